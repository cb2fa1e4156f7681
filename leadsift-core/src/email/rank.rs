use super::validate::matches_compound;
use crate::model::{EmailCandidate, EmailType, ExtractedBy};
use std::collections::HashMap;

/// Outreach priority of role addresses, best first.
const RANK_GROUPS: &[&[&str]] = &[
    &["info"],
    &["contact"],
    &["sales"],
    &["booking", "bookings"],
    &["reservations"],
    &["office"],
    &["hello"],
    &["enquiry", "enquiries"],
    &["support"],
];

fn rank_key(candidate: &EmailCandidate) -> usize {
    let local = candidate.local_part();

    for (i, group) in RANK_GROUPS.iter().enumerate() {
        if group.contains(&local) {
            return 2 * i;
        }
    }
    for (i, group) in RANK_GROUPS.iter().enumerate() {
        if matches_compound(local, group, &['.', '-', '_']) {
            return 2 * i + 1;
        }
    }

    let unlisted = 2 * RANK_GROUPS.len();
    match candidate.email_type {
        EmailType::Generic => unlisted,
        EmailType::Personal | EmailType::Unknown => unlisted + 1,
    }
}

/// Sort by priority (stable, so discovery order breaks ties) and keep the best `max`.
pub fn rank_and_truncate(mut candidates: Vec<EmailCandidate>, max: usize) -> Vec<EmailCandidate> {
    candidates.sort_by_key(rank_key);
    candidates.truncate(max);
    candidates
}

/// Combine pattern and external candidates, keyed by address, keeping first-seen order.
///
/// An address found by both sources is marked `Both` with the higher confidence.
pub fn merge(pattern: Vec<EmailCandidate>, external: Vec<EmailCandidate>) -> Vec<EmailCandidate> {
    let mut merged: Vec<EmailCandidate> = Vec::with_capacity(pattern.len() + external.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for candidate in pattern {
        if !index.contains_key(&candidate.email) {
            index.insert(candidate.email.clone(), merged.len());
            merged.push(candidate);
        }
    }

    for candidate in external {
        match index.get(&candidate.email) {
            Some(&i) => {
                let existing = &mut merged[i];
                if existing.extracted_by != ExtractedBy::Ai {
                    existing.extracted_by = ExtractedBy::Both;
                }
                existing.confidence = existing.confidence.max(candidate.confidence);
            }
            None => {
                index.insert(candidate.email.clone(), merged.len());
                merged.push(candidate);
            }
        }
    }

    merged
}
