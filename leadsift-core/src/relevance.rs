use crate::config::MarketProfile;
use serde::Serialize;

pub const CORE_WEIGHT: i32 = 2;
pub const DESTINATION_WEIGHT: i32 = 1;
pub const UNRELATED_PENALTY: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relevance {
    pub score: i32,
    pub matched_terms: Vec<String>,
}

/// Keyword scorer for a market profile.
///
/// `+2` once if any core term appears, `+1` per distinct destination term,
/// `-2` once if any unrelated term appears. Matching is case-insensitive
/// substring search.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    core_terms: Vec<String>,
    destination_terms: Vec<String>,
}

fn lowered(terms: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for term in terms {
        let term = term.trim().to_lowercase();
        if !term.is_empty() && !out.contains(&term) {
            out.push(term);
        }
    }
    out
}

impl RelevanceScorer {
    pub fn new(core_terms: &[String], destination_terms: &[String]) -> Self {
        Self {
            core_terms: lowered(core_terms),
            destination_terms: lowered(destination_terms),
        }
    }

    pub fn from_profile(profile: &MarketProfile) -> Self {
        Self::new(&profile.core_terms, &profile.destination_terms)
    }

    pub fn score(&self, text: &str, unrelated_keywords: &[String]) -> Relevance {
        let text = text.to_lowercase();
        let mut score = 0;
        let mut matched_terms = Vec::new();

        let core: Vec<&String> = self
            .core_terms
            .iter()
            .filter(|t| text.contains(t.as_str()))
            .collect();
        if !core.is_empty() {
            score += CORE_WEIGHT;
            matched_terms.extend(core.into_iter().cloned());
        }

        for term in &self.destination_terms {
            if text.contains(term.as_str()) {
                score += DESTINATION_WEIGHT;
                matched_terms.push(term.clone());
            }
        }

        let unrelated: Vec<String> = lowered(unrelated_keywords)
            .into_iter()
            .filter(|t| text.contains(t.as_str()))
            .collect();
        if !unrelated.is_empty() {
            score -= UNRELATED_PENALTY;
            matched_terms.extend(unrelated.into_iter().map(|t| format!("-{}", t)));
        }

        Relevance {
            score,
            matched_terms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> RelevanceScorer {
        RelevanceScorer::from_profile(&MarketProfile::default())
    }

    #[test]
    fn test_core_plus_destination() {
        let relevance = scorer().score("Small group tours of GREECE: Santorini in spring", &[]);
        assert_eq!(relevance.score, 3);
        assert_eq!(relevance.matched_terms, vec!["greece", "santorini"]);
    }

    #[test]
    fn test_core_counted_once() {
        let relevance = scorer().score("Greece, greek islands, hellenic culture", &[]);
        assert_eq!(relevance.score, 2);
    }

    #[test]
    fn test_destinations_counted_per_distinct_term() {
        let relevance = scorer().score("athens athens crete rhodes", &[]);
        assert_eq!(relevance.score, 3);
    }

    #[test]
    fn test_unrelated_penalty_once() {
        let unrelated = vec!["casino".to_string(), "crypto".to_string()];
        let relevance = scorer().score("Greece crypto casino", &unrelated);
        assert_eq!(relevance.score, 0);
        assert!(relevance.matched_terms.contains(&"-casino".to_string()));
    }

    #[test]
    fn test_no_matches() {
        let relevance = scorer().score("Plumbing supplies in Ohio", &[]);
        assert_eq!(relevance.score, 0);
        assert!(relevance.matched_terms.is_empty());
    }
}
