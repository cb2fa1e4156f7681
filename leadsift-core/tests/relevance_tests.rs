// Tests for relevance scoring and snowball expansion

use leadsift_core::config::MarketProfile;
use leadsift_core::relevance::RelevanceScorer;
use leadsift_core::snowball::SnowballExpander;
use leadsift_scanner::PageResult;

#[test]
fn test_score_against_threshold() {
    let scorer = RelevanceScorer::from_profile(&MarketProfile::default());
    let relevance = scorer.score("Island hopping in Greece: Naxos and more", &[]);
    assert_eq!(relevance.score, 3);
    assert!(relevance.score >= 2);
    assert!(relevance.score < 4);
}

#[test]
fn test_custom_profile_terms() {
    let profile = MarketProfile {
        core_terms: vec!["Italy".to_string()],
        destination_terms: vec!["Rome".to_string(), "Florence".to_string()],
        ..MarketProfile::default()
    };
    let scorer = RelevanceScorer::from_profile(&profile);
    let relevance = scorer.score("ITALY tours: rome, florence, venice", &["cheap flights".to_string()]);
    assert_eq!(relevance.score, 4);
    assert_eq!(relevance.matched_terms, vec!["italy", "rome", "florence"]);
}

#[test]
fn test_snowball_candidates_in_discovery_order() {
    let expander = SnowballExpander::from_profile(&MarketProfile::default());
    let pages = vec![
        PageResult::new(
            "https://hub.com/",
            r#"<a href="https://zeta-voyages.com/">Zeta</a><a href="https://instagram.com/hub">Travel pics</a>"#,
        ),
        PageResult::new(
            "https://hub.com/partners",
            r#"<a href="https://alpha-dmc.com/">Destination management</a><a href="https://zeta-voyages.com/x">again</a>"#,
        ),
    ];
    assert_eq!(
        expander.expand(&pages, "hub.com"),
        vec!["zeta-voyages.com", "alpha-dmc.com"]
    );
}
