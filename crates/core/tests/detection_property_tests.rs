//! Property-based tests for pattern generation and confidence scoring.

use proptest::prelude::*;
use prodsync_core::detection::{
    ConfidenceScorer, DetectionPattern, PatternGenerator, PatternKind,
};
use prodsync_core::providers::{LocationLink, ProviderRecord};
use prodsync_core::settings::DetectionSettings;

// =============================================================================
// Generators
// =============================================================================

fn arb_provider() -> impl Strategy<Value = ProviderRecord> {
    (
        "[A-Za-z]{2,12}",
        "[A-Za-z' -]{2,16}",
        proptest::option::of("[a-z.]{1,10}@[a-z]{3,8}\\.example"),
        proptest::option::of("(Dr\\.?|Prof|Ms)"),
        proptest::option::of("[A-Z]{3}-[0-9]{4}"),
        proptest::collection::vec((any::<bool>(), any::<bool>()), 0..3),
    )
        .prop_map(|(first, last, email, title, external_id, links)| {
            let code = format!("{}_{}", first, last).to_lowercase();
            ProviderRecord {
                id: format!("id-{}", code),
                code,
                display_name: format!("{} {}", first, last),
                first_name: first,
                last_name: last,
                email,
                title_prefix: title,
                external_id,
                locations: links
                    .into_iter()
                    .enumerate()
                    .map(|(i, (is_primary, is_active))| LocationLink {
                        clinic_code: format!("C{}", i),
                        location_code: format!("L{}", i),
                        is_primary,
                        is_active,
                    })
                    .collect(),
            }
        })
}

fn arb_weight() -> impl Strategy<Value = f64> {
    (1u32..=100).prop_map(|w| f64::from(w) / 100.0)
}

/// Distinct lowercase tokens paired with weights.
fn arb_weighted_tokens(max: usize) -> impl Strategy<Value = Vec<(String, f64)>> {
    proptest::collection::btree_map("[a-z]{3,8}", arb_weight(), 1..=max)
        .prop_map(|tokens| tokens.into_iter().collect())
}

fn token_pattern(token: &str, weight: f64) -> DetectionPattern {
    DetectionPattern::new(PatternKind::Name, weight, &format!(r"(?i)\b{}\b", token)).unwrap()
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The same record always yields the same patterns, in the same order.
    #[test]
    fn prop_generation_is_deterministic(provider in arb_provider(), nicknames in any::<bool>()) {
        let settings = DetectionSettings {
            include_nicknames: nicknames,
            ..DetectionSettings::default()
        };
        let first = PatternGenerator::new(&settings).generate(&provider);
        let second = PatternGenerator::new(&settings).generate(&provider.clone());

        let first: Vec<&str> = first.iter().map(|p| p.as_str()).collect();
        let second: Vec<&str> = second.iter().map(|p| p.as_str()).collect();
        prop_assert_eq!(first, second);
    }

    /// Every generated pattern carries a weight within (0, 1].
    #[test]
    fn prop_generated_weights_are_bounded(provider in arb_provider()) {
        let patterns = PatternGenerator::new(&DetectionSettings::default()).generate(&provider);
        for pattern in &patterns {
            prop_assert!(pattern.weight() > 0.0 && pattern.weight() <= 1.0);
        }
    }

    /// Scores stay within [0, 1] and are zero exactly when nothing matched.
    #[test]
    fn prop_score_is_bounded(
        tokens in arb_weighted_tokens(8),
        candidate in "[a-z ]{0,40}",
    ) {
        let patterns: Vec<DetectionPattern> =
            tokens.iter().map(|(t, w)| token_pattern(t, *w)).collect();
        let result = ConfidenceScorer.score(&candidate, &patterns);

        prop_assert!(result.score >= 0.0 && result.score <= 1.0);
        prop_assert_eq!(result.score == 0.0, result.matched_pattern_count == 0);
        prop_assert_eq!(result.breakdown.len(), result.matched_pattern_count);
    }

    /// A candidate matching a superset of another candidate's patterns, where
    /// the extra patterns weigh at least as much, never scores lower.
    #[test]
    fn prop_superset_with_heavier_patterns_scores_higher(
        base in arb_weighted_tokens(5),
        extra in proptest::collection::btree_set("[a-z]{3,8}", 1..4),
        bumps in proptest::collection::vec(0u32..=100, 4),
    ) {
        let max_base = base.iter().map(|(_, w)| *w).fold(0.0f64, f64::max);
        let mut patterns: Vec<DetectionPattern> =
            base.iter().map(|(t, w)| token_pattern(t, *w)).collect();

        let extra: Vec<String> = extra
            .into_iter()
            .filter(|t| base.iter().all(|(b, _)| b != t))
            .collect();
        for (token, bump) in extra.iter().zip(bumps) {
            let weight = max_base + (1.0 - max_base) * f64::from(bump) / 100.0;
            patterns.push(token_pattern(token, weight.clamp(0.01, 1.0)));
        }

        let base_words: Vec<&str> = base.iter().map(|(t, _)| t.as_str()).collect();
        let candidate_b = base_words.join(" ");
        let candidate_a = format!("{} {}", candidate_b, extra.join(" "));

        let score_a = ConfidenceScorer.score(&candidate_a, &patterns);
        let score_b = ConfidenceScorer.score(&candidate_b, &patterns);

        prop_assert!(score_a.matched_pattern_count >= score_b.matched_pattern_count);
        prop_assert!(
            score_a.score >= score_b.score,
            "superset scored {} below {}",
            score_a.score,
            score_b.score
        );
    }

    /// Repeating a matched signal in the candidate does not raise the score.
    #[test]
    fn prop_repetition_does_not_inflate(tokens in arb_weighted_tokens(5), times in 2usize..5) {
        let patterns: Vec<DetectionPattern> =
            tokens.iter().map(|(t, w)| token_pattern(t, *w)).collect();
        let once = tokens.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>().join(" ");
        let repeated = vec![once.as_str(); times].join(" ");

        prop_assert_eq!(
            ConfidenceScorer.score(&once, &patterns).score,
            ConfidenceScorer.score(&repeated, &patterns).score
        );
    }
}
