//! Confidence scoring of a candidate string against a pattern set.

use serde::{Deserialize, Serialize};

use crate::constants::SCORE_PRECISION;
use crate::detection::{DetectionPattern, PatternKind};

/// One pattern that matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternHit {
    pub kind: PatternKind,
    pub pattern: String,
    pub weight: f64,
}

/// Outcome of scoring one candidate. Never stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Bounded to [0, 1], rounded to four decimals.
    pub score: f64,
    pub matched_pattern_count: usize,
    pub breakdown: Vec<PatternHit>,
}

impl MatchResult {
    pub fn meets(&self, threshold: f64) -> bool {
        self.matched_pattern_count > 0 && self.score >= threshold
    }
}

/// Averages the weights of every matching pattern.
///
/// Each pattern counts at most once, so repeating a signal in the candidate
/// does not raise the score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn score(&self, candidate: &str, patterns: &[DetectionPattern]) -> MatchResult {
        let breakdown: Vec<PatternHit> = patterns
            .iter()
            .filter(|pattern| pattern.is_match(candidate))
            .map(|pattern| PatternHit {
                kind: pattern.kind(),
                pattern: pattern.as_str().to_string(),
                weight: pattern.weight(),
            })
            .collect();

        let matched_pattern_count = breakdown.len();
        if matched_pattern_count == 0 {
            return MatchResult::default();
        }

        let total: f64 = breakdown.iter().map(|hit| hit.weight).sum();
        let average = (total / matched_pattern_count as f64).min(1.0);

        MatchResult {
            score: round_score(average),
            matched_pattern_count,
            breakdown,
        }
    }
}

/// Rounds to [`SCORE_PRECISION`] so float noise such as 0.8999999 does not
/// fall under a threshold. Never rounds a positive score down to zero.
fn round_score(score: f64) -> f64 {
    let rounded = (score * SCORE_PRECISION).round() / SCORE_PRECISION;
    if rounded > 0.0 {
        rounded
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::PatternGenerator;
    use crate::providers::ProviderRecord;
    use crate::settings::DetectionSettings;

    fn pattern(weight: f64, regex: &str) -> DetectionPattern {
        DetectionPattern::new(PatternKind::Name, weight, regex).unwrap()
    }

    #[test]
    fn test_no_match_scores_zero() {
        let result = ConfidenceScorer.score("Untitled spreadsheet", &[pattern(0.9, "(?i)kamdi")]);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.matched_pattern_count, 0);
        assert!(!result.meets(0.0));
    }

    #[test]
    fn test_average_of_matching_weights() {
        let patterns = vec![
            pattern(1.0, "(?i)kamdi"),
            pattern(0.6, "(?i)irondi"),
            pattern(0.9, "(?i)nobody"),
        ];
        let result = ConfidenceScorer.score("Kamdi Irondi", &patterns);
        assert_eq!(result.matched_pattern_count, 2);
        assert_eq!(result.score, 0.8);
        assert_eq!(result.breakdown.len(), 2);
    }

    #[test]
    fn test_repeated_signal_counts_once() {
        let patterns = vec![pattern(0.6, "(?i)kam")];
        let once = ConfidenceScorer.score("kam", &patterns);
        let twice = ConfidenceScorer.score("kam kam kam", &patterns);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_title_sheet_scores_at_least_point_nine() {
        let provider = ProviderRecord {
            id: "p1".to_string(),
            code: "kamdi_irondi".to_string(),
            display_name: "Kamdi Irondi".to_string(),
            first_name: "kamdi".to_string(),
            last_name: "Irondi".to_string(),
            email: None,
            title_prefix: None,
            external_id: None,
            locations: vec![],
        };
        let patterns = PatternGenerator::new(&DetectionSettings::default()).generate(&provider);
        let result = ConfidenceScorer.score("Dr. Kamdi Irondi — Production", &patterns);
        assert!(result.score >= 0.9, "score was {}", result.score);
        assert!(result
            .breakdown
            .iter()
            .any(|hit| hit.kind == PatternKind::Title));
    }
}
