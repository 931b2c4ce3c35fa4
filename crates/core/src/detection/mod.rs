//! Provider detection: pattern generation, scoring, static fallbacks and the
//! orchestrating service.

mod detection_model;
mod detection_service;
mod patterns;
mod scorer;
mod static_patterns;


pub use detection_model::{
    detection_cache_key, DetectedIdentity, DetectionRequest, DetectionSource,
};
pub use detection_service::{DetectionService, DetectionServiceBuilder};
pub use patterns::{
    DetectionPattern, NicknameSource, PatternGenerator, PatternKind, StaticNicknames,
    EMAIL_WEIGHT, EXTERNAL_ID_WEIGHT, FULL_NAME_WEIGHT, NAME_WEIGHT, NICKNAME_WEIGHT,
    TITLE_WEIGHT,
};
pub use scorer::{ConfidenceScorer, MatchResult, PatternHit};
pub use static_patterns::{StaticPatternConfig, StaticPatternTable};
