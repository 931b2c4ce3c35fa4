//! Match pattern generation.
//!
//! Patterns are derived from a provider record alone, so the same record
//! always yields the same patterns in the same order. All source text is
//! regex-escaped before compilation.

use std::collections::HashSet;
use std::sync::Arc;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::providers::ProviderRecord;
use crate::settings::DetectionSettings;
use crate::utils::text::split_display_name;

pub const NAME_WEIGHT: f64 = 0.9;
pub const FULL_NAME_WEIGHT: f64 = 1.0;
pub const TITLE_WEIGHT: f64 = 0.8;
pub const NICKNAME_WEIGHT: f64 = 0.6;
pub const EMAIL_WEIGHT: f64 = 0.7;
pub const EXTERNAL_ID_WEIGHT: f64 = 0.8;

const NAME_SEPARATOR: &str = r"[\s._,-]+";

/// Which provider attribute a pattern was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    Name,
    Title,
    Nickname,
    Email,
    ExternalId,
}

/// A compiled, case-insensitive match rule with its confidence weight.
#[derive(Debug, Clone)]
pub struct DetectionPattern {
    kind: PatternKind,
    weight: f64,
    regex: Regex,
}

impl DetectionPattern {
    /// Compiles `pattern`. `weight` must be in (0, 1].
    pub fn new(kind: PatternKind, weight: f64, pattern: &str) -> Result<Self> {
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "pattern weight must be within (0, 1], got {}",
                weight
            )));
        }
        let regex = Regex::new(pattern)
            .map_err(|e| Error::InvalidInput(format!("pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            kind,
            weight,
            regex,
        })
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

impl PartialEq for DetectionPattern {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.weight == other.weight && self.as_str() == other.as_str()
    }
}

/// Supplies nickname variants for a lowercase first name.
///
/// Nicknames are a weak, approximate signal.
pub trait NicknameSource: Send + Sync {
    fn nicknames(&self, first_name: &str) -> Vec<String>;
}

/// Small built-in nickname table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticNicknames;

impl NicknameSource for StaticNicknames {
    fn nicknames(&self, first_name: &str) -> Vec<String> {
        let names: &[&str] = match first_name {
            "alexander" | "alexandra" => &["alex"],
            "anthony" => &["tony"],
            "benjamin" => &["ben"],
            "christopher" | "christina" | "christine" => &["chris"],
            "daniel" => &["dan", "danny"],
            "deborah" => &["deb", "debbie"],
            "elizabeth" => &["liz", "beth", "eliza"],
            "james" => &["jim", "jimmy"],
            "jennifer" => &["jen", "jenny"],
            "jonathan" => &["jon"],
            "joseph" => &["joe"],
            "katherine" | "catherine" => &["kate", "kathy", "cathy"],
            "margaret" => &["maggie", "peggy"],
            "matthew" => &["matt"],
            "michael" => &["mike"],
            "nicholas" => &["nick"],
            "patricia" => &["pat", "trish"],
            "rebecca" => &["becky"],
            "richard" => &["rick", "rich"],
            "robert" => &["rob", "bob", "bobby"],
            "samuel" | "samantha" => &["sam"],
            "susan" => &["sue"],
            "thomas" => &["tom"],
            "william" => &["will", "bill"],
            _ => &[],
        };
        names.iter().map(|n| n.to_string()).collect()
    }
}

/// Builds the detection patterns for a provider.
#[derive(Clone)]
pub struct PatternGenerator {
    include_nicknames: bool,
    default_title: String,
    nicknames: Arc<dyn NicknameSource>,
}

impl PatternGenerator {
    pub fn new(settings: &DetectionSettings) -> Self {
        Self {
            include_nicknames: settings.include_nicknames,
            default_title: settings.default_title.clone(),
            nicknames: Arc::new(StaticNicknames),
        }
    }

    pub fn with_nickname_source(mut self, nicknames: Arc<dyn NicknameSource>) -> Self {
        self.nicknames = nicknames;
        self
    }

    pub fn generate(&self, provider: &ProviderRecord) -> Vec<DetectionPattern> {
        let mut builder = PatternSet::default();

        let (fallback_first, fallback_last) = split_display_name(&provider.display_name);
        let first = non_empty(&provider.first_name).unwrap_or(fallback_first.trim());
        let last = non_empty(&provider.last_name).unwrap_or(fallback_last.trim());

        for name in [first, last] {
            if let Some(pattern) = literal(name) {
                builder.push(PatternKind::Name, NAME_WEIGHT, pattern);
            }
        }
        if !first.is_empty() && !last.is_empty() {
            for (a, b) in [(first, last), (last, first)] {
                builder.push(
                    PatternKind::Name,
                    FULL_NAME_WEIGHT,
                    bounded(
                        a,
                        &format!("{}{}{}", regex::escape(a), NAME_SEPARATOR, regex::escape(b)),
                        b,
                    ),
                );
            }
        }

        let title = provider
            .title_prefix
            .as_deref()
            .and_then(non_empty)
            .unwrap_or(self.default_title.as_str());
        let bare_title = title.trim().trim_end_matches('.');
        if !bare_title.is_empty() {
            for name in [first, last].into_iter().filter(|n| !n.is_empty()) {
                builder.push(
                    PatternKind::Title,
                    TITLE_WEIGHT,
                    bounded(
                        bare_title,
                        &format!(r"{}\.?\s*{}", regex::escape(bare_title), regex::escape(name)),
                        name,
                    ),
                );
            }
        }

        if self.include_nicknames && !first.is_empty() {
            let lower = first.to_lowercase();
            for nickname in self.nicknames.nicknames(&lower) {
                if let Some(pattern) = literal(&nickname) {
                    builder.push(PatternKind::Nickname, NICKNAME_WEIGHT, pattern);
                }
            }
            let length = lower.chars().count();
            for size in [3, 4] {
                if length > size {
                    let prefix: String = lower.chars().take(size).collect();
                    if let Some(pattern) = literal(&prefix) {
                        builder.push(PatternKind::Nickname, NICKNAME_WEIGHT, pattern);
                    }
                }
            }
        }

        if let Some(local_part) = provider
            .email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .and_then(non_empty)
        {
            if let Some(pattern) = literal(local_part) {
                builder.push(PatternKind::Email, EMAIL_WEIGHT, pattern);
            }
        }

        if let Some(pattern) = provider
            .external_id
            .as_deref()
            .and_then(non_empty)
            .and_then(literal)
        {
            builder.push(PatternKind::ExternalId, EXTERNAL_ID_WEIGHT, pattern);
        }

        builder.patterns
    }
}

/// Ordered pattern list that drops repeats of the same regex.
#[derive(Default)]
struct PatternSet {
    seen: HashSet<String>,
    patterns: Vec<DetectionPattern>,
}

impl PatternSet {
    fn push(&mut self, kind: PatternKind, weight: f64, source: String) {
        if self.seen.contains(&source) {
            return;
        }
        match DetectionPattern::new(kind, weight, &source) {
            Ok(pattern) => {
                self.seen.insert(source);
                self.patterns.push(pattern);
            }
            Err(e) => warn!("Skipping pattern: {}", e),
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive `body`, with word boundaries on each side whose edge
/// text starts or ends with a word character.
fn bounded(head: &str, body: &str, tail: &str) -> String {
    let start = if head.chars().next().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };
    let end = if tail.chars().last().is_some_and(is_word_char) {
        r"\b"
    } else {
        ""
    };
    format!("(?i){}{}{}", start, body, end)
}

fn literal(text: &str) -> Option<String> {
    let text = non_empty(text)?;
    Some(bounded(text, &regex::escape(text), text))
}
