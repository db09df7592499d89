//! Structural validation of candidate answers
//!
//! Checks run in a fixed order and the first failure wins. Validation is
//! pure: the only output besides the verdict is the candidate with its
//! reasoning blocks removed.

use std::sync::LazyLock;

use arbiter_config::ValidationPolicy;
use regex::Regex;
use thiserror::Error;

use crate::analysis::{QuestionType, count_list_items, count_sentences, word_count};
use crate::error::RoutingError;

/// Why a candidate was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Nothing left after removing reasoning blocks
    #[error("empty after removing reasoning blocks")]
    Empty,

    #[error("too short: {length} characters, minimum {min}")]
    TooShort { length: usize, min: usize },

    #[error("too long: {length} characters, maximum {max}")]
    TooLong { length: usize, max: usize },

    #[error("list too long: {items} items, maximum {max}")]
    ListTooLong { items: usize, max: usize },

    #[error("too complex: {sentences} sentences, maximum {max}")]
    TooComplex { sentences: usize, max: usize },

    #[error("banned markup matched `{pattern}`")]
    BannedMarkup { pattern: String },
}

impl Rejection {
    /// Short label used in logs and metric attributes
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooShort { .. } => "too_short",
            Self::TooLong { .. } => "too_long",
            Self::ListTooLong { .. } => "list_too_long",
            Self::TooComplex { .. } => "too_complex",
            Self::BannedMarkup { .. } => "banned_markup",
        }
    }
}

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("think block regex is valid"));

/// A `<think>` that is never closed swallows the rest of the text
static UNCLOSED_THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*$").expect("unclosed think regex is valid"));

/// Remove model reasoning blocks and surrounding whitespace
pub fn strip_reasoning(candidate: &str) -> String {
    let closed = THINK_BLOCK_RE.replace_all(candidate, "");
    let open = UNCLOSED_THINK_RE.replace(&closed, "");
    open.trim().to_owned()
}

/// Validator with banned patterns compiled once
pub struct Validator {
    policy: ValidationPolicy,
    banned: Vec<(String, Regex)>,
}

impl Validator {
    /// Compile the banned patterns; an invalid one is an error
    pub fn new(policy: &ValidationPolicy) -> Result<Self, RoutingError> {
        let banned: Vec<(String, Regex)> = policy
            .banned_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map(|regex| (pattern.clone(), regex))
                    .map_err(|e| RoutingError::InvalidPattern(format!("{pattern}: {e}")))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            policy: policy.clone(),
            banned,
        })
    }

    /// Check a raw candidate, returning the cleaned text when it passes
    pub fn validate(&self, candidate: &str, question_type: QuestionType) -> Result<String, Rejection> {
        let text = strip_reasoning(candidate);

        if text.is_empty() {
            return Err(Rejection::Empty);
        }

        let length = text.chars().count();

        if length < self.policy.min_response_length {
            return Err(Rejection::TooShort {
                length,
                min: self.policy.min_response_length,
            });
        }

        if length > self.policy.max_length {
            return Err(Rejection::TooLong {
                length,
                max: self.policy.max_length,
            });
        }

        let items = count_list_items(&text);
        if items > self.policy.max_list_items {
            return Err(Rejection::ListTooLong {
                items,
                max: self.policy.max_list_items,
            });
        }

        let sentences = count_sentences(&text);
        if sentences > self.policy.max_sentences && !self.within_word_cap(&text, question_type) {
            return Err(Rejection::TooComplex {
                sentences,
                max: self.policy.max_sentences,
            });
        }

        if let Some((pattern, _)) = self.banned.iter().find(|(_, regex)| regex.is_match(&text)) {
            return Err(Rejection::BannedMarkup {
                pattern: pattern.clone(),
            });
        }

        Ok(text)
    }

    /// Short-answer types may run past the sentence cap while under their word cap
    fn within_word_cap(&self, text: &str, question_type: QuestionType) -> bool {
        let cap = match question_type {
            QuestionType::Explanation => self.policy.explanation_max_words,
            QuestionType::Procedural => self.policy.procedural_max_words,
            QuestionType::Code => self.policy.code_max_words,
            QuestionType::List | QuestionType::Reasoning | QuestionType::Generic => return false,
        };

        word_count(text) <= cap
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("policy", &self.policy)
            .field("banned", &self.banned.len())
            .finish()
    }
}
