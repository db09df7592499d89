use std::time::Duration;

use serde::Deserialize;

/// Decision policy shared by every request
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Minimum score for the primary's candidate to be accepted in fallback mode
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,
    /// Latency samples kept per backend
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub validation: ValidationPolicy,
    #[serde(default)]
    pub scoring: ScoringPolicy,
    #[serde(default)]
    pub semantic: SemanticPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: default_acceptance_threshold(),
            latency_window: default_latency_window(),
            retry: RetryPolicy::default(),
            validation: ValidationPolicy::default(),
            scoring: ScoringPolicy::default(),
            semantic: SemanticPolicy::default(),
        }
    }
}

/// Re-invocation of a backend that answered with nothing
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    /// Invocations per backend per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between an empty answer and the next attempt
    #[serde(default, deserialize_with = "crate::duration::deserialize")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: Duration::ZERO,
        }
    }
}

/// Structural limits on a candidate answer
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationPolicy {
    /// Fewer characters than this is `TooShort`
    #[serde(default = "default_min_response_length")]
    pub min_response_length: usize,
    /// More characters than this is `TooLong`
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_max_list_items")]
    pub max_list_items: usize,
    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,
    /// Word cap under which an explanation may exceed the sentence limit
    #[serde(default = "default_explanation_max_words")]
    pub explanation_max_words: usize,
    #[serde(default = "default_procedural_max_words")]
    pub procedural_max_words: usize,
    #[serde(default = "default_code_max_words")]
    pub code_max_words: usize,
    /// Regular expressions that must not match the candidate
    #[serde(default = "default_banned_patterns")]
    pub banned_patterns: Vec<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_response_length: default_min_response_length(),
            max_length: default_max_length(),
            max_list_items: default_max_list_items(),
            max_sentences: default_max_sentences(),
            explanation_max_words: default_explanation_max_words(),
            procedural_max_words: default_procedural_max_words(),
            code_max_words: default_code_max_words(),
            banned_patterns: default_banned_patterns(),
        }
    }
}

/// Relevance and coherence scoring
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringPolicy {
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub relevance: RelevancePolicy,
    #[serde(default)]
    pub type_mismatch: TypeMismatchPolicy,
    #[serde(default)]
    pub repetition: RepetitionPolicy,
    #[serde(default)]
    pub coherence: CoherencePolicy,
    /// Openings that signal a content-free answer
    #[serde(default = "default_generic_phrases")]
    pub generic_phrases: Vec<String>,
    /// A generic opening with at least this many words is not penalized
    #[serde(default = "default_generic_max_words")]
    pub generic_max_words: usize,
    /// Openings that admit not knowing the answer
    #[serde(default = "default_dont_know_phrases")]
    pub dont_know_phrases: Vec<String>,
    /// An uncertain opening with at least this many words is not penalized
    #[serde(default = "default_dont_know_min_words")]
    pub dont_know_min_words: usize,
    /// Domain terms whose coverage earns the technical bonus
    #[serde(default = "default_technical_keywords")]
    pub technical_keywords: Vec<String>,
    #[serde(default = "default_technical_boost")]
    pub technical_boost: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            relevance: RelevancePolicy::default(),
            type_mismatch: TypeMismatchPolicy::default(),
            repetition: RepetitionPolicy::default(),
            coherence: CoherencePolicy::default(),
            generic_phrases: default_generic_phrases(),
            generic_max_words: default_generic_max_words(),
            dont_know_phrases: default_dont_know_phrases(),
            dont_know_min_words: default_dont_know_min_words(),
            technical_keywords: default_technical_keywords(),
            technical_boost: default_technical_boost(),
        }
    }
}

/// Independent weight of every scoring term, each in `0.0..=1.0`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringWeights {
    #[serde(default = "default_baseline_weight")]
    pub baseline: f64,
    #[serde(default = "default_keyword_overlap_weight")]
    pub keyword_overlap: f64,
    #[serde(default = "default_technical_weight")]
    pub technical: f64,
    #[serde(default = "default_type_match_weight")]
    pub type_match: f64,
    #[serde(default = "default_type_mismatch_weight")]
    pub type_mismatch: f64,
    #[serde(default = "default_penalty_weight")]
    pub repetition: f64,
    #[serde(default = "default_penalty_weight")]
    pub generic: f64,
    #[serde(default = "default_penalty_weight")]
    pub uncertainty: f64,
    #[serde(default = "default_penalty_weight")]
    pub coherence: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            baseline: default_baseline_weight(),
            keyword_overlap: default_keyword_overlap_weight(),
            technical: default_technical_weight(),
            type_match: default_type_match_weight(),
            type_mismatch: default_type_mismatch_weight(),
            repetition: default_penalty_weight(),
            generic: default_penalty_weight(),
            uncertainty: default_penalty_weight(),
            coherence: default_penalty_weight(),
        }
    }
}

impl ScoringWeights {
    /// Every weight paired with its config key
    pub fn named(&self) -> [(&'static str, f64); 9] {
        [
            ("baseline", self.baseline),
            ("keyword_overlap", self.keyword_overlap),
            ("technical", self.technical),
            ("type_match", self.type_match),
            ("type_mismatch", self.type_mismatch),
            ("repetition", self.repetition),
            ("generic", self.generic),
            ("uncertainty", self.uncertainty),
            ("coherence", self.coherence),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelevancePolicy {
    /// Overlap ratio at which the keyword term reaches its full weight
    #[serde(default = "default_relevance_min_ratio")]
    pub min_ratio: f64,
    /// Questions with fewer meaningful words skip the keyword term
    #[serde(default = "default_relevance_min_question_words")]
    pub min_question_words: usize,
}

impl Default for RelevancePolicy {
    fn default() -> Self {
        Self {
            min_ratio: default_relevance_min_ratio(),
            min_question_words: default_relevance_min_question_words(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeMismatchPolicy {
    /// Overlap above this ratio forgives a format mismatch
    #[serde(default = "default_type_mismatch_min_ratio")]
    pub min_ratio: f64,
    #[serde(default = "default_type_mismatch_min_question_words")]
    pub min_question_words: usize,
}

impl Default for TypeMismatchPolicy {
    fn default() -> Self {
        Self {
            min_ratio: default_type_mismatch_min_ratio(),
            min_question_words: default_type_mismatch_min_question_words(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepetitionPolicy {
    /// Highest share of the candidate a single word may take
    #[serde(default = "default_repetition_max_word_ratio")]
    pub max_word_ratio: f64,
    /// Shorter words are ignored when counting repeats
    #[serde(default = "default_repetition_min_word_length")]
    pub min_word_length: usize,
}

impl Default for RepetitionPolicy {
    fn default() -> Self {
        Self {
            max_word_ratio: default_repetition_max_word_ratio(),
            min_word_length: default_repetition_min_word_length(),
        }
    }
}

/// Signs that a candidate does not hang together
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoherencePolicy {
    /// Length in words of the phrases checked for repeats
    #[serde(default = "default_coherence_ngram_size")]
    pub ngram_size: usize,
    /// Highest share of phrases that may repeat an earlier one
    #[serde(default = "default_coherence_max_repeated_ratio")]
    pub max_repeated_ratio: f64,
    /// More sentences than this ending on a dangling word is broken structure
    #[serde(default = "default_coherence_max_dangling_sentences")]
    pub max_dangling_sentences: usize,
    /// Words a complete sentence does not end on
    #[serde(default = "default_dangling_words")]
    pub dangling_words: Vec<String>,
}

impl Default for CoherencePolicy {
    fn default() -> Self {
        Self {
            ngram_size: default_coherence_ngram_size(),
            max_repeated_ratio: default_coherence_max_repeated_ratio(),
            max_dangling_sentences: default_coherence_max_dangling_sentences(),
            dangling_words: default_dangling_words(),
        }
    }
}

/// Embedding-based similarity terms
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SemanticPolicy {
    /// Requires an `[embeddings]` section
    #[serde(default)]
    pub enabled: bool,
    /// Similarity below this subtracts from the score
    #[serde(default = "default_semantic_min_threshold")]
    pub min_threshold: f64,
    #[serde(default = "default_semantic_weight")]
    pub weight: f64,
    #[serde(default = "default_semantic_context_weight")]
    pub context_weight: f64,
}

impl Default for SemanticPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            min_threshold: default_semantic_min_threshold(),
            weight: default_semantic_weight(),
            context_weight: default_semantic_context_weight(),
        }
    }
}

const fn default_acceptance_threshold() -> f64 {
    0.5
}
const fn default_latency_window() -> usize {
    100
}
const fn default_max_attempts() -> u32 {
    3
}
const fn default_min_response_length() -> usize {
    3
}
const fn default_max_length() -> usize {
    400
}
const fn default_max_list_items() -> usize {
    5
}
const fn default_max_sentences() -> usize {
    3
}
const fn default_explanation_max_words() -> usize {
    60
}
const fn default_procedural_max_words() -> usize {
    80
}
const fn default_code_max_words() -> usize {
    100
}
const fn default_baseline_weight() -> f64 {
    0.5
}
const fn default_keyword_overlap_weight() -> f64 {
    0.4
}
const fn default_technical_weight() -> f64 {
    0.1
}
const fn default_type_match_weight() -> f64 {
    0.1
}
const fn default_type_mismatch_weight() -> f64 {
    0.3
}
const fn default_penalty_weight() -> f64 {
    0.4
}
const fn default_relevance_min_ratio() -> f64 {
    0.2
}
const fn default_relevance_min_question_words() -> usize {
    3
}
const fn default_type_mismatch_min_ratio() -> f64 {
    0.3
}
const fn default_type_mismatch_min_question_words() -> usize {
    4
}
const fn default_repetition_max_word_ratio() -> f64 {
    0.4
}
const fn default_repetition_min_word_length() -> usize {
    4
}
const fn default_coherence_ngram_size() -> usize {
    2
}
const fn default_coherence_max_repeated_ratio() -> f64 {
    0.2
}
const fn default_coherence_max_dangling_sentences() -> usize {
    1
}
const fn default_generic_max_words() -> usize {
    12
}
const fn default_dont_know_min_words() -> usize {
    10
}
const fn default_technical_boost() -> f64 {
    1.0
}
const fn default_semantic_min_threshold() -> f64 {
    0.3
}
const fn default_semantic_weight() -> f64 {
    0.4
}
const fn default_semantic_context_weight() -> f64 {
    0.2
}

fn default_banned_patterns() -> Vec<String> {
    vec![
        r"(?m)^#{1,6}\s".to_owned(),
        r"(?i)</?(?:div|table|tr|td|th|ul|ol|li|h[1-6]|pre|section)\b[^>]*>".to_owned(),
    ]
}

fn default_generic_phrases() -> Vec<String> {
    [
        "i'd be happy to help",
        "i would be happy to help",
        "that's a great question",
        "that is a great question",
        "great question",
        "here's some information",
        "here is some information",
        "i can help with that",
        "let me help you",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_dont_know_phrases() -> Vec<String> {
    [
        "i don't know",
        "i do not know",
        "i'm not sure",
        "i am not sure",
        "i'm not certain",
        "i have no idea",
        "i cannot answer",
        "i can't answer",
        "i cannot help",
        "i can't help",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_dangling_words() -> Vec<String> {
    [
        "a", "an", "the", "to", "of", "and", "or", "but", "should", "must", "need", "will", "can", "could", "would",
        "might", "shall",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

fn default_technical_keywords() -> Vec<String> {
    [
        "code", "function", "python", "javascript", "rust", "api", "database", "server", "test", "linux", "network",
        "http", "sql", "git", "docker",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}
