//! Relevance and coherence scoring of validated candidates
//!
//! Each signal contributes an independently weighted term. The sum is
//! clamped to `[0, 1]`; weights need not add up to one.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use arbiter_config::{ScoringPolicy, SemanticPolicy};

use crate::analysis::{self, Question, TypeFit};
use crate::coherence::{CoherenceCheck, Incoherence};
use crate::semantic::SimilarityScorer;

/// Candidates shorter than this are never penalized for repetition
const REPETITION_MIN_WORDS: usize = 5;

/// Every term that went into a score
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub baseline: f64,
    /// Share of question keywords found in the candidate; `None` when the
    /// question is too short for the term to apply
    pub keyword_overlap: Option<f64>,
    pub overlap_term: f64,
    pub technical_bonus: f64,
    /// Positive on a format match, negative on a penalized mismatch
    pub type_match: f64,
    pub repetition_penalty: f64,
    pub generic_penalty: f64,
    pub uncertainty_penalty: f64,
    /// First coherence problem found, if any
    pub incoherence: Option<Incoherence>,
    pub coherence_penalty: f64,
    pub semantic_similarity: Option<f64>,
    pub context_similarity: Option<f64>,
    pub semantic_term: f64,
    pub total: f64,
}

pub struct QualityScorer {
    policy: ScoringPolicy,
    semantic: SemanticPolicy,
    technical: BTreeSet<String>,
    generic_phrases: Vec<String>,
    dont_know_phrases: Vec<String>,
    coherence: CoherenceCheck,
    similarity: Arc<dyn SimilarityScorer>,
}

impl QualityScorer {
    /// Scorer using `similarity` for the semantic and context terms
    pub fn new(policy: &ScoringPolicy, semantic: &SemanticPolicy, similarity: Arc<dyn SimilarityScorer>) -> Self {
        let technical = policy
            .technical_keywords
            .iter()
            .flat_map(|keyword| analysis::keywords(keyword))
            .collect();

        Self {
            policy: policy.clone(),
            semantic: semantic.clone(),
            technical,
            generic_phrases: normalize_phrases(&policy.generic_phrases),
            dont_know_phrases: normalize_phrases(&policy.dont_know_phrases),
            coherence: CoherenceCheck::new(&policy.coherence),
            similarity,
        }
    }

    /// Score a validated candidate against its question and context
    pub async fn score(&self, candidate: &str, question: &Question) -> ScoreBreakdown {
        let weights = &self.policy.weights;
        let candidate_words = analysis::keywords(candidate);
        let question_words = question.keywords();

        let mut breakdown = ScoreBreakdown {
            baseline: weights.baseline,
            ..ScoreBreakdown::default()
        };

        let ratio = overlap_ratio(question_words, &candidate_words);

        if question_words.len() >= self.policy.relevance.min_question_words {
            let reach = (ratio / self.policy.relevance.min_ratio).min(1.0);
            breakdown.keyword_overlap = Some(ratio);
            breakdown.overlap_term = weights.keyword_overlap * reach.mul_add(2.0, -1.0);
        }

        breakdown.technical_bonus = self.technical_bonus(question_words, &candidate_words);

        breakdown.type_match = match question.kind().fit(analysis::detect_format(candidate)) {
            TypeFit::Match => weights.type_match,
            TypeFit::Mismatch
                if question_words.len() >= self.policy.type_mismatch.min_question_words
                    && ratio <= self.policy.type_mismatch.min_ratio =>
            {
                -weights.type_mismatch
            }
            TypeFit::Mismatch | TypeFit::Neutral => 0.0,
        };

        if self.is_repetitive(candidate) {
            breakdown.repetition_penalty = weights.repetition;
        }

        let opening = normalize(candidate);
        let words = analysis::word_count(candidate);

        if words < self.policy.generic_max_words && starts_with_any(&opening, &self.generic_phrases) {
            breakdown.generic_penalty = weights.generic;
        }

        if words < self.policy.dont_know_min_words && starts_with_any(&opening, &self.dont_know_phrases) {
            breakdown.uncertainty_penalty = weights.uncertainty;
        }

        breakdown.incoherence = self.coherence.check(candidate);
        if breakdown.incoherence.is_some() {
            breakdown.coherence_penalty = weights.coherence;
        }

        breakdown.semantic_similarity = self.similarity.similarity(question.text(), candidate).await;

        if !question.context().is_empty() {
            let context = question.context().join("\n");
            breakdown.context_similarity = self.similarity.similarity(&context, candidate).await;
        }

        breakdown.semantic_term = breakdown
            .semantic_similarity
            .map_or(0.0, |s| (s - self.semantic.min_threshold) * self.semantic.weight)
            + breakdown
                .context_similarity
                .map_or(0.0, |s| s * self.semantic.context_weight);

        let sum = breakdown.baseline
            + breakdown.overlap_term
            + breakdown.technical_bonus
            + breakdown.type_match
            + breakdown.semantic_term
            - breakdown.repetition_penalty
            - breakdown.generic_penalty
            - breakdown.uncertainty_penalty
            - breakdown.coherence_penalty;

        breakdown.total = sum.clamp(0.0, 1.0);

        tracing::debug!(
            question_type = %question.kind(),
            overlap = ?breakdown.keyword_overlap,
            technical = breakdown.technical_bonus,
            type_match = breakdown.type_match,
            repetition = breakdown.repetition_penalty,
            generic = breakdown.generic_penalty,
            uncertainty = breakdown.uncertainty_penalty,
            incoherence = ?breakdown.incoherence,
            semantic = ?breakdown.semantic_similarity,
            total = breakdown.total,
            "candidate scored"
        );

        breakdown
    }

    /// Coverage of the question's technical terms by the candidate
    #[allow(clippy::cast_precision_loss)]
    fn technical_bonus(&self, question_words: &BTreeSet<String>, candidate_words: &BTreeSet<String>) -> f64 {
        let asked: Vec<_> = question_words.intersection(&self.technical).collect();

        if asked.is_empty() {
            return 0.0;
        }

        let covered = asked.iter().filter(|word| candidate_words.contains(word.as_str())).count();
        let coverage = covered as f64 / asked.len() as f64;

        coverage * self.policy.technical_boost * self.policy.weights.technical
    }

    #[allow(clippy::cast_precision_loss)]
    fn is_repetitive(&self, candidate: &str) -> bool {
        let words: Vec<String> = analysis::raw_words(candidate).collect();

        if words.len() < REPETITION_MIN_WORDS {
            return false;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for word in &words {
            if word.chars().count() >= self.policy.repetition.min_word_length {
                *counts.entry(word.as_str()).or_default() += 1;
            }
        }

        let max = counts.values().copied().max().unwrap_or(0);
        max as f64 / words.len() as f64 > self.policy.repetition.max_word_ratio
    }
}

impl std::fmt::Debug for QualityScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityScorer")
            .field("policy", &self.policy)
            .field("semantic", &self.semantic)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::cast_precision_loss)]
fn overlap_ratio(question: &BTreeSet<String>, candidate: &BTreeSet<String>) -> f64 {
    if question.is_empty() {
        return 0.0;
    }

    question.intersection(candidate).count() as f64 / question.len() as f64
}

/// Lower-case and straighten typographic apostrophes
fn normalize(text: &str) -> String {
    text.trim().to_lowercase().replace('\u{2019}', "'")
}

fn normalize_phrases(phrases: &[String]) -> Vec<String> {
    phrases.iter().map(|p| normalize(p)).filter(|p| !p.is_empty()).collect()
}

fn starts_with_any(text: &str, phrases: &[String]) -> bool {
    phrases.iter().any(|phrase| text.starts_with(phrase.as_str()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::semantic::NoopSimilarity;

    fn scorer() -> QualityScorer {
        QualityScorer::new(
            &ScoringPolicy::default(),
            &SemanticPolicy::default(),
            Arc::new(NoopSimilarity),
        )
    }

    async fn total(candidate: &str, question: &str) -> f64 {
        scorer().score(candidate, &Question::new(question, Vec::new())).await.total
    }

    struct FixedSimilarity {
        value: f64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SimilarityScorer for FixedSimilarity {
        async fn similarity(&self, _a: &str, _b: &str) -> Option<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(self.value)
        }
    }

    #[tokio::test]
    async fn mountain_ranges_list_scores_high() {
        let question = Question::new("name three mountain ranges in the US", Vec::new());
        let breakdown = scorer()
            .score("- The Rocky Mountains\n- The Sierra Nevada\n- The Cascade Range", &question)
            .await;

        assert!(breakdown.keyword_overlap.unwrap() >= 0.2);
        assert!(breakdown.type_match > 0.0);
        assert!(breakdown.total >= 0.5);
    }

    #[tokio::test]
    async fn irrelevant_answer_scores_low() {
        assert!(total("I love cats and dogs", "How to write Python function?").await < 0.5);
        assert!(total("The weather is sunny today", "What is machine learning used for in medicine?").await < 0.5);
    }

    #[tokio::test]
    async fn short_questions_skip_overlap() {
        let breakdown = scorer().score("8080", &Question::new("What port?", Vec::new())).await;

        assert_eq!(breakdown.keyword_overlap, None);
        assert!((breakdown.overlap_term).abs() < f64::EPSILON);
        assert!(breakdown.total >= 0.5);

        // two keywords: relevance is left to the semantic term
        let off_topic = scorer()
            .score("The weather is sunny today", &Question::new("What is machine learning?", Vec::new()))
            .await;
        assert_eq!(off_topic.keyword_overlap, None);
    }

    #[tokio::test]
    async fn generic_openings_are_penalized_unless_substantial() {
        let question = Question::new("How do I configure logging?", Vec::new());

        let short = scorer().score("I'd be happy to help you with that.", &question).await;
        assert!(short.generic_penalty > 0.0);
        assert!(short.total < 0.5);

        let long = scorer()
            .score(
                "I'd be happy to help you with that. Set RUST_LOG to debug and configure logging in the tracing subscriber.",
                &question,
            )
            .await;
        assert!((long.generic_penalty).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn uncertainty_is_tolerated_when_informative() {
        let question = Question::new("Which config option sets the timeout?", Vec::new());

        let bare = scorer().score("I don't know", &question).await;
        assert!(bare.uncertainty_penalty > 0.0);

        for refusal in ["I can't help", "I cannot help", "I can\u{2019}t help"] {
            let breakdown = scorer().score(refusal, &Question::new("Question", Vec::new())).await;
            assert!(breakdown.uncertainty_penalty > 0.0, "{refusal}");
            assert!(breakdown.total < 0.5, "{refusal}");
        }

        let informative = scorer()
            .score(
                "I don't know the exact option, but the timeout config usually lives under the backend section.",
                &question,
            )
            .await;
        assert!((informative.uncertainty_penalty).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn repetition_is_penalized() {
        let question = Question::new("Is it working?", Vec::new());

        let broken = scorer().score(&"broken ".repeat(10), &question).await;
        assert!(broken.repetition_penalty > 0.0);

        let examples = scorer()
            .score(
                "Example 1: print('hello'). Example 2: print('world'). Example 3: print('!')",
                &question,
            )
            .await;
        assert!((examples.repetition_penalty).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn contradictory_answer_scores_low() {
        let breakdown = scorer()
            .score(
                "I can help you with that. I cannot help you with that. Maybe I can help.",
                &Question::new("Question", Vec::new()),
            )
            .await;

        assert_eq!(breakdown.incoherence, Some(Incoherence::Contradiction));
        assert!(breakdown.coherence_penalty > 0.0);
        assert!(breakdown.total < 0.5);
    }

    #[tokio::test]
    async fn trailing_sentences_score_low() {
        let breakdown = scorer()
            .score(
                "To implement the feature, first you need to. Then you should. Finally, you must.",
                &Question::new("Question", Vec::new()),
            )
            .await;

        assert_eq!(breakdown.incoherence, Some(Incoherence::DanglingSentences));
        assert!(breakdown.total < 0.5);
    }

    #[tokio::test]
    async fn looping_phrases_score_low() {
        let breakdown = scorer()
            .score(
                "This is this is this is a repetitive response response response that repeats repeats",
                &Question::new("Question", Vec::new()),
            )
            .await;

        assert_eq!(breakdown.incoherence, Some(Incoherence::RepeatedPhrases));
        assert!(breakdown.total < 0.5);
    }

    #[tokio::test]
    async fn coherent_answer_carries_no_coherence_penalty() {
        let breakdown = scorer()
            .score(
                "This is a well-structured response. It provides clear information about the topic.",
                &Question::new("Question", Vec::new()),
            )
            .await;

        assert_eq!(breakdown.incoherence, None);
        assert!((breakdown.coherence_penalty).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn technical_terms_earn_bonus() {
        let question = Question::new("How do I restart the database server?", Vec::new());

        let covered = scorer()
            .score("Run systemctl restart on the database server process.", &question)
            .await;
        let uncovered = scorer().score("Just reboot the whole machine and wait.", &question).await;

        assert!(covered.technical_bonus > 0.0);
        assert!((uncovered.technical_bonus).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn type_mismatch_needs_long_question_and_low_overlap() {
        let question = Question::new("write code to parse a json file in rust", Vec::new());

        let prose = scorer().score("Cats sleep most of the afternoon in the sun.", &question).await;
        assert!(prose.type_match < 0.0);

        let related = scorer()
            .score("You parse the json file with serde in rust, reading it first.", &question)
            .await;
        assert!(related.type_match >= 0.0);
    }

    #[tokio::test]
    async fn score_is_deterministic() {
        let question = Question::new("What is the borrow checker in Rust?", vec!["we were talking about rust".to_owned()]);
        let candidate = "The borrow checker enforces Rust's ownership rules at compile time.";

        let scorer = scorer();
        let first = scorer.score(candidate, &question).await;
        let second = scorer.score(candidate, &question).await;

        assert_eq!(first, second);
        assert_eq!(first.total.to_bits(), second.total.to_bits());
    }

    #[tokio::test]
    async fn total_is_clamped() {
        let policy = ScoringPolicy {
            weights: arbiter_config::ScoringWeights {
                baseline: 1.0,
                type_match: 1.0,
                keyword_overlap: 1.0,
                ..Default::default()
            },
            ..ScoringPolicy::default()
        };
        let scorer = QualityScorer::new(&policy, &SemanticPolicy::default(), Arc::new(NoopSimilarity));
        let breakdown = scorer
            .score(
                "- The Rocky Mountains\n- The Sierra Nevada\n- The Cascade Range",
                &Question::new("name three mountain ranges in the US", Vec::new()),
            )
            .await;

        assert!((breakdown.total - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn similarity_contributes_question_and_context_terms() {
        let similarity = Arc::new(FixedSimilarity {
            value: 0.8,
            calls: AtomicUsize::new(0),
        });
        let scorer = QualityScorer::new(&ScoringPolicy::default(), &SemanticPolicy::default(), similarity.clone());

        let breakdown = scorer
            .score(
                "Tokio is an async runtime.",
                &Question::new("What is tokio?", vec!["earlier: async rust".to_owned()]),
            )
            .await;

        assert_eq!(similarity.calls.load(Ordering::SeqCst), 2);
        assert_eq!(breakdown.semantic_similarity, Some(0.8));
        assert_eq!(breakdown.context_similarity, Some(0.8));
        // (0.8 - 0.3) * 0.4 + 0.8 * 0.2
        assert!((breakdown.semantic_term - 0.36).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_similarity_degrades_to_keywords() {
        let breakdown = scorer()
            .score("Tokio is an async runtime.", &Question::new("What is tokio?", Vec::new()))
            .await;

        assert_eq!(breakdown.semantic_similarity, None);
        assert!((breakdown.semantic_term).abs() < f64::EPSILON);
    }
}
