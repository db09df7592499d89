//! Coherence checks on validated candidates
//!
//! A candidate can pass every structural limit and still not hang
//! together: it denies what it just claimed, trails off mid-sentence, or
//! loops over the same phrase.

use std::collections::HashSet;

use arbiter_config::CoherencePolicy;

use crate::analysis;

/// Why a candidate reads as incoherent
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Incoherence {
    /// The same statement is both made and denied
    Contradiction,
    /// Too many sentences stop on a word that needs a continuation
    DanglingSentences,
    /// Too many phrases repeat an earlier one
    RepeatedPhrases,
}

/// A modal statement such as "i can help you"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Claim<'a> {
    subject: Option<&'a str>,
    modal: &'static str,
    verb: &'a str,
    object: Option<&'a str>,
}

pub struct CoherenceCheck {
    ngram_size: usize,
    max_repeated_ratio: f64,
    max_dangling_sentences: usize,
    dangling_words: HashSet<String>,
}

impl CoherenceCheck {
    /// Build the check from policy; an n-gram size of zero is treated as one
    pub fn new(policy: &CoherencePolicy) -> Self {
        Self {
            ngram_size: policy.ngram_size.max(1),
            max_repeated_ratio: policy.max_repeated_ratio,
            max_dangling_sentences: policy.max_dangling_sentences,
            dangling_words: policy.dangling_words.iter().map(|w| w.trim().to_lowercase()).collect(),
        }
    }

    /// First coherence problem found in `candidate`, if any
    pub fn check(&self, candidate: &str) -> Option<Incoherence> {
        let text = candidate.replace('\u{2019}', "'");
        let words: Vec<String> = analysis::raw_words(&text).collect();

        if contradicts_itself(&words) {
            return Some(Incoherence::Contradiction);
        }

        if self.dangling_sentences(&text) > self.max_dangling_sentences {
            return Some(Incoherence::DanglingSentences);
        }

        if self.repeated_ratio(&words) > self.max_repeated_ratio {
            return Some(Incoherence::RepeatedPhrases);
        }

        None
    }

    fn dangling_sentences(&self, text: &str) -> usize {
        text.split(['.', '!', '?'])
            .filter_map(|sentence| analysis::raw_words(sentence).last())
            .filter(|last| self.dangling_words.contains(last))
            .count()
    }

    /// Share of word n-grams that already appeared earlier in the text
    #[allow(clippy::cast_precision_loss)]
    fn repeated_ratio(&self, words: &[String]) -> f64 {
        if words.len() < self.ngram_size * 2 {
            return 0.0;
        }

        let mut seen = HashSet::new();
        let mut total = 0_usize;
        let mut repeated = 0_usize;

        for ngram in words.windows(self.ngram_size) {
            total += 1;
            if !seen.insert(ngram) {
                repeated += 1;
            }
        }

        repeated as f64 / total as f64
    }
}

impl std::fmt::Debug for CoherenceCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoherenceCheck")
            .field("ngram_size", &self.ngram_size)
            .field("max_repeated_ratio", &self.max_repeated_ratio)
            .field("max_dangling_sentences", &self.max_dangling_sentences)
            .finish_non_exhaustive()
    }
}

/// Whether a "can"/"will" statement is later denied with the same subject,
/// verb and object, or the other way round
fn contradicts_itself(words: &[String]) -> bool {
    let mut affirmed = HashSet::new();
    let mut denied = HashSet::new();

    for (i, word) in words.iter().enumerate() {
        let (modal, verb_at, negated) = match word.as_str() {
            "can" | "will" if words.get(i + 1).is_some_and(|next| next == "not") => (modal_of(word), i + 2, true),
            "can" | "will" => (modal_of(word), i + 1, false),
            "cannot" | "can't" => ("can", i + 1, true),
            "won't" => ("will", i + 1, true),
            _ => continue,
        };

        let Some(verb) = words.get(verb_at) else {
            continue;
        };

        let claim = Claim {
            subject: i.checked_sub(1).map(|at| words[at].as_str()),
            modal,
            verb: verb.as_str(),
            object: words.get(verb_at + 1).map(String::as_str),
        };

        let opposite = if negated { &affirmed } else { &denied };
        if opposite.contains(&claim) {
            return true;
        }

        if negated {
            denied.insert(claim);
        } else {
            affirmed.insert(claim);
        }
    }

    false
}

fn modal_of(word: &str) -> &'static str {
    if word == "will" { "will" } else { "can" }
}
