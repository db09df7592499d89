//! Question classification and text heuristics
//!
//! Pattern matching only. The same helpers classify questions, detect the
//! shape of a candidate answer and count list items for the validator.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Expected shape of an answer, derived from the question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum QuestionType {
    /// "how does X work", "what is X"
    Explanation,
    /// "how to X", "steps to X"
    Procedural,
    /// "write code to X"
    Code,
    /// "name three X"
    List,
    /// "why X"
    Reasoning,
    Generic,
}

/// How well a candidate's shape fits the question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFit {
    Match,
    Mismatch,
    /// The question has no format expectation
    Neutral,
}

impl QuestionType {
    /// Word cap under which a candidate may exceed the sentence limit
    pub const fn has_short_answer_cap(self) -> bool {
        matches!(self, Self::Explanation | Self::Procedural | Self::Code)
    }

    /// Compare the detected shape of a candidate against this question type
    pub const fn fit(self, candidate: Self) -> TypeFit {
        use QuestionType::{Code, Explanation, Generic, List, Procedural, Reasoning};

        match (self, candidate) {
            (Reasoning | Generic, _) => TypeFit::Neutral,
            (Code, Code)
            | (Procedural, Procedural | List | Code)
            | (List, List | Procedural)
            | (Explanation, Explanation | Procedural | Code) => TypeFit::Match,
            _ => TypeFit::Mismatch,
        }
    }
}

/// A question with its derived classification and keyword set
#[derive(Debug, Clone)]
pub struct Question {
    text: String,
    context: Vec<String>,
    kind: QuestionType,
    keywords: BTreeSet<String>,
}

impl Question {
    /// Classify and tokenize the question once for the whole request
    pub fn new(text: impl Into<String>, context: Vec<String>) -> Self {
        let text = text.into();
        let kind = classify(&text);
        let keywords = keywords(&text);

        Self {
            text,
            context,
            kind,
            keywords,
        }
    }

    /// The question as asked
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Recent conversation lines, oldest first
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// Classification derived at construction
    pub const fn kind(&self) -> QuestionType {
        self.kind
    }

    /// Lower-cased meaningful words, stop-words removed
    pub const fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }
}

static CODE_QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)```|\b(?:write|show|give|generate|create)\b(?:\s+me)?(?:\s+(?:a|an|some|the))?\s+(?:\w+\s+)?(?:code|script|function|snippet|query|program|regex|command)\b|\bcode\s+(?:to|for|that)\b",
    )
    .expect("code question regex is valid")
});

static PROCEDURAL_QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:steps?|step-by-step|instructions|procedure|how\s+to|how\s+can\s+i|how\s+should\s+i|guide\s+to)\b")
        .expect("procedural question regex is valid")
});

static LIST_QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:name|list|give\s+me|what\s+are)\s+(?:\d+|two|three|four|five|six|seven|a\s+few|some|several)\b|list\b)",
    )
    .expect("list question regex is valid")
});

static REASONING_QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*why\b|\bwhy\s+(?:does|do|is|are|did|would|should|can)\b").expect("reasoning question regex is valid")
});

static EXPLANATION_QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:explain|describe|how\s+(?:do|does|did|is|are|can)|what\s+(?:is|are|does|do)|difference\s+between|meaning\s+of)\b",
    )
    .expect("explanation question regex is valid")
});

/// Classify a question; first matching rule wins
pub fn classify(text: &str) -> QuestionType {
    if CODE_QUESTION_RE.is_match(text) {
        QuestionType::Code
    } else if PROCEDURAL_QUESTION_RE.is_match(text) {
        QuestionType::Procedural
    } else if LIST_QUESTION_RE.is_match(text) {
        QuestionType::List
    } else if REASONING_QUESTION_RE.is_match(text) {
        QuestionType::Reasoning
    } else if EXPLANATION_QUESTION_RE.is_match(text) {
        QuestionType::Explanation
    } else {
        QuestionType::Generic
    }
}

// -- candidate shape --

static CODE_ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"```|(?m)^\s*(?:def|fn|pub\s+fn|function|class|import|from|let|const|var|#include)\s+\S|\b(?:SELECT|INSERT|UPDATE|DELETE)\b.+\b(?:FROM|INTO|SET|WHERE)\b|(?m)^\s*(?:git|kubectl|docker|npm|pip|cargo|sudo|apt|curl)\s+\S|`[^`\n]+`",
    )
    .expect("code answer regex is valid")
});

static STEP_WORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:first(?:ly)?|then|next|finally|afterwards|step\s+\d+)\b").expect("step words regex is valid")
});

static SERIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w[^,.;]*,\s*[^,.;]+,?\s+(?:and|or)\s+\w").expect("series regex is valid"));

/// Words at or above which plain prose counts as an explanation
const EXPLANATION_MIN_WORDS: usize = 8;

/// Detect the shape of a candidate answer
pub fn detect_format(text: &str) -> QuestionType {
    if CODE_ANSWER_RE.is_match(text) {
        QuestionType::Code
    } else if count_list_items(text) >= 2 || SERIES_RE.is_match(text) {
        QuestionType::List
    } else if STEP_WORDS_RE.is_match(text) {
        QuestionType::Procedural
    } else if word_count(text) >= EXPLANATION_MIN_WORDS {
        QuestionType::Explanation
    } else {
        QuestionType::Generic
    }
}

// -- list and sentence structure --

/// A bulleted or numbered item at the start of a line
static LINE_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d{1,3}[.)]|[-*•])\s+\S").expect("line item regex is valid"));

/// A numbered marker anywhere after whitespace, e.g. "1. foo 2. bar"
static INLINE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)\d{1,3}[.)]\s+").expect("inline number regex is valid"));

static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence regex is valid"));

/// Count enumerated items, line-leading or inline
pub fn count_list_items(text: &str) -> usize {
    let mut items = 0;

    for line in text.lines() {
        if LINE_ITEM_RE.is_match(line) {
            items += 1;
            // "1. a 2. b" on an item line still counts the trailing inline items
            items += INLINE_NUMBER_RE.find_iter(line).count().saturating_sub(1);
        } else {
            items += INLINE_NUMBER_RE.find_iter(line).count();
        }
    }

    items
}

/// Count prose sentences, ignoring list lines and numbered markers
pub fn count_sentences(text: &str) -> usize {
    text.lines()
        .filter(|line| !LINE_ITEM_RE.is_match(line))
        .map(|line| {
            let prose = INLINE_NUMBER_RE.replace_all(line, " ");
            SENTENCE_END_RE
                .split(&prose)
                .filter(|segment| segment.chars().any(char::is_alphanumeric))
                .count()
        })
        .sum()
}

/// Whitespace-separated words, markup included
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

// -- tokenization --

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be", "been", "but", "by",
    "can", "could", "did", "do", "does", "for", "from", "get", "had", "has", "have", "he", "her", "his", "how", "i",
    "if", "in", "into", "is", "it", "its", "just", "me", "my", "no", "not", "of", "on", "or", "our", "please", "she",
    "so", "some", "tell", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "to", "was", "we", "were", "what", "when", "where", "which", "who", "why", "will", "with", "would", "you",
    "your",
];

/// Lower-cased meaningful words with light plural folding
pub fn keywords(text: &str) -> BTreeSet<String> {
    raw_words(text)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .map(fold_plural)
        .collect()
}

/// Every lower-cased word, stop-words included, in order
pub fn raw_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|word| word.trim_matches('\'').to_lowercase())
        .filter(|word| !word.is_empty())
}

fn fold_plural(word: String) -> String {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_owned()
    } else {
        word
    }
}
