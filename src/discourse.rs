use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::textutil::{punctuation_density, word_count};

static EMOTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:amazing|incredible|unbelievable|wonderful|fantastic|awesome|terrible|horrible|awful|shocking|thrilled|excited|delighted|furious|devastated|heartbreaking|love|hate|adore|can't believe|cannot believe)\b",
    )
    .expect("emotion regex")
});

static TECH_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:api|endpoint|oauth|server|client|database|protocol|algorithm|function|parameter|schema|token|authentication|encryption|runtime|compiler|backend|frontend|latency|middleware|kernel|payload|config)\b",
    )
    .expect("tech word regex")
});

static ACRONYM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z][A-Z0-9]{1,}\b").expect("acronym regex"));

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z][a-z0-9]*_[a-z0-9_]+\b").expect("identifier regex"));

static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\.\d+(?:\.\d+)*\b").expect("version regex"));

static CONNECTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:however|therefore|moreover|furthermore|meanwhile|consequently|nevertheless|although|because|thus|hence|accordingly|in addition|as a result)\b",
    )
    .expect("connector regex")
});

static NARRATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:then|later|afterwards|eventually|suddenly|once|finally|one day|at last)\b")
        .expect("narrative regex")
});

static OPENING_PRONOUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:he|she|it|they|this|that|these|those)\b").expect("opening pronoun regex")
});

// Capitalized token past the first word of a sentence; a cheap stand-in for
// "this sentence introduces a named entity".
static ENTITY_INTRO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S\s+[A-Z][a-z]+").expect("entity intro regex"));

/// Per-call discourse statistics over raw text. Derived, never persisted.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DiscourseFeatures {
    pub sentence_count: usize,
    /// Mean sentence length in words.
    pub avg_sentence_length: f32,
    pub punctuation_density: f32,
    pub connector_count: usize,
    pub emotion_indicator_count: usize,
    pub technical_term_count: usize,
    /// Groups of sentence indices that appear to refer to the same entity.
    /// Diagnostic only; chunk boundaries never consult these.
    pub coreference_chains: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ContentType {
    Emotional,
    Technical,
    Conversational,
    Formal,
    Narrative,
}

impl ContentType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Emotional => "emotional",
            ContentType::Technical => "technical",
            ContentType::Conversational => "conversational",
            ContentType::Formal => "formal",
            ContentType::Narrative => "narrative",
        }
    }
}

/// Analyzes raw text and classifies its content in one pass.
#[must_use]
pub fn analyze_text(text: &str) -> (DiscourseFeatures, ContentType) {
    let sentences: Vec<&str> = crate::textutil::sentence_spans(text)
        .into_iter()
        .map(|(s, e)| &text[s..e])
        .collect();
    let features = analyze_discourse(text, &sentences);
    let content_type = classify_content(&features);
    (features, content_type)
}

pub(crate) fn analyze_discourse(text: &str, sentences: &[&str]) -> DiscourseFeatures {
    let sentence_count = sentences.len();
    let total_words: usize = sentences.iter().map(|s| word_count(s)).sum();
    let avg_sentence_length = if sentence_count == 0 {
        0.0
    } else {
        total_words as f32 / sentence_count as f32
    };

    let exclamations = text.chars().filter(|c| *c == '!' || *c == '！').count();
    let emotion_indicator_count = exclamations + EMOTION_RE.find_iter(text).count();

    let technical_term_count = TECH_WORD_RE.find_iter(text).count()
        + ACRONYM_RE.find_iter(text).count()
        + IDENTIFIER_RE.find_iter(text).count()
        + VERSION_RE.find_iter(text).count();

    DiscourseFeatures {
        sentence_count,
        avg_sentence_length,
        punctuation_density: punctuation_density(text),
        connector_count: CONNECTOR_RE.find_iter(text).count(),
        emotion_indicator_count,
        technical_term_count,
        coreference_chains: coreference_chains(sentences),
    }
}

/// Simple pronoun-to-antecedent linking: a sentence opening with a pronoun is
/// chained to the most recent earlier sentence that introduced an entity.
fn coreference_chains(sentences: &[&str]) -> Vec<Vec<usize>> {
    let mut chains: Vec<Vec<usize>> = Vec::new();
    let mut open_chain: Option<usize> = None; // index into `chains`
    let mut last_antecedent: Option<usize> = None;

    for (idx, sentence) in sentences.iter().enumerate() {
        let trimmed = sentence.trim_start();
        if OPENING_PRONOUN_RE.is_match(trimmed) {
            if let Some(ant) = last_antecedent {
                match open_chain {
                    Some(ci) => chains[ci].push(idx),
                    None => {
                        chains.push(vec![ant, idx]);
                        open_chain = Some(chains.len() - 1);
                    }
                }
                continue;
            }
        }
        if ENTITY_INTRO_RE.is_match(sentence) || starts_capitalized_entity(trimmed) {
            last_antecedent = Some(idx);
            open_chain = None;
        }
    }
    chains
}

fn starts_capitalized_entity(sentence: &str) -> bool {
    let mut words = sentence.split_whitespace();
    let first = words.next().unwrap_or_default();
    // "Alice went home" introduces an entity; "The door closed" does not.
    first.chars().next().is_some_and(|c| c.is_uppercase())
        && !matches!(
            first.trim_matches(|c: char| !c.is_alphanumeric()),
            "The" | "A" | "An" | "I" | "It" | "He" | "She" | "They" | "This" | "That" | "These"
                | "Those" | "We" | "You"
        )
}

/// Ordered classification rules; earlier rules win.
pub(crate) fn classify_content(features: &DiscourseFeatures) -> ContentType {
    if features.emotion_indicator_count >= 3 {
        return ContentType::Emotional;
    }
    if features.technical_term_count >= 3 {
        return ContentType::Technical;
    }
    if features.sentence_count > 0 && features.avg_sentence_length < 8.0 {
        return ContentType::Conversational;
    }
    if !features.coreference_chains.is_empty() {
        return ContentType::Narrative;
    }
    ContentType::Formal
}
