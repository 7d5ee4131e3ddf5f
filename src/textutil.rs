use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}'_-]+").expect("word regex"));

pub(crate) const SENTENCE_TERMINALS: [char; 6] = ['.', '!', '?', '。', '！', '？'];
pub(crate) const CLAUSE_SEPARATORS: [char; 8] = [',', ';', ':', '，', '；', '：', '、', '—'];

#[inline]
pub(crate) fn is_sentence_terminal(ch: char) -> bool {
    SENTENCE_TERMINALS.contains(&ch)
}

#[inline]
fn is_closing_mark(ch: char) -> bool {
    matches!(ch, '"' | '\'' | '”' | '’' | ')' | '）' | ']' | '】' | '」' | '』')
}

/// Splits text into sentence spans (byte offsets). Trailing terminal
/// punctuation, closing quotes and whitespace are attached to the preceding
/// span, so the spans cover the input exactly, with no gaps or overlap.
pub(crate) fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0usize;
    let mut after_terminal = false;
    for (i, ch) in text.char_indices() {
        if is_sentence_terminal(ch) {
            after_terminal = true;
            continue;
        }
        if after_terminal {
            if ch.is_whitespace() || is_closing_mark(ch) {
                continue;
            }
            spans.push((start, i));
            start = i;
            after_terminal = false;
        }
    }
    if start < text.len() {
        spans.push((start, text.len()));
    }
    spans
}

pub(crate) fn word_tokens(text: &str) -> Vec<&str> {
    WORD_RE.find_iter(text).map(|m| m.as_str()).collect()
}

pub(crate) fn word_count(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

/// Non-whitespace character count; length comparisons ignore formatting
/// whitespace so reflowed translations are not penalized.
pub(crate) fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

pub(crate) fn punctuation_density(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let punct = text
        .chars()
        .filter(|c| {
            c.is_ascii_punctuation() || CLAUSE_SEPARATORS.contains(c) || is_sentence_terminal(*c)
        })
        .count();
    punct as f32 / total as f32
}

pub(crate) fn terminal_count(text: &str) -> usize {
    text.chars().filter(|c| is_sentence_terminal(*c)).count()
}

pub(crate) fn separator_count(text: &str) -> usize {
    text.chars().filter(|c| CLAUSE_SEPARATORS.contains(c)).count()
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Lowercased token with edge punctuation stripped, for cross-boundary and
/// repetition comparisons.
pub(crate) fn normalize_token(tok: &str) -> String {
    tok.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Primary language subtag ("en-US" -> "en").
pub(crate) fn primary_subtag(lang: &str) -> String {
    lang.trim()
        .to_ascii_lowercase()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_string()
}
