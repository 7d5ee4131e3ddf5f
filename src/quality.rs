use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::providers::Encoder;
use crate::textutil::{
    cosine_similarity, normalize_token, primary_subtag, separator_count, terminal_count,
    visible_chars, word_tokens,
};

static CAP_SEQUENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)+\b").expect("cap sequence regex")
});
static ACRONYM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][A-Z0-9]{1,}\b").expect("acronym regex"));
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+(?:[.,/:-]\d+)*\b").expect("number regex"));
static PUNCT_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[!?.,;:]{3,}").expect("punct run regex"));

/// Expected translation/original visible-char ratio bands per language pair.
/// Pairs not listed fall back to the default band.
static RATIO_BANDS: &[((&str, &str), (f32, f32))] = &[
    (("en", "zh"), (0.35, 0.90)),
    (("zh", "en"), (1.10, 2.40)),
    (("en", "ja"), (0.45, 1.10)),
    (("ja", "en"), (0.90, 2.20)),
    (("en", "ko"), (0.50, 1.10)),
    (("ko", "en"), (0.90, 2.00)),
    (("en", "fr"), (0.95, 1.40)),
    (("en", "de"), (0.90, 1.40)),
    (("en", "es"), (0.95, 1.40)),
    (("en", "it"), (0.95, 1.40)),
    (("en", "pt"), (0.95, 1.40)),
];
const DEFAULT_RATIO_BAND: (f32, f32) = (0.80, 1.40);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum QualityDimension {
    Confidence,
    LengthRatio,
    StructureIntegrity,
    NamedEntityPreservation,
    BoundaryCoherence,
    SemanticSimilarity,
    Fluency,
}

impl QualityDimension {
    pub const ALL: [QualityDimension; 7] = [
        QualityDimension::Confidence,
        QualityDimension::LengthRatio,
        QualityDimension::StructureIntegrity,
        QualityDimension::NamedEntityPreservation,
        QualityDimension::BoundaryCoherence,
        QualityDimension::SemanticSimilarity,
        QualityDimension::Fluency,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityDimension::Confidence => "confidence",
            QualityDimension::LengthRatio => "length_ratio",
            QualityDimension::StructureIntegrity => "structure_integrity",
            QualityDimension::NamedEntityPreservation => "named_entity_preservation",
            QualityDimension::BoundaryCoherence => "boundary_coherence",
            QualityDimension::SemanticSimilarity => "semantic_similarity",
            QualityDimension::Fluency => "fluency",
        }
    }
}

/// Fixed dimension weights; sum to 1.0. Semantic similarity and structure
/// carry slightly more weight than fluency.
const WEIGHTS: [(QualityDimension, f32); 7] = [
    (QualityDimension::SemanticSimilarity, 0.20),
    (QualityDimension::StructureIntegrity, 0.17),
    (QualityDimension::Fluency, 0.15),
    (QualityDimension::NamedEntityPreservation, 0.14),
    (QualityDimension::Confidence, 0.12),
    (QualityDimension::LengthRatio, 0.12),
    (QualityDimension::BoundaryCoherence, 0.10),
];

/// Immutable (original, translation) pair under assessment.
#[derive(Clone, Debug)]
pub struct TranslationPair {
    pub original: String,
    pub translation: String,
    pub chunks_original: Option<Vec<String>>,
    pub chunks_translated: Option<Vec<String>>,
    pub model_confidence: Option<f32>,
    pub language_pair: (String, String),
}

impl TranslationPair {
    #[must_use]
    pub fn new(original: &str, translation: &str, language_pair: (&str, &str)) -> Self {
        Self {
            original: original.to_string(),
            translation: translation.to_string(),
            chunks_original: None,
            chunks_translated: None,
            model_confidence: None,
            language_pair: (language_pair.0.to_string(), language_pair.1.to_string()),
        }
    }

    #[must_use]
    pub fn with_chunks(mut self, original: Vec<String>, translated: Vec<String>) -> Self {
        self.chunks_original = Some(original);
        self.chunks_translated = Some(translated);
        self
    }

    #[must_use]
    pub fn with_model_confidence(mut self, confidence: f32) -> Self {
        self.model_confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct QualityMetrics {
    pub overall_score: f32,
    pub dimension_scores: HashMap<QualityDimension, f32>,
    pub confidence_interval: (f32, f32),
    pub quality_grade: char,
    pub optimization_needed: bool,
    pub improvement_suggestions: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Outcome of an independent re-assessment of two candidate translations.
#[derive(Clone, Debug, Serialize)]
pub struct TranslationComparison {
    pub score1: f32,
    pub score2: f32,
    /// Per-dimension score of candidate 1 minus candidate 2.
    pub dimension_deltas: HashMap<QualityDimension, f32>,
    /// "translation1" or "translation2".
    pub winner: String,
    pub score_difference: f32,
}

#[derive(Clone, Debug)]
pub struct QualityConfig {
    /// Overall scores below this mark the pair as needing optimization.
    pub optimization_threshold: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            optimization_threshold: 0.85,
        }
    }
}

/// Scores (original, translation) pairs along seven independent dimensions.
/// Holds no mutable state; safely shared and reentrant.
pub struct QualityMetricsEngine {
    cfg: QualityConfig,
    encoder: Option<Arc<dyn Encoder>>,
}

impl QualityMetricsEngine {
    #[must_use]
    pub fn new(cfg: QualityConfig) -> Self {
        Self { cfg, encoder: None }
    }

    #[must_use]
    pub fn with_encoder(cfg: QualityConfig, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            cfg,
            encoder: Some(encoder),
        }
    }

    pub async fn assess_quality(&self, pair: &TranslationPair) -> QualityMetrics {
        if pair.translation.trim().is_empty() {
            return self.empty_translation_metrics(pair);
        }

        let length_ratio = length_ratio_score(pair);
        let confidence = match pair.model_confidence {
            Some(c) => c.clamp(0.0, 1.0),
            // Derived confidence tracks the length-ratio score so extreme
            // ratios land below 0.6.
            None => (0.3 + 0.6 * length_ratio).clamp(0.0, 1.0),
        };

        let mut scores: HashMap<QualityDimension, f32> = HashMap::with_capacity(7);
        scores.insert(QualityDimension::Confidence, confidence);
        scores.insert(QualityDimension::LengthRatio, length_ratio);
        scores.insert(
            QualityDimension::StructureIntegrity,
            structure_integrity_score(&pair.original, &pair.translation),
        );
        scores.insert(
            QualityDimension::NamedEntityPreservation,
            entity_preservation_score(&pair.original, &pair.translation),
        );
        scores.insert(
            QualityDimension::BoundaryCoherence,
            boundary_coherence_score(pair.chunks_translated.as_deref()),
        );
        scores.insert(
            QualityDimension::SemanticSimilarity,
            self.semantic_similarity(&pair.original, &pair.translation).await,
        );
        scores.insert(
            QualityDimension::Fluency,
            fluency_score(&pair.translation, &pair.language_pair.1),
        );

        let overall_score: f32 = WEIGHTS
            .iter()
            .map(|(dim, w)| w * scores.get(dim).copied().unwrap_or(0.0))
            .sum::<f32>()
            .clamp(0.0, 1.0);

        let confidence_interval = confidence_interval(overall_score, &scores);
        let improvement_suggestions = improvement_suggestions(&scores);

        let mut metadata = HashMap::new();
        metadata.insert(
            "language_pair".to_string(),
            json!([pair.language_pair.0, pair.language_pair.1]),
        );
        metadata.insert(
            "chunk_count".to_string(),
            json!(pair.chunks_translated.as_ref().map_or(0, Vec::len)),
        );

        QualityMetrics {
            overall_score,
            quality_grade: score_grade(overall_score),
            optimization_needed: overall_score < self.cfg.optimization_threshold,
            dimension_scores: scores,
            confidence_interval,
            improvement_suggestions,
            metadata,
        }
    }

    /// Independently re-assesses both candidates and reports per-dimension
    /// deltas plus a winner tag.
    pub async fn compare_translations(
        &self,
        original: &str,
        translation_a: &str,
        translation_b: &str,
        language_pair: (&str, &str),
    ) -> TranslationComparison {
        let a = self
            .assess_quality(&TranslationPair::new(original, translation_a, language_pair))
            .await;
        let b = self
            .assess_quality(&TranslationPair::new(original, translation_b, language_pair))
            .await;

        let mut dimension_deltas = HashMap::with_capacity(7);
        for dim in QualityDimension::ALL {
            let da = a.dimension_scores.get(&dim).copied().unwrap_or(0.0);
            let db = b.dimension_scores.get(&dim).copied().unwrap_or(0.0);
            dimension_deltas.insert(dim, da - db);
        }

        let winner = if a.overall_score >= b.overall_score {
            "translation1"
        } else {
            "translation2"
        };

        TranslationComparison {
            score1: a.overall_score,
            score2: b.overall_score,
            dimension_deltas,
            winner: winner.to_string(),
            score_difference: (a.overall_score - b.overall_score).abs(),
        }
    }

    async fn semantic_similarity(&self, original: &str, translation: &str) -> f32 {
        let Some(encoder) = self.encoder.as_ref() else {
            debug!("no encoder available, using neutral semantic similarity");
            return 0.7;
        };
        let texts = vec![original.to_string(), translation.to_string()];
        match encoder.encode(&texts).await {
            Ok(vectors) if vectors.len() == 2 => {
                cosine_similarity(&vectors[0], &vectors[1]).clamp(0.0, 1.0)
            }
            Ok(_) | Err(_) => {
                warn!("encoder failed during similarity scoring, using neutral value");
                0.7
            }
        }
    }

    fn empty_translation_metrics(&self, pair: &TranslationPair) -> QualityMetrics {
        let scores: HashMap<QualityDimension, f32> =
            QualityDimension::ALL.iter().map(|d| (*d, 0.0)).collect();
        let mut metadata = HashMap::new();
        metadata.insert("error".to_string(), json!("empty_translation"));
        metadata.insert(
            "language_pair".to_string(),
            json!([pair.language_pair.0, pair.language_pair.1]),
        );
        QualityMetrics {
            overall_score: 0.0,
            dimension_scores: scores,
            confidence_interval: (0.0, 1.0),
            quality_grade: 'F',
            optimization_needed: true,
            improvement_suggestions: vec![
                "Translation is empty; the source text was not translated at all.".to_string(),
            ],
            metadata,
        }
    }
}

fn score_grade(score: f32) -> char {
    if score >= 0.90 {
        'A'
    } else if score >= 0.80 {
        'B'
    } else if score >= 0.70 {
        'C'
    } else if score >= 0.60 {
        'D'
    } else {
        'F'
    }
}

fn ratio_band(language_pair: &(String, String)) -> (f32, f32) {
    let src = primary_subtag(&language_pair.0);
    let tgt = primary_subtag(&language_pair.1);
    RATIO_BANDS
        .iter()
        .find(|((s, t), _)| *s == src && *t == tgt)
        .map(|(_, band)| *band)
        .unwrap_or(DEFAULT_RATIO_BAND)
}

/// 1.0 inside the expected band, degrading linearly outside it. Empty
/// original is defined as 0.0, not an error.
fn length_ratio_score(pair: &TranslationPair) -> f32 {
    let src_chars = visible_chars(&pair.original);
    if src_chars == 0 {
        return 0.0;
    }
    let tgt_chars = visible_chars(&pair.translation);
    let ratio = tgt_chars as f32 / src_chars as f32;
    let (low, high) = ratio_band(&pair.language_pair);
    if ratio >= low && ratio <= high {
        return 1.0;
    }
    if ratio < low {
        (ratio / low).clamp(0.0, 1.0)
    } else {
        (1.0 - (ratio - high) / (2.0 * high)).clamp(0.0, 1.0)
    }
}

fn count_ratio(src: usize, tgt: usize) -> f32 {
    if src == 0 && tgt == 0 {
        return 1.0;
    }
    if src == 0 || tgt == 0 {
        // Punctuation appearing from nowhere is mild; disappearing entirely
        // is a real structure loss.
        return if src == 0 { 0.8 } else { 0.2 };
    }
    let (lo, hi) = if src < tgt { (src, tgt) } else { (tgt, src) };
    lo as f32 / hi as f32
}

fn structure_integrity_score(original: &str, translation: &str) -> f32 {
    let terminal = count_ratio(terminal_count(original), terminal_count(translation));
    let separator = count_ratio(separator_count(original), separator_count(translation));
    (0.6 * terminal + 0.4 * separator).clamp(0.0, 1.0)
}

fn detect_entities(text: &str) -> HashSet<String> {
    let mut out: HashSet<String> = HashSet::new();
    for re in [&*CAP_SEQUENCE_RE, &*ACRONYM_RE, &*NUMBER_RE] {
        for m in re.find_iter(text) {
            out.insert(m.as_str().to_string());
        }
    }
    out
}

/// preserved / total over entity-like tokens; 1.0 when the original has none.
fn entity_preservation_score(original: &str, translation: &str) -> f32 {
    let entities = detect_entities(original);
    if entities.is_empty() {
        return 1.0;
    }
    let lower = translation.to_lowercase();
    let preserved = entities
        .iter()
        .filter(|e| translation.contains(e.as_str()) || lower.contains(&e.to_lowercase()))
        .count();
    preserved as f32 / entities.len() as f32
}

/// Heuristic continuity across adjacent chunk boundaries; 1.0 for 0 or 1
/// chunks. A transition is rough when the previous chunk trails off without
/// terminal punctuation or the same word straddles the boundary.
fn boundary_coherence_score(chunks: Option<&[String]>) -> f32 {
    let chunks = match chunks {
        Some(c) if c.len() > 1 => c,
        _ => return 1.0,
    };
    let transitions = chunks.len() - 1;
    let mut smooth = 0usize;
    for pair in chunks.windows(2) {
        let prev = pair[0].trim_end();
        let next = pair[1].trim_start();
        let closed = prev
            .chars()
            .next_back()
            .is_some_and(crate::textutil::is_sentence_terminal);
        let prev_last = prev.split_whitespace().next_back().map(normalize_token);
        let next_first = next.split_whitespace().next().map(normalize_token);
        let echoed = prev_last.is_some() && prev_last == next_first;
        if closed && !echoed {
            smooth += 1;
        }
    }
    smooth as f32 / transitions as f32
}

/// Target-language repetition heuristics; 0.7 neutral for unsupported
/// targets.
fn fluency_score(translation: &str, target_lang: &str) -> f32 {
    match primary_subtag(target_lang).as_str() {
        "en" | "fr" | "de" | "es" | "it" | "pt" => latin_fluency(translation),
        "zh" | "ja" | "ko" => cjk_fluency(translation),
        _ => 0.7,
    }
}

fn latin_fluency(text: &str) -> f32 {
    let tokens: Vec<String> = word_tokens(text)
        .into_iter()
        .map(normalize_token)
        .filter(|t| !t.is_empty())
        .collect();
    let mut penalty = 0.0f32;
    for w in tokens.windows(2) {
        if w[0] == w[1] {
            penalty += 0.15;
        }
    }
    penalty += 0.10 * PUNCT_RUN_RE.find_iter(text).count() as f32;
    (1.0 - penalty).clamp(0.0, 1.0)
}

fn cjk_fluency(text: &str) -> f32 {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut penalty = 0.0f32;
    let mut run = 1usize;
    for w in chars.windows(2) {
        if w[0] == w[1] && w[0].is_alphanumeric() {
            run += 1;
            if run >= 3 {
                penalty += 0.15;
            }
        } else {
            run = 1;
        }
    }
    penalty += 0.10 * PUNCT_RUN_RE.find_iter(text).count() as f32;
    (1.0 - penalty).clamp(0.0, 1.0)
}

/// Interval derived from the spread of the dimension scores around the
/// overall score; fewer than 2 usable scores yields the maximal
/// uninformative interval.
fn confidence_interval(overall: f32, scores: &HashMap<QualityDimension, f32>) -> (f32, f32) {
    if scores.len() < 2 {
        return (0.0, 1.0);
    }
    let n = scores.len() as f32;
    let mean = scores.values().sum::<f32>() / n;
    let var = scores.values().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
    let sd = var.sqrt();
    ((overall - sd).clamp(0.0, 1.0), (overall + sd).clamp(0.0, 1.0))
}

fn improvement_suggestions(scores: &HashMap<QualityDimension, f32>) -> Vec<String> {
    if scores.values().all(|s| *s >= 0.85) {
        return vec!["Quality is acceptable; no optimization needed.".to_string()];
    }
    let mut out: Vec<String> = Vec::new();
    let mut low: Vec<(QualityDimension, f32)> = scores
        .iter()
        .map(|(d, s)| (*d, *s))
        .filter(|(_, s)| *s < 0.5)
        .collect();
    low.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    for (dim, _) in low {
        let msg = match dim {
            QualityDimension::Confidence => {
                "Low translation confidence; consider a stronger backend or retranslation."
            }
            QualityDimension::LengthRatio => {
                "Translation length is far outside the expected range for this language pair."
            }
            QualityDimension::StructureIntegrity => {
                "Sentence structure diverges from the original; punctuation is missing or added."
            }
            QualityDimension::NamedEntityPreservation => {
                "Named entities, numbers or dates from the original are missing in the translation."
            }
            QualityDimension::BoundaryCoherence => {
                "Chunk transitions read abruptly; consider larger chunks to preserve flow."
            }
            QualityDimension::SemanticSimilarity => {
                "Translation meaning drifts from the original; consider retranslating."
            }
            QualityDimension::Fluency => {
                "Repeated words or patterns detected; the translation may need smoothing."
            }
        };
        out.push(msg.to_string());
    }
    if out.is_empty() {
        out.push("Several dimensions score below the acceptable range; review the translation.".to_string());
    }
    out
}
