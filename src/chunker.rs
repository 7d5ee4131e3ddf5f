use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::discourse::{analyze_discourse, classify_content, ContentType, DiscourseFeatures};
use crate::providers::Encoder;
use crate::textutil::{cosine_similarity, sentence_spans};

#[derive(Clone, Debug)]
pub struct ChunkerConfig {
    /// Lower bound on chunk length in characters; only the final remainder
    /// may fall below it.
    pub min_chunk_size: usize,
    /// Hard upper bound on chunk length in characters.
    pub max_chunk_size: usize,
    /// Consecutive sentences merge into one chunk while their embedding
    /// similarity stays at or above this value.
    pub similarity_threshold: f32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: 100,
            max_chunk_size: 600,
            similarity_threshold: 0.62,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ChunkingResult {
    pub chunks: Vec<String>,
    /// Byte offsets [start, end) into the source text, one per chunk.
    /// Strictly increasing, non-overlapping, covering the source exactly.
    pub chunk_boundaries: Vec<(usize, usize)>,
    pub content_type: ContentType,
    pub coherence_score: f32,
    /// Suggested chunk length in characters for this kind of content.
    pub optimal_size_estimate: usize,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Content-aware chunker. Pure function of its inputs and the injected
/// encoder; holds no mutable state and is safely shared.
pub struct SemanticChunker {
    cfg: ChunkerConfig,
    encoder: Option<Arc<dyn Encoder>>,
}

impl SemanticChunker {
    #[must_use]
    pub fn new(cfg: ChunkerConfig) -> Self {
        Self { cfg, encoder: None }
    }

    #[must_use]
    pub fn with_encoder(cfg: ChunkerConfig, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            cfg,
            encoder: Some(encoder),
        }
    }

    pub async fn chunk_text(
        &self,
        text: &str,
        _source_lang: Option<&str>,
        _target_lang: Option<&str>,
    ) -> ChunkingResult {
        if text.trim().is_empty() {
            let mut metadata = HashMap::new();
            metadata.insert("error".to_string(), json!("empty_input"));
            return ChunkingResult {
                chunks: Vec::new(),
                chunk_boundaries: Vec::new(),
                content_type: ContentType::Formal,
                coherence_score: 0.0,
                optimal_size_estimate: self.cfg.min_chunk_size,
                metadata,
            };
        }

        let spans = sentence_spans(text);
        let sentences: Vec<&str> = spans.iter().map(|&(s, e)| &text[s..e]).collect();
        let features = analyze_discourse(text, &sentences);
        let content_type = classify_content(&features);
        let optimal_size_estimate = self.estimate_optimal_size(content_type, &features);

        if text.len() <= self.cfg.max_chunk_size {
            let mut metadata = HashMap::new();
            metadata.insert("strategy".to_string(), json!("single"));
            metadata.insert("sentence_count".to_string(), json!(features.sentence_count));
            metadata.insert("content_type".to_string(), json!(content_type.as_str()));
            return ChunkingResult {
                chunks: vec![text.to_string()],
                chunk_boundaries: vec![(0, text.len())],
                content_type,
                coherence_score: 1.0,
                optimal_size_estimate,
                metadata,
            };
        }

        let spans = split_oversized_spans(text, spans, self.cfg.max_chunk_size);
        let (groups, strategy) = match self.embedding_groups(text, &spans).await {
            Some(groups) => (groups, "embedding"),
            None => (self.size_groups(&spans), "size"),
        };

        let mut chunks: Vec<String> = Vec::with_capacity(groups.len());
        let mut chunk_boundaries: Vec<(usize, usize)> = Vec::with_capacity(groups.len());
        for group in &groups {
            let start = spans[group[0]].0;
            let end = spans[*group.last().unwrap_or(&group[0])].1;
            chunks.push(text[start..end].to_string());
            chunk_boundaries.push((start, end));
        }

        let coherence_score = self.coherence(&chunks).await;

        let mut metadata = HashMap::new();
        metadata.insert("strategy".to_string(), json!(strategy));
        metadata.insert("sentence_count".to_string(), json!(features.sentence_count));
        metadata.insert("content_type".to_string(), json!(content_type.as_str()));
        metadata.insert(
            "coreference_chain_count".to_string(),
            json!(features.coreference_chains.len()),
        );

        ChunkingResult {
            chunks,
            chunk_boundaries,
            content_type,
            coherence_score,
            optimal_size_estimate,
            metadata,
        }
    }

    /// Groups sentence spans by embedding similarity. Returns None when no
    /// encoder is available or encoding fails, so the caller falls back to
    /// pure size-based grouping.
    async fn embedding_groups(&self, text: &str, spans: &[(usize, usize)]) -> Option<Vec<Vec<usize>>> {
        let encoder = self.encoder.as_ref()?;
        let sentences: Vec<String> = spans.iter().map(|&(s, e)| text[s..e].to_string()).collect();
        let vectors = match encoder.encode(&sentences).await {
            Ok(v) if v.len() == spans.len() => v,
            Ok(v) => {
                warn!(expected = spans.len(), got = v.len(), "encoder returned wrong vector count");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "encoder failed, falling back to size-based chunking");
                return None;
            }
        };

        let max = self.cfg.max_chunk_size.max(self.cfg.min_chunk_size);
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = vec![0];
        let mut current_len = spans[0].1 - spans[0].0;
        for i in 1..spans.len() {
            let span_len = spans[i].1 - spans[i].0;
            let similar = cosine_similarity(&vectors[i - 1], &vectors[i]) >= self.cfg.similarity_threshold;
            let fits = current_len + span_len <= max;
            let undersized = current_len < self.cfg.min_chunk_size;
            if fits && (similar || undersized) {
                current.push(i);
                current_len += span_len;
            } else {
                groups.push(std::mem::take(&mut current));
                current.push(i);
                current_len = span_len;
            }
        }
        groups.push(current);
        Some(groups)
    }

    /// Greedy size-based grouping respecting the configured bounds.
    fn size_groups(&self, spans: &[(usize, usize)]) -> Vec<Vec<usize>> {
        let max = self.cfg.max_chunk_size.max(self.cfg.min_chunk_size);
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut current_len = 0usize;
        for (i, &(s, e)) in spans.iter().enumerate() {
            let span_len = e - s;
            if !current.is_empty() && current_len + span_len > max {
                groups.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(i);
            current_len += span_len;
        }
        if !current.is_empty() {
            groups.push(current);
        }
        groups
    }

    /// Mean cosine similarity between consecutive chunk embeddings; 1.0 for a
    /// single chunk, 0.5 neutral without an encoder.
    async fn coherence(&self, chunks: &[String]) -> f32 {
        if chunks.len() <= 1 {
            return 1.0;
        }
        let Some(encoder) = self.encoder.as_ref() else {
            debug!("no encoder available, using neutral coherence");
            return 0.5;
        };
        match encoder.encode(chunks).await {
            Ok(vectors) if vectors.len() == chunks.len() => {
                let sims: Vec<f32> = vectors
                    .windows(2)
                    .map(|w| cosine_similarity(&w[0], &w[1]))
                    .collect();
                let mean = sims.iter().sum::<f32>() / sims.len() as f32;
                mean.clamp(0.0, 1.0)
            }
            Ok(_) | Err(_) => {
                warn!("encoder failed during coherence estimate, using neutral value");
                0.5
            }
        }
    }

    /// Larger chunks preserve narrative flow; smaller chunks preserve
    /// technical precision.
    fn estimate_optimal_size(&self, content_type: ContentType, features: &DiscourseFeatures) -> usize {
        let base = match content_type {
            ContentType::Emotional => 400,
            ContentType::Narrative => 380,
            ContentType::Formal => 330,
            ContentType::Conversational => 280,
            ContentType::Technical => 250,
        };
        let adjusted = if features.avg_sentence_length > 20.0 {
            base + 50
        } else {
            base
        };
        adjusted.clamp(
            self.cfg.min_chunk_size,
            self.cfg.max_chunk_size.max(self.cfg.min_chunk_size),
        )
    }
}

/// Hard-splits any span longer than `max` at whitespace (or at a char
/// boundary when a single token exceeds `max`), preserving exact coverage.
fn split_oversized_spans(text: &str, spans: Vec<(usize, usize)>, max: usize) -> Vec<(usize, usize)> {
    let max = max.max(1);
    let mut out: Vec<(usize, usize)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        if end - start <= max {
            out.push((start, end));
            continue;
        }
        let mut cursor = start;
        while end - cursor > max {
            let window = &text[cursor..end];
            let limit = floor_char_boundary(window, max);
            let cut = window[..limit]
                .char_indices()
                .filter(|(_, c)| c.is_whitespace())
                .map(|(i, _)| i)
                .next_back()
                .filter(|&i| i > 0)
                .map(|i| i + 1) // keep the whitespace with the left part
                .unwrap_or(limit);
            out.push((cursor, cursor + cut));
            cursor += cut;
        }
        out.push((cursor, end));
    }
    out
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Deterministic fake encoder: vector direction driven by the first byte
    /// of the trimmed text, so similarity can be scripted per test input.
    struct ByteEncoder;

    #[async_trait]
    impl Encoder for ByteEncoder {
        async fn encode(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let b = t.trim().bytes().next().unwrap_or(0) as f32;
                    vec![(b / 128.0).cos(), (b / 128.0).sin()]
                })
                .collect())
        }
    }

    struct FailingEncoder;

    #[async_trait]
    impl Encoder for FailingEncoder {
        async fn encode(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("encoder offline")
        }
    }

    fn assert_boundaries_cover(result: &ChunkingResult, text: &str) {
        assert_eq!(result.chunks.len(), result.chunk_boundaries.len());
        assert_eq!(result.chunk_boundaries.first().map(|b| b.0), Some(0));
        assert_eq!(result.chunk_boundaries.last().map(|b| b.1), Some(text.len()));
        for w in result.chunk_boundaries.windows(2) {
            assert_eq!(w[0].1, w[1].0, "boundaries must not gap or overlap");
            assert!(w[0].0 < w[0].1);
        }
        for (chunk, &(s, e)) in result.chunks.iter().zip(&result.chunk_boundaries) {
            assert_eq!(chunk, &text[s..e]);
        }
    }

    fn long_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {i} talks about the committee budget review. "))
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    #[tokio::test]
    async fn empty_input_yields_error_metadata_not_panic() {
        let chunker = SemanticChunker::new(ChunkerConfig::default());
        let result = chunker.chunk_text("   ", None, None).await;
        assert!(result.chunks.is_empty());
        assert!(result.chunk_boundaries.is_empty());
        assert_eq!(result.coherence_score, 0.0);
        assert!(result.metadata.contains_key("error"));
    }

    #[tokio::test]
    async fn short_input_is_a_single_fully_coherent_chunk() {
        let chunker = SemanticChunker::new(ChunkerConfig::default());
        let text = "A short paragraph that fits in one chunk.";
        let result = chunker.chunk_text(text, Some("en"), Some("fr")).await;
        assert_eq!(result.chunks, vec![text.to_string()]);
        assert_eq!(result.chunk_boundaries, vec![(0, text.len())]);
        assert_eq!(result.coherence_score, 1.0);
    }

    #[tokio::test]
    async fn size_based_chunks_respect_bounds_and_cover_source() {
        let cfg = ChunkerConfig {
            min_chunk_size: 80,
            max_chunk_size: 200,
            ..ChunkerConfig::default()
        };
        let chunker = SemanticChunker::new(cfg);
        let text = long_text(20);
        let result = chunker.chunk_text(&text, Some("en"), Some("de")).await;
        assert!(result.chunks.len() > 1);
        assert_boundaries_cover(&result, &text);
        for chunk in &result.chunks[..result.chunks.len() - 1] {
            assert!(chunk.len() <= 200, "non-final chunk over max: {}", chunk.len());
        }
        assert_eq!(result.coherence_score, 0.5);
        assert_eq!(result.metadata["strategy"], json!("size"));
    }

    #[tokio::test]
    async fn embedding_strategy_is_used_when_encoder_present() {
        let cfg = ChunkerConfig {
            min_chunk_size: 50,
            max_chunk_size: 150,
            ..ChunkerConfig::default()
        };
        let chunker = SemanticChunker::with_encoder(cfg, Arc::new(ByteEncoder));
        let text = long_text(12);
        let result = chunker.chunk_text(&text, None, None).await;
        assert_boundaries_cover(&result, &text);
        assert_eq!(result.metadata["strategy"], json!("embedding"));
        assert!(result.coherence_score >= 0.0 && result.coherence_score <= 1.0);
    }

    #[tokio::test]
    async fn encoder_failure_degrades_to_size_strategy() {
        let cfg = ChunkerConfig {
            min_chunk_size: 50,
            max_chunk_size: 150,
            ..ChunkerConfig::default()
        };
        let chunker = SemanticChunker::with_encoder(cfg, Arc::new(FailingEncoder));
        let text = long_text(12);
        let result = chunker.chunk_text(&text, None, None).await;
        assert_boundaries_cover(&result, &text);
        assert_eq!(result.metadata["strategy"], json!("size"));
        assert_eq!(result.coherence_score, 0.5);
    }

    #[tokio::test]
    async fn giant_unbroken_token_is_hard_split() {
        let cfg = ChunkerConfig {
            min_chunk_size: 10,
            max_chunk_size: 40,
            ..ChunkerConfig::default()
        };
        let chunker = SemanticChunker::new(cfg);
        let text = "x".repeat(200);
        let result = chunker.chunk_text(&text, None, None).await;
        assert_boundaries_cover(&result, &text);
        for chunk in &result.chunks[..result.chunks.len() - 1] {
            assert!(chunk.len() <= 40);
        }
    }

    #[tokio::test]
    async fn technical_content_estimates_smaller_chunks_than_narrative() {
        let chunker = SemanticChunker::new(ChunkerConfig::default());
        let tech = chunker
            .chunk_text(
                "The API endpoint requires OAuth 2.0. Send the client_id and token parameters.",
                None,
                None,
            )
            .await;
        let story = chunker
            .chunk_text(
                "Margaret walked slowly through the abandoned garden near the old house. \
                 She remembered the long summers spent there with her grandmother years ago. \
                 They had planted roses together along the crumbling stone wall every spring.",
                None,
                None,
            )
            .await;
        assert_eq!(tech.content_type, ContentType::Technical);
        assert!(tech.optimal_size_estimate <= 300);
        assert!(story.optimal_size_estimate >= 350);
    }

    #[tokio::test]
    async fn inverted_bounds_do_not_crash() {
        let cfg = ChunkerConfig {
            min_chunk_size: 500,
            max_chunk_size: 100,
            ..ChunkerConfig::default()
        };
        let chunker = SemanticChunker::new(cfg);
        let text = long_text(15);
        let result = chunker.chunk_text(&text, None, None).await;
        assert_boundaries_cover(&result, &text);
    }
}
