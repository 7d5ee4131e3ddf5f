use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::chunker::{ChunkerConfig, ChunkingResult, SemanticChunker};
use crate::config::CoreConfig;
use crate::providers::{Encoder, Translator};
use crate::quality::{QualityMetricsEngine, TranslationPair};

/// Sizes already evaluated within this many characters of a candidate are
/// reused instead of re-evaluated.
const REUSE_TOLERANCE: usize = 10;
/// Fine-tuning stops once the region is narrower than this.
const REGION_RESOLUTION: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OptimizationStrategy {
    QualityFocused,
    Balanced,
    SpeedFocused,
}

impl OptimizationStrategy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStrategy::QualityFocused => "quality_focused",
            OptimizationStrategy::Balanced => "balanced",
            OptimizationStrategy::SpeedFocused => "speed_focused",
        }
    }

    fn sample_count(&self) -> usize {
        match self {
            OptimizationStrategy::QualityFocused => 7,
            OptimizationStrategy::Balanced => 5,
            OptimizationStrategy::SpeedFocused => 3,
        }
    }

    fn parallelism(&self, configured: usize) -> usize {
        let base = configured.max(1);
        match self {
            OptimizationStrategy::SpeedFocused => base + 1,
            _ => base,
        }
    }

    fn fine_tune_budget(&self, max_iterations: usize) -> usize {
        match self {
            OptimizationStrategy::QualityFocused => max_iterations,
            OptimizationStrategy::Balanced => max_iterations.min(3),
            OptimizationStrategy::SpeedFocused => max_iterations.min(1),
        }
    }
}

/// One sampled (chunk size -> quality) observation. Transient; lives only for
/// the duration of one optimize_translation call.
#[derive(Clone, Debug, Serialize)]
pub struct OptimizationPoint {
    pub chunk_size: usize,
    pub quality_score: f32,
    pub translation: String,
    pub chunking_result: ChunkingResult,
    /// Wall-clock seconds spent on this evaluation.
    pub processing_time: f64,
    /// Midpoint of the quality confidence interval.
    pub confidence: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct OptimizationResult {
    pub optimal_chunk_size: usize,
    pub optimal_translation: String,
    pub optimal_quality_score: f32,
    /// Optimal minus baseline; may be negative.
    pub quality_improvement: f32,
    pub confidence_interval: (f32, f32),
    /// Confidence in the search outcome, distinct from quality confidence.
    pub optimization_confidence: f32,
    pub search_points: Vec<OptimizationPoint>,
    pub convergence_iterations: usize,
    pub total_optimization_time: f64,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Snapshot of running aggregates accumulated across calls on one optimizer.
#[derive(Clone, Debug, Serialize)]
pub struct OptimizationStats {
    pub total_optimizations: u64,
    pub successful_optimizations: u64,
    pub success_rate: f64,
    pub average_improvement: f64,
    pub average_time: f64,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
}

#[derive(Debug, Default)]
struct RunningStats {
    total: u64,
    successful: u64,
    improvement_sum: f64,
    time_sum: f64,
}

#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    /// Fine-tuning iteration ceiling; strategies may lower it.
    pub max_iterations: usize,
    /// Concurrent evaluation limit.
    pub parallel_evaluations: usize,
    /// Fine-tuning stops early when the best quality improves by less than
    /// this between iterations.
    pub convergence_epsilon: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: 100,
            max_chunk_size: 600,
            max_iterations: 5,
            parallel_evaluations: 3,
            convergence_epsilon: 0.01,
        }
    }
}

/// Closed-loop search over the chunk-size space: sample, identify a promising
/// region, fine-tune within it, all under one deadline. Never returns an
/// error; unrecoverable failures yield a failed result carrying the baseline.
pub struct BinarySearchOptimizer {
    cfg: OptimizerConfig,
    chunker_cfg: ChunkerConfig,
    quality: QualityMetricsEngine,
    translator: Arc<dyn Translator>,
    encoder: Option<Arc<dyn Encoder>>,
    stats: Mutex<RunningStats>,
}

impl BinarySearchOptimizer {
    #[must_use]
    pub fn new(config: CoreConfig, translator: Arc<dyn Translator>) -> Self {
        let quality = QualityMetricsEngine::new(config.quality.clone());
        Self {
            cfg: config.optimizer,
            chunker_cfg: config.chunker,
            quality,
            translator,
            encoder: None,
            stats: Mutex::new(RunningStats::default()),
        }
    }

    #[must_use]
    pub fn with_encoder(
        config: CoreConfig,
        translator: Arc<dyn Translator>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        let quality =
            QualityMetricsEngine::with_encoder(config.quality.clone(), Arc::clone(&encoder));
        Self {
            cfg: config.optimizer,
            chunker_cfg: config.chunker,
            quality,
            translator,
            encoder: Some(encoder),
            stats: Mutex::new(RunningStats::default()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn optimize_translation(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        api_key: &str,
        baseline_translation: &str,
        baseline_quality: f32,
        strategy: OptimizationStrategy,
        timeout: Duration,
    ) -> OptimizationResult {
        let started = std::time::Instant::now();
        let deadline = Instant::now() + timeout;
        let degenerate = self.cfg.max_chunk_size < self.cfg.min_chunk_size;
        let (lo, hi) = if degenerate {
            (self.cfg.min_chunk_size, self.cfg.min_chunk_size)
        } else {
            (self.cfg.min_chunk_size, self.cfg.max_chunk_size)
        };

        // Phase 1: sample the size space.
        let sizes = sample_grid(lo, hi, strategy.sample_count());
        let step = if sizes.len() > 1 { sizes[1] - sizes[0] } else { 0 };
        let parallelism = strategy.parallelism(self.cfg.parallel_evaluations);
        let mut points = self
            .evaluate_batch(text, source_lang, target_lang, api_key, &sizes, deadline, parallelism)
            .await;

        let mut convergence_iterations = 0usize;

        // Phases 2 + 3: bound a region around the best sample and refine.
        if points.len() >= 2 && !degenerate {
            let best = best_point(&points);
            let mut rlo = best.chunk_size.saturating_sub(step).max(lo);
            let mut rhi = (best.chunk_size + step).min(hi);
            let mut best_quality = best.quality_score;
            debug!(rlo, rhi, best_quality, "fine-tuning region identified");

            for _ in 0..strategy.fine_tune_budget(self.cfg.max_iterations) {
                if Instant::now() >= deadline || rhi.saturating_sub(rlo) < REGION_RESOLUTION {
                    break;
                }
                let third = (rhi - rlo) / 3;
                let candidates: Vec<usize> = [rlo + third, rhi - third]
                    .into_iter()
                    .filter(|c| {
                        // Reuse already-evaluated points near this size.
                        !points
                            .iter()
                            .any(|p| p.chunk_size.abs_diff(*c) <= REUSE_TOLERANCE)
                    })
                    .collect();
                if !candidates.is_empty() {
                    let fresh = self
                        .evaluate_batch(
                            text,
                            source_lang,
                            target_lang,
                            api_key,
                            &candidates,
                            deadline,
                            parallelism,
                        )
                        .await;
                    points.extend(fresh);
                }
                convergence_iterations += 1;

                let in_region = best_point_in(&points, rlo, rhi);
                let (pivot, quality) = match in_region {
                    Some(p) => (p.chunk_size, p.quality_score),
                    None => break,
                };
                let mid = rlo + (rhi - rlo) / 2;
                if pivot <= mid {
                    rhi = rhi.saturating_sub(third.max(1));
                } else {
                    rlo += third.max(1);
                }
                if quality - best_quality < self.cfg.convergence_epsilon {
                    best_quality = best_quality.max(quality);
                    break;
                }
                best_quality = quality;
            }
        }

        let total_optimization_time = started.elapsed().as_secs_f64();
        if points.is_empty() {
            warn!("no evaluation completed, returning baseline as failed result");
            self.record_call(None, total_optimization_time);
            return self.failed_result(
                baseline_translation,
                baseline_quality,
                strategy,
                total_optimization_time,
            );
        }

        let best = best_point(&points).clone();
        let quality_improvement = best.quality_score - baseline_quality;
        let optimization_confidence = search_confidence(&points, best.quality_score);
        let confidence_interval = best_cluster_interval(&points, best.quality_score);

        let mut metadata = HashMap::new();
        metadata.insert("strategy".to_string(), json!(strategy.as_str()));
        metadata.insert("samples".to_string(), json!(sizes.len()));
        metadata.insert("evaluations".to_string(), json!(points.len()));
        if degenerate {
            metadata.insert("degenerate_range".to_string(), json!(true));
        }

        self.record_call(Some(quality_improvement), total_optimization_time);

        OptimizationResult {
            optimal_chunk_size: best.chunk_size,
            optimal_translation: best.translation,
            optimal_quality_score: best.quality_score,
            quality_improvement,
            confidence_interval,
            optimization_confidence,
            search_points: points,
            convergence_iterations,
            total_optimization_time,
            metadata,
        }
    }

    /// Running aggregates across calls on this instance.
    #[must_use]
    pub fn get_optimization_stats(&self) -> OptimizationStats {
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        let total = stats.total;
        let successful = stats.successful;
        OptimizationStats {
            total_optimizations: total,
            successful_optimizations: successful,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            average_improvement: if successful == 0 {
                0.0
            } else {
                stats.improvement_sum / successful as f64
            },
            average_time: if total == 0 {
                0.0
            } else {
                stats.time_sum / total as f64
            },
            min_chunk_size: self.cfg.min_chunk_size,
            max_chunk_size: self.cfg.max_chunk_size,
        }
    }

    /// Runs evaluations concurrently up to `parallelism`, collecting finished
    /// points until the stream drains or the deadline hits. Dropping the
    /// stream at the deadline cancels outstanding evaluations cooperatively;
    /// points completed before expiry are retained.
    async fn evaluate_batch(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        api_key: &str,
        sizes: &[usize],
        deadline: Instant,
        parallelism: usize,
    ) -> Vec<OptimizationPoint> {
        let mut pending = sizes.iter().copied();
        let mut in_flight = FuturesUnordered::new();
        for size in pending.by_ref().take(parallelism.max(1)) {
            in_flight.push(self.evaluate_size(text, source_lang, target_lang, api_key, size));
        }

        let mut out = Vec::new();
        while !in_flight.is_empty() {
            match tokio::time::timeout_at(deadline, in_flight.next()).await {
                Ok(Some(Ok(point))) => {
                    out.push(point);
                    if let Some(size) = pending.next() {
                        in_flight
                            .push(self.evaluate_size(text, source_lang, target_lang, api_key, size));
                    }
                }
                Ok(Some(Err(err))) => {
                    // A failed evaluation is dropped, not fatal to the batch.
                    warn!(error = %err, "evaluation failed, dropping point");
                    if let Some(size) = pending.next() {
                        in_flight
                            .push(self.evaluate_size(text, source_lang, target_lang, api_key, size));
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(completed = out.len(), "deadline reached, cancelling outstanding evaluations");
                    break;
                }
            }
        }
        out
    }

    /// One evaluation: chunk at `size`, translate every chunk, reassemble,
    /// score. Any chunk translation failure fails the whole evaluation.
    async fn evaluate_size(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        api_key: &str,
        size: usize,
    ) -> anyhow::Result<OptimizationPoint> {
        let t0 = std::time::Instant::now();
        let cfg = ChunkerConfig {
            min_chunk_size: self.chunker_cfg.min_chunk_size.min(size / 2).max(1),
            max_chunk_size: size.max(1),
            similarity_threshold: self.chunker_cfg.similarity_threshold,
        };
        let chunker = match self.encoder.as_ref() {
            Some(enc) => SemanticChunker::with_encoder(cfg, Arc::clone(enc)),
            None => SemanticChunker::new(cfg),
        };
        let chunking = chunker.chunk_text(text, Some(source_lang), Some(target_lang)).await;
        anyhow::ensure!(!chunking.chunks.is_empty(), "chunking produced no chunks at size {size}");

        let mut translated: Vec<String> = Vec::with_capacity(chunking.chunks.len());
        for chunk in &chunking.chunks {
            let out = self
                .translator
                .translate(chunk, source_lang, target_lang, api_key)
                .await
                .with_context(|| format!("translate chunk at size {size}"))?;
            translated.push(out);
        }
        let combined = translated.join(" ");

        let pair = TranslationPair::new(text, &combined, (source_lang, target_lang))
            .with_chunks(chunking.chunks.clone(), translated);
        let metrics = self.quality.assess_quality(&pair).await;
        let (ci_lo, ci_hi) = metrics.confidence_interval;

        Ok(OptimizationPoint {
            chunk_size: size,
            quality_score: metrics.overall_score,
            translation: combined,
            chunking_result: chunking,
            processing_time: t0.elapsed().as_secs_f64().max(f64::MIN_POSITIVE),
            confidence: (ci_lo + ci_hi) / 2.0,
        })
    }

    fn failed_result(
        &self,
        baseline_translation: &str,
        baseline_quality: f32,
        strategy: OptimizationStrategy,
        total_optimization_time: f64,
    ) -> OptimizationResult {
        let midpoint = (self.cfg.min_chunk_size + self.cfg.max_chunk_size) / 2;
        let mut metadata = HashMap::new();
        metadata.insert("optimization_failed".to_string(), json!(true));
        metadata.insert("strategy".to_string(), json!(strategy.as_str()));
        OptimizationResult {
            optimal_chunk_size: midpoint,
            optimal_translation: baseline_translation.to_string(),
            optimal_quality_score: baseline_quality,
            quality_improvement: 0.0,
            confidence_interval: (0.0, 1.0),
            optimization_confidence: 0.0,
            search_points: Vec::new(),
            convergence_iterations: 0,
            total_optimization_time,
            metadata,
        }
    }

    /// Single critical section per completed call; shared-instance callers
    /// must not lose counter updates.
    fn record_call(&self, improvement: Option<f32>, elapsed: f64) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.total += 1;
        stats.time_sum += elapsed;
        if let Some(delta) = improvement {
            if delta > 0.0 {
                stats.successful += 1;
                stats.improvement_sum += f64::from(delta);
            }
        }
    }
}

/// Evenly spread sample sizes across [lo, hi], inclusive of both ends.
fn sample_grid(lo: usize, hi: usize, count: usize) -> Vec<usize> {
    if hi <= lo || count <= 1 {
        return vec![lo];
    }
    let span = hi - lo;
    let mut out: Vec<usize> = (0..count).map(|i| lo + span * i / (count - 1)).collect();
    out.dedup();
    out
}

/// Best by quality; ties break toward the smaller chunk size for determinism.
fn best_point(points: &[OptimizationPoint]) -> &OptimizationPoint {
    let mut best = &points[0];
    for p in &points[1..] {
        if p.quality_score > best.quality_score
            || (p.quality_score == best.quality_score && p.chunk_size < best.chunk_size)
        {
            best = p;
        }
    }
    best
}

fn best_point_in(points: &[OptimizationPoint], lo: usize, hi: usize) -> Option<&OptimizationPoint> {
    let in_region: Vec<&OptimizationPoint> = points
        .iter()
        .filter(|p| p.chunk_size >= lo && p.chunk_size <= hi)
        .collect();
    if in_region.is_empty() {
        return None;
    }
    let mut best = in_region[0];
    for p in &in_region[1..] {
        if p.quality_score > best.quality_score
            || (p.quality_score == best.quality_score && p.chunk_size < best.chunk_size)
        {
            best = p;
        }
    }
    Some(best)
}

/// Blend of agreement among the top-scoring cluster and sample coverage.
/// Single-point searches pin to 0.5.
fn search_confidence(points: &[OptimizationPoint], best: f32) -> f32 {
    if points.len() <= 1 {
        return 0.5;
    }
    let top: Vec<f32> = points
        .iter()
        .map(|p| p.quality_score)
        .filter(|q| best - q <= 0.05)
        .collect();
    let agreement = if top.len() < 2 {
        0.6
    } else {
        let mean = top.iter().sum::<f32>() / top.len() as f32;
        let var = top.iter().map(|q| (q - mean).powi(2)).sum::<f32>() / top.len() as f32;
        (1.0 - 8.0 * var.sqrt()).clamp(0.0, 1.0)
    };
    let coverage = (points.len() as f32 / 8.0).min(1.0);
    (0.6 * agreement + 0.4 * coverage).clamp(0.0, 1.0)
}

/// Interval from the spread of the best cluster around the winning score.
fn best_cluster_interval(points: &[OptimizationPoint], best: f32) -> (f32, f32) {
    let top: Vec<f32> = points
        .iter()
        .map(|p| p.quality_score)
        .filter(|q| best - q <= 0.05)
        .collect();
    if top.len() < 2 {
        return ((best - 0.1).clamp(0.0, 1.0), (best + 0.1).clamp(0.0, 1.0));
    }
    let mean = top.iter().sum::<f32>() / top.len() as f32;
    let var = top.iter().map(|q| (q - mean).powi(2)).sum::<f32>() / top.len() as f32;
    let sd = var.sqrt();
    ((best - sd).clamp(0.0, 1.0), (best + sd).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Identity "translation": deterministic, preserves numbers and
    /// capitalized tokens so entity scores stay meaningful.
    struct EchoTranslator;

    #[async_trait]
    impl Translator for EchoTranslator {
        async fn translate(
            &self,
            text: &str,
            _source_lang: &str,
            _target_lang: &str,
            _api_key: &str,
        ) -> anyhow::Result<String> {
            Ok(text.to_string())
        }
    }

    struct FailingTranslator;

    #[async_trait]
    impl Translator for FailingTranslator {
        async fn translate(
            &self,
            _text: &str,
            _source_lang: &str,
            _target_lang: &str,
            _api_key: &str,
        ) -> anyhow::Result<String> {
            anyhow::bail!("backend unavailable")
        }
    }

    struct SlowTranslator;

    #[async_trait]
    impl Translator for SlowTranslator {
        async fn translate(
            &self,
            text: &str,
            _source_lang: &str,
            _target_lang: &str,
            _api_key: &str,
        ) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(text.to_string())
        }
    }

    fn config(min: usize, max: usize, max_iterations: usize) -> CoreConfig {
        CoreConfig {
            chunker: ChunkerConfig {
                min_chunk_size: min,
                max_chunk_size: max,
                ..ChunkerConfig::default()
            },
            quality: crate::quality::QualityConfig::default(),
            optimizer: OptimizerConfig {
                min_chunk_size: min,
                max_chunk_size: max,
                max_iterations,
                ..OptimizerConfig::default()
            },
        }
    }

    fn forty_word_text() -> String {
        "The committee approved the new budget on Monday after a long debate. \
         Several members raised concerns about the projected costs for next year. \
         The chairman promised a detailed review before the final vote takes place. \
         Everyone agreed to reconvene."
            .to_string()
    }

    #[tokio::test]
    async fn optimizes_within_bounds_and_returns_points() {
        let optimizer =
            BinarySearchOptimizer::new(config(100, 600, 3), Arc::new(EchoTranslator));
        let text = forty_word_text();
        let result = optimizer
            .optimize_translation(
                &text,
                "en",
                "fr",
                "test-key",
                "baseline translation",
                0.5,
                OptimizationStrategy::Balanced,
                Duration::from_secs(5),
            )
            .await;
        assert!((100..=600).contains(&result.optimal_chunk_size));
        assert!(!result.search_points.is_empty());
        assert!((0.0..=1.0).contains(&result.optimization_confidence));
        assert!((0.0..=1.0).contains(&result.optimal_quality_score));
        assert_eq!(result.metadata["strategy"], json!("balanced"));
        for point in &result.search_points {
            assert!(point.processing_time > 0.0);
            assert!((100..=600).contains(&point.chunk_size));
        }
    }

    #[tokio::test]
    async fn all_failures_return_baseline_as_failed_result() {
        let optimizer = BinarySearchOptimizer::new(config(100, 600, 3), Arc::new(FailingTranslator));
        let result = optimizer
            .optimize_translation(
                &forty_word_text(),
                "en",
                "de",
                "test-key",
                "the untouched baseline",
                0.42,
                OptimizationStrategy::Balanced,
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(result.metadata["optimization_failed"], json!(true));
        assert_eq!(result.metadata["strategy"], json!("balanced"));
        assert_eq!(result.optimal_translation, "the untouched baseline");
        assert_eq!(result.optimal_quality_score, 0.42);
        assert_eq!(result.optimal_chunk_size, 350);
        assert_eq!(result.optimization_confidence, 0.0);
        assert!(result.search_points.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_with_zero_completed_points_fails_gracefully() {
        let optimizer = BinarySearchOptimizer::new(config(100, 600, 3), Arc::new(SlowTranslator));
        let result = optimizer
            .optimize_translation(
                &forty_word_text(),
                "en",
                "fr",
                "test-key",
                "baseline",
                0.6,
                OptimizationStrategy::SpeedFocused,
                Duration::from_millis(200),
            )
            .await;
        assert_eq!(result.metadata["optimization_failed"], json!(true));
        assert_eq!(result.optimal_translation, "baseline");
        assert!(result.search_points.is_empty());
    }

    #[tokio::test]
    async fn quality_improvement_is_relative_to_baseline() {
        let optimizer =
            BinarySearchOptimizer::new(config(100, 600, 2), Arc::new(EchoTranslator));
        let text = forty_word_text();
        let result = optimizer
            .optimize_translation(
                &text,
                "en",
                "fr",
                "k",
                "baseline",
                0.0,
                OptimizationStrategy::SpeedFocused,
                Duration::from_secs(5),
            )
            .await;
        assert!(
            (result.quality_improvement - result.optimal_quality_score).abs() < 1e-6,
            "improvement over a 0.0 baseline equals the optimal score"
        );
    }

    #[tokio::test]
    async fn inverted_bounds_collapse_to_single_bucket() {
        let optimizer =
            BinarySearchOptimizer::new(config(400, 200, 3), Arc::new(EchoTranslator));
        let result = optimizer
            .optimize_translation(
                &forty_word_text(),
                "en",
                "fr",
                "k",
                "baseline",
                0.5,
                OptimizationStrategy::Balanced,
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(result.metadata["degenerate_range"], json!(true));
        assert!(result
            .search_points
            .iter()
            .all(|p| p.chunk_size == 400));
    }

    #[tokio::test]
    async fn stats_accumulate_across_calls() {
        let optimizer =
            BinarySearchOptimizer::new(config(100, 600, 2), Arc::new(EchoTranslator));
        let before = optimizer.get_optimization_stats();
        assert_eq!(before.total_optimizations, 0);
        assert_eq!(before.success_rate, 0.0);

        let text = forty_word_text();
        for _ in 0..2 {
            optimizer
                .optimize_translation(
                    &text,
                    "en",
                    "fr",
                    "k",
                    "baseline",
                    0.0,
                    OptimizationStrategy::SpeedFocused,
                    Duration::from_secs(5),
                )
                .await;
        }
        let after = optimizer.get_optimization_stats();
        assert_eq!(after.total_optimizations, 2);
        assert!(after.average_time > 0.0);
        assert_eq!(after.min_chunk_size, 100);
        assert_eq!(after.max_chunk_size, 600);
        assert!(after.successful_optimizations <= after.total_optimizations);
    }

    #[test]
    fn sample_grid_spans_range_inclusively() {
        let grid = sample_grid(100, 600, 5);
        assert_eq!(grid.first(), Some(&100));
        assert_eq!(grid.last(), Some(&600));
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(sample_grid(300, 300, 5), vec![300]);
        assert_eq!(sample_grid(400, 200, 3), vec![400]);
    }

    #[test]
    fn tie_break_prefers_smaller_chunk_size() {
        let mk = |size: usize, q: f32| OptimizationPoint {
            chunk_size: size,
            quality_score: q,
            translation: String::new(),
            chunking_result: ChunkingResult {
                chunks: Vec::new(),
                chunk_boundaries: Vec::new(),
                content_type: crate::discourse::ContentType::Formal,
                coherence_score: 0.0,
                optimal_size_estimate: size,
                metadata: HashMap::new(),
            },
            processing_time: 0.01,
            confidence: 0.5,
        };
        let points = vec![mk(500, 0.8), mk(200, 0.8), mk(350, 0.7)];
        assert_eq!(best_point(&points).chunk_size, 200);
    }

    #[test]
    fn single_point_confidence_is_half() {
        let point = OptimizationPoint {
            chunk_size: 300,
            quality_score: 0.9,
            translation: String::new(),
            chunking_result: ChunkingResult {
                chunks: Vec::new(),
                chunk_boundaries: Vec::new(),
                content_type: crate::discourse::ContentType::Formal,
                coherence_score: 0.0,
                optimal_size_estimate: 300,
                metadata: HashMap::new(),
            },
            processing_time: 0.01,
            confidence: 0.5,
        };
        assert_eq!(search_confidence(&[point], 0.9), 0.5);
    }
}
