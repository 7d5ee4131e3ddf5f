//! Adaptive translation-optimization core: content-aware chunking, a
//! seven-dimension quality rubric, and a bounded-time chunk-size search over
//! an injected translation backend.

mod chunker;
mod config;
mod discourse;
mod optimizer;
mod providers;
mod quality;
mod textutil;

pub use chunker::{ChunkerConfig, ChunkingResult, SemanticChunker};
pub use config::{load_config, AppConfig, ChunkerSection, CoreConfig, OptimizerSection, QualitySection};
pub use discourse::{analyze_text, ContentType, DiscourseFeatures};
pub use optimizer::{
    BinarySearchOptimizer, OptimizationPoint, OptimizationResult, OptimizationStats,
    OptimizationStrategy, OptimizerConfig,
};
pub use providers::{Encoder, Translator};
pub use quality::{
    QualityConfig, QualityDimension, QualityMetrics, QualityMetricsEngine, TranslationComparison,
    TranslationPair,
};
