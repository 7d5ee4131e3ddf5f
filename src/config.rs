use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::chunker::ChunkerConfig;
use crate::optimizer::OptimizerConfig;
use crate::quality::QualityConfig;

/// TOML-facing configuration. Every field is optional; `resolve` fills in
/// the documented defaults. Inverted chunk bounds are accepted as-is: the
/// optimizer treats them as a degenerate single-bucket search space, so
/// callers who care should validate before construction.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub chunker: ChunkerSection,
    #[serde(default)]
    pub quality: QualitySection,
    #[serde(default)]
    pub optimizer: OptimizerSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ChunkerSection {
    #[serde(default)]
    pub min_chunk_size: Option<usize>,
    #[serde(default)]
    pub max_chunk_size: Option<usize>,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QualitySection {
    #[serde(default)]
    pub optimization_threshold: Option<f32>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct OptimizerSection {
    #[serde(default)]
    pub min_chunk_size: Option<usize>,
    #[serde(default)]
    pub max_chunk_size: Option<usize>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub parallel_evaluations: Option<usize>,
    #[serde(default)]
    pub convergence_epsilon: Option<f32>,
}

/// Resolved engine configuration, ready to construct components.
#[derive(Clone, Debug, Default)]
pub struct CoreConfig {
    pub chunker: ChunkerConfig,
    pub quality: QualityConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    #[must_use]
    pub fn resolve(&self) -> CoreConfig {
        let chunker_defaults = ChunkerConfig::default();
        let quality_defaults = QualityConfig::default();
        let optimizer_defaults = OptimizerConfig::default();
        CoreConfig {
            chunker: ChunkerConfig {
                min_chunk_size: self
                    .chunker
                    .min_chunk_size
                    .unwrap_or(chunker_defaults.min_chunk_size),
                max_chunk_size: self
                    .chunker
                    .max_chunk_size
                    .unwrap_or(chunker_defaults.max_chunk_size),
                similarity_threshold: self
                    .chunker
                    .similarity_threshold
                    .unwrap_or(chunker_defaults.similarity_threshold),
            },
            quality: QualityConfig {
                optimization_threshold: self
                    .quality
                    .optimization_threshold
                    .unwrap_or(quality_defaults.optimization_threshold),
            },
            optimizer: OptimizerConfig {
                min_chunk_size: self
                    .optimizer
                    .min_chunk_size
                    .unwrap_or(optimizer_defaults.min_chunk_size),
                max_chunk_size: self
                    .optimizer
                    .max_chunk_size
                    .unwrap_or(optimizer_defaults.max_chunk_size),
                max_iterations: self
                    .optimizer
                    .max_iterations
                    .unwrap_or(optimizer_defaults.max_iterations),
                parallel_evaluations: self
                    .optimizer
                    .parallel_evaluations
                    .unwrap_or(optimizer_defaults.parallel_evaluations),
                convergence_epsilon: self
                    .optimizer
                    .convergence_epsilon
                    .unwrap_or(optimizer_defaults.convergence_epsilon),
            },
        }
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_resolves_to_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("parse empty toml");
        let core = cfg.resolve();
        assert_eq!(core.chunker.min_chunk_size, 100);
        assert_eq!(core.chunker.max_chunk_size, 600);
        assert_eq!(core.optimizer.max_iterations, 5);
        assert_eq!(core.optimizer.parallel_evaluations, 3);
        assert!((core.quality.optimization_threshold - 0.85).abs() < 1e-6);
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [chunker]
            max_chunk_size = 800

            [optimizer]
            max_iterations = 2
            "#,
        )
        .expect("parse toml");
        let core = cfg.resolve();
        assert_eq!(core.chunker.max_chunk_size, 800);
        assert_eq!(core.chunker.min_chunk_size, 100);
        assert_eq!(core.optimizer.max_iterations, 2);
        assert_eq!(core.optimizer.min_chunk_size, 100);
    }

    #[test]
    fn unknown_file_is_a_readable_error() {
        let err = load_config(Path::new("/nonexistent/segtune.toml")).unwrap_err();
        assert!(err.to_string().contains("read config"));
    }
}
