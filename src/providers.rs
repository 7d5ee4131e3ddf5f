use async_trait::async_trait;

/// Translation backend seam. The concrete backend (remote API, local model)
/// lives outside this crate; failures are surfaced as errors and handled at
/// the evaluation boundary.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        api_key: &str,
    ) -> anyhow::Result<String>;
}

/// Sentence-embedding backend seam. Optional everywhere: absence degrades
/// every embedding-dependent score to its documented neutral value.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}
