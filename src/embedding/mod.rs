pub mod ollama;

use anyhow::Result;

/// Trait for embedding text into vectors.
///
/// All methods are synchronous — callers in async contexts should use
/// `tokio::task::spawn_blocking`. A single call is fallible and carries no
/// retry or backoff of its own.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector of [`dimensions`](Self::dimensions) floats.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Whether the backing service is currently reachable.
    fn healthy(&self) -> bool;

    /// The number of dimensions this provider is configured for.
    fn dimensions(&self) -> usize;
}

/// Startup hook: embed a known string and compare the returned length
/// against the configured dimension. A mismatch names both numbers and the
/// remediation.
pub fn validate_dimension(provider: &dyn EmbeddingProvider) -> Result<()> {
    let embedding = provider.embed("dimension check")?;
    let expected = provider.dimensions();
    if embedding.len() != expected {
        anyhow::bail!(
            "embedding model produces {} dimensions, store expects {expected} — set EMBED_DIM={}",
            embedding.len(),
            embedding.len()
        );
    }
    Ok(())
}
