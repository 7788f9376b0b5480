//! Relevance scoring of candidate links against a query.

use async_trait::async_trait;

use crate::error::{ServiceError, ServiceResult};
use crate::types::document::CandidateLink;

/// A candidate with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredLink {
    pub link: CandidateLink,
    pub score: f32,
}

impl ScoredLink {
    /// Pair a link with a score.
    pub fn new(link: CandidateLink, score: f32) -> Self {
        Self { link, score }
    }
}

/// External scorer ranking candidates against a query.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Score every candidate; the result has one entry per candidate.
    async fn score(&self, query: &str, candidates: &[CandidateLink]) -> ServiceResult<Vec<ScoredLink>>;
}

/// Text embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for text.
    async fn embed(&self, text: &str) -> ServiceResult<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch operation).
    async fn embed_batch(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>> {
        // Default implementation calls embed sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

/// Scorer backed by an embedding service and cosine similarity.
///
/// Each candidate is embedded as `"{url} {title} {description}"`.
pub struct EmbeddingScorer<E: Embedder> {
    embedder: E,
}

impl<E: Embedder> EmbeddingScorer<E> {
    /// Create a scorer around an embedder.
    pub fn new(embedder: E) -> Self {
        Self { embedder }
    }

    /// Get the wrapped embedder.
    pub fn embedder(&self) -> &E {
        &self.embedder
    }
}

#[async_trait]
impl<E: Embedder> Scorer for EmbeddingScorer<E> {
    async fn score(&self, query: &str, candidates: &[CandidateLink]) -> ServiceResult<Vec<ScoredLink>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let texts: Vec<String> = candidates.iter().map(|c| c.scoring_text()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != candidates.len() {
            return Err(ServiceError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                candidates.len(),
                embeddings.len()
            )));
        }

        Ok(candidates
            .iter()
            .zip(embeddings.iter())
            .map(|(link, embedding)| {
                ScoredLink::new(link.clone(), cosine_similarity(&query_embedding, embedding))
            })
            .collect())
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
