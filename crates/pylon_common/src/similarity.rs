//! Embedding similarity matcher
//!
//! Nearest-neighbour classification against the precomputed sample set.

use std::sync::Arc;
use tracing::debug;

use crate::intent::Intent;
use crate::llm::{LlmBackend, LlmError};
use crate::samples::SampleEmbedding;

/// Best sample for a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityMatch {
    pub intent: Intent,
    pub score: f32,
}

/// Cosine similarity; 0.0 for mismatched lengths or zero-norm vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Highest-scoring sample; ties go to the earlier sample
pub fn best_match(query_embedding: &[f32], samples: &[SampleEmbedding]) -> Option<SimilarityMatch> {
    let mut best: Option<SimilarityMatch> = None;

    for sample in samples {
        let score = cosine_similarity(query_embedding, &sample.embedding);
        if best.map_or(true, |b| score > b.score) {
            best = Some(SimilarityMatch {
                intent: sample.intent,
                score,
            });
        }
    }

    best
}

/// Classifies by embedding the query and scanning the sample set
pub struct SimilarityMatcher {
    backend: Arc<dyn LlmBackend>,
    samples: Arc<[SampleEmbedding]>,
}

impl SimilarityMatcher {
    pub fn new(backend: Arc<dyn LlmBackend>, samples: impl Into<Arc<[SampleEmbedding]>>) -> Self {
        Self {
            backend,
            samples: samples.into(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Embed the query and return the nearest sample's intent
    ///
    /// Embedding failures propagate; there is no retry and no fallback here.
    /// An empty sample set yields the default intent with score 0.
    pub fn match_query(&self, query: &str) -> Result<SimilarityMatch, LlmError> {
        let embedding = self.backend.embed(query)?;

        let found = best_match(&embedding, &self.samples).unwrap_or(SimilarityMatch {
            intent: Intent::DEFAULT,
            score: 0.0,
        });
        debug!("Similarity match: {} (score {:.4})", found.intent, found.score);

        Ok(found)
    }
}
