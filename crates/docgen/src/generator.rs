//! Concurrent batch synthesis over the document template.

use crate::template::{self, DEFAULT_DOCUMENT_SIZE};
use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Default parallelism for batch synthesis.
pub const DEFAULT_BATCH_WORKERS: usize = 4;

/// Error type for document synthesis.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The synthesized record failed to serialize.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A synthesis worker was cancelled or panicked.
    #[error("synthesis worker failed: {0}")]
    Worker(String),
}

/// Synthesizes hotel records of a fixed serialized size.
///
/// The generator holds no RNG state; every call draws from the thread-local
/// source, so batches are not reproducible. Callers that need determinism
/// use [`template::synthesize`] directly with a seeded RNG.
#[derive(Debug, Clone)]
pub struct DocGenerator {
    document_size: usize,
}

impl DocGenerator {
    pub fn new(document_size: usize) -> Self {
        Self {
            document_size: if document_size == 0 {
                DEFAULT_DOCUMENT_SIZE
            } else {
                document_size
            },
        }
    }

    pub fn document_size(&self) -> usize {
        self.document_size
    }

    /// Synthesize a single record, optionally carrying a caller-chosen key.
    pub fn generate_one(&self, key: Option<String>) -> Result<Value, GeneratorError> {
        let mut rng = rand::rng();
        let hotel = template::synthesize(&mut rng, self.document_size, key);
        Ok(serde_json::to_value(hotel)?)
    }

    /// Synthesize `count` records with at most `workers` parallel workers.
    ///
    /// Ordering of the returned records is not guaranteed. A failed slot is
    /// logged and dropped, so the result may hold fewer than `count`
    /// records; failures never propagate to the caller.
    pub async fn generate_batch(&self, count: usize, workers: usize) -> Vec<Value> {
        let workers = workers.max(1);
        let results: Vec<Result<Result<Value, GeneratorError>, tokio::task::JoinError>> =
            futures::stream::iter(0..count)
                .map(|_| {
                    let generator = self.clone();
                    async move {
                        tokio::task::spawn_blocking(move || generator.generate_one(None)).await
                    }
                })
                .buffer_unordered(workers)
                .collect()
                .await;

        let mut documents = Vec::with_capacity(count);
        for result in results {
            match result {
                Ok(Ok(doc)) => documents.push(doc),
                Ok(Err(err)) => warn!("dropping document slot: {err}"),
                Err(err) => warn!("dropping document slot: synthesis worker failed: {err}"),
            }
        }
        documents
    }
}

impl Default for DocGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_DOCUMENT_SIZE)
    }
}
