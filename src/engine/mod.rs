//! Per-loader steady-state CRUD control loop.
//!
//! Phase A converges the container population onto the target with
//! adaptively sized insert batches (or random-key deletes when over
//! target). Phase B then drives a randomized operation mix, guarded by the
//! buffer band, until the cancellation handle flips or the optional
//! wall-clock budget runs out. Budget expiry ends with a reconciliation
//! pass that insists the population sits exactly on the target.

pub mod object_store;

use docgen::{coerce_for_backend, DocGenerator};
use loader_core::{AdapterError, BackendAdapter, LoaderHandle, LoaderState, OpKind};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Hard cap on a single insert batch.
pub const MAX_BATCH_SIZE: u64 = 10_000;

const UPPER_FACTOR: f64 = 0.10;
const LOWER_FACTOR: f64 = 0.01;

/// How long a paused loop sleeps between handle checks.
const PAUSE_POLL: Duration = Duration::from_millis(250);

/// Backoff after a transient failure, and the idle interval for a
/// degenerate band with no supported update.
const IDLE_SLEEP: Duration = Duration::from_millis(100);

/// Batch size for closing a deficit of `target - current` documents.
///
/// Ten percent of the deficit, floored at one percent, clamped to
/// `[1, max_batch]`: always makes progress, and shrinks as the deficit
/// shrinks so convergence does not overshoot.
pub fn optimal_batch_size(target: u64, current: u64, max_batch: u64) -> u64 {
    let deficit = target.saturating_sub(current);
    let mut batch = ((deficit as f64 * UPPER_FACTOR) as u64).clamp(1, max_batch);
    let lower = (deficit as f64 * LOWER_FACTOR) as u64;
    if batch < lower {
        batch = lower;
    }
    batch.clamp(1, max_batch)
}

/// The closed interval the population is kept within during Phase B.
/// `max = None` means unbounded above (buffer of zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub min: u64,
    pub max: Option<u64>,
}

/// Operation guards for a target and buffer half-width. A zero buffer
/// leaves the per-operation guards unbounded; exact tracking then happens
/// through the recovery pass instead.
pub fn band(target: u64, buffer: u64) -> Band {
    if buffer == 0 {
        Band { min: 0, max: None }
    } else {
        Band {
            min: target.saturating_sub(buffer),
            max: Some(target + buffer),
        }
    }
}

/// Launch parameters of one loader.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Population the loop converges on.
    pub target: u64,
    /// Buffer half-width; zero tracks the target exactly.
    pub buffer: u64,
    /// Serialized size of every synthesized document.
    pub document_size: usize,
    /// Parallelism of Phase A batch synthesis.
    pub batch_workers: usize,
    /// Optional wall-clock budget; expiry stops the loader after a final
    /// reconciliation.
    pub time_budget: Option<Duration>,
}

impl EngineConfig {
    pub fn new(target: u64, buffer: u64) -> Self {
        Self {
            target,
            buffer,
            document_size: docgen::DEFAULT_DOCUMENT_SIZE,
            batch_workers: docgen::DEFAULT_BATCH_WORKERS,
            time_budget: None,
        }
    }

    pub fn with_document_size(mut self, document_size: usize) -> Self {
        self.document_size = document_size;
        self
    }

    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = budget;
        self
    }
}

/// How a loader run ended (other than failing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExit {
    /// The cancellation handle was flipped to stopped.
    Stopped,
    /// The wall-clock budget elapsed and the final reconciliation ran.
    Completed,
}

/// One steady-state CRUD loop bound to one adapter.
pub struct CrudEngine {
    adapter: Arc<dyn BackendAdapter>,
    generator: DocGenerator,
    config: EngineConfig,
}

impl CrudEngine {
    pub fn new(adapter: Arc<dyn BackendAdapter>, config: EngineConfig) -> Self {
        let generator = DocGenerator::new(config.document_size);
        Self {
            adapter,
            generator,
            config,
        }
    }

    /// Drive the loader until cancellation or budget expiry.
    ///
    /// Fatal adapter errors (auth, missing container, unavailability)
    /// during initialization and Phase A are returned to the caller, which
    /// persists the `failed` status; everything else is logged and skipped.
    pub async fn run(&self, handle: LoaderHandle) -> Result<EngineExit, AdapterError> {
        match self.adapter.initialize_container().await {
            Ok(()) => {}
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => warn!("container initialization: {err}"),
        }

        // Phase A: initial convergence.
        if self.converge(&handle).await? {
            return Ok(EngineExit::Stopped);
        }
        info!(
            "initial convergence complete on {} (target {})",
            self.adapter.kind(),
            self.config.target
        );

        // Phase B: randomized operation mix within the band.
        let started = Instant::now();
        let mut rng = StdRng::from_os_rng();
        loop {
            match handle.state() {
                LoaderState::Stopped => return Ok(EngineExit::Stopped),
                LoaderState::Paused => {
                    tokio::select! {
                        _ = handle.cancelled() => {}
                        _ = tokio::time::sleep(PAUSE_POLL) => {}
                    }
                    continue;
                }
                LoaderState::Running => {}
            }
            if let Some(budget) = self.config.time_budget {
                if started.elapsed() >= budget {
                    break;
                }
            }
            if let Err(err) = self.steady_step(&handle, &mut rng).await {
                // Phase B recovers from every adapter error by advancing.
                warn!("steady-state iteration: {err}");
                tokio::time::sleep(IDLE_SLEEP).await;
            }
        }

        // Budget elapsed: reconcile to the exact target before exiting.
        info!("time budget elapsed, reconciling to {}", self.config.target);
        if self.converge(&handle).await? {
            return Ok(EngineExit::Stopped);
        }
        Ok(EngineExit::Completed)
    }

    /// One-shot convergence to the exact target, for restore endpoints.
    pub async fn reconcile(&self, handle: &LoaderHandle) -> Result<(), AdapterError> {
        self.converge(handle).await.map(|_| ())
    }

    /// Converge the population to exactly the target. Returns `true` when
    /// the handle was stopped mid-convergence.
    async fn converge(&self, handle: &LoaderHandle) -> Result<bool, AdapterError> {
        loop {
            if handle.is_stopped() {
                return Ok(true);
            }
            let current = match self.adapter.count().await {
                Ok(count) => count,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!("count during convergence: {err}");
                    tokio::time::sleep(IDLE_SLEEP).await;
                    continue;
                }
            };
            if current < self.config.target {
                let batch = optimal_batch_size(self.config.target, current, MAX_BATCH_SIZE);
                self.insert_documents(batch).await?;
            } else if current > self.config.target {
                self.delete_random().await?;
            } else {
                return Ok(false);
            }
        }
    }

    async fn insert_documents(&self, batch: u64) -> Result<(), AdapterError> {
        let documents = self
            .generator
            .generate_batch(batch as usize, self.config.batch_workers)
            .await;
        if documents.is_empty() {
            warn!("generator produced an empty batch of {batch}");
            tokio::time::sleep(IDLE_SLEEP).await;
            return Ok(());
        }
        let coerced: Vec<_> = documents
            .into_iter()
            .map(|doc| coerce_for_backend(doc, self.adapter.kind()))
            .collect();
        match self.adapter.insert_batch(coerced).await {
            Ok(outcome) => {
                if !outcome.failures.is_empty() {
                    warn!(
                        "batch insert dropped {} of {batch} documents",
                        outcome.failures.len()
                    );
                }
                debug!("inserted {} documents", outcome.inserted);
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!("batch insert: {err}");
                Ok(())
            }
        }
    }

    async fn delete_random(&self) -> Result<(), AdapterError> {
        match self.adapter.pick_random_key().await {
            Ok(Some(key)) => match self.adapter.delete_by_key(&key).await {
                Ok(()) => Ok(()),
                Err(err) if err.is_fatal() => Err(err),
                Err(err) => {
                    warn!("delete of {key}: {err}");
                    Ok(())
                }
            },
            // Random selection on an empty container is a no-op.
            Ok(None) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!("random key pick: {err}");
                Ok(())
            }
        }
    }

    /// One Phase B iteration: pick an operation uniformly from the
    /// adapter's supported set, dispatch it under the band guards, then
    /// pull the population back inside the band if something external (or
    /// the zero-buffer exact mode) left it outside.
    async fn steady_step(&self, handle: &LoaderHandle, rng: &mut StdRng) -> Result<(), AdapterError> {
        let current = self.adapter.count().await?;
        let band = band(self.config.target, self.config.buffer);

        if band.max == Some(band.min) {
            // Degenerate band: only updates can preserve the population.
            if self.adapter.supported_ops().contains(&OpKind::Update) {
                self.update_random().await?;
            } else {
                tokio::time::sleep(IDLE_SLEEP).await;
            }
            return Ok(());
        }

        let op = self.adapter.supported_ops().choose(rng).copied();
        match op {
            Some(OpKind::Insert) if band.max.is_none_or(|max| current < max) => {
                let document = self
                    .generator
                    .generate_one(None)
                    .map_err(|e| AdapterError::Backend(e.to_string()))?;
                let document = coerce_for_backend(document, self.adapter.kind());
                self.adapter.insert_one(document).await?;
            }
            Some(OpKind::Update) => self.update_random().await?,
            Some(OpKind::Delete) if current > band.min => self.delete_random().await?,
            // The band guard blocked this tick's operation; just advance.
            _ => {}
        }

        // Best-effort band recovery: external writers may have moved the
        // population arbitrarily, and a zero buffer tracks the target
        // exactly.
        let current = self.adapter.count().await?;
        let low = self.config.target.saturating_sub(self.config.buffer);
        let high = self.config.target + self.config.buffer;
        if current < low || current > high {
            debug!(
                "population {current} outside [{low}, {high}], reconverging to {}",
                self.config.target
            );
            self.converge(handle).await?;
        }
        Ok(())
    }

    async fn update_random(&self) -> Result<(), AdapterError> {
        match self.adapter.pick_random_key().await? {
            Some(key) => {
                let replacement = self
                    .generator
                    .generate_one(Some(key.to_string()))
                    .map_err(|e| AdapterError::Backend(e.to_string()))?;
                let replacement = coerce_for_backend(replacement, self.adapter.kind());
                match self.adapter.update_by_key(&key, replacement).await {
                    Ok(()) => Ok(()),
                    // The record may have been deleted since the pick.
                    Err(AdapterError::KeyNotFound(_)) => Ok(()),
                    Err(err) => Err(err),
                }
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_monotone_progress() {
        // Always at least one, even when the deficit is tiny or zero.
        assert_eq!(optimal_batch_size(100, 100, MAX_BATCH_SIZE), 1);
        assert_eq!(optimal_batch_size(100, 99, MAX_BATCH_SIZE), 1);
        assert_eq!(optimal_batch_size(0, 50, MAX_BATCH_SIZE), 1);
    }

    #[test]
    fn test_batch_size_shrinks_with_deficit() {
        let far = optimal_batch_size(100_000, 0, MAX_BATCH_SIZE);
        let near = optimal_batch_size(100_000, 99_000, MAX_BATCH_SIZE);
        assert!(far > near);
        assert_eq!(far, MAX_BATCH_SIZE);
        assert_eq!(near, 100);
    }

    #[test]
    fn test_batch_size_respects_cap() {
        assert_eq!(optimal_batch_size(10_000_000, 0, MAX_BATCH_SIZE), MAX_BATCH_SIZE);
        assert_eq!(optimal_batch_size(1_000, 0, 50), 50);
    }

    #[test]
    fn test_band_zero_buffer_is_unbounded() {
        let b = band(1000, 0);
        assert_eq!(b.min, 0);
        assert_eq!(b.max, None);
    }

    #[test]
    fn test_band_with_buffer() {
        let b = band(1000, 100);
        assert_eq!(b.min, 900);
        assert_eq!(b.max, Some(1100));

        let b = band(50, 100);
        assert_eq!(b.min, 0);
        assert_eq!(b.max, Some(150));
    }
}
