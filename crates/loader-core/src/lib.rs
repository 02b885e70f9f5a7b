//! Core types for the docload control plane.
//!
//! This crate defines the vocabulary shared by the CRUD loop engine, the
//! loader registry, and the per-backend adapter crates:
//!
//! - [`BackendKind`] and [`ContainerId`] identify what a loader acts on.
//! - [`BackendAdapter`] is the capability surface every backend exposes to
//!   the engine (`count`, `insert_one`, `insert_batch`, `pick_random_key`,
//!   `update_by_key`, `delete_by_key`, `initialize_container`,
//!   `drop_container`).
//! - [`AdapterError`] is the error taxonomy; [`AdapterError::is_fatal`]
//!   marks the kinds a loader cannot recover from.
//! - [`LoaderHandle`] is the cooperative cancellation handle flipped by the
//!   registry and observed by engine loops at iteration boundaries.
//! - [`LoaderRecord`] is the persisted registry entity.

pub mod adapter;
pub mod container;
pub mod error;
pub mod handle;
pub mod record;

pub use adapter::{BackendAdapter, BatchFailure, BatchOutcome, OpKind, RecordKey};
pub use container::{BackendKind, ContainerId};
pub use error::AdapterError;
pub use handle::{LoaderHandle, LoaderState};
pub use record::{LoaderRecord, LoaderStatus};
