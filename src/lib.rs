//! docload library: a control plane for driving synthetic CRUD workloads
//! against document, relational, wide-column, and object storage.
//!
//! The pieces compose as: HTTP request -> [`registry::LoaderRegistry`]
//! guard -> detached [`engine::CrudEngine`] task parameterized by a
//! [`loader_core::BackendAdapter`] and a cancellation handle. Stop and
//! pause requests flip the handle; the engine observes it at its next
//! iteration boundary.

pub mod engine;
pub mod registry;
pub mod server;
pub mod testing;
