//! DynamoDB backend adapter for docload.
//!
//! Implements the [`loader_core::BackendAdapter`] surface over the AWS SDK:
//! paginated count scans, conditional single-item puts, 25-item
//! BatchWriteItem chunks with unprocessed-slot reporting, and table
//! bootstrap with NEW_IMAGE stream enablement. Records must be coerced
//! float-free before they reach this adapter; updates are not supported.

pub mod adapter;
pub mod attr;
pub mod config;

pub use adapter::DynamoAdapter;
pub use config::DynamoEndpoint;
