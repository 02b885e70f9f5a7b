//! S3 object-store adapter for docload.
//!
//! The object store is driven differently from the flat-container
//! backends: loaders operate per folder path rather than per key, so the
//! capability surface lives on [`S3Client`] (bucket lifecycle, prefix
//! listings, put/delete, counts) with [`TreeBuilder`] seeding the
//! parameterized folder hierarchy with json/csv/tsv/parquet/avro files.

pub mod client;
pub mod config;
pub mod files;
pub mod tree;

pub use client::S3Client;
pub use config::{FileFormat, ObjectStoreConfig};
pub use tree::{random_folder_path, TreeBuilder};
