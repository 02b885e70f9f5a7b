//! Synthetic document generation for the docload control plane.
//!
//! Every loader feeds on the same hotel-shaped record: fixed fake-data
//! fields, a review list grown until the next review would overflow the
//! size target, and a `padding` string that lands the serialized UTF-8
//! length on the target exactly.
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let hotel = docgen::synthesize(&mut rng, 2048, None);
//! let bytes = serde_json::to_string(&hotel).unwrap().len();
//! assert!(bytes.abs_diff(2048) <= 1);
//! ```
//!
//! [`DocGenerator`] layers bounded-concurrency batch synthesis on top, and
//! [`coerce_for_backend`] applies the reshaping some backends require
//! (floats become decimal strings for the wide-column store, with the
//! growth trimmed back out of `padding`).

pub mod coerce;
pub mod generator;
pub mod template;
pub mod words;

pub use coerce::{coerce_for_backend, decimal_string};
pub use generator::{DocGenerator, GeneratorError, DEFAULT_BATCH_WORKERS};
pub use template::{synthesize, Hotel, RatingTriple, Review, DEFAULT_DOCUMENT_SIZE};
