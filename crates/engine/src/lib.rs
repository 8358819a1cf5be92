//! `gridask-engine`: the immutable dataset handle and its operations.
//!
//! Pure crate: no IO, no network. Ingestion lives in `gridask-io`, query
//! resolution in `gridask-query`.

pub mod dataset;
pub mod error;
pub mod filter;
pub mod group;
pub mod profile;
pub mod render;
pub mod stats;
pub mod value;

pub use dataset::{Column, Dataset};
pub use error::EngineError;
pub use filter::{Condition, ConditionSpec, Conditions};
pub use group::AggFunc;
pub use profile::{ColumnInfo, QualityReport};
pub use value::{DType, Value};
