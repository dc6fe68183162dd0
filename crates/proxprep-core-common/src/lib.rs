//! Common types and traits shared across `proxprep` crates.
//!
//! This crate provides the engine abstraction and the validated value types
//! that both the data prepper and engine implementations depend on, so an
//! engine can be written without pulling in the pipeline itself.

pub mod engine;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use engine::{GeoEngine, ProcessInputs, ProcessSummary};
pub use error::{EngineError, EngineResultExt, ValidationError};
pub use types::{FeatureClassRef, GeodatabasePath, LayerName, MAX_LAYER_NAME_LEN, Wkid};
