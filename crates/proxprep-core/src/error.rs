//! Custom error types for data preparation.
//!
//! This module provides structured error handling using `thiserror`. Each
//! failure class the prepper can detect gets its own variant, so the caller
//! always learns which input or parameter caused the run to stop.

use std::path::PathBuf;

use proxprep_core_common::{
    EngineError, FeatureClassRef, GeodatabasePath, LayerName, ValidationError, Wkid,
};
use thiserror::Error;

/// Main error type for data preparation.
#[derive(Debug, Error)]
pub enum PrepError {
    /// A required input path does not exist or cannot be read
    #[error("Parameter {parameter}: '{}' does not exist or is not readable", path.display())]
    MissingInput {
        /// The parameter that supplied the path (e.g., "`site_a_path`")
        parameter: &'static str,
        /// The missing path
        path: PathBuf,
    },

    /// The default geodatabase lacks one of its required layers
    #[error("Geodatabase '{gdb}' is missing required layer '{layer}'")]
    MissingLayer {
        /// The default geodatabase
        gdb: GeodatabasePath,
        /// The missing feature class name
        layer: LayerName,
    },

    /// A target geodatabase does not accept writes
    #[error("Parameter {parameter}: geodatabase '{}' is not writable", path.display())]
    WritePermission {
        /// The parameter that supplied the geodatabase
        parameter: &'static str,
        /// The geodatabase path
        path: PathBuf,
    },

    /// Spatial reference problems (unknown target, undefined source)
    #[error(transparent)]
    SpatialReference(#[from] SpatialReferenceError),

    /// An output feature class already exists and overwriting is disabled
    #[error("Feature class '{target}' already exists")]
    Collision {
        /// The existing feature class
        target: FeatureClassRef,
    },

    /// A layer the run would write is one of its own input layers
    #[error("Writing '{target}' would overwrite the {parameter} input layer")]
    InputOverwrite {
        /// The feature class that would be written
        target: FeatureClassRef,
        /// The parameter that supplied the input layer
        parameter: &'static str,
    },

    /// A raw parameter value was rejected
    #[error("Parameter {parameter}: {source}")]
    Validation {
        /// The offending parameter
        parameter: &'static str,
        /// Why it was rejected
        #[source]
        source: ValidationError,
    },

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failures inside the geospatial engine
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Spatial reference errors.
#[derive(Debug, Error)]
pub enum SpatialReferenceError {
    /// The target WKID is not a coordinate system the engine knows
    #[error("Parameter sr: {wkid} does not correspond to a known coordinate system")]
    Unknown {
        /// The requested WKID
        wkid: Wkid,
    },

    /// A source layer carries no spatial reference
    #[error("Layer '{layer}' has an undefined spatial reference and cannot be reprojected")]
    Undefined {
        /// The layer without a spatial reference
        layer: FeatureClassRef,
    },

    /// A source layer uses a spatial reference the engine cannot project from
    #[error("Layer '{layer}' uses spatial reference {wkid}, which the engine cannot reproject")]
    Unsupported {
        /// The layer
        layer: FeatureClassRef,
        /// Its native WKID
        wkid: Wkid,
    },
}

/// Configuration errors.
///
/// These errors occur when options or the configuration file are invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required parameter is missing
    #[error("Missing required parameter: {parameter}")]
    MissingRequired {
        /// The missing parameter name
        parameter: &'static str,
    },

    /// An output name would overwrite one of the source layers
    #[error("Parameter {parameter}: '{name}' is reserved for a source layer in the default geodatabase")]
    ReservedName {
        /// The parameter holding the name
        parameter: &'static str,
        /// The reserved name
        name: LayerName,
    },

    /// Two output parameters name the same feature class
    #[error("Parameters {first} and {second} both name '{name}'")]
    DuplicateName {
        /// First parameter
        first: &'static str,
        /// Second parameter
        second: &'static str,
        /// The shared name
        name: LayerName,
    },

    /// Invalid option value
    #[error("Invalid {option} option '{value}': expected {expected}")]
    InvalidOption {
        /// The option name
        option: &'static str,
        /// The rejected value
        value: String,
        /// What would have been accepted
        expected: &'static str,
    },

    /// The configuration file could not be read
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this tool
    #[error("Invalid config file '{}': {source}", path.display())]
    Parse {
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: toml::de::Error,
    },
}

/// Type alias for Results using `PrepError`.
pub type Result<T> = std::result::Result<T, PrepError>;

impl PrepError {
    /// Get a user-friendly error message.
    ///
    /// Names the input or parameter at fault so the message can be shown to
    /// end users as-is.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingInput { parameter, path } => format!(
                "Input not found for {parameter}: {}\nIt must exist before processing begins.",
                path.display()
            ),
            Self::MissingLayer { gdb, layer } => {
                format!("The default geodatabase {gdb} does not contain the '{layer}' layer.")
            },
            Self::WritePermission { parameter, path } => {
                format!("Cannot write to {parameter}: {}", path.display())
            },
            Self::SpatialReference(e) => format!("Spatial reference error: {e}"),
            Self::Collision { target } => {
                format!("Output {target} already exists and overwriting is disabled.")
            },
            Self::InputOverwrite { target, parameter } => format!(
                "Output {target} is the same feature class as the {parameter} input; \
                 inputs are never overwritten."
            ),
            Self::Validation { .. } => self.to_string(),
            Self::Config(e) => format!("Configuration error: {e}"),
            Self::Engine(e) => format!("Engine error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::MissingInput { .. } => {
                Some("Check that the path is correct and the dataset exists.".to_string())
            },
            Self::MissingLayer { .. } => Some(
                "The default geodatabase needs both 'Indigenous_autouc' and 'bld_p' layers."
                    .to_string(),
            ),
            Self::WritePermission { .. } => {
                Some("Check permissions on the geodatabase directory.".to_string())
            },
            Self::SpatialReference(SpatialReferenceError::Unknown { .. }) => {
                Some("Run 'proxprep spatial-refs' to list supported WKIDs.".to_string())
            },
            Self::SpatialReference(SpatialReferenceError::Undefined { .. }) => {
                Some("Define a projection on the layer before running again.".to_string())
            },
            Self::Collision { .. } => Some(
                "Choose a different output name or rerun with --on-collision overwrite."
                    .to_string(),
            ),
            Self::InputOverwrite { .. } => Some(
                "Choose output names or a scratch geodatabase that differ from the input layers."
                    .to_string(),
            ),
            Self::Engine(e) => e.recovery_suggestion(),
            Self::SpatialReference(SpatialReferenceError::Unsupported { .. })
            | Self::Validation { .. }
            | Self::Config(_) => None,
        }
    }

    /// Check if this error is potentially recoverable.
    ///
    /// Recoverable errors are fixed by rerunning with different parameters.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Validation { .. }
                | Self::Collision { .. }
                | Self::InputOverwrite { .. }
        )
    }
}
