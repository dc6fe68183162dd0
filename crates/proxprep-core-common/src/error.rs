//! Error types shared by value-type validation and engine implementations.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Wkid;

/// A raw parameter value was rejected while building a value type.
///
/// These errors are produced at the boundary, before any engine call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The value was empty
    #[error("{kind} must not be empty")]
    Empty {
        /// What kind of value was expected (e.g., "layer name")
        kind: &'static str,
    },

    /// The path does not name a geodatabase container
    #[error("'{}' is not a geodatabase: expected a path ending in .gdb", path.display())]
    NotAGeodatabase {
        /// The rejected path
        path: PathBuf,
    },

    /// The path does not point at a feature class inside a geodatabase
    #[error("'{}' does not name a feature class inside a geodatabase", path.display())]
    NotInGeodatabase {
        /// The rejected path
        path: PathBuf,
    },

    /// The feature class name breaks the naming rules
    #[error("Invalid layer name '{name}': {reason}")]
    InvalidLayerName {
        /// The rejected name
        name: String,
        /// Which rule was broken
        reason: String,
    },

    /// The spatial reference identifier is not a positive integer
    #[error("Invalid WKID '{value}': expected a positive integer")]
    InvalidWkid {
        /// The rejected value, as supplied
        value: String,
    },
}

/// Failures reported by a [`GeoEngine`](crate::GeoEngine) implementation.
///
/// Everything that goes wrong inside the engine itself (storage, malformed
/// data, locks) ends up here. Input problems the prepper can detect up front
/// are reported through its own error type instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An I/O operation failed
    #[error("Failed to {operation} '{target}': {source}")]
    Io {
        /// What the engine was doing (e.g., "read", "write")
        operation: &'static str,
        /// The dataset or container involved
        target: String,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// The storage refused a write
    #[error("Permission denied for '{}'", path.display())]
    PermissionDenied {
        /// The path with permission issues
        path: PathBuf,
    },

    /// A stored feature class could not be decoded
    #[error("Malformed feature class '{target}': {message}")]
    Malformed {
        /// The feature class
        target: String,
        /// Description of the problem
        message: String,
    },

    /// Another process holds the workspace
    #[error("Workspace '{target}' is locked by another process")]
    Locked {
        /// The locked geodatabase
        target: String,
    },

    /// The engine has no definition for a spatial reference
    #[error("Spatial reference {wkid} is not supported by the engine")]
    UnsupportedSpatialReference {
        /// The unsupported identifier
        wkid: Wkid,
    },

    /// Any other failure inside an engine operation
    #[error("{operation} failed: {message}")]
    Operation {
        /// The operation name (e.g., "reproject")
        operation: &'static str,
        /// Description of the failure
        message: String,
    },
}

impl EngineError {
    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::PermissionDenied { .. } => {
                Some("Check file permissions and ensure you have write access.".to_string())
            },
            Self::Locked { .. } => Some(
                "Close other sessions using the geodatabase, or remove a stale .proxprep.lock file."
                    .to_string(),
            ),
            Self::Malformed { .. } => {
                Some("Validate the dataset with a GIS tool before running again.".to_string())
            },
            Self::Io { .. } => Some("Check free disk space and that the path is accessible.".to_string()),
            Self::UnsupportedSpatialReference { .. } | Self::Operation { .. } => None,
        }
    }
}

/// Extension trait for adding engine context to I/O errors.
///
/// Permission failures are kept distinct so callers can report them as such.
pub trait EngineResultExt<T> {
    /// Wrap an I/O error with the operation and target it happened on.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PermissionDenied`] for permission failures and
    /// [`EngineError::Io`] for everything else.
    fn engine_context(
        self,
        operation: &'static str,
        target: impl Into<PathBuf>,
    ) -> Result<T, EngineError>;
}

impl<T> EngineResultExt<T> for std::io::Result<T> {
    fn engine_context(
        self,
        operation: &'static str,
        target: impl Into<PathBuf>,
    ) -> Result<T, EngineError> {
        self.map_err(|source| {
            let path = target.into();
            if source.kind() == std::io::ErrorKind::PermissionDenied {
                EngineError::PermissionDenied { path }
            } else {
                EngineError::Io {
                    operation,
                    target: path.display().to_string(),
                    source,
                }
            }
        })
    }
}
