//! `proxprep-core` is the core library for the `proxprep` project, preparing
//! the inputs of a proximity analysis between indigenous communities and
//! distribution sites.
//!
//! This crate includes:
//! - **Data Prepper**: validation, reprojection and copy/rename of the input
//!   layers, followed by the engine's processing step ([`prepare`]).
//! - **Configuration**: run parameters, their defaults and TOML settings ([`config`]).
//! - **File Engine**: a [`GeoEngine`](proxprep_core_common::GeoEngine) storing
//!   feature classes as `GeoJSON` files in `.gdb` directories ([`file_gdb`]).
//! - **Projections**: the spatial references the file engine can transform
//!   between ([`projection`]).

pub mod config;
pub mod error;
pub mod file_gdb;
pub mod prepare;
pub mod projection;
mod proximity;
pub mod types;

pub use config::{CollisionPolicy, PrepConfig, PrepRequest, PrepSettings};
pub use error::{ConfigError, PrepError, Result, SpatialReferenceError};
pub use file_gdb::FileGeodatabaseEngine;
pub use prepare::{DataPrepper, LayerRole, PrepReport, Reprojection};
pub use proximity::{ADV_SITE_ID_FIELD, PD_SITE_ID_FIELD, SITE_ID_FIELD};
pub use proxprep_core_common::{
    EngineError, FeatureClassRef, GeoEngine, GeodatabasePath, LayerName, ProcessInputs,
    ProcessSummary, ValidationError, Wkid,
};
