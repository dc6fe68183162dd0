//! Engine trait for the geospatial operations the data prepper delegates.
//!
//! The prepper never touches storage or geometry directly. Every read, write
//! and transformation goes through a [`GeoEngine`], so a file-backed engine, a
//! licensed GIS engine or an in-memory test double can be swapped in freely.

use crate::error::EngineError;
use crate::types::{FeatureClassRef, GeodatabasePath, Wkid};

/// Geospatial processing engine consumed by the data prepper.
///
/// Implementations are used from a single thread for the duration of one
/// run. Methods take `&self`; engines that need to record state use interior
/// mutability.
pub trait GeoEngine {
    /// Exclusive hold on a geodatabase, released when dropped.
    type Lock;

    /// Returns `true` if the geodatabase container exists.
    fn geodatabase_exists(&self, gdb: &GeodatabasePath) -> bool;

    /// Returns `true` if the feature class exists and can be read.
    fn exists(&self, fc: &FeatureClassRef) -> bool;

    /// Returns `true` if new feature classes can be written into `gdb`.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be inspected.
    fn is_writable(&self, gdb: &GeodatabasePath) -> Result<bool, EngineError>;

    /// Create an empty geodatabase.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be created.
    fn create_geodatabase(&self, gdb: &GeodatabasePath) -> Result<(), EngineError>;

    /// Take an exclusive lock on a geodatabase for the rest of the run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Locked`] if the workspace is already held.
    fn lock_workspace(&self, gdb: &GeodatabasePath) -> Result<Self::Lock, EngineError>;

    /// Returns `true` if the engine can project into and out of `wkid`.
    fn supports_spatial_reference(&self, wkid: Wkid) -> bool;

    /// Native spatial reference of a feature class, `None` when undefined.
    ///
    /// # Errors
    ///
    /// Returns an error if the feature class cannot be read.
    fn spatial_reference_of(&self, fc: &FeatureClassRef) -> Result<Option<Wkid>, EngineError>;

    /// Write a copy of `src` projected into `wkid` as `dst`, replacing `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, transforming or writing fails.
    fn reproject(
        &self,
        src: &FeatureClassRef,
        dst: &FeatureClassRef,
        wkid: Wkid,
    ) -> Result<(), EngineError>;

    /// Write an unchanged copy of `src` as `dst`, replacing `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    fn copy_rename(&self, src: &FeatureClassRef, dst: &FeatureClassRef)
    -> Result<(), EngineError>;

    /// Derive the processed output feature class from the prepared inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if any input cannot be read or the output cannot be written.
    fn process(&self, inputs: &ProcessInputs) -> Result<ProcessSummary, EngineError>;
}

/// Prepared inputs handed to [`GeoEngine::process`].
///
/// Every feature class listed here is already in `spatial_reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInputs {
    /// Indigenous-area polygons, copied into the default geodatabase
    pub indigenous_areas: FeatureClassRef,
    /// Building points, copied into the default geodatabase
    pub buildings: FeatureClassRef,
    /// Site polygons (`site_a`)
    pub site_areas: FeatureClassRef,
    /// Advanced site polygons (`adv_pd`)
    pub advanced_site_areas: FeatureClassRef,
    /// Site points (`site_p`)
    pub site_points: FeatureClassRef,
    /// Where intermediate datasets may be written
    pub scratch_gdb: GeodatabasePath,
    /// The feature class to produce
    pub output: FeatureClassRef,
    /// Common spatial reference of all inputs and the output
    pub spatial_reference: Wkid,
}

/// What the processing step produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Number of features written to the output
    pub features_written: usize,
    /// Interior points added for areas that had no building point
    pub interior_points_added: usize,
    /// Assigned `site_a` ids that have no matching site point
    pub missing_pd_site_ids: Vec<String>,
    /// Assigned `adv_pd` ids that have no matching site point
    pub missing_adv_site_ids: Vec<String>,
}
