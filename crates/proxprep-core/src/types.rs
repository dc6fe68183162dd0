//! Data types describing stored feature classes.
//!
//! This module defines the structures returned when inspecting a geodatabase.

use proxprep_core_common::{LayerName, Wkid};

/// Information about a feature class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureClassInfo {
    /// Feature class name
    pub name: LayerName,
    /// Native spatial reference, `None` when undefined
    pub wkid: Option<Wkid>,
    /// Number of features
    pub feature_count: usize,
    /// Distinct geometry types, in order of first appearance (e.g., "Polygon")
    pub geometry_types: Vec<String>,
}
