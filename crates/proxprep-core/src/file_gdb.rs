//! A [`GeoEngine`] backed by plain directories and `GeoJSON` files.
//!
//! A geodatabase is a directory whose name ends in `.gdb`; every feature class
//! is a `<name>.geojson` FeatureCollection inside it. The spatial reference is
//! stored in the collection's `crs` member, the way GDAL writes it:
//!
//! ```json
//! { "type": "FeatureCollection",
//!   "crs": { "type": "name", "properties": { "name": "EPSG:3347" } },
//!   "features": [] }
//! ```
//!
//! A collection without a `crs` member has an undefined spatial reference.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use geo::MapCoords;
use geo_types::Geometry;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry as GeoJsonGeometry, JsonObject, JsonValue};
use log::{debug, info, warn};
use proxprep_core_common::{
    EngineError, EngineResultExt, FeatureClassRef, GeoEngine, GeodatabasePath, LayerName,
    ProcessInputs, ProcessSummary, Wkid,
};
use serde_json::json;

use crate::projection::{Projection, Transform};
use crate::proximity;
use crate::types::FeatureClassInfo;

/// File extension of a stored feature class.
pub const FEATURE_CLASS_EXTENSION: &str = "geojson";

const LOCK_FILE: &str = ".proxprep.lock";

/// Filesystem engine: `.gdb` directories holding `GeoJSON` feature classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileGeodatabaseEngine;

impl FileGeodatabaseEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// List the feature classes stored in a geodatabase, sorted by name.
    ///
    /// Files whose stem is not a valid feature class name are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or a feature class
    /// cannot be decoded.
    pub fn describe(&self, gdb: &GeodatabasePath) -> Result<Vec<FeatureClassInfo>, EngineError> {
        let entries = fs::read_dir(gdb).engine_context("list", gdb.as_path())?;

        let mut infos = Vec::new();
        for entry in entries {
            let path = entry.engine_context("list", gdb.as_path())?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FEATURE_CLASS_EXTENSION) {
                continue;
            }
            let Some(name) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| LayerName::new(stem).ok())
            else {
                debug!("Skipping {}: not a feature class name", path.display());
                continue;
            };

            let stored = read_feature_class(&gdb.feature_class(name.clone()))?;
            infos.push(FeatureClassInfo {
                name,
                wkid: stored.wkid,
                feature_count: stored.features.len(),
                geometry_types: geometry_types(&stored.features),
            });
        }

        infos.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        Ok(infos)
    }
}

/// Lock file held inside a geodatabase for the duration of a run.
#[derive(Debug)]
pub struct WorkspaceLock {
    path: PathBuf,
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released workspace lock {}", self.path.display()),
            Err(e) => warn!("Failed to release workspace lock {}: {e}", self.path.display()),
        }
    }
}

impl GeoEngine for FileGeodatabaseEngine {
    type Lock = WorkspaceLock;

    fn geodatabase_exists(&self, gdb: &GeodatabasePath) -> bool {
        gdb.as_path().is_dir()
    }

    fn exists(&self, fc: &FeatureClassRef) -> bool {
        dataset_path(fc).is_file()
    }

    fn is_writable(&self, gdb: &GeodatabasePath) -> Result<bool, EngineError> {
        let metadata = fs::metadata(gdb).engine_context("inspect", gdb.as_path())?;
        if !metadata.is_dir() {
            return Ok(false);
        }
        // Mode bits do not say whether this process may create files here.
        match tempfile::Builder::new()
            .prefix(".proxprep-write-check")
            .tempfile_in(gdb)
        {
            Ok(_) => Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem
                ) =>
            {
                Ok(false)
            },
            Err(e) => Err(e).engine_context("inspect", gdb.as_path()),
        }
    }

    fn create_geodatabase(&self, gdb: &GeodatabasePath) -> Result<(), EngineError> {
        info!("Creating geodatabase {gdb}");
        fs::create_dir_all(gdb).engine_context("create", gdb.as_path())
    }

    fn lock_workspace(&self, gdb: &GeodatabasePath) -> Result<WorkspaceLock, EngineError> {
        let path = gdb.as_path().join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(EngineError::Locked {
                    target: gdb.to_string(),
                });
            },
            Err(e) => return Err(e).engine_context("lock", &path),
        };

        let lock = WorkspaceLock { path: path.clone() };
        writeln!(file, "{}", std::process::id()).engine_context("write", &path)?;
        debug!("Acquired workspace lock {}", path.display());
        Ok(lock)
    }

    fn supports_spatial_reference(&self, wkid: Wkid) -> bool {
        Projection::from_wkid(wkid).is_some()
    }

    fn spatial_reference_of(&self, fc: &FeatureClassRef) -> Result<Option<Wkid>, EngineError> {
        Ok(read_feature_class(fc)?.wkid)
    }

    fn reproject(
        &self,
        src: &FeatureClassRef,
        dst: &FeatureClassRef,
        wkid: Wkid,
    ) -> Result<(), EngineError> {
        let stored = read_feature_class(src)?;
        let from = stored.wkid.ok_or_else(|| EngineError::Operation {
            operation: "reproject",
            message: format!("'{src}' has an undefined spatial reference"),
        })?;
        let transform = Transform::new(from, wkid).ok_or_else(|| {
            let unsupported = if Projection::from_wkid(from).is_none() {
                from
            } else {
                wkid
            };
            EngineError::UnsupportedSpatialReference { wkid: unsupported }
        })?;

        let features = stored
            .features
            .into_iter()
            .map(|feature| reproject_feature(feature, &transform, src))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Reprojected {} features from {from} to {wkid}: {src} -> {dst}",
            features.len()
        );
        write_feature_class(dst, features, wkid)
    }

    fn copy_rename(&self, src: &FeatureClassRef, dst: &FeatureClassRef) -> Result<(), EngineError> {
        let from = dataset_path(src);
        let to = dataset_path(dst);
        let staging = staging_path(&to);

        fs::copy(&from, &staging).engine_context("copy", &from)?;
        fs::rename(&staging, &to).engine_context("write", &to)?;
        info!("Copied {src} -> {dst}");
        Ok(())
    }

    fn process(&self, inputs: &ProcessInputs) -> Result<ProcessSummary, EngineError> {
        proximity::process(inputs)
    }
}

/// A decoded feature class.
pub(crate) struct StoredFeatureClass {
    pub(crate) features: Vec<Feature>,
    pub(crate) wkid: Option<Wkid>,
}

pub(crate) fn dataset_path(fc: &FeatureClassRef) -> PathBuf {
    fc.gdb()
        .as_path()
        .join(format!("{}.{FEATURE_CLASS_EXTENSION}", fc.name()))
}

fn staging_path(target: &std::path::Path) -> PathBuf {
    let mut staging = target.as_os_str().to_owned();
    staging.push(".tmp");
    PathBuf::from(staging)
}

pub(crate) fn malformed(fc: &FeatureClassRef, message: impl Into<String>) -> EngineError {
    EngineError::Malformed {
        target: fc.to_string(),
        message: message.into(),
    }
}

pub(crate) fn read_feature_class(fc: &FeatureClassRef) -> Result<StoredFeatureClass, EngineError> {
    let path = dataset_path(fc);
    let text = fs::read_to_string(&path).engine_context("read", &path)?;

    let collection = match text.parse::<GeoJson>() {
        Ok(GeoJson::FeatureCollection(collection)) => collection,
        Ok(_) => return Err(malformed(fc, "expected a FeatureCollection")),
        Err(e) => return Err(malformed(fc, e.to_string())),
    };

    let wkid = wkid_from_members(collection.foreign_members.as_ref(), fc)?;
    Ok(StoredFeatureClass {
        features: collection.features,
        wkid,
    })
}

/// Write a feature class, replacing any existing one of the same name.
pub(crate) fn write_feature_class(
    fc: &FeatureClassRef,
    features: Vec<Feature>,
    wkid: Wkid,
) -> Result<(), EngineError> {
    let mut members = JsonObject::new();
    members.insert("crs".to_string(), crs_member(wkid));

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(members),
    };

    let path = dataset_path(fc);
    let staging = staging_path(&path);
    fs::write(&staging, GeoJson::FeatureCollection(collection).to_string())
        .engine_context("write", &staging)?;
    fs::rename(&staging, &path).engine_context("write", &path)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn crs_member(wkid: Wkid) -> JsonValue {
    json!({
        "type": "name",
        "properties": { "name": format!("EPSG:{wkid}") }
    })
}

fn wkid_from_members(
    members: Option<&JsonObject>,
    fc: &FeatureClassRef,
) -> Result<Option<Wkid>, EngineError> {
    let Some(crs) = members.and_then(|m| m.get("crs")) else {
        return Ok(None);
    };
    if crs.is_null() {
        return Ok(None);
    }

    let name = crs
        .pointer("/properties/name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| malformed(fc, "crs member has no properties.name"))?;
    parse_crs_name(name)
        .map(Some)
        .ok_or_else(|| malformed(fc, format!("unrecognised crs '{name}'")))
}

/// Parse `EPSG:n`, `urn:ogc:def:crs:EPSG::n` or a CRS84 name.
pub(crate) fn parse_crs_name(name: &str) -> Option<Wkid> {
    let upper = name.to_ascii_uppercase();
    if upper.ends_with("CRS84") {
        return Some(Wkid::WGS84);
    }
    if !(upper.contains("EPSG") || upper.contains("ESRI")) {
        return None;
    }
    name.rsplit(':').next()?.parse().ok()
}

fn reproject_feature(
    mut feature: Feature,
    transform: &Transform,
    fc: &FeatureClassRef,
) -> Result<Feature, EngineError> {
    if let Some(geometry) = feature.geometry.take() {
        let geometry =
            Geometry::<f64>::try_from(geometry).map_err(|e| malformed(fc, e.to_string()))?;
        let projected = geometry.map_coords(|c| transform.apply(c));
        feature.geometry = Some(GeoJsonGeometry::new(geojson::Value::from(&projected)));
    }
    Ok(feature)
}

fn geometry_types(features: &[Feature]) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for geometry in features.iter().filter_map(|f| f.geometry.as_ref()) {
        let name = geometry_type_name(&geometry.value);
        if !types.iter().any(|t| t == name) {
            types.push(name.to_string());
        }
    }
    types
}

fn geometry_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
