//! The data prepper pipeline.
//!
//! [`DataPrepper::run`] validates a [`PrepRequest`] against a [`GeoEngine`],
//! brings every input layer into the requested spatial reference, copies the
//! indigenous-area and building layers into the default geodatabase under
//! their configured names and hands the prepared inputs to the engine's
//! processing step.
//!
//! No write happens until every validation check has passed.
//!
//! # Examples
//!
//! ```no_run
//! use proxprep_core::config::PrepSettings;
//! use proxprep_core::file_gdb::FileGeodatabaseEngine;
//! use proxprep_core::prepare::DataPrepper;
//!
//! # fn main() -> proxprep_core::error::Result<()> {
//! let request = PrepSettings::from_toml_file("proxprep.toml")?.into_request()?;
//! let engine = FileGeodatabaseEngine::new();
//! let report = DataPrepper::new(&engine).run(&request)?;
//! println!("wrote {}", report.output);
//! # Ok(())
//! # }
//! ```

use std::fmt;

use log::{debug, info};
use proxprep_core_common::{
    EngineError, FeatureClassRef, GeoEngine, GeodatabasePath, LayerName, ProcessInputs,
    ProcessSummary, Wkid,
};

use crate::config::{BUILDINGS_SOURCE, CollisionPolicy, INDIGENOUS_AREAS_SOURCE, PrepRequest};
use crate::error::{PrepError, Result, SpatialReferenceError};
use crate::proximity::augmented_name;

/// The five input layers of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerRole {
    /// `Indigenous_autouc` in the default geodatabase
    IndigenousAreas,
    /// `bld_p` in the default geodatabase
    Buildings,
    /// Distribution site polygons
    SiteAreas,
    /// Advanced distribution site polygons
    AdvancedSiteAreas,
    /// Distribution site points
    SitePoints,
}

impl LayerRole {
    /// Every role, in the order layers are validated and reprojected.
    pub const ALL: [LayerRole; 5] = [
        LayerRole::IndigenousAreas,
        LayerRole::Buildings,
        LayerRole::SiteAreas,
        LayerRole::AdvancedSiteAreas,
        LayerRole::SitePoints,
    ];

    /// The parameter that supplies this layer.
    #[must_use]
    pub fn parameter(self) -> &'static str {
        match self {
            LayerRole::IndigenousAreas | LayerRole::Buildings => "default_gdb",
            LayerRole::SiteAreas => "site_a_path",
            LayerRole::AdvancedSiteAreas => "adv_pd_path",
            LayerRole::SitePoints => "site_p_path",
        }
    }

    /// Prefix of the reprojected copy in the scratch geodatabase.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            LayerRole::IndigenousAreas => "ia_a",
            LayerRole::Buildings => "bld_p",
            LayerRole::SiteAreas => "site_a",
            LayerRole::AdvancedSiteAreas => "adv_pd",
            LayerRole::SitePoints => "site_p",
        }
    }

    fn source(self, request: &PrepRequest) -> FeatureClassRef {
        match self {
            LayerRole::IndigenousAreas => request
                .default_gdb
                .feature_class(INDIGENOUS_AREAS_SOURCE),
            LayerRole::Buildings => request.default_gdb.feature_class(BUILDINGS_SOURCE),
            LayerRole::SiteAreas => request.site_a.clone(),
            LayerRole::AdvancedSiteAreas => request.adv_pd.clone(),
            LayerRole::SitePoints => request.site_p.clone(),
        }
    }
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A layer that was reprojected into the scratch geodatabase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reprojection {
    /// Which input layer was reprojected
    pub role: LayerRole,
    /// The input layer as supplied
    pub source: FeatureClassRef,
    /// Native spatial reference of `source`
    pub from: Wkid,
    /// The reprojected copy in the scratch geodatabase
    pub target: FeatureClassRef,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepReport {
    /// The processed output feature class
    pub output: FeatureClassRef,
    /// Indigenous-areas copy in the default geodatabase
    pub indigenous_areas: FeatureClassRef,
    /// Building-points copy in the default geodatabase
    pub buildings: FeatureClassRef,
    /// Layers that needed reprojection, in role order
    pub reprojected: Vec<Reprojection>,
    pub summary: ProcessSummary,
}

/// A source layer with its native spatial reference, as found during validation.
struct ValidatedLayer {
    role: LayerRole,
    source: FeatureClassRef,
    wkid: Wkid,
}

/// Runs data preparation against an injected engine.
pub struct DataPrepper<'a, E: GeoEngine> {
    engine: &'a E,
}

impl<'a, E: GeoEngine> DataPrepper<'a, E> {
    #[must_use]
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Validate the request, prepare the inputs and run the processing step.
    ///
    /// # Errors
    ///
    /// Returns the first failed validation check, or the engine error that
    /// stopped a later step. Validation failures leave every geodatabase
    /// untouched.
    pub fn run(&self, request: &PrepRequest) -> Result<PrepReport> {
        info!("Starting data preparation");
        info!("Default geodatabase: {}", request.default_gdb);
        info!("Scratch geodatabase: {}", request.scratch_gdb);

        let layers = self.validate(request)?;
        self.ensure_scratch(&request.scratch_gdb)?;

        let _default_lock = self.lock(&request.default_gdb, "default_gdb")?;
        let _scratch_lock = if request.scratch_gdb.same_location(&request.default_gdb) {
            None
        } else {
            Some(self.lock(&request.scratch_gdb, "scratch_gdb")?)
        };

        let sr = request.config.sr;
        let mut prepared = Vec::with_capacity(layers.len());
        let mut reprojected = Vec::new();
        for layer in layers {
            if layer.wkid == sr {
                debug!("{} already in {sr}, using {}", layer.role, layer.source);
                prepared.push(layer.source);
                continue;
            }
            let target = request
                .scratch_gdb
                .feature_class(scratch_name(layer.role, sr)?);
            info!(
                "Reprojecting {} from {} to {sr} -> {target}",
                layer.source, layer.wkid
            );
            self.engine.reproject(&layer.source, &target, sr)?;
            prepared.push(target.clone());
            reprojected.push(Reprojection {
                role: layer.role,
                source: layer.source,
                from: layer.wkid,
                target,
            });
        }

        let [ia_a, bld_p, site_a, adv_pd, site_p]: [FeatureClassRef; 5] =
            prepared.try_into().map_err(|_| EngineError::Operation {
                operation: "prepare",
                message: "expected one prepared layer per role".to_string(),
            })?;

        let indigenous_areas = request.ia_a_target();
        let buildings = request.bld_p_target();
        self.engine.copy_rename(&ia_a, &indigenous_areas)?;
        self.engine.copy_rename(&bld_p, &buildings)?;

        let output = request.output_target();
        let inputs = ProcessInputs {
            indigenous_areas: indigenous_areas.clone(),
            buildings: buildings.clone(),
            site_areas: site_a,
            advanced_site_areas: adv_pd,
            site_points: site_p,
            scratch_gdb: request.scratch_gdb.clone(),
            output: output.clone(),
            spatial_reference: sr,
        };
        info!("Processing into {output}");
        let summary = self.engine.process(&inputs)?;
        info!(
            "Data preparation complete: {} features written to {output}",
            summary.features_written
        );

        Ok(PrepReport {
            output,
            indigenous_areas,
            buildings,
            reprojected,
            summary,
        })
    }

    /// Every check that can run without writing, in reporting order.
    fn validate(&self, request: &PrepRequest) -> Result<Vec<ValidatedLayer>> {
        if !self.engine.geodatabase_exists(&request.default_gdb) {
            return Err(PrepError::MissingInput {
                parameter: "default_gdb",
                path: request.default_gdb.as_path().to_path_buf(),
            });
        }

        for role in [LayerRole::IndigenousAreas, LayerRole::Buildings] {
            let source = role.source(request);
            if !self.engine.exists(&source) {
                return Err(PrepError::MissingLayer {
                    gdb: request.default_gdb.clone(),
                    layer: source.name().clone(),
                });
            }
        }

        for role in [
            LayerRole::SiteAreas,
            LayerRole::AdvancedSiteAreas,
            LayerRole::SitePoints,
        ] {
            let source = role.source(request);
            if !self.engine.exists(&source) {
                return Err(PrepError::MissingInput {
                    parameter: role.parameter(),
                    path: source.path(),
                });
            }
        }

        request.config.check_names()?;

        let sr = request.config.sr;
        if !self.engine.supports_spatial_reference(sr) {
            return Err(SpatialReferenceError::Unknown { wkid: sr }.into());
        }

        let mut layers = Vec::with_capacity(LayerRole::ALL.len());
        for role in LayerRole::ALL {
            let source = role.source(request);
            let wkid = self
                .engine
                .spatial_reference_of(&source)?
                .ok_or_else(|| SpatialReferenceError::Undefined {
                    layer: source.clone(),
                })?;
            if !self.engine.supports_spatial_reference(wkid) {
                return Err(SpatialReferenceError::Unsupported {
                    layer: source,
                    wkid,
                }
                .into());
            }
            debug!("{role}: {source} in {wkid}");
            layers.push(ValidatedLayer { role, source, wkid });
        }

        for target in write_targets(request, &layers)? {
            if let Some(input) = layers
                .iter()
                .find(|layer| layer.source.same_feature_class(&target))
            {
                return Err(PrepError::InputOverwrite {
                    target,
                    parameter: input.role.parameter(),
                });
            }
        }

        if request.config.on_collision == CollisionPolicy::Error {
            for target in [
                request.ia_a_target(),
                request.bld_p_target(),
                request.output_target(),
            ] {
                if self.engine.exists(&target) {
                    return Err(PrepError::Collision { target });
                }
            }
        }

        if !self.engine.is_writable(&request.default_gdb)? {
            return Err(PrepError::WritePermission {
                parameter: "default_gdb",
                path: request.default_gdb.as_path().to_path_buf(),
            });
        }

        Ok(layers)
    }

    fn lock(&self, gdb: &GeodatabasePath, parameter: &'static str) -> Result<E::Lock> {
        self.engine.lock_workspace(gdb).map_err(|e| match e {
            EngineError::PermissionDenied { .. } => PrepError::WritePermission {
                parameter,
                path: gdb.as_path().to_path_buf(),
            },
            e => e.into(),
        })
    }

    fn ensure_scratch(&self, scratch: &GeodatabasePath) -> Result<()> {
        let denied = || PrepError::WritePermission {
            parameter: "scratch_gdb",
            path: scratch.as_path().to_path_buf(),
        };

        if !self.engine.geodatabase_exists(scratch) {
            match self.engine.create_geodatabase(scratch) {
                Ok(()) => info!("Created scratch geodatabase {scratch}"),
                Err(EngineError::PermissionDenied { .. }) => return Err(denied()),
                Err(e) => return Err(e.into()),
            }
        }

        if self.engine.is_writable(scratch)? {
            Ok(())
        } else {
            Err(denied())
        }
    }
}

/// Every feature class a run may create or replace.
fn write_targets(request: &PrepRequest, layers: &[ValidatedLayer]) -> Result<Vec<FeatureClassRef>> {
    let sr = request.config.sr;
    let mut targets = vec![
        request.ia_a_target(),
        request.bld_p_target(),
        request.output_target(),
    ];
    for layer in layers.iter().filter(|layer| layer.wkid != sr) {
        targets.push(
            request
                .scratch_gdb
                .feature_class(scratch_name(layer.role, sr)?),
        );
    }
    targets.push(
        request
            .scratch_gdb
            .feature_class(augmented_name(&request.config.bld_p_name)?),
    );
    Ok(targets)
}

fn scratch_name(role: LayerRole, sr: Wkid) -> Result<LayerName> {
    LayerName::new(format!("{}_{sr}", role.short_name())).map_err(|source| {
        PrepError::Validation {
            parameter: "sr",
            source,
        }
    })
}
