//! Run configuration for the data prepper.
//!
//! [`PrepConfig`] holds the optional parameters with their defaults,
//! [`PrepRequest`] is a fully validated invocation, and [`PrepSettings`] is
//! the raw, string-typed form read from a TOML file or the command line.
//!
//! # Examples
//!
//! ```
//! use proxprep_core::config::{CollisionPolicy, PrepConfig};
//!
//! let config = PrepConfig::default();
//! assert_eq!(config.ia_a_name.as_str(), "INDIG_AUTOCH_A");
//! assert_eq!(config.sr.code(), 4326);
//! assert_eq!(config.on_collision, CollisionPolicy::Overwrite);
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use proxprep_core_common::{
    FeatureClassRef, GeodatabasePath, LayerName, MAX_LAYER_NAME_LEN, ValidationError, Wkid,
};
use serde::Deserialize;

use crate::error::{ConfigError, PrepError, Result};
use crate::proximity::AUGMENTED_SUFFIX;

/// Indigenous-area layer that must exist in the default geodatabase.
pub const INDIGENOUS_AREAS_SOURCE: LayerName = LayerName::from_static("Indigenous_autouc");
/// Building-point layer that must exist in the default geodatabase.
pub const BUILDINGS_SOURCE: LayerName = LayerName::from_static("bld_p");

pub const DEFAULT_IA_A_NAME: LayerName = LayerName::from_static("INDIG_AUTOCH_A");
pub const DEFAULT_BLD_P_NAME: LayerName = LayerName::from_static("BUILDING_P");
pub const DEFAULT_OUT_FC_NAME: LayerName = LayerName::from_static("bld_p_processed");

/// What to do when an output feature class already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the existing feature class.
    #[default]
    Overwrite,
    /// Fail before writing anything.
    Error,
}

impl CollisionPolicy {
    /// The lowercase name used in config files and on the command line.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            CollisionPolicy::Overwrite => "overwrite",
            CollisionPolicy::Error => "error",
        }
    }
}

impl FromStr for CollisionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidOption {
                option: "on_collision",
                value: s.to_string(),
                expected: "'overwrite' or 'error'",
            }),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional parameters of a run, with their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepConfig {
    /// Name of the indigenous-areas copy in the default geodatabase (`ia_a_nme`)
    pub ia_a_name: LayerName,
    /// Name of the building-points copy in the default geodatabase (`bld_p_nme`)
    pub bld_p_name: LayerName,
    /// Name of the processed output feature class (`out_fc_nme`)
    pub out_fc_name: LayerName,
    /// Spatial reference for every output (`sr`)
    pub sr: Wkid,
    /// Behaviour when an output already exists
    pub on_collision: CollisionPolicy,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            ia_a_name: DEFAULT_IA_A_NAME,
            bld_p_name: DEFAULT_BLD_P_NAME,
            out_fc_name: DEFAULT_OUT_FC_NAME,
            sr: Wkid::WGS84,
            on_collision: CollisionPolicy::default(),
        }
    }
}

impl PrepConfig {
    /// Output names paired with the parameter that supplied them.
    #[must_use]
    pub fn output_names(&self) -> [(&'static str, &LayerName); 3] {
        [
            ("ia_a_nme", &self.ia_a_name),
            ("bld_p_nme", &self.bld_p_name),
            ("out_fc_nme", &self.out_fc_name),
        ]
    }

    /// Check that no output would replace a source layer or another output.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReservedName`], [`ConfigError::DuplicateName`],
    /// or [`ConfigError::InvalidOption`] when `bld_p_nme` leaves no room for
    /// the augmented building layer's suffix.
    pub fn check_names(&self) -> std::result::Result<(), ConfigError> {
        let outputs = self.output_names();

        if self.bld_p_name.as_str().len() + AUGMENTED_SUFFIX.len() > MAX_LAYER_NAME_LEN {
            return Err(ConfigError::InvalidOption {
                option: "bld_p_nme",
                value: self.bld_p_name.to_string(),
                expected: "a name of at most 157 characters",
            });
        }

        for (parameter, name) in outputs {
            if name.matches(&INDIGENOUS_AREAS_SOURCE) || name.matches(&BUILDINGS_SOURCE) {
                return Err(ConfigError::ReservedName {
                    parameter,
                    name: name.clone(),
                });
            }
        }

        for (i, &(first, a)) in outputs.iter().enumerate() {
            if let Some(&(second, _)) = outputs[i + 1..].iter().find(|(_, b)| a.matches(b)) {
                return Err(ConfigError::DuplicateName {
                    first,
                    second,
                    name: a.clone(),
                });
            }
        }

        Ok(())
    }
}

/// A validated invocation of the data prepper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepRequest {
    /// Project geodatabase holding the required source layers
    pub default_gdb: GeodatabasePath,
    /// Geodatabase for intermediate outputs
    pub scratch_gdb: GeodatabasePath,
    /// `site_a` polygon layer
    pub site_a: FeatureClassRef,
    /// `adv_pd` polygon layer
    pub adv_pd: FeatureClassRef,
    /// `site_p` point layer
    pub site_p: FeatureClassRef,
    pub config: PrepConfig,
}

impl PrepRequest {
    /// Create a request with the default configuration.
    #[must_use]
    pub fn new(
        default_gdb: GeodatabasePath,
        scratch_gdb: GeodatabasePath,
        site_a: FeatureClassRef,
        adv_pd: FeatureClassRef,
        site_p: FeatureClassRef,
    ) -> Self {
        Self {
            default_gdb,
            scratch_gdb,
            site_a,
            adv_pd,
            site_p,
            config: PrepConfig::default(),
        }
    }

    /// Replace the configuration, keeping the paths.
    #[must_use]
    pub fn with_config(mut self, config: PrepConfig) -> Self {
        self.config = config;
        self
    }

    /// Where the indigenous-areas copy is written.
    #[must_use]
    pub fn ia_a_target(&self) -> FeatureClassRef {
        self.default_gdb.feature_class(self.config.ia_a_name.clone())
    }

    /// Where the building-points copy is written.
    #[must_use]
    pub fn bld_p_target(&self) -> FeatureClassRef {
        self.default_gdb.feature_class(self.config.bld_p_name.clone())
    }

    /// Where the processed output is written.
    #[must_use]
    pub fn output_target(&self) -> FeatureClassRef {
        self.default_gdb.feature_class(self.config.out_fc_name.clone())
    }
}

/// Raw run parameters, as read from a TOML file or the command line.
///
/// Keys use the tool's parameter names:
///
/// ```toml
/// default_gdb = "data/Proximity_ON/Default.gdb"
/// scratch_gdb = "data/Proximity_ON/scratch.gdb"
/// site_a_path = "data/EGDMP1A.gdb/EGD_MTNC_PD_A"
/// adv_pd_path = "data/EGDMP1A.gdb/EGD_MTNC_ADVPD_A"
/// site_p_path = "data/site_p.gdb/site_p"
/// sr = 3347
/// on_collision = "error"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrepSettings {
    pub default_gdb: Option<String>,
    pub scratch_gdb: Option<String>,
    pub site_a_path: Option<String>,
    pub adv_pd_path: Option<String>,
    pub site_p_path: Option<String>,
    pub ia_a_nme: Option<String>,
    pub bld_p_nme: Option<String>,
    pub out_fc_nme: Option<String>,
    pub sr: Option<u32>,
    pub on_collision: Option<CollisionPolicy>,
}

impl PrepSettings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layer `overrides` on top of these settings; set values in `overrides` win.
    #[must_use]
    pub fn merge(self, overrides: PrepSettings) -> PrepSettings {
        PrepSettings {
            default_gdb: overrides.default_gdb.or(self.default_gdb),
            scratch_gdb: overrides.scratch_gdb.or(self.scratch_gdb),
            site_a_path: overrides.site_a_path.or(self.site_a_path),
            adv_pd_path: overrides.adv_pd_path.or(self.adv_pd_path),
            site_p_path: overrides.site_p_path.or(self.site_p_path),
            ia_a_nme: overrides.ia_a_nme.or(self.ia_a_nme),
            bld_p_nme: overrides.bld_p_nme.or(self.bld_p_nme),
            out_fc_nme: overrides.out_fc_nme.or(self.out_fc_nme),
            sr: overrides.sr.or(self.sr),
            on_collision: overrides.on_collision.or(self.on_collision),
        }
    }

    /// Validate every parameter and build a request, filling in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] for an absent required
    /// parameter and [`PrepError::Validation`] for a malformed one.
    pub fn into_request(self) -> Result<PrepRequest> {
        let defaults = PrepConfig::default();

        let config = PrepConfig {
            ia_a_name: optional("ia_a_nme", self.ia_a_nme, LayerName::new)?
                .unwrap_or(defaults.ia_a_name),
            bld_p_name: optional("bld_p_nme", self.bld_p_nme, LayerName::new)?
                .unwrap_or(defaults.bld_p_name),
            out_fc_name: optional("out_fc_nme", self.out_fc_nme, LayerName::new)?
                .unwrap_or(defaults.out_fc_name),
            sr: optional("sr", self.sr, Wkid::new)?.unwrap_or(defaults.sr),
            on_collision: self.on_collision.unwrap_or(defaults.on_collision),
        };

        Ok(PrepRequest {
            default_gdb: required("default_gdb", self.default_gdb, GeodatabasePath::new)?,
            scratch_gdb: required("scratch_gdb", self.scratch_gdb, GeodatabasePath::new)?,
            site_a: required("site_a_path", self.site_a_path, FeatureClassRef::parse)?,
            adv_pd: required("adv_pd_path", self.adv_pd_path, FeatureClassRef::parse)?,
            site_p: required("site_p_path", self.site_p_path, FeatureClassRef::parse)?,
            config,
        })
    }
}

fn optional<R, T>(
    parameter: &'static str,
    raw: Option<R>,
    build: impl FnOnce(R) -> std::result::Result<T, ValidationError>,
) -> Result<Option<T>> {
    raw.map(build)
        .transpose()
        .map_err(|source| PrepError::Validation { parameter, source })
}

fn required<R, T>(
    parameter: &'static str,
    raw: Option<R>,
    build: impl FnOnce(R) -> std::result::Result<T, ValidationError>,
) -> Result<T> {
    optional(parameter, raw, build)?
        .ok_or_else(|| ConfigError::MissingRequired { parameter }.into())
}
