//! Validated value types for geodatabases, feature classes and spatial references.
//!
//! Raw strings coming from the command line or a config file are turned into
//! these types once, at the boundary. Everything past that point can rely on
//! a [`LayerName`] being a legal feature class name and a [`GeodatabasePath`]
//! pointing at a `.gdb` container.
//!
//! # Examples
//!
//! ```
//! use proxprep_core_common::types::{FeatureClassRef, LayerName, Wkid};
//!
//! let site_p = FeatureClassRef::parse("data/site_p.gdb/site_p").unwrap();
//! assert_eq!(site_p.name().as_str(), "site_p");
//!
//! assert!(LayerName::new("1_bad").is_err());
//! assert_eq!(Wkid::default(), Wkid::WGS84);
//! ```

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ValidationError;

const GDB_EXTENSION: &str = "gdb";
/// Longest feature class name a geodatabase accepts.
pub const MAX_LAYER_NAME_LEN: usize = 160;

/// Path to a geodatabase container.
///
/// The final path component must end in `.gdb` (any case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct GeodatabasePath(PathBuf);

impl GeodatabasePath {
    /// Validate and wrap a geodatabase path.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] for an empty path and
    /// [`ValidationError::NotAGeodatabase`] when the path lacks a `.gdb` extension.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ValidationError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ValidationError::Empty {
                kind: "geodatabase path",
            });
        }

        let is_gdb = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(GDB_EXTENSION));
        if !is_gdb {
            return Err(ValidationError::NotAGeodatabase { path });
        }

        Ok(Self(path))
    }

    /// The underlying filesystem path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Whether both paths name the same geodatabase on disk.
    ///
    /// Paths are resolved before comparing, so `data/../x.gdb` and an
    /// absolute spelling of `x.gdb` match. A geodatabase that does not exist
    /// yet is resolved through its parent directory.
    #[must_use]
    pub fn same_location(&self, other: &GeodatabasePath) -> bool {
        self == other || resolve(&self.0) == resolve(&other.0)
    }

    /// Reference a feature class stored in this geodatabase.
    #[must_use]
    pub fn feature_class(&self, name: LayerName) -> FeatureClassRef {
        FeatureClassRef::new(self.clone(), name)
    }
}

impl TryFrom<String> for GeodatabasePath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for GeodatabasePath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<Path> for GeodatabasePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for GeodatabasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Name of a feature class inside a geodatabase.
///
/// Names start with an ASCII letter, contain only ASCII letters, digits and
/// underscores, and are at most 160 characters long. Geodatabases treat names
/// case-insensitively, see [`LayerName::matches`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct LayerName(Cow<'static, str>);

impl LayerName {
    /// Validate and wrap a feature class name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] for an empty name and
    /// [`ValidationError::InvalidLayerName`] when a naming rule is broken.
    ///
    /// # Examples
    ///
    /// ```
    /// use proxprep_core_common::types::LayerName;
    ///
    /// assert!(LayerName::new("BUILDING_P").is_ok());
    /// assert!(LayerName::new("bld p").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let invalid = |reason: String| ValidationError::InvalidLayerName {
            name: name.clone(),
            reason,
        };

        let Some(first) = name.chars().next() else {
            return Err(ValidationError::Empty { kind: "layer name" });
        };
        if name.len() > MAX_LAYER_NAME_LEN {
            return Err(invalid(format!(
                "longer than {MAX_LAYER_NAME_LEN} characters"
            )));
        }
        if !first.is_ascii_alphabetic() {
            return Err(invalid("must start with a letter".to_string()));
        }
        if let Some(bad) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(invalid(format!("contains invalid character '{bad}'")));
        }

        Ok(Self(Cow::Owned(name)))
    }

    /// Wrap a compile-time constant name.
    ///
    /// # Panics
    ///
    /// Panics (at compile time when used in a `const`) if `name` breaks the
    /// naming rules.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        assert!(is_valid_static_name(name), "invalid layer name");
        Self(Cow::Borrowed(name))
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if both names refer to the same feature class.
    #[must_use]
    pub fn matches(&self, other: &LayerName) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl TryFrom<String> for LayerName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for LayerName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for LayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const fn is_valid_static_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_LAYER_NAME_LEN || !bytes[0].is_ascii_alphabetic() {
        return false;
    }
    let mut i = 1;
    while i < bytes.len() {
        if !(bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
            return false;
        }
        i += 1;
    }
    true
}

/// Canonical form of `path`, falling back to the canonical parent joined with
/// the final component, then to the path as written.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved;
    }
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    std::fs::canonicalize(parent).map_or_else(|_| path.to_path_buf(), |p| p.join(name))
}

/// A feature class addressed by its geodatabase and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct FeatureClassRef {
    gdb: GeodatabasePath,
    name: LayerName,
}

impl FeatureClassRef {
    /// Address `name` inside `gdb`.
    #[must_use]
    pub fn new(gdb: GeodatabasePath, name: LayerName) -> Self {
        Self { gdb, name }
    }

    /// Parse a `<geodatabase>/<feature class>` path.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotInGeodatabase`] if the parent directory is
    /// not a geodatabase, or the name's own validation error.
    pub fn parse(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ValidationError::Empty {
                kind: "feature class path",
            });
        }

        let not_in_gdb = || ValidationError::NotInGeodatabase {
            path: path.to_path_buf(),
        };
        let parent = path.parent().ok_or_else(not_in_gdb)?;
        let gdb = GeodatabasePath::new(parent).map_err(|_| not_in_gdb())?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(not_in_gdb)?;

        Ok(Self::new(gdb, LayerName::new(name)?))
    }

    /// The containing geodatabase.
    #[must_use]
    pub fn gdb(&self) -> &GeodatabasePath {
        &self.gdb
    }

    /// The feature class name.
    #[must_use]
    pub fn name(&self) -> &LayerName {
        &self.name
    }

    /// Whether both references address the same stored feature class.
    ///
    /// Names compare case-insensitively and geodatabases by resolved location.
    #[must_use]
    pub fn same_feature_class(&self, other: &FeatureClassRef) -> bool {
        self.name.matches(&other.name) && self.gdb.same_location(&other.gdb)
    }

    /// Full path of the feature class, `<gdb>/<name>`.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.gdb.as_path().join(self.name.as_str())
    }
}

impl TryFrom<String> for FeatureClassRef {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl FromStr for FeatureClassRef {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FeatureClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// Well-known identifier of a spatial reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "u32")]
pub struct Wkid(u32);

impl Wkid {
    /// WGS 84 geographic coordinates.
    pub const WGS84: Wkid = Wkid(4326);

    /// Wrap a WKID code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidWkid`] for zero.
    pub fn new(code: u32) -> Result<Self, ValidationError> {
        if code == 0 {
            return Err(ValidationError::InvalidWkid {
                value: code.to_string(),
            });
        }
        Ok(Self(code))
    }

    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }
}

impl Default for Wkid {
    fn default() -> Self {
        Self::WGS84
    }
}

impl TryFrom<u32> for Wkid {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Wkid {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().parse::<u32>().map_err(|_| ValidationError::InvalidWkid {
            value: s.to_string(),
        })?;
        Self::new(code)
    }
}

impl fmt::Display for Wkid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
