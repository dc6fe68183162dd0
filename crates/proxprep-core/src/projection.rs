//! Pure-Rust coordinate transformations for the spatial references the file
//! engine understands.
//!
//! Covers WGS84 geographic (4326), Web Mercator (3857), UTM North/South on
//! WGS84 (326xx/327xx) and Statistics Canada Lambert (3347). Every projection
//! goes through geographic coordinates; datum shifts are not modelled, so
//! NAD83-based systems are treated as WGS84.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use geo_types::Coord;
use proxprep_core_common::Wkid;

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared

const K0: f64 = 0.9996; // UTM scale factor
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Lambert Conformal Conic (two standard parallels) parameters, in degrees and metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertConic {
    pub lat1: f64,
    pub lat2: f64,
    pub lat0: f64,
    pub lon0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

/// EPSG:3347, NAD83 / Statistics Canada Lambert.
pub const STATCAN_LAMBERT: LambertConic = LambertConic {
    lat1: 49.0,
    lat2: 77.0,
    lat0: 63.390_675,
    lon0: -91.866_666_666_666_67,
    false_easting: 6_200_000.0,
    false_northing: 3_000_000.0,
};

/// A coordinate system the file engine can project into and out of.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Longitude/latitude in degrees
    Geographic,
    /// Spherical Web Mercator in metres
    WebMercator,
    /// Universal Transverse Mercator zone in metres
    Utm { zone: u8, north: bool },
    /// Lambert Conformal Conic in metres
    Lambert(LambertConic),
}

impl Projection {
    /// Look up the projection for a WKID.
    ///
    /// # Examples
    ///
    /// ```
    /// use proxprep_core::projection::Projection;
    /// use proxprep_core_common::Wkid;
    ///
    /// let utm = Projection::from_wkid(Wkid::new(32617).unwrap());
    /// assert_eq!(utm, Some(Projection::Utm { zone: 17, north: true }));
    /// assert!(Projection::from_wkid(Wkid::new(2154).unwrap()).is_none());
    /// ```
    #[must_use]
    pub fn from_wkid(wkid: Wkid) -> Option<Self> {
        match wkid.code() {
            4326 => Some(Self::Geographic),
            3857 | 102_100 => Some(Self::WebMercator),
            3347 => Some(Self::Lambert(STATCAN_LAMBERT)),
            code @ 32601..=32660 => Some(Self::Utm {
                zone: utm_zone(code - 32600),
                north: true,
            }),
            code @ 32701..=32760 => Some(Self::Utm {
                zone: utm_zone(code - 32700),
                north: false,
            }),
            _ => None,
        }
    }

    /// Convert projected coordinates to longitude/latitude degrees.
    #[must_use]
    pub fn to_geographic(&self, c: Coord<f64>) -> Coord<f64> {
        match *self {
            Self::Geographic => c,
            Self::WebMercator => Coord {
                x: (c.x / A).to_degrees(),
                y: (2.0 * (c.y / A).exp().atan() - FRAC_PI_2).to_degrees(),
            },
            Self::Utm { zone, north } => utm_to_wgs84(c, zone, north),
            Self::Lambert(params) => lambert_inverse(c, &params),
        }
    }

    /// Convert longitude/latitude degrees to projected coordinates.
    #[must_use]
    pub fn from_geographic(&self, c: Coord<f64>) -> Coord<f64> {
        match *self {
            Self::Geographic => c,
            Self::WebMercator => {
                let lat = c.y.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
                Coord {
                    x: A * c.x.to_radians(),
                    y: A * (FRAC_PI_4 + lat / 2.0).tan().ln(),
                }
            },
            Self::Utm { zone, north } => wgs84_to_utm(c, zone, north),
            Self::Lambert(params) => lambert_forward(c, &params),
        }
    }
}

fn utm_zone(zone: u32) -> u8 {
    u8::try_from(zone).unwrap_or(u8::MAX)
}

/// Coordinate transformation between two supported spatial references.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    from: Projection,
    to: Projection,
}

impl Transform {
    /// Build a transformation, or `None` if either side is unsupported.
    #[must_use]
    pub fn new(from: Wkid, to: Wkid) -> Option<Self> {
        Some(Self {
            from: Projection::from_wkid(from)?,
            to: Projection::from_wkid(to)?,
        })
    }

    /// Map one coordinate from the source into the target spatial reference.
    #[must_use]
    pub fn apply(&self, c: Coord<f64>) -> Coord<f64> {
        if self.from == self.to {
            return c;
        }
        self.to.from_geographic(self.from.to_geographic(c))
    }
}

/// A row of the supported spatial reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialReferenceInfo {
    /// WKID or WKID range
    pub wkids: &'static str,
    pub name: &'static str,
}

/// Spatial references the file engine supports, for display.
#[must_use]
pub fn supported_spatial_references() -> Vec<SpatialReferenceInfo> {
    vec![
        SpatialReferenceInfo {
            wkids: "4326",
            name: "WGS 84 (geographic)",
        },
        SpatialReferenceInfo {
            wkids: "3857, 102100",
            name: "WGS 84 / Pseudo-Mercator",
        },
        SpatialReferenceInfo {
            wkids: "3347",
            name: "NAD83 / Statistics Canada Lambert",
        },
        SpatialReferenceInfo {
            wkids: "32601-32660",
            name: "WGS 84 / UTM zones 1N-60N",
        },
        SpatialReferenceInfo {
            wkids: "32701-32760",
            name: "WGS 84 / UTM zones 1S-60S",
        },
    ]
}

// ── UTM (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64) ──────────────────

fn central_meridian(zone: u8) -> f64 {
    (f64::from(zone) - 1.0).mul_add(6.0, -177.0).to_radians()
}

/// Meridional arc length from the equator to `lat` (radians).
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

fn wgs84_to_utm(c: Coord<f64>, zone: u8, north: bool) -> Coord<f64> {
    let lat = c.y.to_radians();
    let lon = c.x.to_radians();

    let (sin_lat, cos_lat) = lat.sin_cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let cc = E_PRIME2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - central_meridian(zone));

    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a2 * a2;
    let a5 = a4 * a;
    let a6 = a4 * a2;

    let easting = K0
        * n
        * (a + (1.0 - t + cc) * a3 / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * cc - 58.0 * E_PRIME2) * a5 / 120.0)
        + UTM_FALSE_EASTING;

    let mut northing = K0
        * (meridional_arc(lat)
            + n * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * cc + 4.0 * cc * cc) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * cc - 330.0 * E_PRIME2) * a6 / 720.0));
    if !north {
        northing += UTM_FALSE_NORTHING_SOUTH;
    }

    Coord {
        x: easting,
        y: northing,
    }
}

fn utm_to_wgs84(c: Coord<f64>, zone: u8, north: bool) -> Coord<f64> {
    let x = c.x - UTM_FALSE_EASTING;
    let y = if north {
        c.y
    } else {
        c.y - UTM_FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let mu = (y / K0) / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let root = (1.0 - E2).sqrt();
    let e1 = (1.0 - root) / (1.0 + root);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_2 * e1_2;

    // Footpoint latitude
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let (sin1, cos1) = phi1.sin_cos();
    let tan1 = phi1.tan();
    let c1 = E_PRIME2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let w = 1.0 - E2 * sin1 * sin1;
    let n1 = A / w.sqrt();
    let r1 = A * (1.0 - E2) / w.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d2 * d2;
    let d5 = d4 * d;
    let d6 = d4 * d2;

    let lat = phi1
        - (n1 * tan1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d5
                / 120.0)
            / cos1;

    Coord {
        x: lon.to_degrees(),
        y: lat.to_degrees(),
    }
}

// ── Lambert Conformal Conic 2SP (Snyder 1987, pp. 107-109) ───────────────

struct LambertConstants {
    n: f64,
    af: f64,
    rho0: f64,
}

fn lambert_m(lat: f64) -> f64 {
    let sin = lat.sin();
    lat.cos() / (1.0 - E2 * sin * sin).sqrt()
}

fn lambert_t(lat: f64) -> f64 {
    let e = E2.sqrt();
    let es = e * lat.sin();
    (FRAC_PI_4 - lat / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

fn lambert_constants(p: &LambertConic) -> LambertConstants {
    let (lat1, lat2, lat0) = (p.lat1.to_radians(), p.lat2.to_radians(), p.lat0.to_radians());
    let (m1, m2) = (lambert_m(lat1), lambert_m(lat2));
    let (t1, t2) = (lambert_t(lat1), lambert_t(lat2));

    let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
    let af = A * m1 / (n * t1.powf(n));
    LambertConstants {
        n,
        af,
        rho0: af * lambert_t(lat0).powf(n),
    }
}

fn lambert_forward(c: Coord<f64>, p: &LambertConic) -> Coord<f64> {
    let k = lambert_constants(p);
    let rho = k.af * lambert_t(c.y.to_radians()).powf(k.n);
    let theta = k.n * (c.x - p.lon0).to_radians();

    Coord {
        x: p.false_easting + rho * theta.sin(),
        y: p.false_northing + k.rho0 - rho * theta.cos(),
    }
}

fn lambert_inverse(c: Coord<f64>, p: &LambertConic) -> Coord<f64> {
    let k = lambert_constants(p);
    let sign = k.n.signum();
    let dx = c.x - p.false_easting;
    let dy = k.rho0 - (c.y - p.false_northing);

    let rho = sign * dx.hypot(dy);
    let theta = (sign * dx).atan2(sign * dy);
    let t = (rho / k.af).powf(1.0 / k.n);

    let e = E2.sqrt();
    let mut lat = FRAC_PI_2 - 2.0 * t.atan();
    for _ in 0..15 {
        let es = e * lat.sin();
        let next = FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).atan();
        let converged = (next - lat).abs() < 1e-12;
        lat = next;
        if converged {
            break;
        }
    }

    Coord {
        x: (theta / k.n).to_degrees() + p.lon0,
        y: lat.to_degrees(),
    }
}
