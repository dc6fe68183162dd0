//! Site-id assignment for building points, the file engine's processing step.
//!
//! 1. Indigenous areas without any building point get one interior point added
//!    to the building layer, so every community is represented.
//! 2. Each area is matched to a `site_a` and an `adv_pd` site: among the site
//!    polygons intersecting the area, the one covering the most of the area's
//!    building points wins.
//! 3. Assigned site ids are checked against the `site_p` points.
//! 4. Building points inside an area receive that area's two site ids and are
//!    written to the output.

use std::collections::{BTreeSet, HashSet};

use geo::{InteriorPoint, Intersects};
use geo_types::{Geometry, Point};
use geojson::{Feature, Geometry as GeoJsonGeometry, JsonObject, JsonValue};
use log::{info, warn};
use proxprep_core_common::{EngineError, FeatureClassRef, LayerName, ProcessInputs, ProcessSummary};

use crate::file_gdb::{malformed, read_feature_class, write_feature_class};

/// Field receiving the `site_a` site id.
pub const PD_SITE_ID_FIELD: &str = "AUTO_PD_SITE_ID";
/// Field receiving the `adv_pd` site id.
pub const ADV_SITE_ID_FIELD: &str = "AUTO_ADV_SITE_ID";
/// Site id field on the site layers.
pub const SITE_ID_FIELD: &str = "SITE_ID";

/// Suffix of the building layer augmented with interior points, in the scratch geodatabase.
pub(crate) const AUGMENTED_SUFFIX: &str = "_ap";

struct Site {
    geometry: Geometry<f64>,
    id: Option<JsonValue>,
}

#[derive(Default)]
struct AreaSites {
    pd: Option<JsonValue>,
    adv: Option<JsonValue>,
}

pub(crate) fn process(inputs: &ProcessInputs) -> Result<ProcessSummary, EngineError> {
    let areas: Vec<Geometry<f64>> = decode_geometries(
        read_feature_class(&inputs.indigenous_areas)?.features,
        &inputs.indigenous_areas,
    )?
    .into_iter()
    .flatten()
    .collect();
    let mut buildings = read_feature_class(&inputs.buildings)?.features;
    let mut building_geometries = decode_geometries(buildings.clone(), &inputs.buildings)?;

    info!("Step 1: adding interior points for indigenous areas without building points");
    let interior = {
        let points: Vec<&Geometry<f64>> = building_geometries.iter().flatten().collect();
        interior_points_for_empty_areas(&areas, &points)
    };
    info!(
        "Indigenous areas with no building points: {}",
        interior.len()
    );
    if !interior.is_empty() {
        for point in &interior {
            buildings.push(point_feature(point));
            building_geometries.push(Some(Geometry::Point(*point)));
        }
        let augmented = augmented_name(inputs.buildings.name())?;
        write_feature_class(
            &inputs.scratch_gdb.feature_class(augmented),
            buildings.clone(),
            inputs.spatial_reference,
        )?;
    }

    info!("Step 2: associating site ids with indigenous areas");
    let pd_sites = load_sites(&inputs.site_areas)?;
    let adv_sites = load_sites(&inputs.advanced_site_areas)?;
    let points: Vec<&Geometry<f64>> = building_geometries.iter().flatten().collect();
    let assigned: Vec<AreaSites> = areas
        .iter()
        .map(|area| {
            let inside: Vec<&Geometry<f64>> = points
                .iter()
                .copied()
                .filter(|point| area.intersects(*point))
                .collect();
            AreaSites {
                pd: best_site(area, &pd_sites, &inside).cloned(),
                adv: best_site(area, &adv_sites, &inside).cloned(),
            }
        })
        .collect();

    info!("Step 3: checking matched site ids against site points");
    let known = site_point_ids(&inputs.site_points)?;
    let missing_pd_site_ids = missing_ids(assigned.iter().map(|a| a.pd.as_ref()), &known);
    let missing_adv_site_ids = missing_ids(assigned.iter().map(|a| a.adv.as_ref()), &known);
    info!(
        "Site points missing for matched site ids (count): PDs: {}, ADVs: {}",
        missing_pd_site_ids.len(),
        missing_adv_site_ids.len()
    );
    if !missing_pd_site_ids.is_empty() {
        warn!("Missing PD site ids: {missing_pd_site_ids:?}");
    }
    if !missing_adv_site_ids.is_empty() {
        warn!("Missing ADV site ids: {missing_adv_site_ids:?}");
    }

    info!("Step 4: joining site ids onto building points");
    let output: Vec<Feature> = buildings
        .into_iter()
        .zip(&building_geometries)
        .filter_map(|(feature, geometry)| {
            let geometry = geometry.as_ref()?;
            let area = areas.iter().position(|area| area.intersects(geometry))?;
            Some(with_site_ids(feature, &assigned[area]))
        })
        .collect();
    let features_written = output.len();
    write_feature_class(&inputs.output, output, inputs.spatial_reference)?;
    info!("Wrote {features_written} features to {}", inputs.output);

    Ok(ProcessSummary {
        features_written,
        interior_points_added: interior.len(),
        missing_pd_site_ids,
        missing_adv_site_ids,
    })
}

fn decode_geometries(
    features: Vec<Feature>,
    fc: &FeatureClassRef,
) -> Result<Vec<Option<Geometry<f64>>>, EngineError> {
    features
        .into_iter()
        .map(|feature| {
            feature
                .geometry
                .map(Geometry::<f64>::try_from)
                .transpose()
                .map_err(|e| malformed(fc, e.to_string()))
        })
        .collect()
}

fn interior_points_for_empty_areas(
    areas: &[Geometry<f64>],
    buildings: &[&Geometry<f64>],
) -> Vec<Point<f64>> {
    areas
        .iter()
        .filter(|area| !buildings.iter().any(|b| area.intersects(*b)))
        .filter_map(InteriorPoint::interior_point)
        .collect()
}

fn point_feature(point: &Point<f64>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(GeoJsonGeometry::new(geojson::Value::from(point))),
        id: None,
        properties: Some(JsonObject::new()),
        foreign_members: None,
    }
}

pub(crate) fn augmented_name(buildings: &LayerName) -> Result<LayerName, EngineError> {
    LayerName::new(format!("{buildings}{AUGMENTED_SUFFIX}")).map_err(|e| EngineError::Operation {
        operation: "process",
        message: e.to_string(),
    })
}

fn load_sites(fc: &FeatureClassRef) -> Result<Vec<Site>, EngineError> {
    let mut sites = Vec::new();
    for feature in read_feature_class(fc)?.features {
        let id = site_id(&feature).cloned();
        if let Some(geometry) = feature.geometry {
            let geometry =
                Geometry::<f64>::try_from(geometry).map_err(|e| malformed(fc, e.to_string()))?;
            sites.push(Site { geometry, id });
        }
    }
    Ok(sites)
}

fn site_id(feature: &Feature) -> Option<&JsonValue> {
    feature
        .properties
        .as_ref()?
        .get(SITE_ID_FIELD)
        .filter(|value| !value.is_null())
}

/// The site covering the most building points of `area`; ties go to the earlier site.
fn best_site<'a>(
    area: &Geometry<f64>,
    sites: &'a [Site],
    inside: &[&Geometry<f64>],
) -> Option<&'a JsonValue> {
    sites
        .iter()
        .filter(|site| site.geometry.intersects(area))
        .map(|site| {
            let covered = inside
                .iter()
                .filter(|point| site.geometry.intersects(**point))
                .count();
            (site, covered)
        })
        .rev()
        .max_by_key(|(_, covered)| *covered)
        .and_then(|(site, _)| site.id.as_ref())
}

fn site_key(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn site_point_ids(fc: &FeatureClassRef) -> Result<HashSet<String>, EngineError> {
    Ok(read_feature_class(fc)?
        .features
        .iter()
        .filter_map(site_id)
        .map(site_key)
        .collect())
}

fn missing_ids<'a>(
    assigned: impl Iterator<Item = Option<&'a JsonValue>>,
    known: &HashSet<String>,
) -> Vec<String> {
    assigned
        .flatten()
        .map(site_key)
        .filter(|id| !known.contains(id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn with_site_ids(mut feature: Feature, sites: &AreaSites) -> Feature {
    let properties = feature.properties.get_or_insert_with(JsonObject::new);
    properties.insert(
        PD_SITE_ID_FIELD.to_string(),
        sites.pd.clone().unwrap_or(JsonValue::Null),
    );
    properties.insert(
        ADV_SITE_ID_FIELD.to_string(),
        sites.adv.clone().unwrap_or(JsonValue::Null),
    );
    feature
}
