//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting preparation results and geodatabase contents.

use tabled::{Table, Tabled};

use proxprep_core::PrepReport;
use proxprep_core::projection::SpatialReferenceInfo;
use proxprep_core::types::FeatureClassInfo;

/// Table row representation for a feature class in a geodatabase.
#[derive(Tabled)]
pub struct FeatureClassRow {
    #[tabled(rename = "Feature Class")]
    pub name: String,
    /// Native WKID, or "Undefined".
    #[tabled(rename = "WKID")]
    pub wkid: String,
    #[tabled(rename = "Features")]
    pub features: usize,
    #[tabled(rename = "Geometry")]
    pub geometry: String,
}

/// Table row representation for a layer that was reprojected.
#[derive(Tabled)]
pub struct ReprojectionRow {
    #[tabled(rename = "Layer")]
    pub role: String,
    #[tabled(rename = "Source")]
    pub source: String,
    #[tabled(rename = "From")]
    pub from: String,
    #[tabled(rename = "Target")]
    pub target: String,
}

/// Table row representation for a supported spatial reference.
#[derive(Tabled)]
pub struct SpatialReferenceRow {
    #[tabled(rename = "WKID")]
    pub wkids: String,
    #[tabled(rename = "Name")]
    pub name: String,
}

/// Key/value row for run summaries.
#[derive(Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Item")]
    pub item: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl SummaryRow {
    fn new(item: &str, value: impl ToString) -> Self {
        Self {
            item: item.to_string(),
            value: value.to_string(),
        }
    }
}

fn id_list(ids: &[String]) -> String {
    if ids.is_empty() {
        "None".to_string()
    } else {
        ids.join(", ")
    }
}

#[must_use]
pub fn feature_class_rows(infos: &[FeatureClassInfo]) -> Vec<FeatureClassRow> {
    infos
        .iter()
        .map(|info| FeatureClassRow {
            name: info.name.to_string(),
            wkid: info
                .wkid
                .map_or_else(|| "Undefined".to_string(), |wkid| wkid.to_string()),
            features: info.feature_count,
            geometry: if info.geometry_types.is_empty() {
                "N/A".to_string()
            } else {
                info.geometry_types.join(", ")
            },
        })
        .collect()
}

#[must_use]
pub fn summary_rows(report: &PrepReport) -> Vec<SummaryRow> {
    vec![
        SummaryRow::new("Output", &report.output),
        SummaryRow::new("Indigenous areas", &report.indigenous_areas),
        SummaryRow::new("Buildings", &report.buildings),
        SummaryRow::new("Features written", report.summary.features_written),
        SummaryRow::new(
            "Interior points added",
            report.summary.interior_points_added,
        ),
        SummaryRow::new(
            "Missing PD site ids",
            id_list(&report.summary.missing_pd_site_ids),
        ),
        SummaryRow::new(
            "Missing ADV site ids",
            id_list(&report.summary.missing_adv_site_ids),
        ),
    ]
}

/// Display the outcome of a `prepare` run.
pub fn display_prep_report(report: &PrepReport) {
    println!("\nData preparation complete\n");
    println!("{}", Table::new(summary_rows(report)));

    if report.reprojected.is_empty() {
        println!("\nNo layers needed reprojection.");
        return;
    }

    println!("\n=== Reprojected Layers ===");
    let rows: Vec<ReprojectionRow> = report
        .reprojected
        .iter()
        .map(|r| ReprojectionRow {
            role: r.role.to_string(),
            source: r.source.to_string(),
            from: r.from.to_string(),
            target: r.target.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
}

/// Display the feature classes stored in a geodatabase.
pub fn display_geodatabase_info(gdb: &str, infos: &[FeatureClassInfo]) {
    println!("\nGeodatabase: {gdb}");
    if infos.is_empty() {
        println!("No feature classes found.");
        return;
    }

    println!("Feature classes ({} total):\n", infos.len());
    println!("{}", Table::new(feature_class_rows(infos)));
}

pub fn display_spatial_references(refs: &[SpatialReferenceInfo]) {
    println!("\nSupported Spatial References ({} total):\n", refs.len());
    let rows: Vec<SpatialReferenceRow> = refs
        .iter()
        .map(|r| SpatialReferenceRow {
            wkids: r.wkids.to_string(),
            name: r.name.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
}
