//! Workflow par parcelle
//!
//! Intersection des parcelles protégées avec les aires de répartition, puis
//! surface d'aire de répartition (`SAR_HA`) par parcelle.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use overlap::{square_meters_to_hectares, Table, Value};
use tracing::info;

use super::{write_intermediate, WorkflowOptions, AREA_FIELD};
use crate::config::Config;
use crate::engine::Geoprocessor;
use crate::export::{self, CsvTarget};
use crate::layer::Layer;
use crate::report::RunReport;

/// Résultat en mémoire du workflow par parcelle
#[derive(Debug)]
pub struct ParcelsResult {
    /// Intersection complète (tous les attributs des deux couches)
    pub intersection: Layer,
    /// Intersection fusionnée par parcelle
    pub dissolved: Layer,
    /// Table par parcelle (`parcel_field`, `SAR_HA`)
    pub table: Table,
}

/// Calcule les deux tables sans rien écrire
pub fn compute_parcels(
    engine: &dyn Geoprocessor,
    config: &Config,
    achievements: &Layer,
    ranges: Layer,
    report: &mut RunReport,
) -> Result<ParcelsResult> {
    info!(layer = %ranges.name, target = ?achievements.epsg, "Projecting");
    let ranges = engine.project(ranges, achievements.epsg)?;

    info!(a = %achievements.name, b = %ranges.name, "Intersecting");
    let mut intersection = engine.pairwise_intersect(achievements, &ranges)?;
    engine.add_area_field(&mut intersection, AREA_FIELD)?;
    report.record_step("intersect", intersection.len());

    info!(field = %config.parcel_field, "Dissolving");
    let mut dissolved = engine
        .dissolve(&intersection, &[config.parcel_field.as_str()])
        .context("Failed to dissolve intersection by parcel")?;
    dissolved.name = format!("{}_dis", intersection.name);
    report.record_step("dissolve", dissolved.len());

    // Surface non arrondie
    let ha_idx = dissolved.table.add_field(&config.columns.parcel_ha)?;
    for row in 0..dissolved.len() {
        let hectares = square_meters_to_hectares(engine.area(&dissolved.geometries[row]));
        dissolved.table.set(row, ha_idx, Value::Number(hectares));
    }

    let table = dissolved
        .table
        .select(&[config.parcel_field.as_str(), config.columns.parcel_ha.as_str()])?;

    Ok(ParcelsResult {
        intersection,
        dissolved,
        table,
    })
}

/// Workflow complet : lecture des couches, calcul, export des deux CSV
pub fn run_parcels(
    engine: &dyn Geoprocessor,
    config: &Config,
    achievements_path: &Path,
    ranges_path: &Path,
    options: &WorkflowOptions,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new("parcels");

    let achievements = Layer::read_geojson(achievements_path)?;
    report.record_input("achievements", achievements_path, achievements.len())?;
    let ranges = Layer::read_geojson(ranges_path)?;
    report.record_input("ranges", ranges_path, ranges.len())?;

    let result = compute_parcels(engine, config, &achievements, ranges, &mut report)?;

    write_intermediate(options, &[&result.intersection, &result.dissolved])?;

    let intersection_csv = options.output_dir.join(&config.outputs.intersection_csv);
    let parcels_csv = options.output_dir.join(&config.outputs.parcels_csv);
    info!(
        intersection = %intersection_csv.display(),
        parcels = %parcels_csv.display(),
        "Exporting to csv"
    );
    export::write_csv_all(&[
        CsvTarget {
            table: &result.intersection.table,
            fields: &[],
            path: &intersection_csv,
        },
        CsvTarget {
            table: &result.table,
            fields: &[],
            path: &parcels_csv,
        },
    ])?;
    report.record_step("export", result.table.len());
    report.record_output(&intersection_csv);
    report.record_output(&parcels_csv);

    report.set_duration(start.elapsed());
    report.finalize();
    Ok(report)
}
