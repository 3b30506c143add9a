//! Workflow par espèce
//!
//! Pour chaque aire de répartition fusionnée par espèce : surface de l'aire
//! (`RANGE_HA`), surface protégée qui la chevauche (`NCC_FS_HA`) et
//! pourcentage protégé (`PCT_NCC`).

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use overlap::{hectares_rounded, percentage, try_aggregate, OverlapError, Table, Value};
use tracing::{info, warn};

use super::{write_intermediate, WorkflowOptions, AREA_FIELD};
use crate::config::{Config, ZeroRangePolicy};
use crate::engine::{intersect_field_name, Geoprocessor};
use crate::export;
use crate::layer::Layer;
use crate::report::RunReport;

/// Résultat en mémoire du workflow par espèce
#[derive(Debug)]
pub struct SpeciesResult {
    /// Table exportée, une ligne par aire fusionnée
    pub table: Table,
    /// Colonnes exportées, dans l'ordre
    pub fields: Vec<String>,
    /// Aires de répartition fusionnées
    pub dissolved: Layer,
    /// Intersection filtrée sur la tenure
    pub intersection: Layer,
}

impl SpeciesResult {
    fn field_refs(&self) -> Vec<&str> {
        self.fields.iter().map(String::as_str).collect()
    }
}

/// Calcule la table par espèce sans rien écrire
pub fn compute_species(
    engine: &dyn Geoprocessor,
    config: &Config,
    achievements: &Layer,
    ranges: Layer,
    join_field: &str,
    report: &mut RunReport,
) -> Result<SpeciesResult> {
    let columns = &config.columns;

    info!(layer = %ranges.name, target = ?achievements.epsg, "Projecting");
    let ranges = engine.project(ranges, achievements.epsg)?;

    let mut dissolve_fields: Vec<&str> = vec![join_field];
    dissolve_fields.extend(config.species_fields.iter().map(String::as_str));

    info!(fields = ?dissolve_fields, "Dissolving");
    let mut dissolved = engine
        .dissolve(&ranges, &dissolve_fields)
        .context("Failed to dissolve ranges")?;
    dissolved.name = format!("{}_dis", ranges.name);
    report.record_step("dissolve", dissolved.len());

    info!(field = %columns.range_ha, "Calculating range area");
    let range_idx = dissolved.table.add_field(&columns.range_ha)?;
    for row in 0..dissolved.len() {
        let hectares = hectares_rounded(engine.area(&dissolved.geometries[row]));
        dissolved.table.set(row, range_idx, Value::Number(hectares));
    }
    dissolved.table.add_field(&columns.overlap_ha)?;

    info!(a = %achievements.name, b = %dissolved.name, "Intersecting");
    let mut intersection = engine.pairwise_intersect(achievements, &dissolved)?;
    report.record_step("intersect", intersection.len());

    if let Some(clause) = config.tenure_clause()? {
        info!(filter = %clause, "Filtering intersection");
        let mask = clause.mask(&intersection.table)?;
        intersection.retain_mask(&mask);
        report.record_step("filter", intersection.len());
    }

    info!("Extracting overlap area");
    engine.add_area_field(&mut intersection, AREA_FIELD)?;
    let key_field = intersect_field_name(achievements, join_field);
    let totals = try_aggregate(intersection.table.overlap_records(&key_field, AREA_FIELD)?)
        .context("Failed to aggregate overlap area")?;

    let stats = overlap::join_table(&totals, &mut dissolved.table, join_field, &columns.overlap_ha)?;
    report.record_join(stats);

    fill_percentages(&mut dissolved.table, config, join_field, report)?;

    let mut fields = dissolve_fields.iter().map(|f| f.to_string()).collect::<Vec<_>>();
    fields.extend([
        columns.range_ha.clone(),
        columns.overlap_ha.clone(),
        columns.percent.clone(),
    ]);

    Ok(SpeciesResult {
        table: dissolved.table.clone(),
        fields,
        dissolved,
        intersection,
    })
}

/// Calcule `PCT_NCC` ligne par ligne selon la politique de surface nulle
fn fill_percentages(
    table: &mut Table,
    config: &Config,
    join_field: &str,
    report: &mut RunReport,
) -> Result<()> {
    let columns = &config.columns;
    let key_idx = table.require_column(join_field)?;
    let range_idx = table.require_column(&columns.range_ha)?;
    let overlap_idx = table.require_column(&columns.overlap_ha)?;
    let pct_idx = table.add_field(&columns.percent)?;

    for row in 0..table.len() {
        let key = table.key(row, key_idx)?;
        let value = match percentage(table.number(row, overlap_idx)?, table.number(row, range_idx)?) {
            Ok(pct) => Value::Number(pct),
            Err(OverlapError::DivisionByZero { .. }) => match config.zero_range {
                ZeroRangePolicy::Null => {
                    warn!(key = %key, "Range area rounds to 0 ha, percentage left empty");
                    report.record_warning(&key, "Range area rounds to 0 ha, percentage left empty");
                    Value::Null
                }
                ZeroRangePolicy::Error => {
                    bail!("Range area of {} rounds to 0 ha, cannot compute percentage", key)
                }
            },
            Err(e) => return Err(e.into()),
        };
        table.set(row, pct_idx, value);
    }
    Ok(())
}

/// Workflow complet : lecture des couches, calcul, export CSV
pub fn run_species(
    engine: &dyn Geoprocessor,
    config: &Config,
    achievements_path: &Path,
    ranges_path: &Path,
    join_field: &str,
    options: &WorkflowOptions,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::new("species");

    let achievements = Layer::read_geojson(achievements_path)?;
    report.record_input("achievements", achievements_path, achievements.len())?;
    let ranges = Layer::read_geojson(ranges_path)?;
    report.record_input("ranges", ranges_path, ranges.len())?;

    let result = compute_species(engine, config, &achievements, ranges, join_field, &mut report)?;

    write_intermediate(options, &[&result.dissolved, &result.intersection])?;

    let output = options.output_dir.join(&config.outputs.species_csv);
    info!(path = %output.display(), "Exporting to csv");
    let rows = export::write_csv(&result.table, &result.field_refs(), &output)?;
    report.record_step("export", rows);
    report.record_output(&output);

    report.set_duration(start.elapsed());
    report.finalize();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GeoEngine;
    use geo::{polygon, MultiPolygon, Polygon};

    fn rect(x: f64, y: f64, w: f64, h: f64) -> MultiPolygon {
        let p: Polygon = polygon![
            (x: x, y: y),
            (x: x + w, y: y),
            (x: x + w, y: y + h),
            (x: x, y: y + h),
            (x: x, y: y),
        ];
        MultiPolygon::new(vec![p])
    }

    fn config() -> Config {
        Config {
            species_fields: vec!["COM_NAME_E".to_string()],
            ..Config::default()
        }
    }

    /// Aire A : 500 m x 100 m (5 ha), aire B : 10 m x 10 m (0.01 ha)
    fn ranges() -> Layer {
        let mut layer = Layer::new("ranges", Some(3978), &["COSEWIC_ID", "COM_NAME_E"]);
        layer
            .push(rect(0.0, 0.0, 250.0, 100.0), vec!["1".into(), "Alpha".into()])
            .unwrap();
        layer
            .push(rect(250.0, 0.0, 250.0, 100.0), vec!["1".into(), "Alpha".into()])
            .unwrap();
        layer
            .push(rect(10_000.0, 0.0, 10.0, 10.0), vec!["2".into(), "Beta".into()])
            .unwrap();
        layer
    }

    /// Parcelle en pleine propriété : 150 m x 100 m sur A (1.5 ha)
    fn achievements() -> Layer {
        let mut layer = Layer::new("ncc", Some(3978), &["PARCEL", "PCL_INTERE"]);
        layer
            .push(rect(0.0, 0.0, 150.0, 100.0), vec!["P1".into(), "Fee Simple".into()])
            .unwrap();
        layer
            .push(
                rect(300.0, 0.0, 100.0, 100.0),
                vec!["P2".into(), "Conservation Agreement".into()],
            )
            .unwrap();
        layer
    }

    #[test]
    fn test_compute_species() {
        let engine = GeoEngine::new();
        let mut report = RunReport::new("species");
        let result = compute_species(
            &engine,
            &config(),
            &achievements(),
            ranges(),
            "COSEWIC_ID",
            &mut report,
        )
        .unwrap();

        assert_eq!(
            result.fields,
            vec!["COSEWIC_ID", "COM_NAME_E", "RANGE_HA", "NCC_FS_HA", "PCT_NCC"]
        );
        assert_eq!(result.table.len(), 2);

        let t = &result.table;
        let range = t.require_column("RANGE_HA").unwrap();
        let overlap = t.require_column("NCC_FS_HA").unwrap();
        let pct = t.require_column("PCT_NCC").unwrap();

        assert_eq!(t.number(0, range).unwrap(), 5.0);
        assert_eq!(t.number(0, overlap).unwrap(), 1.5);
        assert_eq!(t.number(0, pct).unwrap(), 30.0);

        assert_eq!(t.number(1, range).unwrap(), 0.01);
        assert_eq!(t.number(1, overlap).unwrap(), 0.0);
        assert_eq!(t.number(1, pct).unwrap(), 0.0);

        assert_eq!(report.step("dissolve"), Some(2));
        assert_eq!(report.step("intersect"), Some(2));
        assert_eq!(report.step("filter"), Some(1));
        assert_eq!(report.keys_matched, 1);
        assert_eq!(report.keys_defaulted, 1);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_no_tenure_filter() {
        let engine = GeoEngine::new();
        let config = Config {
            tenure_filter: None,
            ..config()
        };
        let mut report = RunReport::new("species");
        let result =
            compute_species(&engine, &config, &achievements(), ranges(), "COSEWIC_ID", &mut report)
                .unwrap();

        let overlap = result.table.require_column("NCC_FS_HA").unwrap();
        assert_eq!(result.table.number(0, overlap).unwrap(), 2.5);
        assert_eq!(report.step("filter"), None);
    }

    fn tiny_ranges() -> Layer {
        let mut layer = ranges();
        // 5 m x 5 m : 0.0025 ha, arrondi à 0
        layer
            .push(rect(20_000.0, 0.0, 5.0, 5.0), vec!["3".into(), "Gamma".into()])
            .unwrap();
        layer
    }

    #[test]
    fn test_zero_range_null() {
        let engine = GeoEngine::new();
        let mut report = RunReport::new("species");
        let result = compute_species(
            &engine,
            &config(),
            &achievements(),
            tiny_ranges(),
            "COSEWIC_ID",
            &mut report,
        )
        .unwrap();

        let pct = result.table.require_column("PCT_NCC").unwrap();
        assert!(result.table.get(2, pct).unwrap().is_null());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].key, "3");
    }

    #[test]
    fn test_zero_range_error() {
        let engine = GeoEngine::new();
        let config = Config {
            zero_range: ZeroRangePolicy::Error,
            ..config()
        };
        let mut report = RunReport::new("species");
        let result = compute_species(
            &engine,
            &config,
            &achievements(),
            tiny_ranges(),
            "COSEWIC_ID",
            &mut report,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_join_field() {
        let engine = GeoEngine::new();
        let mut report = RunReport::new("species");
        let result =
            compute_species(&engine, &config(), &achievements(), ranges(), "SARA_ID", &mut report);
        assert!(result.is_err());
    }
}
