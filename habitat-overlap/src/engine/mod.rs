//! Moteur de géotraitement
//!
//! Les opérations géométriques (projection, fusion, intersection, surfaces)
//! sont déléguées à `geo` et `proj`. Le moteur est passé explicitement aux
//! workflows : pas d'état global d'espace de travail.

pub mod reproject;

use std::collections::HashMap;

use anyhow::{Context, Result};
use geo::{Area, BooleanOps, BoundingRect, Intersects, MultiPolygon};
use overlap::{Table, Value};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::layer::Layer;

pub use reproject::Reprojector;

/// Suffixe ajouté aux champs de la seconde couche en cas de collision de noms
const DUPLICATE_FIELD_SUFFIX: &str = "_1";

/// Opérations de géotraitement utilisées par les workflows
pub trait Geoprocessor {
    /// Projette une couche dans le système `target_epsg`
    fn project(&self, layer: Layer, target_epsg: Option<u32>) -> Result<Layer>;

    /// Fusionne les entités qui partagent les mêmes valeurs de `fields`
    fn dissolve(&self, layer: &Layer, fields: &[&str]) -> Result<Layer>;

    /// Intersection deux à deux : une entité par paire qui se chevauche
    fn pairwise_intersect(&self, a: &Layer, b: &Layer) -> Result<Layer>;

    /// Surface planaire dans l'unité du système de coordonnées (m²)
    fn area(&self, geometry: &MultiPolygon) -> f64;

    /// Ajoute (ou recalcule) un champ de surface (m²) pour chaque entité
    fn add_area_field(&self, layer: &mut Layer, field: &str) -> Result<()> {
        let idx = match layer.table.column_index(field) {
            Some(idx) => idx,
            None => layer.table.add_field(field)?,
        };
        for (row, geometry) in layer.geometries.iter().enumerate() {
            layer.table.set(row, idx, Value::Number(self.area(geometry)));
        }
        Ok(())
    }
}

/// Moteur par défaut basé sur `geo`
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoEngine;

impl GeoEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Geoprocessor for GeoEngine {
    fn project(&self, mut layer: Layer, target_epsg: Option<u32>) -> Result<Layer> {
        let (Some(source), Some(target)) = (layer.epsg, target_epsg) else {
            if layer.epsg != target_epsg {
                warn!(
                    layer = %layer.name,
                    source = ?layer.epsg,
                    target = ?target_epsg,
                    "Unknown CRS, assuming layers share the same coordinate system"
                );
            }
            layer.epsg = layer.epsg.or(target_epsg);
            return Ok(layer);
        };

        if source == target {
            return Ok(layer);
        }

        let reprojector = Reprojector::new(source, target)
            .with_context(|| format!("Cannot project layer {}", layer.name))?;

        layer.geometries = layer
            .geometries
            .iter()
            .map(|g| reprojector.transform(g))
            .collect::<Result<Vec<_>>>()?;
        layer.epsg = Some(target);

        debug!(layer = %layer.name, source = source, target = target, "Layer projected");
        Ok(layer)
    }

    fn dissolve(&self, layer: &Layer, fields: &[&str]) -> Result<Layer> {
        let indices = fields
            .iter()
            .map(|f| layer.table.require_column(f))
            .collect::<Result<Vec<_>, _>>()?;

        // Groupes dans l'ordre de première apparition
        let mut group_of: HashMap<Vec<String>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<&MultiPolygon>)> = Vec::new();

        for (row, geometry) in layer.geometries.iter().enumerate() {
            let values: Vec<Value> = indices
                .iter()
                .map(|&i| layer.table.get(row, i).cloned().unwrap_or_default())
                .collect();
            let signature: Vec<String> = values.iter().map(value_signature).collect();

            let group = *group_of.entry(signature).or_insert_with(|| {
                groups.push((values, Vec::new()));
                groups.len() - 1
            });
            groups[group].1.push(geometry);
        }

        let columns: Vec<&str> = indices
            .iter()
            .map(|&i| layer.table.columns()[i].as_str())
            .collect();
        let mut output = Layer::new(&layer.name, layer.epsg, &columns);

        for (values, geometries) in groups {
            output.push(union_all(&geometries), values)?;
        }

        debug!(
            layer = %layer.name,
            input = layer.len(),
            output = output.len(),
            "Layer dissolved"
        );
        Ok(output)
    }

    fn pairwise_intersect(&self, a: &Layer, b: &Layer) -> Result<Layer> {
        let (columns, b_names) = merged_columns(&a.table, &b.table);
        let name = format!("{}_{}_int", a.name, b.name);
        let mut output = Layer {
            name,
            epsg: a.epsg.or(b.epsg),
            geometries: Vec::new(),
            table: Table::new(columns),
        };
        debug!(renamed = b_names.len(), "Merged attribute schemas");

        let b_bounds: Vec<_> = b.geometries.iter().map(|g| g.bounding_rect()).collect();

        // Intersections calculées en parallèle, assemblées dans l'ordre (i, j)
        let pieces: Vec<Vec<(usize, MultiPolygon)>> = a
            .geometries
            .par_iter()
            .map(|ga| {
                let Some(a_bounds) = ga.bounding_rect() else {
                    return Vec::new();
                };
                b.geometries
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| matches!(b_bounds[*j], Some(rect) if rect.intersects(&a_bounds)))
                    .map(|(j, gb)| (j, ga.intersection(gb)))
                    .filter(|(_, piece)| !piece.0.is_empty())
                    .collect()
            })
            .collect();

        for (i, row_pieces) in pieces.into_iter().enumerate() {
            for (j, piece) in row_pieces {
                let mut values = a.table.rows()[i].clone();
                values.extend(b.table.rows()[j].iter().cloned());
                output.push(piece, values)?;
            }
        }

        debug!(
            a = a.len(),
            b = b.len(),
            output = output.len(),
            "Pairwise intersection done"
        );
        Ok(output)
    }

    fn area(&self, geometry: &MultiPolygon) -> f64 {
        geometry.unsigned_area()
    }
}

/// Union de toutes les géométries d'un groupe
fn union_all(geometries: &[&MultiPolygon]) -> MultiPolygon {
    let mut iter = geometries.iter();
    let Some(first) = iter.next() else {
        return MultiPolygon::new(Vec::new());
    };
    iter.fold((*first).clone(), |acc, g| acc.union(g))
}

/// Clé de regroupement d'une valeur (`f64` n'est pas `Hash`)
fn value_signature(value: &Value) -> String {
    match value {
        Value::Null => "\u{0}null".to_string(),
        Value::Text(s) => format!("t:{}", s),
        Value::Integer(i) => format!("n:{}", *i as f64),
        Value::Number(n) => format!("n:{}", n),
    }
}

/// Nom que prend `field` de la seconde couche dans le résultat d'une
/// intersection avec `first`
pub fn intersect_field_name(first: &Layer, field: &str) -> String {
    suffixed_name(first.table.columns(), field)
}

fn suffixed_name(columns: &[String], column: &str) -> String {
    let mut name = column.to_string();
    while columns.iter().any(|c| c.eq_ignore_ascii_case(&name)) {
        name.push_str(DUPLICATE_FIELD_SUFFIX);
    }
    name
}

/// Colonnes de `a` puis de `b`, les doublons de `b` suffixés
fn merged_columns(a: &Table, b: &Table) -> (Vec<String>, Vec<String>) {
    let mut columns: Vec<String> = a.columns().to_vec();
    let mut renamed = Vec::new();

    for column in b.columns() {
        let name = suffixed_name(&columns, column);
        if &name != column {
            renamed.push(name.clone());
        }
        columns.push(name);
    }

    (columns, renamed)
}
