//! Workflows de calcul de chevauchement
//!
//! - `species` : surface protégée et pourcentage par aire de répartition
//! - `parcels` : surface d'aire de répartition par parcelle protégée
//!
//! Tous les calculs sont faits en mémoire avant la première écriture : un
//! workflow qui échoue ne laisse aucun CSV.

pub mod parcels;
pub mod species;

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::export;
use crate::layer::Layer;

pub use parcels::run_parcels;
pub use species::run_species;

/// Nom du champ de surface (m²) ajouté aux intersections
pub const AREA_FIELD: &str = "Shape_Area";

/// Répertoire des couches intermédiaires, relatif au répertoire de sortie
pub const INTERMEDIATE_DIR: &str = "intermediate";

/// Options communes aux workflows
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Répertoire des CSV produits
    pub output_dir: PathBuf,
    /// Conserver les couches intermédiaires en GeoJSON
    pub keep_intermediate: bool,
}

impl WorkflowOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            keep_intermediate: false,
        }
    }
}

/// Écrit les couches intermédiaires si demandé
pub(crate) fn write_intermediate(options: &WorkflowOptions, layers: &[&Layer]) -> Result<()> {
    if !options.keep_intermediate {
        return Ok(());
    }

    let dir = options.output_dir.join(INTERMEDIATE_DIR);
    std::fs::create_dir_all(&dir)?;

    for layer in layers {
        let path = intermediate_path(&dir, &layer.name);
        export::export_layer(layer, &path)?;
        info!(layer = %layer.name, path = %path.display(), "Intermediate layer written");
    }
    Ok(())
}

fn intermediate_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.geojson", name))
}
