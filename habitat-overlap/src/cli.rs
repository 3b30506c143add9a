//! Définition et implémentation des commandes CLI
//!
//! - `species` : surface protégée et pourcentage par espèce
//! - `parcels` : surface d'aire de répartition par parcelle

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use habitat_overlap::config::{Config, ZeroRangePolicy};
use habitat_overlap::engine::{reproject, GeoEngine};
use habitat_overlap::report::RunReport;
use habitat_overlap::workflow::{self, WorkflowOptions};

/// Variable d'environnement du répertoire de sortie par défaut
pub const OUTPUT_ENV: &str = "HABITAT_OVERLAP_OUTPUT";

#[derive(Subcommand)]
pub enum Commands {
    /// Protected area, range area and percentage per species range
    Species {
        /// Protected parcels (GeoJSON)
        achievements: PathBuf,

        /// Species range maps (GeoJSON)
        habitat: PathBuf,

        /// Range identifier used to dissolve and join (e.g. COSEWIC_ID)
        join_field: String,

        /// Output directory (défaut : env HABITAT_OVERLAP_OUTPUT / répertoire courant)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config preset name (nhcp/spp) or path to a JSON config
        #[arg(long, default_value = "nhcp")]
        config: String,

        /// Behaviour when a range rounds to 0 ha: null, error
        #[arg(long)]
        zero_range: Option<ZeroRangePolicy>,

        /// Keep intermediate layers as GeoJSON in <output>/intermediate
        #[arg(long)]
        keep_intermediate: bool,

        /// Save the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Range area per protected parcel
    Parcels {
        /// Protected parcels (GeoJSON)
        achievements: PathBuf,

        /// Species range maps (GeoJSON)
        ranges: PathBuf,

        /// Output directory (défaut : env HABITAT_OVERLAP_OUTPUT / répertoire courant)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config preset name (nhcp/spp) or path to a JSON config
        #[arg(long, default_value = "spp")]
        config: String,

        /// Keep intermediate layers as GeoJSON in <output>/intermediate
        #[arg(long)]
        keep_intermediate: bool,

        /// Save the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

/// Exécute la commande species
#[allow(clippy::too_many_arguments)]
pub fn cmd_species(
    achievements: &Path,
    habitat: &Path,
    join_field: &str,
    output: Option<PathBuf>,
    config_spec: &str,
    zero_range: Option<ZeroRangePolicy>,
    keep_intermediate: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::resolve(config_spec)?;
    if let Some(policy) = zero_range {
        config.zero_range = policy;
    }

    let options = workflow_options(output, keep_intermediate);
    log_engine();

    let report = workflow::run_species(
        &GeoEngine::new(),
        &config,
        achievements,
        habitat,
        join_field,
        &options,
    )?;

    finish(&report, report_path)
}

/// Exécute la commande parcels
pub fn cmd_parcels(
    achievements: &Path,
    ranges: &Path,
    output: Option<PathBuf>,
    config_spec: &str,
    keep_intermediate: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let config = Config::resolve(config_spec)?;
    let options = workflow_options(output, keep_intermediate);
    log_engine();

    let report =
        workflow::run_parcels(&GeoEngine::new(), &config, achievements, ranges, &options)?;

    finish(&report, report_path)
}

/// Répertoire de sortie : option, sinon variable d'environnement, sinon `.`
fn resolve_output_dir(output: Option<PathBuf>) -> PathBuf {
    output
        .or_else(|| std::env::var_os(OUTPUT_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn workflow_options(output: Option<PathBuf>, keep_intermediate: bool) -> WorkflowOptions {
    WorkflowOptions {
        output_dir: resolve_output_dir(output),
        keep_intermediate,
    }
}

fn log_engine() {
    info!(reproject = reproject::is_available(), "Geoprocessing engine: geo");
}

fn finish(report: &RunReport, report_path: Option<&Path>) -> Result<()> {
    report.display();
    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .context("Failed to save run report")?;
        info!(path = %path.display(), "Report saved");
    }
    info!("{}", report.summary());
    Ok(())
}
