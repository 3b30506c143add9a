//! Point d'entrée CLI pour habitat-overlap

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Mesurer le chevauchement entre terres protégées et aires de répartition
#[derive(Parser)]
#[command(name = "habitat-overlap")]
#[command(author, version)]
#[command(about = "Surface protégée (ha) et pourcentage par espèce ou par parcelle")]
#[command(long_about = "Intersecte les parcelles protégées avec les aires de répartition des espèces en péril et exporte les surfaces en hectares.\n\n'species' : surface et pourcentage par aire de répartition.\n'parcels' : surface d'aire de répartition par parcelle.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Species {
            achievements,
            habitat,
            join_field,
            output,
            config,
            zero_range,
            keep_intermediate,
            report,
        } => {
            info!(
                achievements = %achievements.display(),
                habitat = %habitat.display(),
                join_field = %join_field,
                "Overlap par espèce"
            );
            cli::cmd_species(
                &achievements,
                &habitat,
                &join_field,
                output,
                &config,
                zero_range,
                keep_intermediate,
                report.as_deref(),
            )?;
        }
        Commands::Parcels {
            achievements,
            ranges,
            output,
            config,
            keep_intermediate,
            report,
        } => {
            info!(
                achievements = %achievements.display(),
                ranges = %ranges.display(),
                "Overlap par parcelle"
            );
            cli::cmd_parcels(
                &achievements,
                &ranges,
                output,
                &config,
                keep_intermediate,
                report.as_deref(),
            )?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
