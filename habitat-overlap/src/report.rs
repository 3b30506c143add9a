//! Rapport d'exécution d'un workflow
//!
//! Collecte les entrées (avec checksum), les effectifs à chaque étape, le
//! résultat de la jointure et les warnings, puis les affiche ou les
//! sauvegarde en JSON.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use overlap::JoinStats;
use serde::Serialize;

/// Statut global de l'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Exécution sans warning
    Success,
    /// CSV produits, avec des warnings (pourcentages non calculables...)
    SuccessWithWarnings,
}

/// Fichier d'entrée
#[derive(Debug, Clone, Serialize)]
pub struct InputFile {
    /// Rôle de la couche (`achievements`, `ranges`)
    pub role: String,
    /// Chemin
    pub path: String,
    /// Checksum blake3 du fichier
    pub checksum: String,
    /// Nombre d'entités lues
    pub features: usize,
}

/// Nombre d'entités en sortie d'une étape
#[derive(Debug, Clone, Serialize)]
pub struct StepCount {
    pub step: String,
    pub features: usize,
}

/// Warning non bloquant
#[derive(Debug, Clone, Serialize)]
pub struct RunWarning {
    /// Clé concernée (identifiant d'espèce, de parcelle...)
    pub key: String,
    /// Message
    pub message: String,
}

/// Rapport complet d'exécution
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Nom du workflow (`species`, `parcels`)
    pub workflow: String,
    /// Durée du traitement
    pub duration_secs: f64,
    /// Statut global
    pub status: RunStatus,

    /// Couches lues
    pub inputs: Vec<InputFile>,
    /// Effectifs par étape, dans l'ordre d'exécution
    pub steps: Vec<StepCount>,

    /// Lignes cibles qui ont trouvé une surface
    pub keys_matched: usize,
    /// Lignes cibles sans chevauchement (valeur 0)
    pub keys_defaulted: usize,

    /// Fichiers produits
    pub outputs: Vec<String>,
    /// Liste des warnings
    pub warnings: Vec<RunWarning>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            workflow: String::new(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            inputs: Vec::new(),
            steps: Vec::new(),
            keys_matched: 0,
            keys_defaulted: 0,
            outputs: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl RunReport {
    /// Crée un nouveau rapport pour un workflow
    pub fn new(workflow: &str) -> Self {
        Self {
            workflow: workflow.to_string(),
            ..Default::default()
        }
    }

    /// Enregistre une couche d'entrée et calcule son checksum
    pub fn record_input(&mut self, role: &str, path: &Path, features: usize) -> Result<()> {
        let checksum = compute_file_checksum(path)?;
        self.inputs.push(InputFile {
            role: role.to_string(),
            path: path.display().to_string(),
            checksum,
            features,
        });
        Ok(())
    }

    /// Enregistre l'effectif en sortie d'une étape
    pub fn record_step(&mut self, step: &str, features: usize) {
        self.steps.push(StepCount {
            step: step.to_string(),
            features,
        });
    }

    /// Enregistre le résultat de la jointure
    pub fn record_join(&mut self, stats: JoinStats) {
        self.keys_matched += stats.matched;
        self.keys_defaulted += stats.defaulted;
    }

    /// Enregistre un fichier produit
    pub fn record_output(&mut self, path: &Path) {
        self.outputs.push(path.display().to_string());
    }

    /// Enregistre un warning
    pub fn record_warning(&mut self, key: &str, message: &str) {
        self.warnings.push(RunWarning {
            key: key.to_string(),
            message: message.to_string(),
        });
    }

    /// Effectif d'une étape, si elle a été enregistrée
    pub fn step(&self, step: &str) -> Option<usize> {
        self.steps.iter().find(|s| s.step == step).map(|s| s.features)
    }

    /// Définit la durée du traitement
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = if self.warnings.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::SuccessWithWarnings
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("RUN REPORT - {}", self.workflow);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        if !self.inputs.is_empty() {
            println!("\n--- INPUTS ---");
            for input in &self.inputs {
                println!(
                    "  {}: {} ({} features, blake3 {})",
                    input.role,
                    input.path,
                    input.features,
                    short_checksum(&input.checksum)
                );
            }
        }

        if !self.steps.is_empty() {
            println!("\n--- STEPS ---");
            for step in &self.steps {
                println!("  {}: {} features", step.step, step.features);
            }
        }

        println!("\n--- SUMMARY ---");
        println!(
            "Join: {} matched, {} without overlap",
            self.keys_matched, self.keys_defaulted
        );
        for output in &self.outputs {
            println!("Output: {}", output);
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(10) {
                println!("  [{}] {}", w.key, w.message);
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} matched, {} without overlap, {} warnings",
            self.workflow,
            self.keys_matched,
            self.keys_defaulted,
            self.warnings.len()
        )
    }
}

fn short_checksum(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}

/// Calcule le checksum blake3 d'un fichier
pub fn compute_file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
