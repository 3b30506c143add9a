//! Configuration des workflows

use serde::{Deserialize, Serialize};
use std::path::Path;

use anyhow::{Context, Result};

use crate::filter::WhereClause;

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Attributs d'espèce conservés lors de la fusion des aires de répartition
    #[serde(default = "default_species_fields")]
    pub species_fields: Vec<String>,

    /// Filtre de tenure appliqué à l'intersection (`null` : aucun filtre)
    #[serde(default = "default_tenure_filter")]
    pub tenure_filter: Option<String>,

    /// Identifiant de parcelle pour le workflow par parcelle
    #[serde(default = "default_parcel_field")]
    pub parcel_field: String,

    /// Noms des colonnes calculées
    #[serde(default)]
    pub columns: ColumnNames,

    /// Noms des fichiers CSV produits
    #[serde(default)]
    pub outputs: OutputNames,

    /// Politique quand la surface de l'aire de répartition est nulle
    #[serde(default)]
    pub zero_range: ZeroRangePolicy,
}

/// Noms des colonnes calculées
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnNames {
    /// Surface de l'aire de répartition (ha)
    pub range_ha: String,
    /// Surface protégée qui chevauche l'aire (ha)
    pub overlap_ha: String,
    /// Pourcentage protégé
    pub percent: String,
    /// Surface de chevauchement par parcelle (ha)
    pub parcel_ha: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            range_ha: "RANGE_HA".to_string(),
            overlap_ha: "NCC_FS_HA".to_string(),
            percent: "PCT_NCC".to_string(),
            parcel_ha: "SAR_HA".to_string(),
        }
    }
}

/// Noms des fichiers produits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputNames {
    pub species_csv: String,
    pub intersection_csv: String,
    pub parcels_csv: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            species_csv: "ECCC_SAR_RANGE_MAP_EXTENTS_NCC_ACHIEVMENTS.csv".to_string(),
            intersection_csv: "NCC_ECCC_SAR.csv".to_string(),
            parcels_csv: "NCC_ECCC_SAR_DIS_PARCEL.csv".to_string(),
        }
    }
}

/// Politique pour un pourcentage dont la surface de référence vaut 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroRangePolicy {
    /// Cellule vide et warning dans le rapport
    #[default]
    Null,
    /// Abandon du traitement avant toute écriture
    Error,
}

impl std::str::FromStr for ZeroRangePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "null" | "empty" | "none" => Ok(ZeroRangePolicy::Null),
            "error" | "fail" => Ok(ZeroRangePolicy::Error),
            _ => Err(format!("Invalid zero-range policy: {}. Use: null, error", s)),
        }
    }
}

fn default_species_fields() -> Vec<String> {
    ["SCI_NAME", "COM_NAME_E", "TAXON_E", "SAR_STAT_E", "SCHEDULE_E"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_tenure_filter() -> Option<String> {
    Some("PCL_INTERE = 'Fee Simple'".to_string())
}

fn default_parcel_field() -> String {
    "LIS_PARCEL_ID".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            species_fields: default_species_fields(),
            tenure_filter: default_tenure_filter(),
            parcel_field: default_parcel_field(),
            columns: ColumnNames::default(),
            outputs: OutputNames::default(),
            zero_range: ZeroRangePolicy::default(),
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "nhcp" => Self::load_embedded(include_str!("presets/nhcp.json")),
            "spp" => Self::load_embedded(include_str!("presets/spp.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: nhcp, spp", preset),
        }
    }

    /// Preset embarqué ou chemin vers un fichier JSON
    pub fn resolve(spec: &str) -> Result<Self> {
        match spec {
            "nhcp" | "spp" => Self::from_preset(spec),
            _ => Self::load(Path::new(spec)),
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Clause de tenure analysée, si configurée
    pub fn tenure_clause(&self) -> Result<Option<WhereClause>> {
        match self.tenure_filter.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(clause) => Ok(Some(clause.parse::<WhereClause>()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let nhcp = Config::from_preset("nhcp").unwrap();
        assert_eq!(nhcp.species_fields.len(), 5);
        assert_eq!(nhcp.columns.overlap_ha, "NCC_FS_HA");
        assert_eq!(nhcp.zero_range, ZeroRangePolicy::Null);
        assert!(nhcp.tenure_clause().unwrap().is_some());

        let spp = Config::from_preset("spp").unwrap();
        assert_eq!(spp.parcel_field, "LIS_PARCEL_ID");
        assert!(spp.tenure_clause().unwrap().is_none());

        assert!(Config::from_preset("full").is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"zero_range": "error"}"#).unwrap();
        assert_eq!(config.zero_range, ZeroRangePolicy::Error);
        assert_eq!(config.species_fields.len(), 5);
        assert_eq!(config.columns.range_ha, "RANGE_HA");
        assert!(config.tenure_clause().unwrap().is_some());

        let config: Config = serde_json::from_str(r#"{"tenure_filter": null}"#).unwrap();
        assert!(config.tenure_clause().unwrap().is_none());
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join("habitat_overlap_test_config.json");
        std::fs::write(
            &path,
            r#"{"species_fields": ["SCI_NAME"], "tenure_filter": "TENURE = 'Owned'"}"#,
        )
        .unwrap();

        let config = Config::resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(config.species_fields, vec!["SCI_NAME".to_string()]);
        assert_eq!(config.tenure_clause().unwrap().unwrap().field, "TENURE");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_invalid_tenure_filter() {
        let config = Config {
            tenure_filter: Some("PCL_INTERE LIKE 'Fee%'".to_string()),
            ..Config::default()
        };
        assert!(config.tenure_clause().is_err());
    }

    #[test]
    fn test_zero_range_policy_from_str() {
        assert_eq!("null".parse::<ZeroRangePolicy>(), Ok(ZeroRangePolicy::Null));
        assert_eq!("ERROR".parse::<ZeroRangePolicy>(), Ok(ZeroRangePolicy::Error));
        assert!("skip".parse::<ZeroRangePolicy>().is_err());
    }
}
