//! Types d'erreurs pour le crate overlap

use thiserror::Error;

/// Erreurs pouvant survenir pendant l'agrégation ou la jointure
#[derive(Debug, Error)]
pub enum OverlapError {
    /// Pourcentage demandé avec un dénominateur nul
    #[error("Division by zero: cannot compute percentage of {numerator} over 0")]
    DivisionByZero { numerator: f64 },

    /// Champ absent de la table
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Valeur nulle là où une clé ou une surface est attendue
    #[error("Null value in field {field} (row {row})")]
    NullValue { field: String, row: usize },

    /// Valeur présente mais du mauvais type
    #[error("Invalid value in field {field} (row {row}): {reason}")]
    InvalidValue {
        field: String,
        row: usize,
        reason: String,
    },

    /// Le champ existe déjà dans la table
    #[error("Field already exists: {0}")]
    DuplicateField(String),

    /// Nombre de valeurs incohérent avec le nombre de colonnes
    #[error("Row has {actual} values, table has {expected} columns")]
    RowLength { expected: usize, actual: usize },
}

impl OverlapError {
    /// Crée une erreur de valeur invalide avec contexte
    pub fn invalid_value(field: impl Into<String>, row: usize, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            row,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de valeur nulle
    pub fn null_value(field: impl Into<String>, row: usize) -> Self {
        Self::NullValue {
            field: field.into(),
            row,
        }
    }

    /// Vrai si l'erreur provient d'une ligne amont mal formée
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_) | Self::NullValue { .. } | Self::InvalidValue { .. }
        )
    }
}
