//! Filtre attributaire de type `CHAMP = 'valeur'`
//!
//! Seule l'égalité (ou la différence `<>`) entre un champ et un littéral est
//! supportée : c'est tout ce dont les workflows ont besoin
//! (`PCL_INTERE = 'Fee Simple'`).

use std::fmt;
use std::str::FromStr;

use overlap::{Table, Value};
use regex::Regex;
use thiserror::Error;

/// Erreurs de filtre
#[derive(Debug, Error)]
pub enum FilterError {
    /// Clause illisible
    #[error("Invalid where clause: '{0}'. Expected FIELD = 'value'")]
    Syntax(String),

    /// Champ absent de la table filtrée
    #[error("Field not found for where clause: {0}")]
    UnknownField(String),
}

/// Opérateur de comparaison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
}

/// Littéral comparé
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(f64),
}

/// Clause `CHAMP op littéral`
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub field: String,
    pub operator: Operator,
    pub literal: Literal,
}

impl FromStr for WhereClause {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = Regex::new(
            r#"^\s*"?([A-Za-z_][A-Za-z0-9_]*)"?\s*(=|<>|!=)\s*(?:'((?:[^']|'')*)'|(-?\d+(?:\.\d+)?))\s*$"#,
        )
        .map_err(|_| FilterError::Syntax(s.to_string()))?;

        let caps = re
            .captures(s)
            .ok_or_else(|| FilterError::Syntax(s.to_string()))?;

        let field = caps[1].to_string();
        let operator = match &caps[2] {
            "=" => Operator::Equal,
            _ => Operator::NotEqual,
        };

        let literal = if let Some(text) = caps.get(3) {
            Literal::Text(text.as_str().replace("''", "'"))
        } else if let Some(number) = caps.get(4) {
            let n = number
                .as_str()
                .parse()
                .map_err(|_| FilterError::Syntax(s.to_string()))?;
            Literal::Number(n)
        } else {
            return Err(FilterError::Syntax(s.to_string()));
        };

        Ok(Self {
            field,
            operator,
            literal,
        })
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.operator {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
        };
        match &self.literal {
            Literal::Text(t) => write!(f, "{} {} '{}'", self.field, op, t.replace('\'', "''")),
            Literal::Number(n) => write!(f, "{} {} {}", self.field, op, n),
        }
    }
}

impl WhereClause {
    /// Vrai si la valeur satisfait la clause (une valeur nulle ne satisfait
    /// jamais la clause, comme en SQL)
    pub fn matches(&self, value: &Value) -> bool {
        let equal = match (&self.literal, value) {
            (_, Value::Null) => return false,
            (Literal::Text(t), Value::Text(v)) => t == v,
            (Literal::Text(t), other) => t.parse::<f64>().ok() == other.as_f64(),
            (Literal::Number(n), Value::Text(v)) => v.parse::<f64>().map_or(false, |x| x == *n),
            (Literal::Number(n), other) => other.as_f64() == Some(*n),
        };
        match self.operator {
            Operator::Equal => equal,
            Operator::NotEqual => !equal,
        }
    }

    /// Masque de sélection sur une table
    pub fn mask(&self, table: &Table) -> Result<Vec<bool>, FilterError> {
        let idx = table
            .column_index(&self.field)
            .ok_or_else(|| FilterError::UnknownField(self.field.clone()))?;

        Ok(table
            .rows()
            .iter()
            .map(|row| self.matches(&row[idx]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fee_simple() {
        let clause: WhereClause = "PCL_INTERE = 'Fee Simple'".parse().unwrap();
        assert_eq!(clause.field, "PCL_INTERE");
        assert_eq!(clause.operator, Operator::Equal);
        assert_eq!(clause.literal, Literal::Text("Fee Simple".to_string()));
    }

    #[test]
    fn test_parse_variants() {
        let clause: WhereClause = "\"STATUS\" <> 'Owner''s land'".parse().unwrap();
        assert_eq!(clause.operator, Operator::NotEqual);
        assert_eq!(clause.literal, Literal::Text("Owner's land".to_string()));

        let clause: WhereClause = "YEAR=2023".parse().unwrap();
        assert_eq!(clause.literal, Literal::Number(2023.0));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("PCL_INTERE LIKE 'Fee%'".parse::<WhereClause>().is_err());
        assert!("= 'Fee Simple'".parse::<WhereClause>().is_err());
        assert!("".parse::<WhereClause>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let clause: WhereClause = "PCL_INTERE = 'Fee Simple'".parse().unwrap();
        assert_eq!(clause.to_string(), "PCL_INTERE = 'Fee Simple'");
    }

    #[test]
    fn test_mask() {
        let mut table = Table::new(["ID", "PCL_INTERE"]);
        table.push_row(vec!["1".into(), "Fee Simple".into()]).unwrap();
        table.push_row(vec!["2".into(), "Conservation Agreement".into()]).unwrap();
        table.push_row(vec!["3".into(), Value::Null]).unwrap();

        let clause: WhereClause = "PCL_INTERE = 'Fee Simple'".parse().unwrap();
        assert_eq!(clause.mask(&table).unwrap(), vec![true, false, false]);

        let clause: WhereClause = "pcl_intere <> 'Fee Simple'".parse().unwrap();
        assert_eq!(clause.mask(&table).unwrap(), vec![false, true, false]);

        let clause: WhereClause = "ID = 2".parse().unwrap();
        assert_eq!(clause.mask(&table).unwrap(), vec![false, true, false]);

        let clause: WhereClause = "TENURE = 'Fee Simple'".parse().unwrap();
        assert!(matches!(clause.mask(&table), Err(FilterError::UnknownField(_))));
    }
}
