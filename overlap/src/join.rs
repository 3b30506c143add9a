//! Jointure des surfaces agrégées sur une table cible
//!
//! Chaque ligne cible reçoit le total de sa clé, ou `0` si la clé n'a aucun
//! chevauchement. Seul le champ désigné est écrit.

use tracing::debug;

use crate::aggregate::AreaTotals;
use crate::table::{Table, Value};
use crate::OverlapError;

/// Ligne d'une table cible adressable par clé
pub trait TargetRow {
    /// Clé de jointure de la ligne
    fn join_key(&self) -> &str;

    /// Écrit la surface jointe (hectares) dans le champ désigné
    fn set_overlap(&mut self, hectares: f64);
}

/// Ligne cible simple : clé et valeur optionnelle
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedValue {
    pub key: String,
    pub value: Option<f64>,
}

impl KeyedValue {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

impl TargetRow for KeyedValue {
    fn join_key(&self) -> &str {
        &self.key
    }

    fn set_overlap(&mut self, hectares: f64) {
        self.value = Some(hectares);
    }
}

/// Compteurs d'une jointure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Lignes dont la clé a un total
    pub matched: usize,
    /// Lignes sans chevauchement, mises à 0
    pub defaulted: usize,
}

impl JoinStats {
    pub fn total(&self) -> usize {
        self.matched + self.defaulted
    }

    /// Valeur à écrire pour `key`, comptée comme trouvée ou par défaut
    fn resolve(&mut self, totals: &AreaTotals, key: &str) -> f64 {
        if totals.contains_key(key) {
            self.matched += 1;
        } else {
            self.defaulted += 1;
        }
        lookup(totals, key)
    }
}

/// Valeur jointe pour une clé : le total, ou 0 si absente
pub fn lookup(totals: &AreaTotals, key: &str) -> f64 {
    totals.get(key).unwrap_or(0.0)
}

/// Joint les totaux sur une séquence de lignes cibles
///
/// Retourne les lignes mises à jour, dans l'ordre d'entrée et en même
/// nombre.
pub fn join<R, I>(totals: &AreaTotals, targets: I) -> Vec<R>
where
    R: TargetRow,
    I: IntoIterator<Item = R>,
{
    let mut stats = JoinStats::default();
    let rows: Vec<R> = targets
        .into_iter()
        .map(|mut row| {
            let total = stats.resolve(totals, row.join_key());
            row.set_overlap(total);
            row
        })
        .collect();
    debug!(matched = stats.matched, defaulted = stats.defaulted, "Joined overlap totals");
    rows
}

/// Joint les totaux en place sur une tranche de lignes cibles
pub fn join_in_place<R: TargetRow>(totals: &AreaTotals, targets: &mut [R]) -> JoinStats {
    let mut stats = JoinStats::default();
    for row in targets.iter_mut() {
        let total = stats.resolve(totals, row.join_key());
        row.set_overlap(total);
    }
    stats
}

/// Joint les totaux sur une table attributaire
///
/// `key_field` identifie la clé, `value_field` reçoit la surface. Une clé
/// nulle dans la table cible est une erreur amont.
pub fn join_table(
    totals: &AreaTotals,
    table: &mut Table,
    key_field: &str,
    value_field: &str,
) -> Result<JoinStats, OverlapError> {
    let key_idx = table.require_column(key_field)?;
    let value_idx = table.require_column(value_field)?;

    // Lecture complète des clés avant toute écriture : pas de table
    // partiellement jointe en cas d'erreur
    let keys = (0..table.len())
        .map(|row| table.key(row, key_idx))
        .collect::<Result<Vec<_>, _>>()?;

    let mut stats = JoinStats::default();
    for (row, key) in keys.iter().enumerate() {
        let total = stats.resolve(totals, key);
        table.set(row, value_idx, Value::Number(total));
    }

    debug!(
        field = value_field,
        matched = stats.matched,
        defaulted = stats.defaulted,
        "Joined overlap totals"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, OverlapRecord};

    fn totals_a() -> AreaTotals {
        aggregate(vec![OverlapRecord::new("A", 15_000.0)])
    }

    #[test]
    fn test_join_example() {
        let rows = join(&totals_a(), vec![KeyedValue::new("A"), KeyedValue::new("C")]);

        assert_eq!(
            rows,
            vec![
                KeyedValue {
                    key: "A".to_string(),
                    value: Some(1.5)
                },
                KeyedValue {
                    key: "C".to_string(),
                    value: Some(0.0)
                },
            ]
        );
    }

    #[test]
    fn test_join_preserves_length_and_order() {
        let targets: Vec<_> = ["C", "A", "A", "B"].iter().map(|k| KeyedValue::new(*k)).collect();
        let rows = join(&totals_a(), targets.clone());

        assert_eq!(rows.len(), targets.len());
        let keys: Vec<_> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["C", "A", "A", "B"]);
    }

    #[test]
    fn test_join_empty_totals() {
        let rows = join(&AreaTotals::new(), vec![KeyedValue::new("A")]);
        assert_eq!(rows[0].value, Some(0.0));
    }

    #[test]
    fn test_join_in_place_stats() {
        let mut rows = vec![KeyedValue::new("A"), KeyedValue::new("B"), KeyedValue::new("A")];
        let stats = join_in_place(&totals_a(), &mut rows);

        assert_eq!(stats.matched, 2);
        assert_eq!(stats.defaulted, 1);
        assert_eq!(stats.total(), 3);
        assert_eq!(rows[1].value, Some(0.0));
    }

    #[test]
    fn test_join_table_only_touches_value_field() {
        let mut table = Table::new(["ID", "NAME", "HA"]);
        table
            .push_row(vec!["A".into(), "Species A".into(), Value::Null])
            .unwrap();
        table
            .push_row(vec!["C".into(), "Species C".into(), Value::Null])
            .unwrap();

        let stats = join_table(&totals_a(), &mut table, "ID", "HA").unwrap();

        assert_eq!(stats, JoinStats { matched: 1, defaulted: 1 });
        assert_eq!(table.get(0, 2), Some(&Value::Number(1.5)));
        assert_eq!(table.get(1, 2), Some(&Value::Number(0.0)));
        assert_eq!(table.get(0, 1), Some(&Value::from("Species A")));
        assert_eq!(table.get(1, 0), Some(&Value::from("C")));
    }

    #[test]
    fn test_join_table_null_key_leaves_table_untouched() {
        let mut table = Table::new(["ID", "HA"]);
        table.push_row(vec!["A".into(), Value::Null]).unwrap();
        table.push_row(vec![Value::Null, Value::Null]).unwrap();

        let result = join_table(&totals_a(), &mut table, "ID", "HA");

        assert!(matches!(result, Err(OverlapError::NullValue { row: 1, .. })));
        assert!(table.get(0, 1).unwrap().is_null());
    }

    #[test]
    fn test_lookup_default() {
        assert_eq!(lookup(&totals_a(), "A"), 1.5);
        assert_eq!(lookup(&totals_a(), "Z"), 0.0);
    }

    #[test]
    fn test_stats_follow_lookup() {
        let totals = totals_a();
        let mut stats = JoinStats::default();
        assert_eq!(stats.resolve(&totals, "A"), lookup(&totals, "A"));
        assert_eq!(stats.resolve(&totals, "Z"), 0.0);
        assert_eq!(stats, JoinStats { matched: 1, defaulted: 1 });
    }
}
