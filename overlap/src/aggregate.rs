//! Agrégation des surfaces de chevauchement par clé de jointure
//!
//! Une intersection spatiale many-to-many produit un fragment par paire de
//! géométries qui se chevauchent. Ce module additionne les surfaces des
//! fragments par clé (code espèce, identifiant de parcelle...).
//!
//! Chaque fragment est converti en hectares puis arrondi à 2 décimales
//! **avant** d'être additionné. Arrondir la somme donnerait un résultat
//! légèrement différent : l'écart peut atteindre un demi-centième
//! d'hectare par fragment. L'arrondi par fragment est conservé pour rester
//! identique aux rapports déjà produits.

use std::collections::hash_map::{self, HashMap};

use rayon::prelude::*;
use tracing::debug;

use crate::units::hectares_rounded;

/// Un fragment d'intersection : clé de jointure et surface en m²
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapRecord {
    /// Clé de jointure (code espèce, identifiant de parcelle...)
    pub key: String,

    /// Surface du fragment dans l'unité native du moteur (m²)
    pub area: f64,
}

impl OverlapRecord {
    pub fn new(key: impl Into<String>, area: f64) -> Self {
        Self {
            key: key.into(),
            area,
        }
    }
}

/// Surfaces totales (hectares) par clé
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaTotals {
    totals: HashMap<String, f64>,
}

impl AreaTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute un fragment (m²) au total de sa clé
    pub fn add(&mut self, key: &str, area: f64) {
        let hectares = hectares_rounded(area);
        match self.totals.get_mut(key) {
            Some(total) => *total += hectares,
            None => {
                self.totals.insert(key.to_string(), hectares);
            }
        }
    }

    /// Total en hectares pour une clé
    pub fn get(&self, key: &str) -> Option<f64> {
        self.totals.get(key).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.totals.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Somme de tous les totaux
    pub fn sum(&self) -> f64 {
        self.totals.values().sum()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, f64> {
        self.totals.iter()
    }

    /// Fusionne un total partiel en additionnant les clés communes
    ///
    /// Les valeurs sont déjà arrondies par fragment : la fusion n'arrondit
    /// rien de plus.
    pub fn merge(&mut self, other: AreaTotals) {
        for (key, hectares) in other.totals {
            *self.totals.entry(key).or_insert(0.0) += hectares;
        }
    }
}

impl IntoIterator for AreaTotals {
    type Item = (String, f64);
    type IntoIter = hash_map::IntoIter<String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.totals.into_iter()
    }
}

impl<'a> IntoIterator for &'a AreaTotals {
    type Item = (&'a String, &'a f64);
    type IntoIter = hash_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.totals.iter()
    }
}

impl FromIterator<OverlapRecord> for AreaTotals {
    fn from_iter<I: IntoIterator<Item = OverlapRecord>>(iter: I) -> Self {
        aggregate(iter)
    }
}

/// Agrège une séquence de fragments en surfaces totales par clé
///
/// Une séquence vide donne un résultat vide.
pub fn aggregate<I>(records: I) -> AreaTotals
where
    I: IntoIterator<Item = OverlapRecord>,
{
    let mut totals = AreaTotals::new();
    let mut count = 0usize;
    for record in records {
        totals.add(&record.key, record.area);
        count += 1;
    }
    debug!(records = count, keys = totals.len(), "Aggregated overlap areas");
    totals
}

/// Agrège une séquence faillible (lecture d'une table amont)
///
/// La première erreur interrompt le passage : aucun résultat partiel n'est
/// retourné.
pub fn try_aggregate<I, E>(records: I) -> Result<AreaTotals, E>
where
    I: IntoIterator<Item = Result<OverlapRecord, E>>,
{
    let mut totals = AreaTotals::new();
    let mut count = 0usize;
    for record in records {
        let record = record?;
        totals.add(&record.key, record.area);
        count += 1;
    }
    debug!(records = count, keys = totals.len(), "Aggregated overlap areas");
    Ok(totals)
}

/// Agrégation parallèle par shards (rayon)
///
/// Chaque shard construit un total partiel, fusionné ensuite par somme des
/// clés communes. Les arrondis par fragment sont identiques au passage
/// séquentiel ; seul l'ordre des additions change, ce qui peut déplacer le
/// dernier bit d'un total.
pub fn par_aggregate(records: &[OverlapRecord]) -> AreaTotals {
    let totals = records
        .par_iter()
        .fold(AreaTotals::new, |mut acc, record| {
            acc.add(&record.key, record.area);
            acc
        })
        .reduce(AreaTotals::new, |mut a, b| {
            a.merge(b);
            a
        });
    debug!(
        records = records.len(),
        keys = totals.len(),
        "Aggregated overlap areas (parallel)"
    );
    totals
}
