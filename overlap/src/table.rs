//! Table attributaire en mémoire
//!
//! Représentation minimale d'une table de classe d'entités : colonnes
//! nommées, lignes de valeurs. Sert de collaborateur de stockage explicite
//! pour l'agrégation et la jointure (et de fausse table dans les tests).

use std::fmt;

use crate::aggregate::OverlapRecord;
use crate::OverlapError;

/// Valeur d'un attribut
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Number(f64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Représentation textuelle d'une clé de jointure
    ///
    /// Les nombres entiers sont écrits sans partie décimale (`42`, pas `42.0`).
    pub fn to_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Value::Number(n) => Some(n.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Table attributaire : colonnes nommées et lignes de valeurs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Crée une table vide avec les colonnes données
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index d'une colonne (comparaison insensible à la casse, comme les
    /// noms de champs d'une géodatabase)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    /// Index d'une colonne, ou erreur si elle est absente
    pub fn require_column(&self, name: &str) -> Result<usize, OverlapError> {
        self.column_index(name)
            .ok_or_else(|| OverlapError::MissingField(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Ajoute une ligne (le nombre de valeurs doit correspondre aux colonnes)
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<(), OverlapError> {
        if values.len() != self.columns.len() {
            return Err(OverlapError::RowLength {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        self.rows.push(values);
        Ok(())
    }

    /// Ajoute un champ, initialisé à `Null` sur toutes les lignes
    pub fn add_field(&mut self, name: &str) -> Result<usize, OverlapError> {
        if self.has_column(name) {
            return Err(OverlapError::DuplicateField(name.to_string()));
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        Ok(self.columns.len() - 1)
    }

    /// Valeur d'une cellule
    pub fn get(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Écrit une cellule
    pub fn set(&mut self, row: usize, column: usize, value: Value) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value;
        }
    }

    /// Lit un nombre, en échouant sur une valeur nulle ou non numérique
    pub fn number(&self, row: usize, column: usize) -> Result<f64, OverlapError> {
        match self.get(row, column) {
            Some(Value::Number(n)) => Ok(*n),
            Some(Value::Integer(i)) => Ok(*i as f64),
            Some(Value::Null) | None => Err(OverlapError::null_value(&self.columns[column], row)),
            Some(Value::Text(s)) => Err(OverlapError::invalid_value(
                &self.columns[column],
                row,
                format!("expected a number, got text '{}'", s),
            )),
        }
    }

    /// Lit une clé de jointure, en échouant sur une valeur nulle
    pub fn key(&self, row: usize, column: usize) -> Result<String, OverlapError> {
        self.get(row, column)
            .and_then(Value::to_key)
            .ok_or_else(|| OverlapError::null_value(&self.columns[column], row))
    }

    /// Parcourt les lignes comme fragments (clé, surface en m²)
    ///
    /// Une ligne mal formée produit une erreur à sa position : l'agrégation
    /// qui consomme l'itérateur s'arrête dessus.
    pub fn overlap_records<'a>(
        &'a self,
        key_field: &str,
        area_field: &str,
    ) -> Result<impl Iterator<Item = Result<OverlapRecord, OverlapError>> + 'a, OverlapError> {
        let key_idx = self.require_column(key_field)?;
        let area_idx = self.require_column(area_field)?;

        Ok((0..self.rows.len()).map(move |row| {
            let key = self.key(row, key_idx)?;
            let area = self.number(row, area_idx)?;
            Ok(OverlapRecord { key, area })
        }))
    }

    /// Garde uniquement les lignes pour lesquelles `keep` est vrai
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Value]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Garde les lignes dont l'entrée du masque est vraie (lignes au-delà
    /// du masque supprimées)
    pub fn retain_mask(&mut self, mask: &[bool]) {
        let mut idx = 0;
        self.rows.retain(|_| {
            let keep = mask.get(idx).copied().unwrap_or(false);
            idx += 1;
            keep
        });
    }

    /// Nouvelle table limitée à certaines colonnes, dans l'ordre demandé
    pub fn select(&self, fields: &[&str]) -> Result<Table, OverlapError> {
        let indices = fields
            .iter()
            .map(|f| self.require_column(f))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Table {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }
}
