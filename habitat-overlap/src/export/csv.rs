//! Export de tables attributaires en CSV
//!
//! Les fichiers complets sont construits en mémoire puis écrits dans des
//! fichiers temporaires renommés à la fin : un traitement interrompu ne
//! laisse jamais de CSV partiel, ni une partie seulement des CSV d'un lot.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::{BufMut, BytesMut};
use overlap::{Table, Value};
use tracing::debug;

const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Texte d'une valeur dans le CSV
///
/// Null → cellule vide, entier → sans décimale, réel à valeur entière → une
/// décimale (`30.0`), autres réels → représentation la plus courte.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Text(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 => {
            format!("{:.1}", n)
        }
        Value::Number(n) => n.to_string(),
    }
}

/// Ajoute un champ, entre guillemets seulement si nécessaire
fn push_csv_field(buf: &mut BytesMut, value: &str) {
    let needs_quotes = value
        .bytes()
        .any(|b| matches!(b, b',' | b'"' | b'\n' | b'\r'));

    if !needs_quotes {
        buf.put_slice(value.as_bytes());
        return;
    }

    buf.put_u8(b'"');
    for b in value.as_bytes() {
        match *b {
            b'"' => buf.put_slice(b"\"\""),
            _ => buf.put_u8(*b),
        }
    }
    buf.put_u8(b'"');
}

fn push_record<'a>(buf: &mut BytesMut, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            buf.put_u8(b',');
        }
        push_csv_field(buf, field);
    }
    buf.put_slice(LINE_TERMINATOR);
}

/// Rend les colonnes `fields` de la table (toutes si vide) en CSV
pub fn render_table(table: &Table, fields: &[&str]) -> Result<BytesMut> {
    let indices: Vec<usize> = if fields.is_empty() {
        (0..table.columns().len()).collect()
    } else {
        fields
            .iter()
            .map(|f| table.require_column(f))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut buf = BytesMut::with_capacity(64 * (table.len() + 1));

    // En-tête : noms demandés, sinon noms de la table
    if fields.is_empty() {
        push_record(&mut buf, table.columns().iter().map(String::as_str));
    } else {
        push_record(&mut buf, fields.iter().copied());
    }

    for row in table.rows() {
        let cells: Vec<String> = indices.iter().map(|&i| format_value(&row[i])).collect();
        push_record(&mut buf, cells.iter().map(String::as_str));
    }

    Ok(buf)
}

/// Un CSV à produire : table, colonnes (toutes si vide) et destination
#[derive(Debug, Clone, Copy)]
pub struct CsvTarget<'a> {
    pub table: &'a Table,
    pub fields: &'a [&'a str],
    pub path: &'a Path,
}

/// Écrit les colonnes `fields` de la table dans un CSV
///
/// Retourne le nombre de lignes de données écrites.
pub fn write_csv(table: &Table, fields: &[&str], output_path: &Path) -> Result<usize> {
    write_csv_all(&[CsvTarget {
        table,
        fields,
        path: output_path,
    }])?;
    Ok(table.len())
}

/// Écrit un lot de CSV en tout ou rien
///
/// Tous les fichiers sont rendus puis écrits en `.tmp` avant le premier
/// renommage ; en cas d'échec les fichiers temporaires sont supprimés et
/// aucune destination n'est créée.
pub fn write_csv_all(targets: &[CsvTarget<'_>]) -> Result<()> {
    let buffers = targets
        .iter()
        .map(|t| render_table(t.table, t.fields))
        .collect::<Result<Vec<_>>>()?;

    for target in targets {
        if let Some(parent) = target.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }
    }

    let tmp_paths: Vec<PathBuf> = targets.iter().map(|t| temp_path(t.path)).collect();
    for (tmp_path, buf) in tmp_paths.iter().zip(&buffers) {
        if let Err(e) = std::fs::write(tmp_path, buf) {
            remove_temp_files(&tmp_paths);
            return Err(e).context(format!("Failed to write file: {}", tmp_path.display()));
        }
    }

    for (target, tmp_path) in targets.iter().zip(&tmp_paths) {
        std::fs::rename(tmp_path, target.path)
            .context(format!("Failed to move file into place: {}", target.path.display()))?;
    }

    for (target, buf) in targets.iter().zip(&buffers) {
        debug!(path = %target.path.display(), rows = target.table.len(), bytes = buf.len(), "CSV written");
    }
    Ok(())
}

fn remove_temp_files(paths: &[PathBuf]) {
    for path in paths {
        std::fs::remove_file(path).ok();
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
