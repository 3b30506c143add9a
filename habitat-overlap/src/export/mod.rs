//! Modules d'export (CSV, GeoJSON)

pub mod csv;
pub mod geojson;

pub use self::csv::{write_csv, write_csv_all, CsvTarget};
pub use self::geojson::export_layer;
