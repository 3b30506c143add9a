//! # habitat-overlap
//!
//! Surface de terres protégées qui chevauche les aires de répartition des
//! espèces en péril, en hectares et en pourcentage.
//!
//! ## Features
//!
//! - Lecture de couches GeoJSON (CRS `urn:ogc:def:crs:EPSG::<code>`)
//! - Géotraitement avec `geo` (fusion, intersection, surfaces)
//! - Reprojection PROJ (feature `reproject`)
//! - Export CSV et rapport d'exécution JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Surface et pourcentage par espèce
//! habitat-overlap species ./ncc.geojson ./ranges.geojson COSEWIC_ID --output ./out/
//!
//! # Surface d'aire de répartition par parcelle
//! habitat-overlap parcels ./ncc.geojson ./sar.geojson --output ./out/
//! ```

pub mod config;
pub mod engine;
pub mod export;
pub mod filter;
pub mod layer;
pub mod report;
pub mod workflow;

pub use config::{Config, ZeroRangePolicy};
pub use engine::{GeoEngine, Geoprocessor};
pub use layer::Layer;
pub use report::{RunReport, RunStatus};
