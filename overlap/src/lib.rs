//! # overlap
//!
//! Agrégation des surfaces de chevauchement entre des aires protégées et des
//! aires de répartition d'espèces en péril.
//!
//! ## Features
//!
//! - Somme des fragments d'intersection par clé (m² → hectares, arrondi par fragment)
//! - Jointure des totaux sur une table cible, avec 0 par défaut
//! - Pourcentage avec erreur explicite sur dénominateur nul
//! - Agrégation parallèle optionnelle (rayon)
//!
//! Les opérations géométriques (projection, intersection, fusion, calcul des
//! surfaces) restent à la charge du moteur géospatial appelant.
//!
//! ## Usage
//!
//! ```rust
//! use overlap::{aggregate, join, KeyedValue, OverlapRecord};
//!
//! let totals = aggregate(vec![
//!     OverlapRecord::new("A", 10_000.0),
//!     OverlapRecord::new("A", 5_000.0),
//!     OverlapRecord::new("B", 20_000.0),
//! ]);
//! assert_eq!(totals.get("A"), Some(1.5));
//!
//! let rows = join(&totals, vec![KeyedValue::new("A"), KeyedValue::new("C")]);
//! assert_eq!(rows[1].value, Some(0.0));
//! ```

pub mod aggregate;
pub mod error;
pub mod join;
pub mod table;
pub mod units;

pub use aggregate::{aggregate, par_aggregate, try_aggregate, AreaTotals, OverlapRecord};
pub use error::OverlapError;
pub use join::{join, join_in_place, join_table, lookup, JoinStats, KeyedValue, TargetRow};
pub use table::{Table, Value};
pub use units::{hectares_rounded, percentage, round_to, square_meters_to_hectares};
