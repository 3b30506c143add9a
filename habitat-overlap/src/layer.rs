//! Couches polygonales : géométries et table attributaire
//!
//! Les couches sont lues depuis des FeatureCollection GeoJSON. Le système de
//! coordonnées est pris dans le membre `crs`
//! (`urn:ogc:def:crs:EPSG::<code>`), celui qu'écrit l'export GeoJSON.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use geo::{Geometry, MultiPolygon};
use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue};
use overlap::{Table, Value};
use regex::Regex;
use tracing::{debug, warn};

/// Couche polygonale en mémoire
#[derive(Debug, Clone, Default)]
pub struct Layer {
    /// Nom de la couche (nom de fichier sans extension)
    pub name: String,

    /// Code EPSG du système de coordonnées, si connu
    pub epsg: Option<u32>,

    /// Une géométrie par ligne de `table`
    pub geometries: Vec<MultiPolygon>,

    /// Attributs
    pub table: Table,
}

impl Layer {
    /// Crée une couche vide avec les colonnes données
    pub fn new(name: &str, epsg: Option<u32>, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            epsg,
            geometries: Vec::new(),
            table: Table::new(columns.iter().copied()),
        }
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Ajoute une entité
    pub fn push(&mut self, geometry: MultiPolygon, values: Vec<Value>) -> Result<()> {
        self.table.push_row(values)?;
        self.geometries.push(geometry);
        Ok(())
    }

    /// Garde les entités dont l'entrée du masque est vraie
    pub fn retain_mask(&mut self, mask: &[bool]) {
        let mut idx = 0;
        self.geometries.retain(|_| {
            let keep = mask.get(idx).copied().unwrap_or(false);
            idx += 1;
            keep
        });
        self.table.retain_mask(mask);
    }

    /// Lit une couche GeoJSON
    pub fn read_geojson(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layer: {}", path.display()))?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("layer")
            .to_string();

        let layer = Self::from_geojson_str(&name, &content)
            .with_context(|| format!("Failed to load layer: {}", path.display()))?;

        debug!(
            layer = %layer.name,
            features = layer.len(),
            epsg = ?layer.epsg,
            "Layer loaded"
        );
        Ok(layer)
    }

    /// Construit une couche depuis un texte GeoJSON
    pub fn from_geojson_str(name: &str, content: &str) -> Result<Self> {
        let geojson: GeoJson = content.parse().context("Invalid GeoJSON")?;

        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            GeoJson::Feature(f) => FeatureCollection {
                bbox: None,
                features: vec![f],
                foreign_members: None,
            },
            GeoJson::Geometry(_) => bail!("Expected a Feature or FeatureCollection, got a bare geometry"),
        };

        let epsg = collection
            .foreign_members
            .as_ref()
            .and_then(crs_epsg);

        // Colonnes : ordre de première apparition
        let mut columns: Vec<String> = Vec::new();
        for feature in &collection.features {
            if let Some(props) = &feature.properties {
                for key in props.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
            }
        }

        let mut layer = Layer {
            name: name.to_string(),
            epsg,
            geometries: Vec::with_capacity(collection.features.len()),
            table: Table::new(columns.iter().cloned()),
        };

        let mut skipped = 0usize;
        for (idx, feature) in collection.features.into_iter().enumerate() {
            let Some(geometry) = feature.geometry else {
                skipped += 1;
                continue;
            };

            let geometry = Geometry::<f64>::try_from(geometry.value)
                .with_context(|| format!("Invalid geometry for feature {}", idx))?;
            let multipolygon = to_multipolygon(geometry)
                .with_context(|| format!("Feature {} is not polygonal", idx))?;

            let values = columns
                .iter()
                .map(|c| {
                    feature
                        .properties
                        .as_ref()
                        .and_then(|p| p.get(c))
                        .map(json_to_value)
                        .unwrap_or(Value::Null)
                })
                .collect();

            layer.push(multipolygon, values)?;
        }

        if skipped > 0 {
            warn!(layer = name, skipped = skipped, "Features without geometry skipped");
        }

        Ok(layer)
    }
}

/// Convertit une géométrie polygonale en multipolygone
pub fn to_multipolygon(geometry: Geometry) -> Result<MultiPolygon> {
    match geometry {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Ok(mp),
        Geometry::Rect(r) => Ok(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Ok(MultiPolygon::new(vec![t.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let mut polys = Vec::new();
            for g in gc {
                polys.extend(to_multipolygon(g)?.0);
            }
            Ok(MultiPolygon::new(polys))
        }
        other => bail!("Unsupported geometry type: {}", geometry_type(&other)),
    }
}

fn geometry_type(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        _ => "Polygon",
    }
}

/// Convertit une valeur JSON en valeur d'attribut
pub fn json_to_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Number))
            .unwrap_or(Value::Null),
        JsonValue::Bool(b) => Value::Text(b.to_string()),
        other => Value::Text(other.to_string()),
    }
}

/// Extrait le code EPSG du membre `crs` d'une FeatureCollection
fn crs_epsg(members: &JsonObject) -> Option<u32> {
    let name = members.get("crs")?.get("properties")?.get("name")?.as_str()?;
    parse_epsg(name)
}

/// Code EPSG depuis un nom de CRS (`urn:ogc:def:crs:EPSG::3978`, `EPSG:3978`)
pub fn parse_epsg(name: &str) -> Option<u32> {
    static EPSG_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = EPSG_RE
        .get_or_init(|| Regex::new(r"(?i)EPSG:(?:[\d.]*:)?(\d+)$").ok())
        .as_ref()?;
    re.captures(name.trim())?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3978"}},
        "features": [
            {"type": "Feature",
             "properties": {"ID": "A", "HA": 1.5},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[100,0],[100,100],[0,100],[0,0]]]}},
            {"type": "Feature",
             "properties": {"ID": 42, "NAME": null},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[0,0],[10,0],[10,10],[0,0]]]]}},
            {"type": "Feature", "properties": {"ID": "none"}, "geometry": null}
        ]
    }"#;

    #[test]
    fn test_from_geojson_str() {
        let layer = Layer::from_geojson_str("sample", SAMPLE).unwrap();

        assert_eq!(layer.epsg, Some(3978));
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.table.len(), 2);
        assert!(layer.table.has_column("ID"));
        assert!(layer.table.has_column("NAME"));

        let id = layer.table.require_column("ID").unwrap();
        assert_eq!(layer.table.key(1, id).unwrap(), "42");
        assert_eq!(layer.table.get(1, id), Some(&Value::Integer(42)));
        let ha = layer.table.require_column("HA").unwrap();
        assert_eq!(layer.table.get(0, ha), Some(&Value::Number(1.5)));
        let name = layer.table.require_column("NAME").unwrap();
        assert!(layer.table.get(0, name).unwrap().is_null());
    }

    #[test]
    fn test_columns_keep_source_order() {
        let content = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"ZULU": 1, "ALPHA": 2, "MIKE": 3},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}},
            {"type": "Feature", "properties": {"MIKE": 4, "BRAVO": 5},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}
        ]}"#;
        let layer = Layer::from_geojson_str("ordered", content).unwrap();
        assert_eq!(layer.table.columns(), &["ZULU", "ALPHA", "MIKE", "BRAVO"]);

        let bravo = layer.table.require_column("BRAVO").unwrap();
        assert!(layer.table.get(0, bravo).unwrap().is_null());
        assert_eq!(layer.table.get(1, bravo), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_point_rejected() {
        let content = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1, 2]}}
        ]}"#;
        assert!(Layer::from_geojson_str("points", content).is_err());
    }

    #[test]
    fn test_parse_epsg() {
        assert_eq!(parse_epsg("urn:ogc:def:crs:EPSG::3978"), Some(3978));
        assert_eq!(parse_epsg("urn:ogc:def:crs:EPSG:9.9.1:102001"), Some(102001));
        assert_eq!(parse_epsg("EPSG:4326"), Some(4326));
        assert_eq!(parse_epsg("urn:ogc:def:crs:OGC:1.3:CRS84"), None);
    }

    #[test]
    fn test_retain_mask() {
        let mut layer = Layer::from_geojson_str("sample", SAMPLE).unwrap();
        layer.retain_mask(&[false, true]);
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.table.len(), 1);
    }

    #[test]
    fn test_missing_crs() {
        let content = r#"{"type": "FeatureCollection", "features": []}"#;
        let layer = Layer::from_geojson_str("empty", content).unwrap();
        assert_eq!(layer.epsg, None);
        assert!(layer.is_empty());
    }
}
