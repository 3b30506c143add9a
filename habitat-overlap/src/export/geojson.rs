//! Export des couches intermédiaires vers GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geo::{Geometry, MultiPolygon};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use overlap::Value;

use crate::layer::Layer;

/// Exporte une couche en GeoJSON
pub fn export_layer(layer: &Layer, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);

    // Header FeatureCollection avec CRS
    write!(writer, r#"{{"type":"FeatureCollection","#)?;
    if let Some(epsg) = layer.epsg {
        write!(
            writer,
            r#""crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"#,
            epsg
        )?;
    }
    write!(writer, r#""features":["#)?;

    for (i, geometry) in layer.geometries.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(&mut writer, geometry, layer.table.columns(), &layer.table.rows()[i])?;
    }

    write!(writer, "]}}")?;
    writer.flush()?;

    Ok(())
}

/// Écrit une entité en GeoJSON
fn write_feature<W: Write>(
    writer: &mut W,
    geometry: &MultiPolygon,
    columns: &[String],
    values: &[Value],
) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","geometry":"#)?;

    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    Geometry::MultiPolygon(geometry.clone()).process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    write!(writer, r#","properties":{{"#)?;
    for (i, (key, value)) in columns.iter().zip(values).enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        serde_json::to_writer(&mut *writer, key)?;
        write!(writer, ":")?;
        match value {
            Value::Null => write!(writer, "null")?,
            Value::Text(s) => serde_json::to_writer(&mut *writer, s)?,
            Value::Integer(n) => write!(writer, "{}", n)?,
            Value::Number(n) if n.is_finite() => write!(writer, "{}", n)?,
            Value::Number(_) => write!(writer, "null")?,
        }
    }
    write!(writer, "}}}}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Polygon};

    fn sample_layer() -> Layer {
        let p: Polygon = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 0.0)];
        let mut layer = Layer::new("ranges", Some(3978), &["ID", "NAME", "HA"]);
        layer
            .push(
                MultiPolygon::new(vec![p]),
                vec!["A".into(), "Say \"hi\"".into(), Value::Number(1.5)],
            )
            .unwrap();
        layer
    }

    #[test]
    fn test_special_characters_reload() {
        let p: Polygon = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let text = "line\nbreak\ttab \\ \u{1} \"quoted\"";
        let mut layer = Layer::new("special", None, &["NOTE \"A\"", "N"]);
        layer
            .push(MultiPolygon::new(vec![p]), vec![text.into(), Value::Number(f64::NAN)])
            .unwrap();

        let path = std::env::temp_dir().join("habitat_overlap_export_special.geojson");
        export_layer(&layer, &path).unwrap();

        let reloaded = Layer::read_geojson(&path).unwrap();
        assert_eq!(reloaded.epsg, None);
        let note = reloaded.table.require_column("NOTE \"A\"").unwrap();
        assert_eq!(reloaded.table.get(0, note), Some(&Value::from(text)));
        let n = reloaded.table.require_column("N").unwrap();
        assert!(reloaded.table.get(0, n).unwrap().is_null());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_export_reload() {
        let path = std::env::temp_dir().join("habitat_overlap_export_test.geojson");
        export_layer(&sample_layer(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(r#""type":"FeatureCollection""#));
        assert!(content.contains("EPSG::3978"));
        assert!(content.contains("MultiPolygon"));

        let reloaded = Layer::read_geojson(&path).unwrap();
        assert_eq!(reloaded.epsg, Some(3978));
        assert_eq!(reloaded.len(), 1);
        let name = reloaded.table.require_column("NAME").unwrap();
        assert_eq!(reloaded.table.get(0, name), Some(&Value::from("Say \"hi\"")));

        std::fs::remove_file(path).ok();
    }
}
