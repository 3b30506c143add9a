//! Reprojection des couches avec PROJ
//!
//! Ce module est disponible uniquement avec le feature `reproject`.

#[cfg(feature = "reproject")]
use anyhow::{Context, Result};
#[cfg(feature = "reproject")]
use geo::{Coord, LineString, MultiPolygon, Polygon};
#[cfg(feature = "reproject")]
use proj::Proj;

/// Reprojection de polygones entre deux systèmes de coordonnées
#[cfg(feature = "reproject")]
pub struct Reprojector {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

#[cfg(feature = "reproject")]
impl Reprojector {
    /// Crée un nouveau reprojector entre deux EPSG
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&source, &target, None).context(format!(
            "Failed to create projection from {} to {}",
            source, target
        ))?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    /// Transforme un multipolygone
    pub fn transform(&self, geom: &MultiPolygon) -> Result<MultiPolygon> {
        if self.source_epsg == self.target_epsg {
            return Ok(geom.clone());
        }

        let polys: Result<Vec<Polygon>> = geom.0.iter().map(|p| self.transform_polygon(p)).collect();
        Ok(MultiPolygon::new(polys?))
    }

    /// Transforme une LineString (conversion par lot)
    fn transform_linestring(&self, ls: &LineString) -> Result<LineString> {
        let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();

        self.proj
            .convert_array(&mut coords)
            .context("Batch coordinate transformation failed")?;

        let result: Vec<Coord> = coords.into_iter().map(|(x, y)| Coord { x, y }).collect();
        Ok(LineString::new(result))
    }

    fn transform_polygon(&self, p: &Polygon) -> Result<Polygon> {
        let exterior = self.transform_linestring(p.exterior())?;
        let interiors: Result<Vec<LineString>> = p
            .interiors()
            .iter()
            .map(|ls| self.transform_linestring(ls))
            .collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}

#[cfg(feature = "reproject")]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgs84_to_canada_albers() {
        // Petit carré près d'Ottawa
        let reprojector = Reprojector::new(4326, 3978).unwrap();
        let square = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![
                (-75.70, 45.40),
                (-75.69, 45.40),
                (-75.69, 45.41),
                (-75.70, 45.41),
                (-75.70, 45.40),
            ]),
            vec![],
        )]);

        let result = reprojector.transform(&square).unwrap();
        let first = result.0[0].exterior().0[0];
        // Coordonnées métriques, loin des degrés
        assert!(first.x.abs() > 1_000.0 || first.y.abs() > 1_000.0);
        assert_eq!(result.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn test_invalid_epsg() {
        assert!(Reprojector::new(99999, 3978).is_err());
    }
}

/// Vérifie si la reprojection est disponible
pub fn is_available() -> bool {
    cfg!(feature = "reproject")
}

#[cfg(not(feature = "reproject"))]
use anyhow::{bail, Result};
#[cfg(not(feature = "reproject"))]
use geo::MultiPolygon;

/// Reprojector factice - pas de reprojection disponible
#[cfg(not(feature = "reproject"))]
pub struct Reprojector;

#[cfg(not(feature = "reproject"))]
impl Reprojector {
    /// Tente de créer un reprojector - échoue sauf si les EPSG sont identiques
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        if source_epsg == target_epsg {
            Ok(Self)
        } else {
            bail!(
                "Reprojection from EPSG:{} to EPSG:{} requires the 'reproject' feature. \
                 Build with: cargo build --features reproject",
                source_epsg,
                target_epsg
            )
        }
    }

    /// Retourne la géométrie inchangée
    pub fn transform(&self, geom: &MultiPolygon) -> Result<MultiPolygon> {
        Ok(geom.clone())
    }
}
