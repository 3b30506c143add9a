//! Conversions d'unités et arrondis
//!
//! Toutes les surfaces produites par le moteur géométrique sont en m²
//! (unité linéaire native d'une projection métrique). Les rapports sont en
//! hectares, arrondis à 2 décimales.

use crate::OverlapError;

/// Nombre de m² dans un hectare
pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Nombre de décimales conservées pour les hectares
pub const HECTARE_DECIMALS: u8 = 2;

/// Convertit des m² en hectares (sans arrondi)
pub fn square_meters_to_hectares(area: f64) -> f64 {
    area / SQUARE_METERS_PER_HECTARE
}

/// Convertit des m² en hectares arrondis à 2 décimales
pub fn hectares_rounded(area: f64) -> f64 {
    round_to(square_meters_to_hectares(area), HECTARE_DECIMALS)
}

/// Arrondit à `decimals` décimales, au pair le plus proche.
///
/// L'arrondi porte sur la valeur binaire exacte : `2.675` (stocké
/// 2.67499999…) donne `2.67`, `0.125` donne `0.12`. Le formatage de `f64`
/// produit exactement cet arrondi, d'où l'aller-retour par une chaîne.
pub fn round_to(value: f64, decimals: u8) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let text = format!("{:.*}", decimals as usize, value);
    text.parse::<f64>().unwrap_or(value)
}

/// Pourcentage `numerator / denominator * 100`
///
/// # Errors
///
/// `OverlapError::DivisionByZero` si `denominator` vaut exactement 0.
/// L'appelant choisit le repli (valeur nulle, abandon...).
pub fn percentage(numerator: f64, denominator: f64) -> Result<f64, OverlapError> {
    if denominator == 0.0 {
        return Err(OverlapError::DivisionByZero { numerator });
    }
    Ok((numerator / denominator) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_meters_to_hectares() {
        assert_eq!(square_meters_to_hectares(10_000.0), 1.0);
        assert_eq!(square_meters_to_hectares(5_000.0), 0.5);
        assert_eq!(square_meters_to_hectares(0.0), 0.0);
    }

    #[test]
    fn test_hectares_rounded() {
        assert_eq!(hectares_rounded(12_345.0), 1.23);
        assert_eq!(hectares_rounded(12_360.0), 1.24);
        assert_eq!(hectares_rounded(49.0), 0.0);
        assert_eq!(hectares_rounded(51.0), 0.01);
    }

    #[test]
    fn test_round_to_exact_binary_value() {
        // 2.675 est stocké légèrement sous 2.675
        assert_eq!(round_to(2.675, 2), 2.67);
        assert_eq!(round_to(1.005, 2), 1.0);
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
    }

    #[test]
    fn test_round_to_non_finite() {
        assert!(round_to(f64::NAN, 2).is_nan());
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1.5, 5.0).unwrap(), 30.0);
        assert_eq!(percentage(0.0, 5.0).unwrap(), 0.0);
        assert_eq!(percentage(5.0, 5.0).unwrap(), 100.0);
    }

    #[test]
    fn test_percentage_division_by_zero() {
        assert!(matches!(
            percentage(0.0, 0.0),
            Err(OverlapError::DivisionByZero { .. })
        ));
        assert!(matches!(
            percentage(1.5, 0.0),
            Err(OverlapError::DivisionByZero { .. })
        ));
        // -0.0 == 0.0
        assert!(percentage(1.0, -0.0).is_err());
    }
}
