//! Conversion factor resolution over the unit catalog.
//!
//! For a unit pair the resolver tries, in order: identity, the direct
//! table, the inverse of a direct entry, then derivation through a shared
//! base unit. The first path that applies wins; nothing is averaged or
//! chained across multiple hops. All products and ratios are computed
//! with checked decimal operations: a result outside the representable
//! range comes back as an error, never a panic.

use crate::catalog::UnitCatalog;
use crate::units::{is_compound, normalize_unit, split_compound};
use crate::{Error, Result};
use rust_decimal::Decimal;

/// Resolve the multiplicative factor taking `from` into `to`
pub fn factor(catalog: &UnitCatalog, from: &str, to: &str) -> Result<Decimal> {
    let from = normalize_unit(from)?;
    let to = normalize_unit(to)?;

    // Identity and explicit direct entries share one lookup.
    if let Some(direct) = catalog.direct_factor(&from, &to) {
        tracing::debug!("factor {} -> {}: direct {}", from, to, direct);
        return Ok(direct);
    }

    // Inverse of a stored entry; a zero factor cannot be inverted and is
    // treated as absent.
    if let Some(stored) = catalog.direct_factor(&to, &from) {
        if let Some(inverse) = Decimal::ONE.checked_div(stored) {
            tracing::debug!("factor {} -> {}: inverse direct {}", from, to, inverse);
            return Ok(inverse);
        }
    }

    // Derivation through a shared base of the same kind. Both units must
    // declare the same base with non-zero factors.
    if let (Some(uf), Some(ut)) = (catalog.lookup_unit(&from), catalog.lookup_unit(&to)) {
        if uf.kind == ut.kind {
            if let (Some(base_from), Some(base_to), Some(f), Some(t)) = (
                uf.base_code.as_deref(),
                ut.base_code.as_deref(),
                uf.to_base_factor,
                ut.to_base_factor,
            ) {
                if base_from == base_to && !f.is_zero() && !t.is_zero() {
                    if let Some(derived) = f.checked_div(t) {
                        tracing::debug!(
                            "factor {} -> {}: via base {} = {}",
                            from,
                            to,
                            base_from,
                            derived
                        );
                        return Ok(derived);
                    }
                }
            }
        }
    }

    Err(Error::ConversionImpossible { from, to })
}

/// Convert a value between two simple units
pub fn convert(catalog: &UnitCatalog, value: Decimal, from: &str, to: &str) -> Result<Decimal> {
    let conversion_factor = factor(catalog, from, to)?;
    value.checked_mul(conversion_factor).ok_or_else(|| {
        Error::validation("value", "converted value exceeds the supported numeric range")
    })
}

/// Resolve the factor between two compound units
///
/// Each side is split and resolved independently; the compound factor is
/// the numerator factor divided by the denominator factor. A denominator
/// factor of exactly zero cannot be divided through, nor can a ratio
/// outside the representable range; both fail as `ConversionImpossible`
/// on the full compound pair.
pub fn compound_factor(catalog: &UnitCatalog, from: &str, to: &str) -> Result<Decimal> {
    let (num_from, den_from) = split_compound(from)?;
    let (num_to, den_to) = split_compound(to)?;

    let num_factor = factor(catalog, &num_from, &num_to)?;
    let den_factor = factor(catalog, &den_from, &den_to)?;
    num_factor
        .checked_div(den_factor)
        .ok_or_else(|| Error::ConversionImpossible {
            from: format!("{}/{}", num_from, den_from),
            to: format!("{}/{}", num_to, den_to),
        })
}

/// Convert a value between two compound units
pub fn convert_compound(
    catalog: &UnitCatalog,
    value: Decimal,
    from: &str,
    to: &str,
) -> Result<Decimal> {
    let conversion_factor = compound_factor(catalog, from, to)?;
    value.checked_mul(conversion_factor).ok_or_else(|| {
        Error::validation("value", "converted value exceeds the supported numeric range")
    })
}

/// Scale a per-kilogram quantity into an absolute one
///
/// A simple unit passes through untouched. A compound with a `kg`
/// denominator requires a positive weight and multiplies through to its
/// numerator unit. Any other compound also passes through unchanged: the
/// engine does not guess what to scale a non-weight ratio by.
pub fn to_absolute_dose(
    value: Decimal,
    unit: &str,
    weight_kg: Option<Decimal>,
) -> Result<(Decimal, String)> {
    let normalized = normalize_unit(unit)?;
    if !is_compound(&normalized) {
        return Ok((value, normalized));
    }

    let (num, den) = split_compound(&normalized)?;
    if den == "kg" {
        let weight = weight_kg.ok_or_else(|| {
            Error::validation("weight_kg", "weight is required for a per-kilogram dose")
        })?;
        if weight <= Decimal::ZERO {
            return Err(Error::validation(
                "weight_kg",
                "weight must be strictly positive",
            ));
        }
        let absolute = value.checked_mul(weight).ok_or_else(|| {
            Error::validation("value", "absolute dose exceeds the supported numeric range")
        })?;
        return Ok((absolute, num));
    }

    Ok((value, normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{builtin_rows, CatalogRows, ConversionRow, UnitCatalog};
    use rust_decimal_macros::dec;

    fn catalog() -> UnitCatalog {
        UnitCatalog::from_rows(builtin_rows()).unwrap()
    }

    #[test]
    fn test_identity_is_exact_for_any_value() {
        let catalog = catalog();
        for value in [dec!(0), dec!(1), dec!(0.3333), dec!(123456.789)] {
            assert_eq!(convert(&catalog, value, "mg", "mg").unwrap(), value);
            assert_eq!(convert(&catalog, value, " MG ", "mg").unwrap(), value);
        }
    }

    #[test]
    fn test_direct_and_inverse_round_trip() {
        let catalog = catalog();
        let forward = convert(&catalog, dec!(40), "gtt", "mL").unwrap();
        assert_eq!(forward, dec!(2.00));
        let back = convert(&catalog, forward, "mL", "gtt").unwrap();
        assert_eq!(back, dec!(40));
    }

    #[test]
    fn test_via_shared_base() {
        let catalog = catalog();
        assert_eq!(convert(&catalog, dec!(2), "g", "mg").unwrap(), dec!(2000));
        assert_eq!(convert(&catalog, dec!(1500), "mg", "g").unwrap(), dec!(1.5));
        assert_eq!(convert(&catalog, dec!(3), "mg", "mcg").unwrap(), dec!(3000));
        // 1/60 does not terminate; compare at display precision.
        assert_eq!(
            convert(&catalog, dec!(90), "min", "h").unwrap().round_dp(6),
            dec!(1.5)
        );
    }

    #[test]
    fn test_cross_kind_conversion_fails() {
        let catalog = catalog();
        let err = factor(&catalog, "mg", "mL").unwrap_err();
        match err {
            Error::ConversionImpossible { from, to } => {
                assert_eq!(from, "mg");
                assert_eq!(to, "mL");
            }
            other => panic!("expected ConversionImpossible, got {:?}", other),
        }
    }

    #[test]
    fn test_unit_without_base_fails_outside_direct_entries() {
        let catalog = catalog();
        assert!(factor(&catalog, "UI", "mg").is_err());
        assert!(factor(&catalog, "gtt", "L").is_err());
    }

    #[test]
    fn test_zero_direct_factor_is_not_inverted() {
        let rows = CatalogRows {
            units: vec![],
            conversions: vec![ConversionRow {
                from_unit: "a".to_string(),
                to_unit: "b".to_string(),
                factor: dec!(0),
            }],
        };
        let catalog = UnitCatalog::from_rows(rows).unwrap();
        // Forward returns the stored factor, even zero.
        assert_eq!(convert(&catalog, dec!(5), "a", "b").unwrap(), dec!(0));
        // The inverse path must skip it rather than divide by zero.
        assert!(matches!(
            factor(&catalog, "b", "a"),
            Err(Error::ConversionImpossible { .. })
        ));
    }

    #[test]
    fn test_compound_reduces_to_numerator_when_denominators_match() {
        let catalog = catalog();
        let compound = convert_compound(&catalog, dec!(5), "mg/kg", "mcg/kg").unwrap();
        let simple = convert(&catalog, dec!(5), "mg", "mcg").unwrap();
        assert_eq!(compound, simple);
        assert_eq!(compound, dec!(5000));
    }

    #[test]
    fn test_compound_conversion_both_sides() {
        let catalog = catalog();
        // 1 mg/mL = 1 g/L
        assert_eq!(
            convert_compound(&catalog, dec!(1), "mg/mL", "g/L").unwrap(),
            dec!(1)
        );
        // 5000 mcg/kg = 5 mg/kg
        assert_eq!(
            convert_compound(&catalog, dec!(5000), "mcg/kg", "mg/kg").unwrap(),
            dec!(5.000)
        );
    }

    #[test]
    fn test_compound_zero_denominator_factor_fails() {
        let rows = CatalogRows {
            units: vec![
                crate::catalog::UnitRow {
                    code: "g".to_string(),
                    kind: "mass".to_string(),
                    base_code: Some("g".to_string()),
                    to_base_factor: Some(dec!(1)),
                },
                crate::catalog::UnitRow {
                    code: "mg".to_string(),
                    kind: "mass".to_string(),
                    base_code: Some("g".to_string()),
                    to_base_factor: Some(dec!(0.001)),
                },
            ],
            conversions: vec![ConversionRow {
                from_unit: "x".to_string(),
                to_unit: "y".to_string(),
                factor: dec!(0),
            }],
        };
        let catalog = UnitCatalog::from_rows(rows).unwrap();
        let err = convert_compound(&catalog, dec!(1), "mg/x", "mg/y").unwrap_err();
        match err {
            Error::ConversionImpossible { from, to } => {
                assert_eq!(from, "mg/x");
                assert_eq!(to, "mg/y");
            }
            other => panic!("expected ConversionImpossible, got {:?}", other),
        }
    }

    #[test]
    fn test_overflowing_conversion_is_an_error_not_a_panic() {
        let catalog = catalog();
        assert!(matches!(
            convert(&catalog, Decimal::MAX, "g", "mg"),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            convert_compound(&catalog, Decimal::MAX, "g/mL", "mg/mL"),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            to_absolute_dose(Decimal::MAX, "mg/kg", Some(dec!(2))),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_compound_rejects_simple_units() {
        let catalog = catalog();
        assert!(matches!(
            convert_compound(&catalog, dec!(1), "mg", "mg/kg"),
            Err(Error::InvalidUnit(_))
        ));
    }

    #[test]
    fn test_to_absolute_dose_scales_per_kg() {
        let (value, unit) = to_absolute_dose(dec!(5), "mg/kg", Some(dec!(10))).unwrap();
        assert_eq!(value, dec!(50));
        assert_eq!(unit, "mg");
    }

    #[test]
    fn test_to_absolute_dose_passes_simple_units_through() {
        let (value, unit) = to_absolute_dose(dec!(500), "MG", None).unwrap();
        assert_eq!(value, dec!(500));
        assert_eq!(unit, "mg");
    }

    #[test]
    fn test_to_absolute_dose_passes_non_weight_compounds_through() {
        let (value, unit) = to_absolute_dose(dec!(120), "mL/h", Some(dec!(10))).unwrap();
        assert_eq!(value, dec!(120));
        assert_eq!(unit, "mL/h");
    }

    #[test]
    fn test_to_absolute_dose_requires_positive_weight() {
        let err = to_absolute_dose(dec!(5), "mg/kg", None).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "weight_kg"));

        let err = to_absolute_dose(dec!(5), "mg/kg", Some(dec!(0))).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "weight_kg"));
    }
}
