//! Engine façade over the catalog, resolver, and calculator.
//!
//! `DoseEngine` is the main entry point:
//! - Owns the lazily-loaded unit catalog
//! - Validates requests before dispatching them to a strategy
//! - Exposes the unit helpers for callers that convert outside a request

use crate::catalog::{builtin_rows, CatalogSource, LazyCatalog, UnitCatalog};
use crate::types::{CalculationRequest, CalculationResult};
use crate::validator::validate_request;
use crate::{calculator, resolver, units, Result};
use rust_decimal::Decimal;

/// Dose computation engine backed by a unit catalog
pub struct DoseEngine {
    catalog: LazyCatalog,
}

impl DoseEngine {
    /// Create an engine whose catalog loads from `source` on first use
    pub fn new(source: impl CatalogSource + 'static) -> Self {
        Self {
            catalog: LazyCatalog::new(source),
        }
    }

    /// Create an engine around an already-constructed catalog
    pub fn with_catalog(catalog: UnitCatalog) -> Self {
        Self {
            catalog: LazyCatalog::preloaded(catalog),
        }
    }

    /// Create an engine over the built-in clinical unit catalog
    pub fn builtin() -> Self {
        Self::new(builtin_rows())
    }

    /// The loaded catalog, loading it on first call
    pub fn catalog(&self) -> Result<&UnitCatalog> {
        self.catalog.get()
    }

    /// Normalize a raw unit string to its catalog form
    pub fn normalize_unit(&self, raw: &str) -> Result<String> {
        units::normalize_unit(raw)
    }

    /// Check that a unit (both sides for compounds) is known to the catalog
    pub fn ensure_unit_exists(&self, unit: &str) -> Result<()> {
        self.catalog()?.ensure_unit_exists(unit)
    }

    /// Convert a value between two simple units
    pub fn convert(&self, value: Decimal, from: &str, to: &str) -> Result<Decimal> {
        resolver::convert(self.catalog()?, value, from, to)
    }

    /// Convert a value between two compound units
    pub fn convert_compound(&self, value: Decimal, from: &str, to: &str) -> Result<Decimal> {
        resolver::convert_compound(self.catalog()?, value, from, to)
    }

    /// Collapse a per-kilogram quantity into an absolute one
    pub fn to_absolute_dose(
        &self,
        value: Decimal,
        unit: &str,
        weight_kg: Option<Decimal>,
    ) -> Result<(Decimal, String)> {
        resolver::to_absolute_dose(value, unit, weight_kg)
    }

    /// Validate a request and run its calculation strategy
    pub fn compute(&self, request: &CalculationRequest) -> Result<CalculationResult> {
        tracing::info!(
            "Computing dose for '{}' in context {:?}",
            request.drug_name,
            request.context
        );
        validate_request(request)?;
        calculator::compute(&self.catalog, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRows;
    use crate::{CalculationKind, Error};
    use rust_decimal_macros::dec;

    struct FailingSource;

    impl CatalogSource for FailingSource {
        fn load(&self) -> Result<CatalogRows> {
            Err(Error::CatalogUnavailable("unit store offline".to_string()))
        }
    }

    #[test]
    fn test_mg_kg_round_trip_through_json() {
        let engine = DoseEngine::builtin();
        let request = CalculationRequest::from_json(
            r#"{
                "context": "FREE",
                "weight_kg": 10,
                "drug_name": "amoxicillin",
                "dose_input": {
                    "type": "MG_KG",
                    "prescribed": {"value": 5, "unit": "mg/kg"}
                }
            }"#,
        )
        .unwrap();

        let result = engine.compute(&request).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&result.to_json().unwrap()).unwrap();

        assert_eq!(json["status"], "OK");
        assert_eq!(json["type"], "MG_KG");
        assert_eq!(json["answer"]["value"], "50.0000");
        assert_eq!(json["answer"]["unit"], "mg");
        assert_eq!(json["canonical"]["prescribed"]["value"], "5.0000");
        assert_eq!(json["canonical"]["prescribed"]["unit"], "mg/kg");
        assert_eq!(json["canonical"]["weight_kg"], "10");
        assert_eq!(json["steps"].as_array().unwrap().len(), 2);
        assert_eq!(json["warnings"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_exercise_context_through_json() {
        let engine = DoseEngine::builtin();
        let request = CalculationRequest::from_json(
            r#"{
                "context": "TRAINING_EXERCISE",
                "exercise_id": 42,
                "weight_kg": 25,
                "drug_name": "paracetamol",
                "dose_input": {"type": "DOSE_BASIC", "dose_mg_per_kg": 15, "max_mg": 1000}
            }"#,
        )
        .unwrap();

        let result = engine.compute(&request).unwrap();
        assert_eq!(result.kind, CalculationKind::DoseBasic);
        assert_eq!(result.answer.value, dec!(375));
    }

    #[test]
    fn test_validation_runs_before_strategies() {
        let engine = DoseEngine::builtin();
        let request = CalculationRequest::from_json(
            r#"{
                "weight_kg": 10,
                "drug_name": "   ",
                "dose_input": {"type": "MG_KG", "prescribed": {"value": 5, "unit": "mg/kg"}}
            }"#,
        )
        .unwrap();

        match engine.compute(&request).unwrap_err() {
            Error::Validation { field, .. } => assert_eq!(field, "drug_name"),
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_calculation_type_is_rejected() {
        let engine = DoseEngine::builtin();
        let request = CalculationRequest::from_json(
            r#"{
                "drug_name": "amoxicillin",
                "dose_input": {"type": "BOGUS", "prescribed": {"value": 5, "unit": "mg/kg"}}
            }"#,
        )
        .unwrap();

        match engine.compute(&request).unwrap_err() {
            Error::UnsupportedCalculationType(tag) => assert_eq!(tag, "BOGUS"),
            other => panic!("expected UnsupportedCalculationType, got {:?}", other),
        }
    }

    #[test]
    fn test_extreme_magnitudes_return_an_error() {
        let engine = DoseEngine::builtin();
        let request = CalculationRequest::from_json(
            r#"{
                "weight_kg": "79228162514264337593543950335",
                "drug_name": "amoxicillin",
                "dose_input": {
                    "type": "MG_KG",
                    "prescribed": {"value": "79228162514264337593543950335", "unit": "mg/kg"}
                }
            }"#,
        )
        .unwrap();

        match engine.compute(&request).unwrap_err() {
            Error::Validation { field, .. } => assert_eq!(field, "prescribed.value"),
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_catalog_failure_surfaces_only_when_needed() {
        let engine = DoseEngine::new(FailingSource);

        // DOSE_BASIC never touches units, so the broken source stays dormant.
        let request = CalculationRequest::from_json(
            r#"{
                "weight_kg": 10,
                "drug_name": "paracetamol",
                "dose_input": {"type": "DOSE_BASIC", "dose_mg_per_kg": 15}
            }"#,
        )
        .unwrap();
        assert_eq!(engine.compute(&request).unwrap().answer.value, dec!(150));

        let request = CalculationRequest::from_json(
            r#"{
                "weight_kg": 10,
                "drug_name": "amoxicillin",
                "dose_input": {"type": "MG_KG", "prescribed": {"value": 5, "unit": "mg/kg"}}
            }"#,
        )
        .unwrap();
        assert!(matches!(
            engine.compute(&request).unwrap_err(),
            Error::CatalogUnavailable(_)
        ));
    }

    #[test]
    fn test_unit_helpers_delegate_to_catalog() {
        let engine = DoseEngine::builtin();

        assert_eq!(engine.normalize_unit(" ML ").unwrap(), "mL");
        assert_eq!(engine.convert(dec!(2), "g", "mg").unwrap(), dec!(2000));
        assert_eq!(
            engine
                .convert_compound(dec!(5), "mg/kg", "mcg/kg")
                .unwrap(),
            dec!(5000)
        );
        assert_eq!(
            engine
                .to_absolute_dose(dec!(5), "mg/kg", Some(dec!(10)))
                .unwrap(),
            (dec!(50), "mg".to_string())
        );
        assert!(engine.ensure_unit_exists("gtt").is_ok());
        assert!(matches!(
            engine.ensure_unit_exists("banana"),
            Err(Error::InvalidUnit(_))
        ));
    }

    #[test]
    fn test_with_catalog_skips_the_source() {
        let catalog = UnitCatalog::from_rows(builtin_rows()).unwrap();
        let engine = DoseEngine::with_catalog(catalog);

        assert!(engine.catalog().is_ok());
        assert_eq!(engine.convert(dec!(1), "L", "mL").unwrap(), dec!(1000));
    }
}
