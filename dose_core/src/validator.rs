//! Structural validation of calculation requests.
//!
//! Checks run in a fixed order and fail on the first violation, so callers
//! can rely on which field gets reported when several are wrong at once.
//! Context membership and payload shape need no checks here: the request
//! types make an unknown context or an absent payload unrepresentable.

use crate::types::{CalculationContext, CalculationRequest};
use crate::{Error, Result};
use rust_decimal::Decimal;

/// Validate a request's structural preconditions before any arithmetic
///
/// Order: drug name, context-specific reference id, optional weight,
/// optional age. Strategy payload fields are checked by the strategies
/// themselves.
pub fn validate_request(request: &CalculationRequest) -> Result<()> {
    if request.drug_name.trim().is_empty() {
        return Err(Error::validation("drug_name", "drug name must not be empty"));
    }

    match request.context {
        CalculationContext::TrainingExercise => {
            if request.exercise_id.is_none() {
                return Err(Error::validation(
                    "exercise_id",
                    "exercise_id is required in the TRAINING_EXERCISE context",
                ));
            }
        }
        CalculationContext::ClinicalCase => {
            if request.case_id.is_none() {
                return Err(Error::validation(
                    "case_id",
                    "case_id is required in the CLINICAL_CASE context",
                ));
            }
        }
        CalculationContext::Free => {}
    }

    if let Some(weight) = request.weight_kg {
        if weight <= Decimal::ZERO {
            return Err(Error::validation(
                "weight_kg",
                "weight must be strictly positive",
            ));
        }
    }

    if let Some(age) = request.patient_age_y {
        if age < Decimal::ZERO {
            return Err(Error::validation(
                "patient_age_y",
                "age must not be negative",
            ));
        }
    }

    Ok(())
}
