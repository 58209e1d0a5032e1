//! Core domain types for the dose engine.
//!
//! This module defines the request and result shapes used throughout the
//! system:
//! - Calculation requests and their per-type payloads
//! - Quantities and display steps
//! - Structured results with canonical intermediate values

use crate::error::{Error, Result};
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

// ============================================================================
// Request Types
// ============================================================================

/// Clinical context a calculation request originates from
///
/// Context tags are trimmed and folded to upper case before matching, so
/// `"free"` and `"FREE"` name the same context on the wire.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationContext {
    #[default]
    Free,
    TrainingExercise,
    ClinicalCase,
}

impl FromStr for CalculationContext {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "FREE" => Ok(CalculationContext::Free),
            "TRAINING_EXERCISE" => Ok(CalculationContext::TrainingExercise),
            "CLINICAL_CASE" => Ok(CalculationContext::ClinicalCase),
            other => Err(Error::validation(
                "context",
                format!("unknown context '{}'", other),
            )),
        }
    }
}

impl<'de> Deserialize<'de> for CalculationContext {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// A value/unit pair as entered by the caller
///
/// Both halves are optional so the calculator can report exactly which one
/// is missing instead of rejecting the request at the parse boundary.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct QuantityInput {
    pub value: Option<Decimal>,
    pub unit: Option<String>,
}

/// Payload for weight-scaled dosing (`MG_KG`)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MgKgInput {
    pub prescribed: Option<QuantityInput>,
}

/// Payload for per-kilogram dosing with an optional ceiling (`DOSE_BASIC`)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DoseBasicInput {
    pub dose_mg_per_kg: Option<Decimal>,
    pub max_mg: Option<Decimal>,
}

/// Payload for a free-standing unit conversion (`UNIT_CONVERSION`)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UnitConversionInput {
    pub value: Option<Decimal>,
    pub from_unit: Option<String>,
    pub to_unit: Option<String>,
}

/// Payload for an infusion rate from volume and duration (`INFUSION_RATE`)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct InfusionRateInput {
    pub volume: Option<QuantityInput>,
    pub duration: Option<QuantityInput>,
}

/// A dosing payload, tagged by calculation type
///
/// On the wire this is an object tagged under a `"type"` key; the tag is
/// trimmed and folded to upper case before dispatch. A known tag with a
/// malformed payload is a hard deserialization error, while an unknown
/// tag becomes [`DoseInput::Other`] so the calculator can answer with an
/// unsupported-type error instead of the parser rejecting the whole
/// request.
#[derive(Clone, Debug, PartialEq)]
pub enum DoseInput {
    MgKg(MgKgInput),
    DoseBasic(DoseBasicInput),
    UnitConversion(UnitConversionInput),
    InfusionRate(InfusionRateInput),
    Other(String),
}

impl Serialize for DoseInput {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        #[serde(tag = "type")]
        enum Tagged<'a> {
            #[serde(rename = "MG_KG")]
            MgKg(&'a MgKgInput),
            #[serde(rename = "DOSE_BASIC")]
            DoseBasic(&'a DoseBasicInput),
            #[serde(rename = "UNIT_CONVERSION")]
            UnitConversion(&'a UnitConversionInput),
            #[serde(rename = "INFUSION_RATE")]
            InfusionRate(&'a InfusionRateInput),
        }

        match self {
            DoseInput::MgKg(input) => Tagged::MgKg(input).serialize(serializer),
            DoseInput::DoseBasic(input) => Tagged::DoseBasic(input).serialize(serializer),
            DoseInput::UnitConversion(input) => Tagged::UnitConversion(input).serialize(serializer),
            DoseInput::InfusionRate(input) => Tagged::InfusionRate(input).serialize(serializer),
            DoseInput::Other(tag) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", tag)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for DoseInput {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let tag = match value.get("type") {
            None => return Err(D::Error::missing_field("type")),
            Some(tag) => tag
                .as_str()
                .ok_or_else(|| D::Error::custom("calculation type tag must be a string"))?
                .trim()
                .to_uppercase(),
        };

        let parsed = match tag.as_str() {
            "MG_KG" => MgKgInput::deserialize(&value).map(DoseInput::MgKg),
            "DOSE_BASIC" => DoseBasicInput::deserialize(&value).map(DoseInput::DoseBasic),
            "UNIT_CONVERSION" => {
                UnitConversionInput::deserialize(&value).map(DoseInput::UnitConversion)
            }
            "INFUSION_RATE" => InfusionRateInput::deserialize(&value).map(DoseInput::InfusionRate),
            _ => return Ok(DoseInput::Other(tag)),
        };
        parsed.map_err(D::Error::custom)
    }
}

/// A dose calculation request as submitted by a caller
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CalculationRequest {
    #[serde(default)]
    pub context: CalculationContext,
    pub exercise_id: Option<i64>,
    pub case_id: Option<i64>,
    pub patient_age_y: Option<Decimal>,
    pub weight_kg: Option<Decimal>,
    pub drug_name: String,
    pub dose_input: DoseInput,
}

impl CalculationRequest {
    /// Parse a request from its JSON wire form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render the request in its JSON wire form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// A value with its unit, as carried in results
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Quantity {
    pub value: Decimal,
    pub unit: String,
}

impl Quantity {
    pub fn new(value: Decimal, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

/// One display/audit step of a calculation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CalculationStep {
    pub label: String,
    pub calc: String,
}

impl CalculationStep {
    pub fn new(label: impl Into<String>, calc: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            calc: calc.into(),
        }
    }
}

/// Outcome tag of a completed calculation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationStatus {
    Ok,
}

/// Calculation type tag carried in results
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalculationKind {
    MgKg,
    DoseBasic,
    UnitConversion,
    InfusionRate,
}

/// Canonical intermediate values, shaped per calculation type
///
/// Serialized untagged: the variants carry disjoint required field sets,
/// and the enclosing result's `type` field names the strategy anyway.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CanonicalDose {
    /// Weight-scaled dosing: the canonical per-kg rate and the weight used
    WeightScaled {
        prescribed: Quantity,
        weight_kg: Decimal,
    },
    /// Per-kg dosing with ceiling: the rate, weight, and configured cap
    PerKg {
        dose_mg_per_kg: Decimal,
        weight_kg: Decimal,
        max_mg: Option<Decimal>,
    },
    /// Unit conversion: the normalized source, target unit, and factor
    Conversion {
        #[serde(rename = "from")]
        source: Quantity,
        to_unit: String,
        factor: Decimal,
    },
    /// Infusion rate: volume and duration in canonical units
    Infusion { volume: Quantity, duration: Quantity },
}

/// Structured outcome of a dose calculation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CalculationResult {
    pub status: CalculationStatus,
    #[serde(rename = "type")]
    pub kind: CalculationKind,
    pub answer: Quantity,
    pub canonical: CanonicalDose,
    pub steps: Vec<CalculationStep>,
    pub explanations: Vec<String>,
    /// Always empty here; a downstream safety layer may populate it
    pub warnings: Vec<String>,
}

impl CalculationResult {
    /// Render the result in its JSON wire form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a result from its JSON wire form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
