//! Dose calculation strategies.
//!
//! Each strategy checks its payload preconditions in a fixed order,
//! converts through the resolver, and composes a result whose step list
//! retraces the arithmetic for display and audit. Arithmetic keeps full
//! precision throughout; values are quantized only where they enter step
//! text and result fields, and quantized values never feed back into a
//! computation. Products and ratios use checked decimal operations, so a
//! result outside the representable range is reported as a validation
//! error on the driving field instead of panicking.

use crate::catalog::{LazyCatalog, UnitCatalog};
use crate::resolver;
use crate::types::*;
use crate::units::{is_compound, normalize_unit, split_compound};
use crate::{Error, Result};
use rust_decimal::Decimal;

/// Run the strategy selected by the request's dose input
///
/// The request is assumed to have passed `validate_request`; each strategy
/// still checks its own payload. The catalog loads only for strategies
/// that convert units.
pub fn compute(catalog: &LazyCatalog, request: &CalculationRequest) -> Result<CalculationResult> {
    match &request.dose_input {
        DoseInput::MgKg(input) => compute_mg_kg(catalog.get()?, input, request.weight_kg),
        DoseInput::DoseBasic(input) => compute_dose_basic(input, request.weight_kg),
        DoseInput::UnitConversion(input) => compute_unit_conversion(catalog.get()?, input),
        DoseInput::InfusionRate(input) => compute_infusion_rate(catalog.get()?, input),
        DoseInput::Other(tag) => {
            tracing::warn!("Rejecting unsupported calculation type '{}'", tag);
            Err(Error::UnsupportedCalculationType(tag.clone()))
        }
    }
}

/// Round to `places` decimals and pad the scale, so `50` displays `50.0000`
fn quantize(value: Decimal, places: u32) -> Decimal {
    let mut rounded = value.round_dp(places);
    rounded.rescale(places);
    rounded
}

/// Weight-scaled dosing: a per-kilogram rate times the patient's weight
fn compute_mg_kg(
    catalog: &UnitCatalog,
    input: &MgKgInput,
    weight_kg: Option<Decimal>,
) -> Result<CalculationResult> {
    let value = input
        .prescribed
        .as_ref()
        .and_then(|q| q.value)
        .ok_or_else(|| Error::validation("prescribed.value", "a prescribed value is required"))?;
    let unit = match input.prescribed.as_ref().and_then(|q| q.unit.as_deref()) {
        Some(unit) if !unit.trim().is_empty() => unit.to_string(),
        _ => {
            return Err(Error::validation(
                "prescribed.unit",
                "a prescribed unit is required",
            ))
        }
    };
    let weight = weight_kg.ok_or_else(|| {
        Error::validation("weight_kg", "weight is required for weight-scaled dosing")
    })?;
    if weight <= Decimal::ZERO {
        return Err(Error::validation(
            "weight_kg",
            "weight must be strictly positive",
        ));
    }

    let (num, den) = split_compound(&unit)?;
    let per_kg = resolver::convert_compound(catalog, value, &unit, "mg/kg")?;
    let total = per_kg.checked_mul(weight).ok_or_else(|| {
        Error::validation(
            "prescribed.value",
            "computed dose exceeds the supported numeric range",
        )
    })?;

    let per_kg_display = quantize(per_kg, 4);
    let total_display = quantize(total, 4);
    let needs_conversion = !(num == "mg" && den == "kg");

    let mut steps = vec![CalculationStep::new(
        "Formula",
        "dose (mg) = dose rate (mg/kg) × weight (kg)",
    )];
    if needs_conversion {
        steps.push(CalculationStep::new(
            "Unit conversion",
            format!("{} {} = {} mg/kg", value, unit.trim(), per_kg_display),
        ));
    }
    steps.push(CalculationStep::new(
        "Application",
        format!("{} × {} = {} mg", per_kg_display, weight, total_display),
    ));

    let mut explanations = vec![
        "The absolute dose is the per-kilogram rate multiplied by the patient's weight."
            .to_string(),
    ];
    if needs_conversion {
        explanations
            .push("The prescribed rate was first converted to the canonical mg/kg unit.".to_string());
    }

    tracing::debug!(
        "MG_KG: {} {} at {} kg -> {} mg",
        value,
        unit,
        weight,
        total_display
    );

    Ok(CalculationResult {
        status: CalculationStatus::Ok,
        kind: CalculationKind::MgKg,
        answer: Quantity::new(total_display, "mg"),
        canonical: CanonicalDose::WeightScaled {
            prescribed: Quantity::new(per_kg_display, "mg/kg"),
            weight_kg: weight,
        },
        steps,
        explanations,
        warnings: Vec::new(),
    })
}

/// Per-kilogram dosing with an optional absolute ceiling
fn compute_dose_basic(
    input: &DoseBasicInput,
    weight_kg: Option<Decimal>,
) -> Result<CalculationResult> {
    let dose = input
        .dose_mg_per_kg
        .ok_or_else(|| Error::validation("dose_mg_per_kg", "a per-kilogram dose is required"))?;
    let weight = weight_kg.ok_or_else(|| {
        Error::validation("weight_kg", "weight is required for weight-scaled dosing")
    })?;
    if weight <= Decimal::ZERO {
        return Err(Error::validation(
            "weight_kg",
            "weight must be strictly positive",
        ));
    }

    let raw_total = dose.checked_mul(weight).ok_or_else(|| {
        Error::validation(
            "dose_mg_per_kg",
            "computed dose exceeds the supported numeric range",
        )
    })?;
    let (total, capped) = match input.max_mg {
        Some(max) if raw_total > max => (max, true),
        _ => (raw_total, false),
    };

    let dose_display = quantize(dose, 4);
    let raw_display = quantize(raw_total, 4);
    let total_display = quantize(total, 4);

    let mut steps = vec![
        CalculationStep::new("Formula", "dose (mg) = dose rate (mg/kg) × weight (kg)"),
        CalculationStep::new(
            "Application",
            format!("{} × {} = {} mg", dose_display, weight, raw_display),
        ),
    ];
    if capped {
        steps.push(CalculationStep::new(
            "Ceiling",
            format!(
                "{} mg exceeds the maximum, capped at {} mg",
                raw_display, total_display
            ),
        ));
    }

    let mut explanations = vec![
        "The absolute dose is the per-kilogram rate multiplied by the patient's weight."
            .to_string(),
    ];
    if capped {
        explanations
            .push("The computed dose exceeded the prescribed maximum and was capped.".to_string());
    }

    Ok(CalculationResult {
        status: CalculationStatus::Ok,
        kind: CalculationKind::DoseBasic,
        answer: Quantity::new(total_display, "mg"),
        canonical: CanonicalDose::PerKg {
            dose_mg_per_kg: dose_display,
            weight_kg: weight,
            max_mg: input.max_mg,
        },
        steps,
        explanations,
        warnings: Vec::new(),
    })
}

/// Free-standing unit conversion through the catalog
fn compute_unit_conversion(
    catalog: &UnitCatalog,
    input: &UnitConversionInput,
) -> Result<CalculationResult> {
    let value = input
        .value
        .ok_or_else(|| Error::validation("value", "a value to convert is required"))?;
    let from_unit = match input.from_unit.as_deref() {
        Some(unit) if !unit.trim().is_empty() => unit,
        _ => return Err(Error::validation("from_unit", "a source unit is required")),
    };
    let to_unit = match input.to_unit.as_deref() {
        Some(unit) if !unit.trim().is_empty() => unit,
        _ => return Err(Error::validation("to_unit", "a target unit is required")),
    };

    let from_normalized = normalize_unit(from_unit)?;
    let to_normalized = normalize_unit(to_unit)?;

    // A pair with any compound side goes through compound resolution; a
    // mixed pair fails there when the simple side cannot be split.
    let conversion_factor = if is_compound(&from_normalized) || is_compound(&to_normalized) {
        resolver::compound_factor(catalog, &from_normalized, &to_normalized)?
    } else {
        resolver::factor(catalog, &from_normalized, &to_normalized)?
    };
    let converted = value.checked_mul(conversion_factor).ok_or_else(|| {
        Error::validation("value", "converted value exceeds the supported numeric range")
    })?;
    let converted_display = quantize(converted, 6);

    let steps = vec![
        CalculationStep::new("Formula", "target value = source value × conversion factor"),
        CalculationStep::new(
            "Application",
            format!(
                "{} {} × {} = {} {}",
                value, from_normalized, conversion_factor, converted_display, to_normalized
            ),
        ),
    ];

    tracing::debug!(
        "UNIT_CONVERSION: {} {} -> {} {}",
        value,
        from_normalized,
        converted_display,
        to_normalized
    );

    Ok(CalculationResult {
        status: CalculationStatus::Ok,
        kind: CalculationKind::UnitConversion,
        answer: Quantity::new(converted_display, to_normalized.clone()),
        canonical: CanonicalDose::Conversion {
            source: Quantity::new(value, from_normalized),
            to_unit: to_normalized,
            factor: conversion_factor,
        },
        steps,
        explanations: vec![
            "The value is scaled by the resolved conversion factor between the two units."
                .to_string(),
        ],
        warnings: Vec::new(),
    })
}

/// Infusion rate from a volume and a duration, canonicalized to mL/h
fn compute_infusion_rate(
    catalog: &UnitCatalog,
    input: &InfusionRateInput,
) -> Result<CalculationResult> {
    let volume_value = input
        .volume
        .as_ref()
        .and_then(|q| q.value)
        .ok_or_else(|| Error::validation("volume.value", "an infusion volume is required"))?;
    let volume_unit = match input.volume.as_ref().and_then(|q| q.unit.as_deref()) {
        Some(unit) if !unit.trim().is_empty() => unit.to_string(),
        _ => return Err(Error::validation("volume.unit", "a volume unit is required")),
    };
    let duration_value = input
        .duration
        .as_ref()
        .and_then(|q| q.value)
        .ok_or_else(|| Error::validation("duration.value", "an infusion duration is required"))?;
    let duration_unit = match input.duration.as_ref().and_then(|q| q.unit.as_deref()) {
        Some(unit) if !unit.trim().is_empty() => unit.to_string(),
        _ => {
            return Err(Error::validation(
                "duration.unit",
                "a duration unit is required",
            ))
        }
    };
    if duration_value <= Decimal::ZERO {
        return Err(Error::validation(
            "duration.value",
            "duration must be strictly positive",
        ));
    }

    let volume_from = normalize_unit(&volume_unit)?;
    let duration_from = normalize_unit(&duration_unit)?;

    let volume_ml = resolver::convert(catalog, volume_value, &volume_from, "mL")?;
    let duration_h = resolver::convert(catalog, duration_value, &duration_from, "h")?;
    // A catalog may carry a zero direct factor; that would zero out the
    // converted duration, which cannot be divided through.
    if duration_h.is_zero() {
        return Err(Error::ConversionImpossible {
            from: duration_from.clone(),
            to: "h".to_string(),
        });
    }

    let rate = volume_ml.checked_div(duration_h).ok_or_else(|| {
        Error::validation(
            "volume.value",
            "computed rate exceeds the supported numeric range",
        )
    })?;
    let volume_display = quantize(volume_ml, 4);
    let duration_display = quantize(duration_h, 4);
    let rate_display = quantize(rate, 4);

    let mut steps = vec![CalculationStep::new(
        "Formula",
        "rate (mL/h) = volume (mL) ÷ duration (h)",
    )];
    if volume_from != "mL" {
        steps.push(CalculationStep::new(
            "Unit conversion",
            format!(
                "{} {} = {} mL",
                volume_value,
                volume_unit.trim(),
                volume_display
            ),
        ));
    }
    if duration_from != "h" {
        steps.push(CalculationStep::new(
            "Unit conversion",
            format!(
                "{} {} = {} h",
                duration_value,
                duration_unit.trim(),
                duration_display
            ),
        ));
    }
    steps.push(CalculationStep::new(
        "Application",
        format!(
            "{} ÷ {} = {} mL/h",
            volume_display, duration_display, rate_display
        ),
    ));

    tracing::debug!(
        "INFUSION_RATE: {} {} over {} {} -> {} mL/h",
        volume_value,
        volume_unit,
        duration_value,
        duration_unit,
        rate_display
    );

    Ok(CalculationResult {
        status: CalculationStatus::Ok,
        kind: CalculationKind::InfusionRate,
        answer: Quantity::new(rate_display, "mL/h"),
        canonical: CanonicalDose::Infusion {
            volume: Quantity::new(volume_display, "mL"),
            duration: Quantity::new(duration_display, "h"),
        },
        steps,
        explanations: vec![
            "The infusion rate is the total volume divided by the total duration.".to_string(),
        ],
        warnings: Vec::new(),
    })
}
