//! Unit string normalization and compound-unit parsing.
//!
//! Clinician-entered unit strings arrive in many spellings (`ML`, ` mg `,
//! `µg`, `iu`). This module folds them onto the catalog's canonical codes
//! before any lookup or conversion takes place.

use crate::{Error, Result};

/// Normalize a raw unit string onto its canonical catalog code
///
/// Applied in order: trim (empty input is rejected), replace micro-sign
/// variants with the ASCII prefix `mc`, strip remaining whitespace, then
/// fold known synonyms case-insensitively. Tokens outside the synonym
/// table pass through with their original casing, so the catalog lookup
/// can report them precisely.
pub fn normalize_unit(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUnit("empty unit".into()));
    }

    let cleaned = trimmed.replace('µ', "mc").replace('μ', "mc");
    let compact: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();

    Ok(canonical_code(&compact))
}

/// Fold a cleaned token onto its canonical code
fn canonical_code(token: &str) -> String {
    match token.to_lowercase().as_str() {
        "ml" => "mL".into(),
        "l" => "L".into(),
        "mg" => "mg".into(),
        "g" => "g".into(),
        "kg" => "kg".into(),
        "ug" | "mcg" => "mcg".into(),
        "ui" | "iu" => "UI".into(),
        "h" | "hr" => "h".into(),
        "min" | "mn" => "min".into(),
        "s" | "sec" => "s".into(),
        _ => token.to_string(),
    }
}

/// Whether a unit string denotes a ratio unit such as `mg/kg`
pub fn is_compound(unit: &str) -> bool {
    unit.contains('/')
}

/// Split a compound unit into normalized (numerator, denominator) codes
///
/// Exactly one `/` is accepted and both sides must be non-empty. Each side
/// is normalized independently, so `ML/H` splits into (`mL`, `h`).
pub fn split_compound(unit: &str) -> Result<(String, String)> {
    let normalized = normalize_unit(unit)?;
    let parts: Vec<&str> = normalized.split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(Error::InvalidUnit(format!(
            "invalid compound unit: {}",
            unit.trim()
        )));
    }
    Ok((normalize_unit(parts[0])?, normalize_unit(parts[1])?))
}
