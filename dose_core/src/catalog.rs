//! Unit catalog: definitions, direct conversion factors, and load sources.
//!
//! The catalog is built from two row collections handed over by a
//! persistence collaborator, validated as a whole, and immutable after
//! construction. [`LazyCatalog`] defers that construction to first use
//! behind a load-once guard.

use crate::units::{is_compound, normalize_unit, split_compound};
use crate::{Error, Result};
use once_cell::sync::OnceCell;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Row Types
// ============================================================================

/// Raw unit row as supplied by a persistence collaborator
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UnitRow {
    pub code: String,
    pub kind: String,
    pub base_code: Option<String>,
    pub to_base_factor: Option<Decimal>,
}

/// Raw direct-conversion row for one ordered unit pair
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConversionRow {
    pub from_unit: String,
    pub to_unit: String,
    pub factor: Decimal,
}

/// The two row collections a catalog is built from
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogRows {
    #[serde(default)]
    pub units: Vec<UnitRow>,
    #[serde(default)]
    pub conversions: Vec<ConversionRow>,
}

/// Source of catalog rows, the seam a persistence collaborator implements
pub trait CatalogSource: Send + Sync {
    /// Fetch the raw unit and conversion rows
    fn load(&self) -> Result<CatalogRows>;
}

/// In-memory rows are themselves a source
impl CatalogSource for CatalogRows {
    fn load(&self) -> Result<CatalogRows> {
        Ok(self.clone())
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// A unit definition held by the catalog
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    pub code: String,
    pub kind: String,
    pub base_code: Option<String>,
    pub to_base_factor: Option<Decimal>,
}

/// Immutable lookup tables for units and direct conversion factors
///
/// Codes are normalized at construction, so lookups expect normalized
/// codes (the resolver normalizes caller input before consulting us).
#[derive(Clone, Debug, Default)]
pub struct UnitCatalog {
    units: HashMap<String, Unit>,
    direct: HashMap<(String, String), Decimal>,
}

impl UnitCatalog {
    /// Build a catalog from raw rows, rejecting any invariant violation
    ///
    /// Unit codes are normalized before insertion; duplicate codes after
    /// normalization are an error. For conversion rows, a later row
    /// overrides an earlier one for the same ordered pair. Every problem
    /// found is reported in one `CatalogUnavailable` error.
    pub fn from_rows(rows: CatalogRows) -> Result<UnitCatalog> {
        let mut units = HashMap::new();
        let mut direct = HashMap::new();
        let mut errors = Vec::new();

        for row in &rows.units {
            let code = match normalize_unit(&row.code) {
                Ok(code) => code,
                Err(_) => {
                    errors.push("unit row with an empty code".to_string());
                    continue;
                }
            };
            let base_code = match &row.base_code {
                Some(raw) => match normalize_unit(raw) {
                    Ok(base) => Some(base),
                    Err(_) => {
                        errors.push(format!("unit '{}' has an empty base code", code));
                        continue;
                    }
                },
                None => None,
            };
            let unit = Unit {
                code: code.clone(),
                kind: row.kind.clone(),
                base_code,
                to_base_factor: row.to_base_factor,
            };
            if units.insert(code.clone(), unit).is_some() {
                errors.push(format!("duplicate unit code '{}' after normalization", code));
            }
        }

        for row in &rows.conversions {
            match (normalize_unit(&row.from_unit), normalize_unit(&row.to_unit)) {
                (Ok(from), Ok(to)) => {
                    direct.insert((from, to), row.factor);
                }
                _ => errors.push("conversion row with an empty unit code".to_string()),
            }
        }

        let catalog = UnitCatalog { units, direct };
        errors.extend(catalog.validate());

        if errors.is_empty() {
            Ok(catalog)
        } else {
            Err(Error::CatalogUnavailable(errors.join("; ")))
        }
    }

    /// Validate catalog invariants, returning every problem found
    ///
    /// Base references must form a single-hop star per kind: a base unit
    /// references itself with factor 1, and every other unit with a base
    /// points straight at such a base of its own kind.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (code, unit) in &self.units {
            match (&unit.base_code, unit.to_base_factor) {
                (Some(base), Some(factor)) => {
                    if factor.is_zero() {
                        errors.push(format!("unit '{}' has a zero base factor", code));
                        continue;
                    }
                    if base == code {
                        if factor != Decimal::ONE {
                            errors.push(format!(
                                "base unit '{}' must reference itself with factor 1",
                                code
                            ));
                        }
                        continue;
                    }
                    match self.units.get(base) {
                        Some(base_unit) => {
                            if base_unit.kind != unit.kind {
                                errors.push(format!(
                                    "unit '{}' of kind '{}' has base '{}' of kind '{}'",
                                    code, unit.kind, base, base_unit.kind
                                ));
                            }
                            if base_unit.base_code.as_deref() != Some(base.as_str()) {
                                errors.push(format!(
                                    "base '{}' of unit '{}' is not a base unit itself",
                                    base, code
                                ));
                            }
                        }
                        None => errors.push(format!(
                            "unit '{}' references unknown base '{}'",
                            code, base
                        )),
                    }
                }
                (Some(_), None) => {
                    errors.push(format!("unit '{}' has a base code but no base factor", code));
                }
                (None, Some(_)) => {
                    errors.push(format!("unit '{}' has a base factor but no base code", code));
                }
                (None, None) => {}
            }
        }

        errors
    }

    /// Look up a unit definition by normalized code
    pub fn lookup_unit(&self, code: &str) -> Option<&Unit> {
        self.units.get(code)
    }

    /// Direct factor for an ordered pair of normalized codes
    ///
    /// Identity wins over any stored entry: equal codes always give 1.
    pub fn direct_factor(&self, from: &str, to: &str) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        self.direct
            .get(&(from.to_string(), to.to_string()))
            .copied()
    }

    /// Check that a unit (every side of a compound) is known to the catalog
    ///
    /// A unit counts as known if it is defined in the unit table or appears
    /// on either side of a direct conversion entry.
    pub fn ensure_unit_exists(&self, unit: &str) -> Result<()> {
        let normalized = normalize_unit(unit)?;
        if is_compound(&normalized) {
            let (num, den) = split_compound(&normalized)?;
            self.ensure_unit_exists(&num)?;
            self.ensure_unit_exists(&den)?;
            return Ok(());
        }
        if self.units.contains_key(&normalized) {
            return Ok(());
        }
        let in_direct = self
            .direct
            .keys()
            .any(|(from, to)| *from == normalized || *to == normalized);
        if in_direct {
            return Ok(());
        }
        Err(Error::InvalidUnit(format!("unknown unit: {}", normalized)))
    }

    /// Number of units in the catalog
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Number of direct conversion entries
    pub fn direct_count(&self) -> usize {
        self.direct.len()
    }
}

// ============================================================================
// Built-in Seed Rows
// ============================================================================

/// Seed rows for the clinical units the dose strategies rely on
///
/// Mass sits on base `g`, volume on base `L` (with drops reaching `mL`
/// through a direct factor), time on base `s`. `UI` has no base:
/// international units measure biological activity and are not
/// mass-convertible.
pub fn builtin_rows() -> CatalogRows {
    fn unit(code: &str, kind: &str, base_code: &str, to_base_factor: Decimal) -> UnitRow {
        UnitRow {
            code: code.to_string(),
            kind: kind.to_string(),
            base_code: Some(base_code.to_string()),
            to_base_factor: Some(to_base_factor),
        }
    }

    let units = vec![
        // Mass
        unit("g", "mass", "g", dec!(1)),
        unit("mg", "mass", "g", dec!(0.001)),
        unit("mcg", "mass", "g", dec!(0.000001)),
        unit("kg", "mass", "g", dec!(1000)),
        // Volume
        unit("L", "volume", "L", dec!(1)),
        unit("mL", "volume", "L", dec!(0.001)),
        UnitRow {
            code: "gtt".to_string(),
            kind: "volume".to_string(),
            base_code: None,
            to_base_factor: None,
        },
        // Time
        unit("s", "time", "s", dec!(1)),
        unit("min", "time", "s", dec!(60)),
        unit("h", "time", "s", dec!(3600)),
        // Biological activity
        UnitRow {
            code: "UI".to_string(),
            kind: "activity".to_string(),
            base_code: None,
            to_base_factor: None,
        },
    ];

    let conversions = vec![ConversionRow {
        from_unit: "gtt".to_string(),
        to_unit: "mL".to_string(),
        factor: dec!(0.05),
    }];

    CatalogRows { units, conversions }
}

// ============================================================================
// Lazy Loading
// ============================================================================

/// Load-once wrapper around a catalog source
///
/// The first `get` fetches the rows and builds the catalog; concurrent
/// first callers block until that load finishes and then share the same
/// instance. A failed load is not cached, so a later call retries the
/// source.
pub struct LazyCatalog {
    source: Option<Box<dyn CatalogSource>>,
    loaded: OnceCell<UnitCatalog>,
}

impl LazyCatalog {
    /// Wrap a source without loading it yet
    pub fn new(source: impl CatalogSource + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            loaded: OnceCell::new(),
        }
    }

    /// Wrap an already-built catalog; no source is consulted
    pub fn preloaded(catalog: UnitCatalog) -> Self {
        let loaded = OnceCell::new();
        let _ = loaded.set(catalog);
        Self {
            source: None,
            loaded,
        }
    }

    /// Get the catalog, loading it on first use
    ///
    /// Any source failure surfaces as `CatalogUnavailable`.
    pub fn get(&self) -> Result<&UnitCatalog> {
        self.loaded.get_or_try_init(|| {
            let source = self.source.as_ref().ok_or_else(|| {
                Error::CatalogUnavailable("no catalog source configured".to_string())
            })?;
            tracing::info!("Loading unit catalog");
            let rows = source.load().map_err(|e| match e {
                Error::CatalogUnavailable(_) => e,
                other => Error::CatalogUnavailable(other.to_string()),
            })?;
            let catalog = UnitCatalog::from_rows(rows)?;
            tracing::info!(
                "Unit catalog loaded: {} units, {} direct conversions",
                catalog.unit_count(),
                catalog.direct_count()
            );
            Ok(catalog)
        })
    }
}
