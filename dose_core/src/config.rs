//! TOML catalog-file support.
//!
//! A catalog file carries unit and conversion rows:
//!
//! ```toml
//! [[units]]
//! code = "mg"
//! kind = "mass"
//! base_code = "g"
//! to_base_factor = "0.001"
//!
//! [[conversions]]
//! from_unit = "gtt"
//! to_unit = "mL"
//! factor = "0.05"
//! ```
//!
//! Factors should be written as strings so they parse as exact decimals;
//! plain TOML numbers are accepted but route through floating point.

use crate::catalog::{CatalogRows, CatalogSource};
use crate::Result;
use std::path::{Path, PathBuf};

/// Catalog source reading rows from a TOML file
#[derive(Clone, Debug)]
pub struct CatalogFile {
    path: PathBuf,
}

impl CatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for CatalogFile {
    fn load(&self) -> Result<CatalogRows> {
        let contents = std::fs::read_to_string(&self.path)?;
        let rows: CatalogRows = toml::from_str(&contents)?;
        tracing::info!(
            "Loaded {} unit rows and {} conversion rows from {:?}",
            rows.units.len(),
            rows.conversions.len(),
            self.path
        );
        Ok(rows)
    }
}
