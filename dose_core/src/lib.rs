#![forbid(unsafe_code)]

//! Core domain model and computation logic for the Dosis engine.
//!
//! This crate provides:
//! - Domain types (requests, quantities, calculation results)
//! - Unit normalization and the conversion catalog
//! - Conversion resolution over a single-hop star topology
//! - Dose calculation strategies and request validation
//! - A façade engine tying catalog, validator, and calculator together

pub mod types;
pub mod error;
pub mod units;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod resolver;
pub mod validator;
pub mod calculator;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{builtin_rows, CatalogRows, CatalogSource, LazyCatalog, UnitCatalog};
pub use config::CatalogFile;
pub use engine::DoseEngine;
pub use resolver::{convert, convert_compound, to_absolute_dose};
pub use units::{is_compound, normalize_unit, split_compound};
pub use validator::validate_request;
