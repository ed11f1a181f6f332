//! Endfield Production Calculator
//!
//! Resolves a factory item's recipe graph into the machines and raw
//! materials needed to sustain a target output.

pub mod calculator;
pub mod catalog;
pub mod db;
pub mod extract;
pub mod models;

pub use calculator::{CalcError, Demand, RateUnit, Resolution, ResolveOptions, resolve};
pub use catalog::{Catalog, CatalogError};
pub use models::{EdgeMeta, NodeDemand, Production, Recipe, ResolvedNode, ResourceTotals};
