//! Execution engine for dbconverge
//!
//! The engine orchestrates:
//! 1. Planning - Refresh recorded state and compare it with the manifest
//! 2. Diffing - Show what each address needs
//! 3. Executing - Apply changes in dependency stages, in parallel within each

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ExecuteOptions, execute};
