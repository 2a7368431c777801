//! Shared utilities for the AirTag tracker backend.
//!
//! Currently this is the home of the validation helpers used by request
//! models and configuration in the other crates.

pub mod validation;
