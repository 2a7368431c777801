//! Domain layer for the AirTag tracker backend.
//!
//! This crate contains:
//! - Domain models (Device, LocationReading, VisitGroup)
//! - The ingestion services: text normalization, fuzzy device matching,
//!   device resolution and the reading pipeline
//! - Pure read-side helpers (timeline grouping, distances)
//! - Domain error types

pub mod errors;
pub mod models;
pub mod services;
