//! Persistence layer for the AirTag tracker backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations, including the domain store traits
//! - Query metrics

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
