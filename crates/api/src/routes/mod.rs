//! HTTP route handlers.

pub mod devices;
pub mod health;
pub mod ingest;
pub mod locations;
