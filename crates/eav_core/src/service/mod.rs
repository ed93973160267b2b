//! Use-case layer over repository contracts.
//!
//! # Responsibility
//! - Bundle entity records with attribute accessors.
//! - Orchestrate repository calls without touching SQL.

pub mod entity_handle;
pub mod entity_service;
