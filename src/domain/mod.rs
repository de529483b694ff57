// Domain-specific error types
pub mod errors;

// Artifact metadata, feature registry and feature tables
pub mod ml;

// Repository traits
pub mod repositories;

// Scored output
pub mod signal;

// Insider filings
pub mod trade;
