//! Parameters submitted with a preview or submit request

/// Flat string parameters as submitted by the job form
pub mod params;

/// Validate environment map files against a bundled JSON schema
pub mod schema;
