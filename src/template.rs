//! Expand environment maps and render script templates
//!
//! A map value is a small expression language evaluated in three passes, always in this order:
//!
//! 1. `-X $name` becomes `-X <value>`, or nothing when `name` is missing or empty
//! 2. `$name` becomes the parameter value, or nothing when missing
//! 3. `!function(a, b)` becomes the result of calling `function` with the literal arguments
//!
//! The expanded values are then substituted into `[key]` placeholders in a template.

use std::collections::BTreeMap;

/// The three expression passes over a single map value
pub mod expand;

/// Named functions callable from map expressions
pub mod functions;

/// Functions available to every environment
pub mod builtins;

/// Functions provided as executables by an environment
pub mod external;

/// Placeholder substitution and output normalisation
pub mod render;

/// Map key to map expression, iterated in key order
pub type MapSpec = BTreeMap<String, String>;

/// Reserved map key whose expanded value is shown next to a preview
pub const WARNING_KEY: &str = "drona_warning";

pub use expand::evaluate_map;
pub use functions::{FunctionError, FunctionNamespace, FunctionRegistry};
pub use render::{custom_replace, job_file_name, normalize};
