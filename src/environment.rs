//! Environment bundles
//!
//! An environment is a directory describing one kind of submittable job:
//!
//! | file               | purpose                                               |
//! | ------------------ | ----------------------------------------------------- |
//! | `map.json`         | placeholder key to map expression                     |
//! | `schema.json`      | form schema rendered by the web client (opaque here)  |
//! | `template.txt`     | job script template, read at preview time             |
//! | `driver.sh`        | driver template that submits the job script           |
//! | `additional_files` | optional manifest of extra templates, one per line    |
//! | `functions/`       | optional directory of executable map functions        |

use std::path::PathBuf;

use serde_json::Value;

use crate::template::{FunctionRegistry, MapSpec};

/// Read the bundle files into an Environment
pub mod load;

/// Parse the additional files manifest
pub mod manifest;

pub const MAP_FILE: &str = "map.json";
pub const SCHEMA_FILE: &str = "schema.json";
pub const TEMPLATE_FILE: &str = "template.txt";
pub const DRIVER_FILE: &str = "driver.sh";
pub const MANIFEST_FILE: &str = "additional_files";
pub const FUNCTIONS_DIR: &str = "functions";

/// A loaded environment bundle
///
/// Loaded once per selection. The per-environment functions are discovered at load time and
/// reused for every expansion.
#[derive(Debug, Clone)]
pub struct Environment {
    pub name: String,
    pub dir: PathBuf,
    pub map: MapSpec,
    /// Form schema, handed to the client unchanged
    pub schema: Value,
    pub driver: String,
    /// Extra templates written next to the job script, in manifest order
    pub additional_files: Vec<AdditionalFile>,
    pub functions: Option<FunctionRegistry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalFile {
    pub name: String,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("can't read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not valid JSON: {source}", path.display())]
    JSONDecode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{} is not a valid map: {}", path.display(), reasons.join("; "))]
    InvalidMap {
        path: PathBuf,
        reasons: Vec<String>,
    },
}

impl Environment {
    pub fn template_path(&self) -> PathBuf {
        self.dir.join(TEMPLATE_FILE)
    }
}
