use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Form fields that are given special meaning by the composer
pub const NAME: &str = "name";
pub const LOCATION: &str = "location";
pub const DRONA_JOB_ID: &str = "drona_job_id";
pub const USER_PICKED_LOCATION: &str = "user_picked_location";
pub const RUN_COMMAND: &str = "run_command";
pub const RUNTIME: &str = "runtime";
pub const ENV_NAME: &str = "env_name";
pub const ENV_DIR: &str = "env_dir";

/// A flat mapping of form field name to value
///
/// Every value is a string, the same way an HTTP form submission arrives. Missing keys are not an
/// error anywhere in the template engine, they expand to an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, String>);

impl ParameterSet {
    pub fn new() -> Self {
        ParameterSet(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value with surrounding whitespace removed, empty if absent
    pub fn trimmed(&self, key: &str) -> &str {
        self.get(key).map(str::trim).unwrap_or_default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Interpret a checkbox-like field
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).map(parse_bool).unwrap_or(false)
    }

    /// Build a parameter set from an untyped JSON object
    ///
    /// Scalars are stringified the way a browser would submit them. Nested arrays and objects are
    /// kept as compact JSON text.
    pub fn from_json(value: Value) -> Result<Self, ParamsError> {
        let Value::Object(object) = value else {
            return Err(ParamsError::NotAnObject);
        };

        let params = object
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();

        Ok(ParameterSet(params))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ParameterSet(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Form booleans: "1", "true", "t", "yes", "y" and "on" in any case
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "t" | "yes" | "y" | "on"
    )
}

#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("can't read parameters at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parameters are not valid JSON: {0}")]
    JSONDecode(#[from] serde_json::Error),
    #[error("parameters must be a JSON object")]
    NotAnObject,
}

/// A parameter file written by the web form (or by hand) as a JSON object
pub struct ParamsFile {
    pub path: PathBuf,
}

impl ParamsFile {
    pub fn read(&self) -> Result<ParameterSet, ParamsError> {
        let json: Value = self.parse_untyped_json()?;
        ParameterSet::from_json(json).map_err(|err| {
            warn!("Parameters at {} are not a flat object", self.path.display());
            err
        })
    }

    fn read_file(&self) -> Result<String, ParamsError> {
        let path: &Path = self.path.as_path();
        info!("Reading parameters at {}", path.display());
        fs::read_to_string(path).map_err(|source| {
            warn!("Can't read parameters at path {}: {}", path.display(), source);
            ParamsError::Read { path: path.to_path_buf(), source }
        })
    }

    fn parse_untyped_json(&self) -> Result<Value, ParamsError> {
        let json_string = self.read_file()?;
        Ok(serde_json::from_str::<Value>(&json_string)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_are_stringified() {
        let params = ParameterSet::from_json(json!({
            "cores": 4,
            "parallel": true,
            "name": "run-1",
            "gpu": null
        }))
        .unwrap();

        assert_eq!(params.get("cores"), Some("4"));
        assert_eq!(params.get("parallel"), Some("true"));
        assert_eq!(params.get("name"), Some("run-1"));
        assert_eq!(params.get("gpu"), Some(""));
    }

    #[test]
    fn arrays_are_rejected_at_top_level() {
        assert!(matches!(
            ParameterSet::from_json(json!(["a"])),
            Err(ParamsError::NotAnObject)
        ));
    }

    #[test]
    fn form_booleans() {
        for truthy in ["1", "true", "T", " yes ", "Y", "on"] {
            assert!(parse_bool(truthy), "{truthy}");
        }
        for falsy in ["", "0", "false", "off", "nope"] {
            assert!(!parse_bool(falsy), "{falsy}");
        }
    }

    #[test]
    fn trimmed_missing_key_is_empty() {
        let params: ParameterSet = [("name", "  job  ")].into_iter().collect();
        assert_eq!(params.trimmed("name"), "job");
        assert_eq!(params.trimmed("location"), "");
        assert!(!params.flag(USER_PICKED_LOCATION));
    }
}
