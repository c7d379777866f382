use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::Value;

use crate::environment::manifest::read_additional_files;
use crate::environment::{
    Environment, EnvironmentError, DRIVER_FILE, FUNCTIONS_DIR, MAP_FILE, SCHEMA_FILE,
};
use crate::request::schema::{load_map_schema, validate_map};
use crate::template::external::load_functions;
use crate::template::MapSpec;

impl Environment {
    /// Load the environment `name` from the environments directory `env_dir`
    pub fn load(env_dir: &Path, name: &str) -> Result<Environment, EnvironmentError> {
        let dir = env_dir.join(name);
        info!("Loading environment {} from {}", name, dir.display());

        let map = read_map(&dir.join(MAP_FILE))?;
        let schema = read_json(&dir.join(SCHEMA_FILE))?;
        let driver = read_text(&dir.join(DRIVER_FILE))?;
        let additional_files = read_additional_files(&dir)?;

        let functions_dir = dir.join(FUNCTIONS_DIR);
        let functions = match functions_dir.is_dir() {
            true => Some(load_functions(&functions_dir).map_err(|source| EnvironmentError::Read {
                path: functions_dir.clone(),
                source,
            })?),
            false => None,
        };

        Ok(Environment {
            name: name.to_string(),
            dir,
            map,
            schema,
            driver,
            additional_files,
            functions,
        })
    }

    /// Read the job script template
    ///
    /// Read on every preview so template edits show up without reselecting the environment.
    pub fn fetch_template(&self) -> Result<String, EnvironmentError> {
        read_text(&self.template_path())
    }
}

pub(crate) fn read_text(path: &Path) -> Result<String, EnvironmentError> {
    fs::read_to_string(path).map_err(|source| {
        warn!("Can't read {}: {}", path.display(), source);
        EnvironmentError::Read { path: PathBuf::from(path), source }
    })
}

fn read_json(path: &Path) -> Result<Value, EnvironmentError> {
    let json_string = read_text(path)?;
    serde_json::from_str::<Value>(&json_string).map_err(|source| EnvironmentError::JSONDecode {
        path: PathBuf::from(path),
        source,
    })
}

fn read_map(path: &Path) -> Result<MapSpec, EnvironmentError> {
    let json = read_json(path)?;
    let compiled_schema = load_map_schema();
    validate_map(&compiled_schema, &json).map_err(|reasons| EnvironmentError::InvalidMap {
        path: PathBuf::from(path),
        reasons,
    })?;

    // validated above, so every value is a string
    serde_json::from_value::<MapSpec>(json).map_err(|source| EnvironmentError::JSONDecode {
        path: PathBuf::from(path),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_bundle(root: &Path, name: &str, map: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MAP_FILE), map).unwrap();
        fs::write(dir.join(SCHEMA_FILE), r#"{"cores": {"type": "number"}}"#).unwrap();
        fs::write(dir.join(DRIVER_FILE), "sbatch [job-file-name]\n").unwrap();
        dir
    }

    #[test]
    fn loads_a_minimal_bundle() {
        let root = TempDir::new().unwrap();
        write_bundle(root.path(), "Generic", r#"{"cores": "-n $cores"}"#);

        let env = Environment::load(root.path(), "Generic").unwrap();
        assert_eq!(env.name, "Generic");
        assert_eq!(env.map["cores"], "-n $cores");
        assert_eq!(env.driver, "sbatch [job-file-name]\n");
        assert_eq!(env.schema, serde_json::json!({"cores": {"type": "number"}}));
        assert!(env.additional_files.is_empty());
        assert!(env.functions.is_none());
    }

    #[test]
    fn missing_driver_is_an_error() {
        let root = TempDir::new().unwrap();
        let dir = write_bundle(root.path(), "Generic", "{}");
        fs::remove_file(dir.join(DRIVER_FILE)).unwrap();

        assert!(matches!(
            Environment::load(root.path(), "Generic"),
            Err(EnvironmentError::Read { .. })
        ));
    }

    #[test]
    fn non_string_map_values_are_rejected() {
        let root = TempDir::new().unwrap();
        write_bundle(root.path(), "Generic", r#"{"cores": 4}"#);

        assert!(matches!(
            Environment::load(root.path(), "Generic"),
            Err(EnvironmentError::InvalidMap { .. })
        ));
    }

    #[test]
    fn template_is_read_lazily() {
        let root = TempDir::new().unwrap();
        let dir = write_bundle(root.path(), "Generic", "{}");
        let env = Environment::load(root.path(), "Generic").unwrap();

        assert!(env.fetch_template().is_err());
        fs::write(dir.join("template.txt"), "#!/bin/bash\n").unwrap();
        assert_eq!(env.fetch_template().unwrap(), "#!/bin/bash\n");
    }
}
