use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::environment::{Environment, EnvironmentError};
use crate::request::params::{ParameterSet, LOCATION, NAME, RUN_COMMAND};
use crate::template::render::{finish, normalize, substitute};
use crate::template::{evaluate_map, job_file_name, FunctionNamespace, FunctionRegistry, MapSpec, WARNING_KEY};

/// File name of the rendered driver inside the job location
pub const DRIVER_SCRIPT: &str = "run.sh";

/// Result of an engine operation that needs a selected environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    NoEnvironment,
    Ready(T),
}

impl<T> Outcome<T> {
    /// The value, or `None` when no environment was selected
    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(value) => Some(value),
            Outcome::NoEnvironment => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::NoEnvironment => write!(f, "No environment selected"),
            Outcome::Ready(value) => write!(f, "{value}"),
        }
    }
}

/// A rendered job script with the environment's warning text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewJob {
    pub script: String,
    pub warning: String,
}

/// Renders job scripts for the selected environment
///
/// The built-in functions are handed in at construction. The environment's own functions come
/// with the environment and shadow the built-ins.
///
/// The last expansion of the map is kept with the parameters it was made from. Generating the job
/// script and then the driver from the same parameters runs each map function only once.
pub struct ScriptEngine {
    builtins: FunctionRegistry,
    environment: Option<Environment>,
    evaluated: RefCell<Option<(ParameterSet, MapSpec)>>,
}

impl ScriptEngine {
    pub fn new(builtins: FunctionRegistry) -> Self {
        ScriptEngine { builtins, environment: None, evaluated: RefCell::new(None) }
    }

    pub fn set_environment(&mut self, env_dir: &Path, name: &str) -> Result<(), EnvironmentError> {
        self.environment = Some(Environment::load(env_dir, name)?);
        self.evaluated.replace(None);
        Ok(())
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self.evaluated.replace(None);
        self
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    fn functions<'a>(&'a self, environment: &'a Environment) -> FunctionNamespace<'a> {
        FunctionNamespace::new(&self.builtins, environment.functions.as_ref())
    }

    /// The JSON schema of the environment's job form
    pub fn form_schema(&self) -> Outcome<&Value> {
        match &self.environment {
            Some(environment) => Outcome::Ready(&environment.schema),
            None => Outcome::NoEnvironment,
        }
    }

    /// Expand the environment's map, reusing the previous expansion for identical parameters
    fn evaluate(&self, environment: &Environment, params: &ParameterSet) -> MapSpec {
        let mut evaluated = self.evaluated.borrow_mut();
        if let Some((previous, map)) = evaluated.as_ref() {
            if previous == params {
                debug!("Reusing expanded map for {}", environment.name);
                return map.clone();
            }
        }

        let map = evaluate_map(&environment.map, params, &self.functions(environment));
        *evaluated = Some((params.clone(), map.clone()));
        map
    }

    /// Render the environment's template for review
    pub fn preview_script(&self, params: &ParameterSet) -> Result<Outcome<PreviewJob>, EnvironmentError> {
        let Some(environment) = &self.environment else {
            return Ok(Outcome::NoEnvironment);
        };

        let template = environment.fetch_template()?;
        let evaluated = self.evaluate(environment, params);
        let script = finish(&substitute(&template, &evaluated), params);
        let warning = evaluated.get(WARNING_KEY).cloned().unwrap_or_default();

        Ok(Outcome::Ready(PreviewJob { script, warning }))
    }

    /// Write the user-reviewed script and the environment's additional files to the job location
    ///
    /// The job script is the `run_command` parameter as edited after preview, not a fresh
    /// rendering of the template.
    pub fn generate_script(&self, params: &ParameterSet) -> io::Result<Outcome<PathBuf>> {
        let Some(environment) = &self.environment else {
            return Ok(Outcome::NoEnvironment);
        };

        let location = job_location(params);
        let job_file = job_file_name(params.get(NAME).unwrap_or_default());
        let job_file_path = location.join(&job_file);

        let script = normalize(params.get(RUN_COMMAND).unwrap_or_default());
        write_file(&job_file_path, &script)?;

        let evaluated = self.evaluate(environment, params);
        for file in &environment.additional_files {
            let content = finish(&substitute(&file.content, &evaluated), params);
            write_file(&location.join(&file.name), &content)?;
        }

        Ok(Outcome::Ready(job_file_path))
    }

    /// Render the driver into `run.sh` at the job location
    pub fn generate_driver_script(&self, params: &ParameterSet) -> io::Result<Outcome<PathBuf>> {
        let Some(environment) = &self.environment else {
            return Ok(Outcome::NoEnvironment);
        };

        let driver_path = job_location(params).join(DRIVER_SCRIPT);
        let evaluated = self.evaluate(environment, params);
        let driver = finish(&substitute(&environment.driver, &evaluated), params);
        write_file(&driver_path, &driver)?;

        Ok(Outcome::Ready(driver_path))
    }
}

fn job_location(params: &ParameterSet) -> PathBuf {
    PathBuf::from(params.get(LOCATION).unwrap_or_default())
}

fn write_file(path: &Path, content: &str) -> io::Result<()> {
    if path.exists() {
        warn!("{} already exists and will be overwritten", path.display());
    }
    info!("Writing {}", path.display());
    fs::write(path, content)
}
