use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::job::save::save_job;
use crate::db::job::JobRecord;
use crate::job::identity::IdentityRequest;
use crate::job::script::{Outcome, ScriptEngine};
use crate::request::params::{ParameterSet, DRONA_JOB_ID, ENV_DIR, ENV_NAME, LOCATION, NAME, RUNTIME};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("No environment selected")]
    NoEnvironment,
    #[error("Missing drona_job_id. Please preview the job before submitting.")]
    MissingJobId,
    #[error("Missing location. Please preview the job before submitting.")]
    MissingLocation,
}

/// Preview result plus the fields the client must send back with its next request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewResponse {
    pub script: String,
    pub warning: String,
    pub drona_job_id: String,
    pub name: String,
    pub location: String,
    pub env_name: String,
    pub env_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResponse {
    pub bash_cmd: String,
    pub drona_job_id: String,
    pub location: String,
    pub env_name: String,
    pub env_dir: String,
}

/// Resolve the job identity and render the job script for review
///
/// `runs_dir` is the default parent of job locations when the form doesn't give one.
pub fn preview_job(engine: &ScriptEngine, mut params: ParameterSet, runs_dir: &Path) -> Result<PreviewResponse> {
    let identity = IdentityRequest::from_params(&params).resolve(runs_dir);
    identity.apply(&mut params);
    info!("Previewing job {} at {}", identity.name, identity.location);

    let preview = engine
        .preview_script(&params)?
        .ready()
        .ok_or(RequestError::NoEnvironment)?;

    Ok(PreviewResponse {
        script: preview.script,
        warning: preview.warning,
        drona_job_id: identity.drona_job_id,
        name: identity.name,
        location: identity.location,
        env_name: params.trimmed(ENV_NAME).to_string(),
        env_dir: params.trimmed(ENV_DIR).to_string(),
    })
}

/// Write the job files to the previewed location and record the job in the history
///
/// The location is used exactly as the preview returned it.
pub fn submit_job(engine: &ScriptEngine, mut params: ParameterSet, conn: &Connection) -> Result<SubmitResponse> {
    let drona_job_id = params.trimmed(DRONA_JOB_ID).to_string();
    if drona_job_id.is_empty() {
        return Err(RequestError::MissingJobId.into());
    }
    let location = params.trimmed(LOCATION).to_string();
    if location.is_empty() {
        return Err(RequestError::MissingLocation.into());
    }
    params.insert(LOCATION, location.as_str());
    if params.trimmed(NAME).is_empty() {
        params.insert(NAME, drona_job_id.as_str());
    }

    fs::create_dir_all(&location).with_context(|| format!("Can't create job location {location}"))?;

    let job_script = ready(engine.generate_script(&params)?)?;
    let driver_script = ready(engine.generate_driver_script(&params)?)?;
    let bash_cmd = format!("bash {}", driver_script.display());

    let environment = match params.trimmed(RUNTIME) {
        "" => engine.environment().map(|e| e.name.clone()).unwrap_or_default(),
        runtime => runtime.to_string(),
    };
    let record = JobRecord {
        drona_job_id: drona_job_id.clone(),
        name: params.trimmed(NAME).to_string(),
        environment,
        env_dir: params.trimmed(ENV_DIR).to_string(),
        location: location.clone(),
        job_script: job_script.display().to_string(),
        driver_script: driver_script.display().to_string(),
        params: params.clone(),
        created_at: Utc::now(),
    };
    save_job(conn, &record)?;

    Ok(SubmitResponse {
        bash_cmd,
        drona_job_id,
        location,
        env_name: params.trimmed(ENV_NAME).to_string(),
        env_dir: params.trimmed(ENV_DIR).to_string(),
    })
}

fn ready<T>(outcome: Outcome<T>) -> Result<T, RequestError> {
    outcome.ready().ok_or(RequestError::NoEnvironment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open::open_in_memory;
    use crate::template::FunctionRegistry;

    #[test]
    fn submit_requires_a_preview() {
        let engine = ScriptEngine::new(FunctionRegistry::new());
        let conn = open_in_memory().unwrap();

        let err = submit_job(&engine, ParameterSet::new(), &conn).unwrap_err();
        assert_eq!(err.downcast_ref::<RequestError>(), Some(&RequestError::MissingJobId));

        let params: ParameterSet = [("drona_job_id", "5")].into_iter().collect();
        let err = submit_job(&engine, params, &conn).unwrap_err();
        assert_eq!(err.downcast_ref::<RequestError>(), Some(&RequestError::MissingLocation));
    }

    #[test]
    fn preview_without_environment_fails() {
        let engine = ScriptEngine::new(FunctionRegistry::new());
        let err = preview_job(&engine, ParameterSet::new(), Path::new("/runs")).unwrap_err();
        assert_eq!(err.downcast_ref::<RequestError>(), Some(&RequestError::NoEnvironment));
    }
}
