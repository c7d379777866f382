//! Job history records
//!
//! A record is written once the job script and driver are on disk. Submitting again with the same
//! drona job id replaces the earlier record, so the id stays a unique key for lookups.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::request::params::ParameterSet;

pub mod load;
pub mod save;

/// Everything needed to find and rerun a submitted job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub drona_job_id: String,
    pub name: String,
    pub environment: String,
    pub env_dir: String,
    pub location: String,
    pub job_script: String,
    pub driver_script: String,
    pub params: ParameterSet,
    pub created_at: DateTime<Utc>,
}
