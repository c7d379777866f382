use anyhow::Result;
use log::info;
use rusqlite::{params, Connection};

use crate::db::job::JobRecord;

/// Insert a job record, replacing any earlier record with the same id
pub fn save_job(conn: &Connection, record: &JobRecord) -> Result<()> {
    info!("Adding job {} ({}) to history", record.drona_job_id, record.name);
    let params_json = serde_json::to_string(&record.params)?;

    conn.execute(
        "INSERT OR REPLACE INTO job \
         (drona_job_id, name, environment, env_dir, location, job_script, driver_script, params, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.drona_job_id,
            record.name,
            record.environment,
            record.env_dir,
            record.location,
            record.job_script,
            record.driver_script,
            params_json,
            record.created_at.to_rfc3339(),
        ],
    )?;

    Ok(())
}
