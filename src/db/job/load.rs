use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::job::JobRecord;

const COLUMNS: &str =
    "drona_job_id, name, environment, env_dir, location, job_script, driver_script, params, created_at";

/// Raw row, decoded into a JobRecord outside of rusqlite
struct JobRow {
    drona_job_id: String,
    name: String,
    environment: String,
    env_dir: String,
    location: String,
    job_script: String,
    driver_script: String,
    params: String,
    created_at: String,
}

impl JobRow {
    fn from_row(row: &Row) -> rusqlite::Result<JobRow> {
        Ok(JobRow {
            drona_job_id: row.get(0)?,
            name: row.get(1)?,
            environment: row.get(2)?,
            env_dir: row.get(3)?,
            location: row.get(4)?,
            job_script: row.get(5)?,
            driver_script: row.get(6)?,
            params: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn decode(self) -> Result<JobRecord> {
        let params = serde_json::from_str(&self.params)
            .with_context(|| format!("Invalid parameters stored for job {}", self.drona_job_id))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .with_context(|| format!("Invalid timestamp stored for job {}", self.drona_job_id))?
            .with_timezone(&Utc);

        Ok(JobRecord {
            drona_job_id: self.drona_job_id,
            name: self.name,
            environment: self.environment,
            env_dir: self.env_dir,
            location: self.location,
            job_script: self.job_script,
            driver_script: self.driver_script,
            params,
            created_at,
        })
    }
}

pub fn get_job(conn: &Connection, drona_job_id: &str) -> Result<Option<JobRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM job WHERE drona_job_id = ?1"))?;
    let row = stmt.query_row([drona_job_id], JobRow::from_row).optional()?;
    row.map(JobRow::decode).transpose()
}

/// Every recorded job, newest first
pub fn list_jobs(conn: &Connection) -> Result<Vec<JobRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM job ORDER BY created_at DESC"))?;
    let rows = stmt.query_map([], JobRow::from_row)?;

    let mut jobs: Vec<JobRecord> = Vec::new();
    for row in rows {
        let job = row?.decode()?;
        info!("Loading job from history: {}", job.drona_job_id);
        jobs.push(job);
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job::save::save_job;
    use crate::db::open::open_in_memory;
    use chrono::TimeZone;

    fn record(id: &str, name: &str, minute: u32) -> JobRecord {
        JobRecord {
            drona_job_id: id.to_string(),
            name: name.to_string(),
            environment: "Generic".to_string(),
            env_dir: "/envs".to_string(),
            location: format!("/runs/{id}"),
            job_script: format!("/runs/{id}/{name}.job"),
            driver_script: format!("/runs/{id}/run.sh"),
            params: [("cores", "4")].into_iter().collect(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    #[test]
    fn saved_job_round_trips() {
        let conn = open_in_memory().unwrap();
        let job = record("101", "blast", 0);
        save_job(&conn, &job).unwrap();

        assert_eq!(get_job(&conn, "101").unwrap(), Some(job));
        assert_eq!(get_job(&conn, "999").unwrap(), None);
    }

    #[test]
    fn resubmitting_replaces_and_lists_newest_first() {
        let conn = open_in_memory().unwrap();
        save_job(&conn, &record("101", "first", 0)).unwrap();
        save_job(&conn, &record("102", "second", 5)).unwrap();
        save_job(&conn, &record("101", "first-again", 10)).unwrap();

        let names: Vec<String> = list_jobs(&conn).unwrap().into_iter().map(|j| j.name).collect();
        assert_eq!(names, vec!["first-again", "second"]);
    }
}
