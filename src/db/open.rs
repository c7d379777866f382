use std::path::Path;

use log::info;

/// File name of the history database inside the drona directory
pub const DB_FILE: &str = "history.db";

pub fn open_db(dir: &Path) -> rusqlite::Result<rusqlite::Connection> {
    let path = &dir.join(DB_FILE);
    if !path.exists() { info!("Creating new database {}", path.display()) }
    let conn = rusqlite::Connection::open(path)?;
    create_schema(&conn)?;
    Ok(conn)
}

/// An in-memory history, nothing is persisted
pub fn open_in_memory() -> rusqlite::Result<rusqlite::Connection> {
    let conn = rusqlite::Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/db/schema.sql"));
    conn.execute(SCHEMA, [])?;
    Ok(())
}
