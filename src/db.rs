//! Submitted jobs are recorded in a SQLite database so they can be looked up again

/// Connect to a SQLite database
pub mod open;
/// Save and load job records
pub mod job;
