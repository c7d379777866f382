//! Job composer core for a shared HPC cluster
//!
//! Users describe a computation as a flat set of form parameters. An *environment* bundle
//! supplies a map of expressions, a script template and a driver template. The template engine
//! expands the map against the parameters, substitutes the results into the templates and writes
//! the job script plus driver into the job's output directory.

/// Read and validate the user configuration file
pub mod config;
/// Load environment bundles from disk
pub mod environment;
/// Expand maps and render templates
pub mod template;
/// Job identity resolution and script generation
pub mod job;
/// Form parameters and map validation
pub mod request;
/// All submitted jobs are recorded in a SQLite database
pub mod db;
