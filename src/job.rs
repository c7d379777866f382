//! Turn a submitted form into a job on disk
//!
//! A job goes through any number of previews followed by one submit. Nothing is stored on the
//! server in between: the identity fields returned by a preview are sent back with the next
//! request.

/// Decide job id, name and output location
pub mod identity;

/// Render and write job scripts for an environment
pub mod script;

/// Preview and submit requests
pub mod submit;
