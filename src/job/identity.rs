use std::path::{Component, Path, PathBuf};

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::request::params::{ParameterSet, DRONA_JOB_ID, LOCATION, NAME, USER_PICKED_LOCATION};

/// Marks a round-tripped job id as stale: a new one must be minted
pub const DEPRECATED_MARKER: char = '*';

/// Upper bound of minted job ids (36 bits)
const MAX_JOB_ID: u64 = 0xF_FFFF_FFFF;

/// Identity fields as submitted by the form, echoed from the previous response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRequest {
    pub drona_job_id: String,
    pub name: String,
    pub location: String,
    pub user_picked_location: bool,
}

/// The resolved job id, display name and output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobIdentity {
    pub drona_job_id: String,
    pub name: String,
    pub location: String,
}

impl IdentityRequest {
    pub fn from_params(params: &ParameterSet) -> Self {
        IdentityRequest {
            drona_job_id: params.trimmed(DRONA_JOB_ID).to_string(),
            name: params.trimmed(NAME).to_string(),
            location: params.trimmed(LOCATION).to_string(),
            user_picked_location: params.flag(USER_PICKED_LOCATION),
        }
    }

    /// Resolve with a freshly minted random id when one is needed
    pub fn resolve(&self, runs_dir: &Path) -> JobIdentity {
        self.resolve_with(runs_dir, mint_job_id)
    }

    /// Decide the job's id, name and location
    ///
    /// No state is kept between calls: feeding a response back in unchanged yields the same
    /// identity, and the location never ends up with more than one id segment.
    pub fn resolve_with(&self, runs_dir: &Path, mint: impl FnOnce() -> String) -> JobIdentity {
        let (old_id, deprecated) = parse_job_id(&self.drona_job_id);

        let drona_job_id = if !old_id.is_empty() && !deprecated {
            info!("Reusing job id {old_id}");
            old_id.to_string()
        } else {
            let id = mint();
            info!("Minted job id {id}");
            id
        };

        let user_named = !self.name.is_empty() && self.name != old_id && self.name != drona_job_id;
        let auto_named = !user_named;
        let name = match auto_named {
            true => drona_job_id.clone(),
            false => self.name.clone(),
        };

        let mut location = match self.location.is_empty() {
            true => runs_dir.to_string_lossy().into_owned(),
            false => self.location.clone(),
        };

        if auto_named && !self.user_picked_location {
            if deprecated && !old_id.is_empty() {
                location = strip_trailing_component(&location, old_id);
            }
            location = ensure_id_appended(&location, &drona_job_id);
        }

        JobIdentity { drona_job_id, name, location }
    }
}

impl JobIdentity {
    /// Write the resolved fields back into the request parameters
    pub fn apply(&self, params: &mut ParameterSet) {
        params.insert(DRONA_JOB_ID, self.drona_job_id.as_str());
        params.insert(NAME, self.name.as_str());
        params.insert(LOCATION, self.location.as_str());
    }
}

/// A large random non-negative integer as a decimal string
///
/// Collisions are not checked for; at 36 bits they are negligible for a single user's runs.
pub fn mint_job_id() -> String {
    rand::thread_rng().gen_range(0..=MAX_JOB_ID).to_string()
}

/// Split off the deprecation marker: `"123*"` is `("123", true)`
pub fn parse_job_id(raw: &str) -> (&str, bool) {
    let raw = raw.trim();
    match raw.strip_suffix(DEPRECATED_MARKER) {
        Some(id) => (id.trim(), true),
        None => (raw, false),
    }
}

/// Remove a final `/<component>` or `/<component>*` from `path`
fn strip_trailing_component(path: &str, component: &str) -> String {
    if path.is_empty() || component.is_empty() {
        return path.to_string();
    }
    let normalized = normalize_path(path);
    let base = Path::new(&normalized)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if base == component || base == format!("{component}{DEPRECATED_MARKER}") {
        Path::new(&normalized)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        path.to_string()
    }
}

/// Append `/<job_id>` unless the path already ends with it
fn ensure_id_appended(base: &str, job_id: &str) -> String {
    let normalized = normalize_path(base.trim());
    let path = Path::new(&normalized);
    if path.file_name().is_some_and(|n| n == job_id) {
        return normalized;
    }
    path.join(job_id).to_string_lossy().into_owned()
}

/// Lexical normalisation: drops `.`, repeated and trailing separators and folds `..`
///
/// The filesystem is never consulted, the directory may not exist yet.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<Component> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return ".".to_string();
    }
    parts.iter().collect::<PathBuf>().to_string_lossy().into_owned()
}
