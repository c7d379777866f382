use std::path::Path;

use log::{info, warn};

use crate::environment::load::read_text;
use crate::environment::{AdditionalFile, EnvironmentError, MANIFEST_FILE};

/// Read the templates listed in the environment's `additional_files` manifest
///
/// The manifest holds one file name per line, relative to the environment directory. Blank lines
/// and names that don't exist are skipped. No manifest means no additional files.
pub fn read_additional_files(env_dir: &Path) -> Result<Vec<AdditionalFile>, EnvironmentError> {
    let manifest = env_dir.join(MANIFEST_FILE);
    if !manifest.is_file() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for line in read_text(&manifest)?.lines() {
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        let path = env_dir.join(name);
        if !path.is_file() {
            warn!("Additional file {} listed in {} doesn't exist", name, manifest.display());
            continue;
        }
        info!("Reading additional file {}", path.display());
        files.push(AdditionalFile { name: name.to_string(), content: read_text(&path)? });
    }

    Ok(files)
}
