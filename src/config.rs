//! User configuration
//!
//! The only setting is `drona_dir`, the directory holding environments, runs and the job history.
//! It lives in `~/.drona/config.json`:
//!
//! ```json
//! { "drona_dir": "/scratch/user/alice/drona_wfe" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const CONFIG_DIR: &str = ".drona";
pub const CONFIG_FILE: &str = "config.json";
/// Directory created under the directory picked by the user
pub const DRONA_DIR_NAME: &str = "drona_wfe";
/// Directory name used by older releases, migrated on first start
pub const LEGACY_DIR_NAME: &str = "drona_composer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DronaConfig {
    pub drona_dir: PathBuf,
}

impl DronaConfig {
    /// Job locations default to a subdirectory of this
    pub fn runs_dir(&self) -> PathBuf {
        self.drona_dir.join("runs")
    }

    pub fn environments_dir(&self) -> PathBuf {
        self.drona_dir.join("environments")
    }
}

/// Outcome of checking the configuration at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Ok(DronaConfig),
    /// A legacy directory was found and linked; show `notice` to the user
    Migrated { config: DronaConfig, notice: String },
    /// Nothing usable, the user has to pick a directory
    SelectNeeded { reason: String },
}

/// Where the configuration file is kept
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ConfigStore { dir: dir.into() }
    }

    /// `~/.drona`
    pub fn in_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Can't determine the home directory"))?;
        Ok(ConfigStore::new(home.join(CONFIG_DIR)))
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Read and validate the configuration file
    pub fn read(&self) -> Result<DronaConfig> {
        let path = self.path();
        let json = fs::read_to_string(&path).with_context(|| format!("Config file not found: {}", path.display()))?;
        let config: DronaConfig = serde_json::from_str(&json).context("Config file is invalid")?;

        if config.drona_dir.as_os_str().is_empty() {
            bail!("Config missing 'drona_dir' key");
        }
        let drona_dir = resolve_dir(&config.drona_dir)?;
        Ok(DronaConfig { drona_dir })
    }

    /// Write the configuration through a temporary file so readers never see a partial file
    pub fn write(&self, drona_dir: &Path) -> Result<DronaConfig> {
        fs::create_dir_all(&self.dir).with_context(|| format!("Can't create {}", self.dir.display()))?;
        let config = DronaConfig { drona_dir: drona_dir.to_path_buf() };

        let tmp = self.dir.join("config.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&config)?)
            .with_context(|| format!("Can't write {}", tmp.display()))?;
        fs::rename(&tmp, self.path()).with_context(|| format!("Can't replace {}", self.path().display()))?;

        info!("Saved configuration to {}", self.path().display());
        Ok(config)
    }

    /// Create `<base>/drona_wfe` and make it the configured directory
    pub fn save(&self, base: &Path) -> Result<DronaConfig> {
        let base = resolve_dir(base)?;
        let target = base.join(DRONA_DIR_NAME);
        fs::create_dir_all(&target).with_context(|| format!("Can't create {}", target.display()))?;
        self.write(&target)
    }

    /// Check the configuration, migrating a legacy scratch directory when there is no config
    ///
    /// `scratch_root` is the per-user scratch directory, `/scratch/user/<user>` on the cluster.
    pub fn probe_and_autofix(&self, scratch_root: &Path) -> Result<Probe> {
        let reason = match self.read() {
            Ok(config) => return Ok(Probe::Ok(config)),
            Err(err) => format!("{err:#}"),
        };
        info!("No usable configuration: {reason}");

        let legacy = scratch_root.join(LEGACY_DIR_NAME);
        if legacy.is_dir() {
            let target = scratch_root.join(DRONA_DIR_NAME);
            if !target.exists() {
                link_dir(&legacy, &target)
                    .with_context(|| format!("Failed to migrate {} -> {}", legacy.display(), target.display()))?;
            }
            let config = self.write(&target)?;
            let notice = format!(
                "Existing '{}' was renamed to '{}'. Drona location updated.",
                legacy.display(),
                DRONA_DIR_NAME
            );
            warn!("{notice}");
            return Ok(Probe::Migrated { config, notice });
        }

        Ok(Probe::SelectNeeded {
            reason: format!(
                "No config found and no {} to migrate. Please choose a location.",
                legacy.display()
            ),
        })
    }
}

/// The configuration to run with: `drona_dir` when given on the command line, the stored one
/// otherwise
///
/// The store is only located when it is needed, so an explicit directory works without a home
/// directory.
pub fn resolve_config(drona_dir: Option<&Path>, store: impl FnOnce() -> Result<ConfigStore>) -> Result<DronaConfig> {
    match drona_dir {
        Some(dir) => Ok(DronaConfig { drona_dir: dir.to_path_buf() }),
        None => store()?.read().context("Run `drona-composer config save <dir>` first"),
    }
}

/// Expand a leading `~` and canonicalise; the directory must exist
fn resolve_dir(dir: &Path) -> Result<PathBuf> {
    let expanded = match dir.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .ok_or_else(|| anyhow!("Can't determine the home directory"))?
            .join(rest),
        Err(_) => dir.to_path_buf(),
    };
    let resolved = expanded
        .canonicalize()
        .with_context(|| format!("Directory does not exist: {}", expanded.display()))?;
    if !resolved.is_dir() {
        bail!("Not a directory: {}", resolved.display());
    }
    Ok(resolved)
}

#[cfg(unix)]
fn link_dir(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn link_dir(original: &Path, link: &Path) -> std::io::Result<()> {
    fs::rename(original, link)
}
