use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use log::{debug, info, warn};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::template::functions::{FunctionError, FunctionRegistry, FunctionResult};

/// Load every executable in `dir` as a function named after its file stem
///
/// A function call runs the executable with the literal call arguments. Its trimmed stdout is the
/// result; a non-zero exit status turns trimmed stderr into the error message.
pub fn load_functions(dir: &Path) -> io::Result<FunctionRegistry> {
    let mut registry = FunctionRegistry::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_executable(&path) {
            debug!("Skipping non-executable {}", path.display());
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            warn!("Skipping function with a non UTF-8 name: {}", path.display());
            continue;
        };

        info!("Registering environment function {} from {}", name, path.display());
        registry.register(name, move |args| run_function(&path, args));
    }

    Ok(registry)
}

fn run_function(path: &Path, args: &[&str]) -> FunctionResult {
    let output = Command::new(path)
        .args(args)
        .output()
        .map_err(|source| FunctionError::Spawn { path: path.to_path_buf(), source })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        Ok(stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", path.display(), output.status)
        } else {
            stderr
        };
        Err(FunctionError::Failed(message))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_script(dir: &Path, name: &str, body: &str, mode: u32) {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn executables_become_functions() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "partition.sh", r#"echo "--partition $1""#, 0o755);
        write_script(dir.path(), "notes.txt", "echo ignored", 0o644);

        let registry = load_functions(dir.path()).unwrap();
        assert_eq!(registry.names(), vec!["partition"]);
        assert_eq!(registry.call("partition", &["gpu"]).unwrap(), "--partition gpu");
    }

    #[test]
    fn failing_executable_reports_stderr() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "broken", "echo 'no such queue' >&2; exit 3", 0o755);

        let registry = load_functions(dir.path()).unwrap();
        let err = registry.call("broken", &[]).unwrap_err();
        assert_eq!(err.to_string(), "no such queue");
    }
}
