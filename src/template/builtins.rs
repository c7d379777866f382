//! Built-in functions for map expressions
//!
//! These cover the module loads and scheduler option strings shared by the cluster's stock
//! environments. Every function returns an empty string when its option doesn't apply, so the
//! surrounding template line collapses cleanly.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::template::functions::{exact_args, FunctionError, FunctionRegistry, FunctionResult};

/// Walltimes longer than this many hours need the xlong partition
const XLONG_HOURS: u32 = 168;

/// Build the built-in registry
///
/// `scratch_dir` is where `drona_add_warning` and `drona_add_additional_file` keep their per-job
/// lists between calls.
pub fn registry(scratch_dir: PathBuf) -> FunctionRegistry {
    let mut registry = FunctionRegistry::new();
    registry
        .register("retrieve_workers", |args| {
            let [workers, default] = exact_args::<2>("retrieve_workers", args)?;
            Ok(retrieve_workers(workers, default))
        })
        .register("retrieve_R_version", |args| {
            let [version] = exact_args::<1>("retrieve_R_version", args)?;
            Ok(retrieve_r_version(version))
        })
        .register("retrieve_R_driver", |args| {
            let [mpistring] = exact_args::<1>("retrieve_R_driver", args)?;
            Ok(retrieve_r_driver(mpistring))
        })
        .register("retrieve_alphapickle", |args| {
            let [pickle, fasta, output_dir] = exact_args::<3>("retrieve_alphapickle", args)?;
            Ok(retrieve_alphapickle(pickle, fasta, output_dir))
        })
        .register("retrieve_loaded_modules", |args| {
            let [modules] = exact_args::<1>("retrieve_loaded_modules", args)?;
            Ok(retrieve_loaded_modules(modules))
        })
        .register("retrieve_R_version_grace", |args| {
            let [version] = exact_args::<1>("retrieve_R_version_grace", args)?;
            Ok(retrieve_r_version_grace(version))
        })
        .register("retrieve_loaded_modules_grace", |args| {
            let [modules] = exact_args::<1>("retrieve_loaded_modules_grace", args)?;
            Ok(retrieve_loaded_modules(modules))
        })
        .register("retrieve_mpi_mode_abaqus", |args| {
            let [cores, limit] = exact_args::<2>("retrieve_mpi_mode_abaqus", args)?;
            retrieve_mpi_mode_abaqus(cores, limit)
        })
        .register("retrieve_umat_abaqus", |args| {
            let [umat] = exact_args::<1>("retrieve_umat_abaqus", args)?;
            Ok(retrieve_umat_abaqus(umat))
        })
        .register("retrieve_ncpus", |args| {
            let [cores, parallel] = exact_args::<2>("retrieve_ncpus", args)?;
            Ok(retrieve_ncpus(cores, parallel))
        })
        .register("retrieve_tamubatch_opts", |args| match *args {
            [cores, memory, walltime] => retrieve_tamubatch_opts(cores, memory, walltime, "", ""),
            [cores, memory, walltime, extra] => retrieve_tamubatch_opts(cores, memory, walltime, extra, ""),
            [cores, memory, walltime, extra, gpu] => retrieve_tamubatch_opts(cores, memory, walltime, extra, gpu),
            _ => Err(FunctionError::Arity {
                name: "retrieve_tamubatch_opts".to_string(),
                expected: "from 3 to 5".to_string(),
                given: args.len(),
            }),
        })
        .register("retrieve_mopts", |args| {
            let [workers, threads, walltime, memory, extra] = exact_args::<5>("retrieve_mopts", args)?;
            retrieve_mopts(workers, threads, walltime, memory, extra)
        });

    let files_dir = scratch_dir.clone();
    registry.register("drona_add_additional_file", move |args| {
        let [job_name, file] = exact_args::<2>("drona_add_additional_file", args)?;
        let path = files_dir.join(format!("{job_name}.additional_files"));
        append_entry::<AdditionalFiles>(&path, file)?;
        Ok(String::new())
    });

    let warnings_dir = scratch_dir;
    registry.register("drona_add_warning", move |args| {
        let [job_name, warning] = exact_args::<2>("drona_add_warning", args)?;
        let path = warnings_dir.join(format!("{job_name}.warnings"));
        append_entry::<Warnings>(&path, warning)?;
        Ok(String::new())
    });

    registry
}

/// Built-in registry keeping its per-job lists in the system temporary directory
pub fn default_registry() -> FunctionRegistry {
    registry(std::env::temp_dir())
}

fn retrieve_workers(workers: &str, default: &str) -> String {
    if workers.is_empty() {
        format!("-w {default}")
    } else {
        format!("-w {workers}")
    }
}

fn retrieve_r_version(version: &str) -> String {
    match version {
        "4.2.2" => "module load GCC/12.2.0  OpenMPI/4.1.4 R_tamu/4.2.2".to_string(),
        _ => String::new(),
    }
}

fn retrieve_r_version_grace(version: &str) -> String {
    match version {
        "4.1.2" => "module load foss/2021b R_tamu/4.1.2",
        "4.2.0" => "module load foss/2021b R_tamu/4.2.0",
        _ => "module load foss/2022b R_tamu/4.3.1",
    }
    .to_string()
}

fn retrieve_r_driver(mpistring: &str) -> String {
    match mpistring {
        "mpi" => "mpirun -np 1 ".to_string(),
        _ => String::new(),
    }
}

fn retrieve_alphapickle(pickle: &str, fasta: &str, output_dir: &str) -> String {
    if pickle != "true" {
        return String::new();
    }
    let name = Path::new(fasta)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("run_AlphaPickle.py   -od {output_dir}/{name}")
}

fn retrieve_loaded_modules(modules: &str) -> String {
    if modules.is_empty() {
        String::new()
    } else {
        format!("module load foss/2023a {modules}")
    }
}

fn retrieve_mpi_mode_abaqus(cores: &str, limit: &str) -> FunctionResult {
    let cores: f64 = parse_number("cores", cores)?;
    let limit: f64 = parse_number("limit", limit)?;
    Ok(if cores > limit { "mp_mode=mpi".to_string() } else { String::new() })
}

fn retrieve_umat_abaqus(umat: &str) -> String {
    if umat.is_empty() {
        String::new()
    } else {
        format!("user={umat} ")
    }
}

fn retrieve_ncpus(cores: &str, parallel: &str) -> String {
    if parallel == "yes" {
        format!("ncpus={cores}")
    } else {
        String::new()
    }
}

/// Option string for the `tamubatch` wrapper
fn retrieve_tamubatch_opts(cores: &str, memory: &str, walltime: &str, extra_slurm: &str, gpu: &str) -> FunctionResult {
    let mut options = String::new();
    let mut additional = format!("{extra_slurm} {gpu}");

    if !cores.is_empty() {
        options.push_str(&format!("-n {cores} "));
    }
    if !walltime.is_empty() {
        if walltime_hours(walltime)? > XLONG_HOURS {
            additional.push_str(" --partition xlong ");
        }
        options.push_str(&format!("-W {walltime} "));
    }
    if memory.find("MB").is_some_and(|i| i > 0) || memory.find('G').is_some_and(|i| i > 0) {
        options.push_str(&format!("-M {memory} "));
    }
    if !additional.trim().is_empty() {
        options = format!("-x '{additional}' {options}");
    }
    Ok(options)
}

/// Option string for the multi-worker launcher, options prepended in reverse order
fn retrieve_mopts(workers: &str, threads: &str, walltime: &str, memory: &str, extra_params: &str) -> FunctionResult {
    let mut options = String::new();
    let mut additional = format!("{extra_params} ");

    if !workers.is_empty() && workers != "0" {
        options = format!("-w {workers} {options}");
    }
    if !threads.is_empty() {
        options = format!("-s {threads} {options}");
    }
    if !walltime.is_empty() {
        if walltime_hours(walltime)? > XLONG_HOURS {
            additional.push_str("--partition xlong ");
        }
        options = format!("-t {walltime} {options}");
    }
    if !memory.is_empty() && memory != "MB" {
        // drop the two character unit suffix
        let mut value = memory.chars();
        value.next_back();
        value.next_back();
        options = format!("-m {} {options}", value.as_str());
    }
    if !extra_params.is_empty() {
        options = format!("-x '{additional}' {options}");
    }
    Ok(options)
}

fn walltime_hours(walltime: &str) -> Result<u32, FunctionError> {
    let hours = walltime.split(':').next().unwrap_or_default();
    parse_number("walltime hours", hours)
}

fn parse_number<T: std::str::FromStr>(what: &str, value: &str) -> Result<T, FunctionError> {
    value
        .trim()
        .parse()
        .map_err(|_| FunctionError::Failed(format!("invalid {what}: '{value}'")))
}

/// A JSON document holding one growing list
trait EntryList: Default + Serialize + for<'de> Deserialize<'de> {
    fn push(&mut self, entry: String);
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AdditionalFiles {
    files: Vec<String>,
}

impl EntryList for AdditionalFiles {
    fn push(&mut self, entry: String) {
        self.files.push(entry);
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Warnings {
    warnings: Vec<String>,
}

impl EntryList for Warnings {
    fn push(&mut self, entry: String) {
        self.warnings.push(entry);
    }
}

fn append_entry<L: EntryList>(path: &Path, entry: &str) -> Result<(), FunctionError> {
    let failed = |err: &dyn std::fmt::Display| FunctionError::Failed(format!("{}: {}", path.display(), err));

    let mut list: L = if path.exists() {
        let json = fs::read_to_string(path).map_err(|e| failed(&e))?;
        serde_json::from_str(&json).map_err(|e| failed(&e))?
    } else {
        L::default()
    };
    list.push(entry.to_string());

    info!("Appending '{}' to {}", entry, path.display());
    let json = serde_json::to_string(&list).map_err(|e| failed(&e))?;
    fs::write(path, json).map_err(|e| failed(&e))
}
