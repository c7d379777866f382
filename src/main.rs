use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

use drona_composer::config::{resolve_config, ConfigStore, DronaConfig, Probe};
use drona_composer::db::job::load::{get_job, list_jobs};
use drona_composer::db::open::open_db;
use drona_composer::job::script::ScriptEngine;
use drona_composer::job::submit::{preview_job, submit_job};
use drona_composer::request::params::{ParameterSet, ParamsFile, ENV_DIR, RUNTIME};
use drona_composer::template::builtins;

#[derive(Parser, Debug)]
#[command(name = "drona-composer")]
#[command(version = "0.1.0")]
#[command(about = "Compose, preview and submit HPC jobs from environment templates")]
struct Args {
    /// Drona directory, overrides ~/.drona/config.json
    #[arg(long)]
    drona_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the job identity and print the rendered job script as JSON
    Preview(JobArgs),
    /// Write the job script, driver and additional files, and record the job
    Submit(JobArgs),
    /// Print the JSON schema of an environment's job form
    Form {
        /// Environment name
        #[arg(short, long)]
        env: String,
        /// Directory holding environments, defaults to <drona_dir>/environments
        #[arg(long)]
        env_dir: Option<PathBuf>,
    },
    /// Show recorded jobs
    History {
        /// Show a single job
        #[arg(long)]
        id: Option<String>,
    },
    /// Inspect or create the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct JobArgs {
    /// JSON object of form parameters
    #[arg(short, long)]
    params: PathBuf,
    /// Environment name, defaults to the `runtime` parameter
    #[arg(short, long)]
    env: Option<String>,
    /// Directory holding environments, defaults to the `env_dir` parameter or <drona_dir>/environments
    #[arg(long)]
    env_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Check the configuration, migrating an old scratch directory if one is found
    Status,
    /// Create <dir>/drona_wfe and save it as the drona directory
    Save { dir: PathBuf },
}

fn main() -> Result<()> {
    env_logger::init();
    info!("Starting drona-composer");

    let args = Args::parse();
    let drona_dir = args.drona_dir;
    let config = || resolve_config(drona_dir.as_deref(), ConfigStore::in_home);

    match args.command {
        Command::Preview(job) => {
            let config = config()?;
            let (engine, params) = load_job(&job, &config)?;
            let response = preview_job(&engine, params, &config.runs_dir())?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Submit(job) => {
            let config = config()?;
            let (engine, params) = load_job(&job, &config)?;
            let conn = open_db(&config.drona_dir)?;
            let response = submit_job(&engine, params, &conn)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Form { env, env_dir } => {
            let env_dir = match env_dir {
                Some(dir) => dir,
                None => config()?.environments_dir(),
            };
            let mut engine = ScriptEngine::new(builtins::default_registry());
            engine.set_environment(&env_dir, &env)?;
            let schema = engine.form_schema().ready().ok_or_else(|| anyhow!("No environment selected"))?;
            println!("{}", serde_json::to_string_pretty(schema)?);
        }
        Command::History { id: Some(id) } => {
            let conn = open_db(&config()?.drona_dir)?;
            let job = get_job(&conn, &id)?.ok_or_else(|| anyhow!("Job not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::History { id: None } => {
            let conn = open_db(&config()?.drona_dir)?;
            println!("{}", serde_json::to_string_pretty(&list_jobs(&conn)?)?);
        }
        Command::Config { action: ConfigAction::Status } => config_status(&ConfigStore::in_home()?)?,
        Command::Config { action: ConfigAction::Save { dir } } => {
            let config = ConfigStore::in_home()?.save(&dir)?;
            println!("Created directory '{}'. Configuration saved.", config.drona_dir.display());
        }
    }
    Ok(())
}

/// Read the parameters and select the environment they ask for
fn load_job(job: &JobArgs, config: &DronaConfig) -> Result<(ScriptEngine, ParameterSet)> {
    let params = ParamsFile { path: job.params.clone() }.read()?;

    let env_name = job
        .env
        .clone()
        .or_else(|| params.get(RUNTIME).map(str::to_string))
        .ok_or_else(|| anyhow!("No environment given: pass --env or set 'runtime'"))?;
    let env_dir = job
        .env_dir
        .clone()
        .or_else(|| params.get(ENV_DIR).filter(|d| !d.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| config.environments_dir());

    let mut engine = ScriptEngine::new(builtins::default_registry());
    engine.set_environment(&env_dir, &env_name)?;
    Ok((engine, params))
}

fn config_status(store: &ConfigStore) -> Result<()> {
    let user = std::env::var("USER").unwrap_or_default();
    let scratch = Path::new("/scratch/user").join(user.trim());

    match store.probe_and_autofix(&scratch)? {
        Probe::Ok(config) => println!("drona_dir: {}", config.drona_dir.display()),
        Probe::Migrated { config, notice } => {
            println!("{notice}");
            println!("drona_dir: {}", config.drona_dir.display());
        }
        Probe::SelectNeeded { reason } => println!("missing config: {reason}"),
    }
    Ok(())
}
