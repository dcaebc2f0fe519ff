//! KernelCI LAVA job generator CLI
//!
//! Entry point for the `lava-jobs` command-line tool.

use clap::{CommandFactory, Parser};
use kci_lava_jobs::config::EffectiveConfig;
use kci_lava_jobs::summary::ExitCode;
use kci_lava_jobs::{logging, pipeline, RunOptions};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process;
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "lava-jobs")]
#[command(about = "Generate LAVA job definitions from KernelCI builds", version)]
struct Cli {
    /// TOML settings file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Table of the settings file to use (default: default)
    #[arg(long)]
    section: Option<String>,

    /// Lab name
    #[arg(long)]
    lab: Option<String>,

    /// Kernel tree
    #[arg(long)]
    tree: Option<String>,

    /// Kernel branch
    #[arg(long)]
    branch: Option<String>,

    /// Kernel `git describe`
    #[arg(long)]
    describe: Option<String>,

    /// Test plans to generate jobs for
    #[arg(long, num_args = 1..)]
    plans: Vec<String>,

    /// CPU architecture
    #[arg(long)]
    arch: Option<String>,

    /// Device types to restrict jobs to
    #[arg(long, num_args = 1..)]
    targets: Vec<String>,

    /// LAVA priority (high, medium, low)
    #[arg(long)]
    priority: Option<String>,

    /// KernelCI storage URL
    #[arg(long)]
    storage: Option<String>,

    /// KernelCI API URL
    #[arg(long)]
    api: Option<String>,

    /// KernelCI API token
    #[arg(long)]
    token: Option<String>,

    /// Local JSON file with builds, used instead of the API
    #[arg(long)]
    builds: Option<PathBuf>,

    /// Output directory (default: the lab name)
    #[arg(long)]
    jobs: Option<PathBuf>,

    /// Test configs catalog
    #[arg(long)]
    test_configs: Option<PathBuf>,

    /// Job templates directory
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Callback token
    #[arg(long)]
    callback: Option<String>,

    /// Callback URL (default: the API URL)
    #[arg(long)]
    callback_url: Option<String>,

    /// Callback type (kernelci, custom)
    #[arg(long)]
    callback_type: Option<String>,

    /// Callback dataset (minimal, logs, results, all)
    #[arg(long)]
    callback_dataset: Option<String>,

    /// File with extra callbacks (.json array or TOML [[callback]])
    #[arg(long)]
    callback_config_file: Option<PathBuf>,

    /// Number of builds expected from the API
    #[arg(long)]
    defconfigs: Option<u64>,

    /// Only generate jobs for this full defconfig
    #[arg(long)]
    defconfig_full: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    summary_json: bool,

    /// Resolve jobs without writing them
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Flags that were given, as a config layer
    fn overrides(&self) -> Value {
        let list = |v: &Vec<String>| {
            if v.is_empty() {
                Value::Null
            } else {
                json!(v)
            }
        };
        json!({
            "lab": self.lab,
            "tree": self.tree,
            "branch": self.branch,
            "describe": self.describe,
            "plans": list(&self.plans),
            "arch": self.arch,
            "targets": list(&self.targets),
            "priority": self.priority,
            "storage": self.storage,
            "api": self.api,
            "token": self.token,
            "builds": self.builds,
            "jobs": self.jobs,
            "test_configs": self.test_configs,
            "templates": self.templates,
            "callback": self.callback,
            "callback_url": self.callback_url,
            "callback_type": self.callback_type,
            "callback_dataset": self.callback_dataset,
            "callback_config_file": self.callback_config_file,
            "defconfigs": self.defconfigs,
            "defconfig_full": self.defconfig_full,
        })
    }
}

fn main() {
    if std::env::args_os().len() <= 1 {
        let _ = Cli::command().print_help();
        process::exit(ExitCode::Fatal.as_i32());
    }
    let cli = Cli::parse();
    logging::init();

    let section = cli
        .section
        .clone()
        .unwrap_or_else(|| kci_lava_jobs::config::BuiltinDefaults::default().section);

    let effective = match EffectiveConfig::build(cli.config.as_deref(), &section, Some(cli.overrides())) {
        Ok(effective) => effective,
        Err(e) => {
            error!("Error loading config: {}", e);
            process::exit(ExitCode::Fatal.as_i32());
        }
    };
    if let Ok(json) = effective.to_json() {
        debug!(effective_config = %json, "configuration");
    }

    let config = match effective.jobgen_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            process::exit(ExitCode::Fatal.as_i32());
        }
    };

    let options = RunOptions {
        dry_run: cli.dry_run,
    };
    let summary = match pipeline::run(&config, &options) {
        Ok(summary) => summary,
        Err(e) => {
            error!("{}", e);
            process::exit(ExitCode::Fatal.as_i32());
        }
    };

    if cli.summary_json {
        match summary.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Error serializing summary: {}", e);
                process::exit(ExitCode::Fatal.as_i32());
            }
        }
    }

    process::exit(summary.exit_code().as_i32());
}
