//! Run orchestration
//!
//! Loads the catalog and callbacks, fetches builds, resolves jobs and
//! writes them:
//! - Catalog (fails fast before any API polling)
//! - Builds (local file or API with retries)
//! - Callbacks (command line + optional file)
//! - Resolution
//! - Emission (skipped on dry runs)

use kci_catalog::{Catalog, CatalogError};
use kci_protocol::BuildRecord;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::callback::{load_callbacks, CallbackAssembler, CallbackError};
use crate::config::{ConfigError, JobgenConfig};
use crate::emit::JobEmitter;
use crate::fetch::{fetch_builds, FetchError};
use crate::resolver::{JobResolver, ResolveContext};
use crate::summary::{RunIdentity, RunSummary};

/// Errors that stop a run
#[derive(Debug, Error)]
pub enum JobgenError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Callback(#[from] CallbackError),

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Per-invocation switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Resolve and report without writing job files
    pub dry_run: bool,
}

/// Full run: fetch builds, then resolve and emit.
pub fn run(config: &JobgenConfig, options: &RunOptions) -> Result<RunSummary, JobgenError> {
    info!(tree = %config.tree, branch = %config.branch, "working on kernel");
    let ctx = ResolveContext::from_config(config)?;
    let source = config.build_source()?;
    let catalog = load_catalog(config)?;

    let fetched = fetch_builds(&source, &config.build_query(), &config.retry.policy())?;
    info!(
        count = fetched.builds.len(),
        expected = fetched.expected,
        "number of builds"
    );

    generate(config, &ctx, &catalog, &fetched.builds, options)
}

/// Resolve and emit jobs for already fetched builds.
pub fn run_with_builds(
    config: &JobgenConfig,
    builds: &[BuildRecord],
    options: &RunOptions,
) -> Result<RunSummary, JobgenError> {
    let ctx = ResolveContext::from_config(config)?;
    let catalog = load_catalog(config)?;
    generate(config, &ctx, &catalog, builds, options)
}

fn load_catalog(config: &JobgenConfig) -> Result<Catalog, JobgenError> {
    let catalog = Catalog::load(&config.test_configs)?;
    info!(
        path = %config.test_configs.display(),
        test_configs = catalog.len(),
        "loaded catalog"
    );
    Ok(catalog)
}

fn generate(
    config: &JobgenConfig,
    ctx: &ResolveContext,
    catalog: &Catalog,
    builds: &[BuildRecord],
    options: &RunOptions,
) -> Result<RunSummary, JobgenError> {
    let external = match config.callback_config_file {
        Some(ref path) => load_callbacks(path)?,
        None => None,
    };
    let callbacks = CallbackAssembler::new(config.cli_callback(), external);
    if callbacks.external_empty() {
        warn!("no valid callbacks in callback file");
    }

    let resolution = JobResolver::new(catalog, &callbacks, ctx).resolve(builds);

    let report = if options.dry_run {
        for job in &resolution.jobs {
            info!(job = %job.name(), template = %job.template(), "would write job");
        }
        None
    } else {
        let dir = config.output_dir();
        fs::create_dir_all(&dir).map_err(|source| JobgenError::OutputDir {
            path: dir.clone(),
            source,
        })?;
        Some(JobEmitter::new(&config.templates, &dir).emit_all(&resolution.jobs))
    };

    let identity = RunIdentity {
        lab: config.lab.clone(),
        tree: config.tree.clone(),
        branch: config.branch.clone(),
        describe: config.describe.clone(),
        arch: config.arch.clone(),
    };
    let mut summary = RunSummary::new(identity, catalog.len(), &resolution, report.as_ref());
    summary.callback_file_empty = callbacks.external_empty();
    summary.log();
    Ok(summary)
}
