//! Build to job resolution
//!
//! For every passing build and every requested plan, walks the catalog's
//! test configs in document order and turns each applicable
//! (build, plan, device type) combination into a [`JobDescriptor`].
//! Candidates that cannot be resolved are logged and counted, never fatal.

mod params;

pub use params::{derive_params, BuildOptions, ParamError};

use kci_catalog::{Catalog, TestConfig};
use kci_protocol::BuildRecord;
use reqwest::Url;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::callback::CallbackAssembler;
use crate::config::{ConfigError, JobgenConfig, Priority};
use crate::job::JobDescriptor;

/// Run-wide inputs to resolution
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub arch: String,
    pub storage: Url,
    pub tree: String,
    pub branch: String,
    pub describe: String,
    pub lab: String,
    pub priority: Priority,
    pub plans: Vec<String>,
    /// Device type allowlist (empty: all)
    pub targets: Vec<String>,
    pub templates_dir: PathBuf,
}

impl ResolveContext {
    pub fn from_config(config: &JobgenConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            arch: config.arch.clone(),
            storage: config.storage_url()?,
            tree: config.tree.clone(),
            branch: config.branch.clone(),
            describe: config.describe.clone(),
            lab: config.lab.clone(),
            priority: config.priority,
            plans: config.plans.clone(),
            targets: config.targets.clone(),
            templates_dir: config.templates.clone(),
        })
    }

    fn in_targets(&self, device_type: &str) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|t| t == device_type)
    }
}

/// Why a build or candidate produced no job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotPassing,
    NoDefconfig,
    NoKernelImage,
    NotInTargets,
    NoMatch,
    MissingDtb,
    MissingTemplate,
    InvalidUrl,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NotPassing => "build did not pass",
            SkipReason::NoDefconfig => "build has no defconfig",
            SkipReason::NoKernelImage => "build has no kernel image",
            SkipReason::NotInTargets => "device not in targets",
            SkipReason::NoMatch => "test config did not match",
            SkipReason::MissingDtb => "dtb not in build",
            SkipReason::MissingTemplate => "template not found",
            SkipReason::InvalidUrl => "invalid artifact URL",
        };
        f.write_str(s)
    }
}

/// Skip counts by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub not_passing: usize,
    pub no_defconfig: usize,
    pub no_kernel_image: usize,
    pub not_in_targets: usize,
    pub no_match: usize,
    pub missing_dtb: usize,
    pub missing_template: usize,
    pub invalid_url: usize,
}

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        let slot = match reason {
            SkipReason::NotPassing => &mut self.not_passing,
            SkipReason::NoDefconfig => &mut self.no_defconfig,
            SkipReason::NoKernelImage => &mut self.no_kernel_image,
            SkipReason::NotInTargets => &mut self.not_in_targets,
            SkipReason::NoMatch => &mut self.no_match,
            SkipReason::MissingDtb => &mut self.missing_dtb,
            SkipReason::MissingTemplate => &mut self.missing_template,
            SkipReason::InvalidUrl => &mut self.invalid_url,
        };
        *slot += 1;
    }

    pub fn get(&self, reason: SkipReason) -> usize {
        match reason {
            SkipReason::NotPassing => self.not_passing,
            SkipReason::NoDefconfig => self.no_defconfig,
            SkipReason::NoKernelImage => self.no_kernel_image,
            SkipReason::NotInTargets => self.not_in_targets,
            SkipReason::NoMatch => self.no_match,
            SkipReason::MissingDtb => self.missing_dtb,
            SkipReason::MissingTemplate => self.missing_template,
            SkipReason::InvalidUrl => self.invalid_url,
        }
    }
}

/// Output of a resolution pass
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Jobs in (build, plan, test config) order
    pub jobs: Vec<JobDescriptor>,
    pub skipped: SkipCounts,
    pub builds: usize,
    pub passing_builds: usize,
}

/// Matches builds against the catalog.
pub struct JobResolver<'a> {
    catalog: &'a Catalog,
    callbacks: &'a CallbackAssembler,
    ctx: &'a ResolveContext,
}

impl<'a> JobResolver<'a> {
    pub fn new(
        catalog: &'a Catalog,
        callbacks: &'a CallbackAssembler,
        ctx: &'a ResolveContext,
    ) -> Self {
        Self {
            catalog,
            callbacks,
            ctx,
        }
    }

    /// Resolve every build against every requested plan.
    pub fn resolve(&self, builds: &[BuildRecord]) -> Resolution {
        let mut resolution = Resolution {
            builds: builds.len(),
            ..Resolution::default()
        };
        for build in builds {
            self.resolve_build(build, &mut resolution);
        }
        info!(
            builds = resolution.builds,
            passing = resolution.passing_builds,
            jobs = resolution.jobs.len(),
            "resolution complete"
        );
        resolution
    }

    fn resolve_build(&self, build: &BuildRecord, out: &mut Resolution) {
        if !build.is_pass() {
            debug!(build = %build.label(), status = ?build.status, "skipping build: {}", SkipReason::NotPassing);
            out.skipped.record(SkipReason::NotPassing);
            return;
        }
        out.passing_builds += 1;

        let defconfig = match build.defconfig_full() {
            Some(defconfig) => defconfig,
            None => {
                warn!(build = %build.label(), "skipping build: {}", SkipReason::NoDefconfig);
                out.skipped.record(SkipReason::NoDefconfig);
                return;
            }
        };
        if build.kernel_image.as_deref().map(str::is_empty).unwrap_or(true) {
            warn!(build = %build.label(), "skipping build: {}", SkipReason::NoKernelImage);
            out.skipped.record(SkipReason::NoKernelImage);
            return;
        }

        info!(build = %build.label(), "working on build");
        let opts = BuildOptions::new(&self.ctx.arch, defconfig, &self.ctx.describe, &self.ctx.lab);

        for plan in &self.ctx.plans {
            for config in self.catalog.configs_for_plan(plan) {
                match self.resolve_candidate(build, &opts, plan, config) {
                    Ok(job) => {
                        debug!(job = %job.name(), "job resolved");
                        out.jobs.push(job);
                    }
                    Err(reason) => out.skipped.record(reason),
                }
            }
        }
    }

    /// Check one test config for a build and plan, in order: target
    /// allowlist, catalog match, DTB presence, template presence.
    fn resolve_candidate(
        &self,
        build: &BuildRecord,
        opts: &BuildOptions,
        plan: &str,
        config: &TestConfig,
    ) -> Result<JobDescriptor, SkipReason> {
        let device_type = &config.device_type;

        if !self.ctx.in_targets(&device_type.name) {
            debug!(device_type = %device_type, plan, "skipping: {}", SkipReason::NotInTargets);
            return Err(SkipReason::NotInTargets);
        }

        if !config.matches(&opts.query(&self.ctx.arch, plan)) {
            debug!(device_type = %device_type, plan, build = %build.label(), "skipping: {}", SkipReason::NoMatch);
            return Err(SkipReason::NoMatch);
        }

        if let Some(ref dtb) = device_type.dtb {
            if !build.has_dtb(dtb) {
                warn!(device_type = %device_type, plan, dtb = %dtb, build = %build.label(), "skipping: {}", SkipReason::MissingDtb);
                return Err(SkipReason::MissingDtb);
            }
        }

        let test_plan = config.plan(plan).ok_or(SkipReason::NoMatch)?;
        let short_template = test_plan.template_path(&device_type.boot_method);
        let template_file = self.ctx.templates_dir.join(&short_template);
        if !template_file.is_file() {
            warn!(device_type = %device_type, plan, template = %template_file.display(), "skipping: {}", SkipReason::MissingTemplate);
            return Err(SkipReason::MissingTemplate);
        }

        let params = derive_params(self.ctx, build, opts, config, test_plan, short_template)
            .map_err(|e| {
                warn!(device_type = %device_type, plan, build = %build.label(), "skipping: {}", e);
                match e {
                    ParamError::NoKernelImage => SkipReason::NoKernelImage,
                    ParamError::InvalidUrl { .. } => SkipReason::InvalidUrl,
                }
            })?;

        JobDescriptor::new(params, &test_plan.params, self.callbacks.assemble(plan)).map_err(
            |e| {
                warn!(device_type = %device_type, plan, "skipping: invalid parameters: {}", e);
                SkipReason::InvalidUrl
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{validate_callbacks, CallbackType, CliCallback, Dataset};
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    const CATALOG: &str = r#"
        [rootfs.buildroot]
        [rootfs.buildroot.url_formats]
        ramdisk = "https://storage.kernelci.org/images/rootfs/buildroot/{arch}/rootfs.cpio.gz"

        [device_type.juno]
        arch = "arm64"
        mach = "arm"
        dtb = "foo.dtb"

        [device_type.rk3399]
        arch = "arm64"
        mach = "rockchip"
        dtb = "bar.dtb"

        [device_type.qemu_arm64]
        arch = "arm64"
        mach = "qemu"
        boot_method = "qemu"

        [test_plan.boot]
        rootfs = "buildroot"

        [test_plan.simple]
        rootfs = "buildroot"
        [test_plan.simple.params]
        job_timeout = 20

        [[test_config]]
        device_type = "juno"
        test_plans = ["boot", "simple"]

        [[test_config]]
        device_type = "rk3399"
        test_plans = ["boot"]

        [[test_config]]
        device_type = "qemu_arm64"
        test_plans = ["boot"]
    "#;

    struct Fixture {
        _templates: TempDir,
        catalog: Catalog,
        ctx: ResolveContext,
    }

    fn fixture(plans: &[&str], targets: &[&str]) -> Fixture {
        let templates = TempDir::new().unwrap();
        for path in [
            "boot/uboot-tftp-ramdisk-boot-template.jinja2",
            "boot/qemu-tftp-ramdisk-boot-template.jinja2",
        ] {
            let file = templates.path().join(path);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, "name: {{ name }}\n").unwrap();
        }
        let ctx = ResolveContext {
            arch: "arm64".to_string(),
            storage: Url::parse("https://storage.kernelci.org/").unwrap(),
            tree: "mainline".to_string(),
            branch: "master".to_string(),
            describe: "v5.0".to_string(),
            lab: "lab-baylibre".to_string(),
            priority: Priority::High,
            plans: plans.iter().map(|s| s.to_string()).collect(),
            targets: targets.iter().map(|s| s.to_string()).collect(),
            templates_dir: templates.path().to_path_buf(),
        };
        Fixture {
            _templates: templates,
            catalog: Catalog::parse(CATALOG).unwrap(),
            ctx,
        }
    }

    fn build(overrides: Value) -> BuildRecord {
        let mut base = json!({
            "tree": "mainline",
            "branch": "master",
            "describe": "v5.0",
            "arch": "arm64",
            "defconfig": "defconfig",
            "status": "PASS",
            "kernel_image": "Image",
            "dtb_dir_data": ["foo.dtb"],
            "modules": null
        });
        for (k, v) in overrides.as_object().unwrap() {
            base[k] = v.clone();
        }
        serde_json::from_value(base).unwrap()
    }

    fn resolve(f: &Fixture, callbacks: &CallbackAssembler, builds: &[BuildRecord]) -> Resolution {
        JobResolver::new(&f.catalog, callbacks, &f.ctx).resolve(builds)
    }

    #[test]
    fn test_dtb_present_yields_one_job() {
        let f = fixture(&["boot"], &["juno", "rk3399"]);
        let resolution = resolve(&f, &CallbackAssembler::default(), &[build(json!({}))]);

        assert_eq!(resolution.jobs.len(), 1);
        let job = &resolution.jobs[0];
        assert_eq!(job.get("dtb_short"), Some(&json!("foo.dtb")));
        assert_eq!(job.get("modules_url"), Some(&Value::Null));
        assert!(job.name().ends_with("-boot"));
        assert_eq!(resolution.skipped.missing_dtb, 1);
    }

    #[test]
    fn test_dtb_absent_yields_nothing() {
        let f = fixture(&["boot"], &["rk3399"]);
        let resolution = resolve(&f, &CallbackAssembler::default(), &[build(json!({}))]);

        assert!(resolution.jobs.is_empty());
        assert_eq!(resolution.skipped.missing_dtb, 1);
        assert_eq!(resolution.skipped.not_in_targets, 2);
    }

    #[test]
    fn test_failed_builds_skipped() {
        let f = fixture(&["boot"], &[]);
        let builds = [
            build(json!({"status": "FAIL"})),
            build(json!({"status": "UNKNOWN"})),
        ];
        let resolution = resolve(&f, &CallbackAssembler::default(), &builds);

        assert!(resolution.jobs.is_empty());
        assert_eq!(resolution.builds, 2);
        assert_eq!(resolution.passing_builds, 0);
        assert_eq!(resolution.skipped.not_passing, 2);
    }

    #[test]
    fn test_catalog_order_preserved() {
        let f = fixture(&["boot"], &[]);
        let resolution = resolve(
            &f,
            &CallbackAssembler::default(),
            &[build(json!({"dtb_dir_data": ["foo.dtb", "bar.dtb"]}))],
        );

        let devices: Vec<&str> = resolution
            .jobs
            .iter()
            .map(|j| j.params().device_type.as_str())
            .collect();
        assert_eq!(devices, vec!["juno", "rk3399", "qemu_arm64"]);
        assert_eq!(resolution.jobs[2].get("platform"), Some(&json!("qemu_arm64")));
        assert_eq!(resolution.jobs[2].get("dtb_short"), Some(&Value::Null));
        assert!(resolution.jobs[2].name().contains("-no-dtb-qemu_arm64-"));
    }

    #[test]
    fn test_missing_template_skipped() {
        let f = fixture(&["simple"], &[]);
        let resolution = resolve(&f, &CallbackAssembler::default(), &[build(json!({}))]);

        assert!(resolution.jobs.is_empty());
        assert_eq!(resolution.skipped.missing_template, 1);
    }

    #[test]
    fn test_arch_mismatch_is_no_match() {
        let mut f = fixture(&["boot"], &[]);
        f.ctx.arch = "arm".to_string();
        let resolution = resolve(&f, &CallbackAssembler::default(), &[build(json!({}))]);

        assert!(resolution.jobs.is_empty());
        assert_eq!(resolution.skipped.no_match, 3);
    }

    #[test]
    fn test_big_endian_requires_flag() {
        let f = fixture(&["boot"], &["qemu_arm64"]);
        let resolution = resolve(
            &f,
            &CallbackAssembler::default(),
            &[build(json!({"defconfig": "defconfig+CONFIG_CPU_BIG_ENDIAN=y"}))],
        );

        assert!(resolution.jobs.is_empty());
        assert_eq!(resolution.skipped.no_match, 1);
    }

    #[test]
    fn test_callbacks_attached() {
        let f = fixture(&["boot"], &["juno"]);
        let callbacks = CallbackAssembler::new(
            Some(CliCallback {
                token: "tok".to_string(),
                url: Some("https://api.kernelci.org".to_string()),
                kind: CallbackType::Kernelci,
                dataset: Dataset::All,
            }),
            Some(validate_callbacks(&[json!({"url": "http://x", "method": "PUT"})])),
        );
        let resolution = resolve(&f, &callbacks, &[build(json!({}))]);

        let cbs = resolution.jobs[0].get("callbacks").unwrap().as_array().unwrap();
        assert_eq!(cbs.len(), 2);
        assert_eq!(cbs[0]["name"], "lava/boot");
        assert_eq!(cbs[1]["method"], "POST");
    }

    #[test]
    fn test_build_without_kernel_image_skipped() {
        let f = fixture(&["boot"], &[]);
        let resolution = resolve(
            &f,
            &CallbackAssembler::default(),
            &[build(json!({"kernel_image": null}))],
        );

        assert!(resolution.jobs.is_empty());
        assert_eq!(resolution.skipped.no_kernel_image, 1);
        assert_eq!(resolution.passing_builds, 1);
    }

    #[test]
    fn test_skip_counts() {
        let mut counts = SkipCounts::default();
        counts.record(SkipReason::MissingDtb);
        counts.record(SkipReason::MissingDtb);
        counts.record(SkipReason::NoMatch);

        assert_eq!(counts.get(SkipReason::MissingDtb), 2);
        assert_eq!(counts.get(SkipReason::NoMatch), 1);
        assert_eq!(counts.get(SkipReason::NotInTargets), 0);
    }
}
