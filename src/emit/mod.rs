//! Job file rendering
//!
//! Renders each job's template from the templates directory and writes
//! `<name>.yaml` into the output directory. A failing job is reported and
//! the remaining jobs are still written.

use minijinja::{path_loader, Environment, UndefinedBehavior};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::job::JobDescriptor;

/// Errors for a single job
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("failed to render {template}: {source}")]
    Render {
        template: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("job name '{name}' is not a plain file name")]
    InvalidName { name: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A job that could not be emitted
#[derive(Debug, Clone, Serialize)]
pub struct EmitFailure {
    pub job: String,
    pub reason: String,
}

/// Outcome of emitting a batch of jobs
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmitReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<EmitFailure>,
}

impl EmitReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Template renderer bound to a templates and an output directory.
pub struct JobEmitter {
    env: Environment<'static>,
    output_dir: PathBuf,
}

impl JobEmitter {
    pub fn new(templates_dir: &Path, output_dir: &Path) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(templates_dir));
        // `{% if x %}` on an absent variable is allowed, printing one is not
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);
        Self {
            env,
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render a job without writing it.
    pub fn render(&self, job: &JobDescriptor) -> Result<String, EmitError> {
        let render_error = |source| EmitError::Render {
            template: job.template().to_string(),
            source,
        };
        let template = self.env.get_template(job.template()).map_err(render_error)?;
        template.render(job.context()).map_err(render_error)
    }

    /// Render a job and write it to `<output_dir>/<name>.yaml`.
    pub fn write(&self, job: &JobDescriptor) -> Result<PathBuf, EmitError> {
        // Non-arm64 DTB paths keep their vendor directory in the job name
        if job.name().contains(['/', '\\']) {
            return Err(EmitError::InvalidName {
                name: job.name().to_string(),
            });
        }
        let rendered = self.render(job)?;
        let path = self.output_dir.join(job.file_name());
        fs::write(&path, rendered).map_err(|source| EmitError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Write every job, continuing past failures.
    pub fn emit_all(&self, jobs: &[JobDescriptor]) -> EmitReport {
        let mut report = EmitReport::default();
        for job in jobs {
            match self.write(job) {
                Ok(path) => {
                    info!(path = %path.display(), "job written");
                    report.written.push(path);
                }
                Err(e) => {
                    error!(job = %job.name(), "{}", e);
                    report.failed.push(EmitFailure {
                        job: job.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{CallbackSpec, CallbackType, Dataset};
    use crate::job::{JobParams, IMAGE_TYPE};
    use kci_catalog::Endianness;
    use serde_json::Map;
    use tempfile::TempDir;

    fn job(name: &str, template: &str, callbacks: Vec<CallbackSpec>) -> JobDescriptor {
        let params = JobParams {
            name: name.to_string(),
            dtb_url: None,
            dtb_short: None,
            dtb_full: None,
            platform: "qemu".to_string(),
            mach: "qemu".to_string(),
            kernel_url: "https://storage.kernelci.org/x/Image".to_string(),
            image_type: IMAGE_TYPE,
            image_url: "https://storage.kernelci.org/x/".to_string(),
            modules_url: None,
            plan: "boot".to_string(),
            kernel: "v5.0".to_string(),
            tree: "mainline".to_string(),
            defconfig: "defconfig".to_string(),
            arch_defconfig: "arm64-defconfig".to_string(),
            fastboot: "false".to_string(),
            priority: "high".to_string(),
            device_type: "qemu".to_string(),
            template_file: format!("templates/{}", template),
            base_url: "https://storage.kernelci.org/x/".to_string(),
            endian: Endianness::Little,
            short_template_file: template.to_string(),
            arch: "arm64".to_string(),
            git_branch: "master".to_string(),
            git_commit: None,
            git_describe: "v5.0".to_string(),
            git_url: None,
            defconfig_base: "defconfig".to_string(),
            initrd_url: None,
            kernel_image: "Image".to_string(),
            nfsrootfs_url: None,
            lab_name: "lab-baylibre".to_string(),
            context: Map::new(),
            rootfs_prompt: "/ #".to_string(),
            plan_name: "boot".to_string(),
            file_server_resource: None,
            build_environment: None,
        };
        JobDescriptor::new(params, &Map::new(), callbacks).unwrap()
    }

    fn setup(templates: &[(&str, &str)]) -> (TempDir, TempDir) {
        let tdir = TempDir::new().unwrap();
        for (path, body) in templates {
            let file = tdir.path().join(path);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, body).unwrap();
        }
        (tdir, TempDir::new().unwrap())
    }

    #[test]
    fn test_write_job() {
        let (templates, out) = setup(&[(
            "boot/qemu.jinja2",
            "job_name: {{ name }}\npriority: {{ priority }}\n{% if callbacks %}notify: yes\n{% endif %}",
        )]);
        let emitter = JobEmitter::new(templates.path(), out.path());

        let path = emitter.write(&job("job-a", "boot/qemu.jinja2", Vec::new())).unwrap();

        assert_eq!(path, out.path().join("job-a.yaml"));
        let body = fs::read_to_string(path).unwrap();
        assert!(body.contains("job_name: job-a"));
        assert!(body.contains("priority: high"));
        assert!(!body.contains("notify"));
    }

    #[test]
    fn test_callbacks_rendered() {
        let (templates, out) = setup(&[(
            "boot/qemu.jinja2",
            "{% for cb in callbacks %}{{ cb.url }} {{ cb['content-type'] }}\n{% endfor %}",
        )]);
        let emitter = JobEmitter::new(templates.path(), out.path());
        let callbacks = vec![CallbackSpec {
            kind: CallbackType::Custom,
            token: None,
            url: "http://x".to_string(),
            dataset: Dataset::All,
            method: None,
            content_type: Some(crate::callback::ContentType::json()),
            name: None,
        }];

        let rendered = emitter
            .render(&job("job-a", "boot/qemu.jinja2", callbacks))
            .unwrap();
        assert_eq!(rendered.trim(), "http://x json");
    }

    #[test]
    fn test_failures_do_not_stop_batch() {
        let (templates, out) = setup(&[
            ("boot/good.jinja2", "name: {{ name }}\n"),
            ("boot/bad.jinja2", "timeout: {{ job_timeout }}\n"),
        ]);
        let emitter = JobEmitter::new(templates.path(), out.path());
        let jobs = vec![
            job("job-bad", "boot/bad.jinja2", Vec::new()),
            job("job-missing", "boot/missing.jinja2", Vec::new()),
            job("job-good", "boot/good.jinja2", Vec::new()),
        ];

        let report = emitter.emit_all(&jobs);

        assert!(!report.is_success());
        assert_eq!(report.written, vec![out.path().join("job-good.yaml")]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].job, "job-bad");
        assert_eq!(report.failed[1].job, "job-missing");
        assert!(!out.path().join("job-bad.yaml").exists());
    }

    #[test]
    fn test_name_with_directory_reported() {
        let (templates, out) = setup(&[("boot/good.jinja2", "name: {{ name }}\n")]);
        let emitter = JobEmitter::new(templates.path(), out.path());
        let jobs = vec![
            job("v5.0-ti/am335x-boneblack.dtb-bbb-boot", "boot/good.jinja2", Vec::new()),
            job("job-good", "boot/good.jinja2", Vec::new()),
        ];

        let report = emitter.emit_all(&jobs);

        assert_eq!(report.written, vec![out.path().join("job-good.yaml")]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].reason.contains("not a plain file name"));
        assert!(!out.path().join("v5.0-ti").exists());
    }

    #[test]
    fn test_unwritable_output_reported() {
        let (templates, out) = setup(&[("boot/good.jinja2", "name: {{ name }}\n")]);
        let emitter = JobEmitter::new(templates.path(), &out.path().join("missing-dir"));

        let err = emitter
            .write(&job("job-a", "boot/good.jinja2", Vec::new()))
            .unwrap_err();
        assert!(matches!(err, EmitError::Write { .. }));
    }
}
