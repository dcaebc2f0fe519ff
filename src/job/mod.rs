//! Resolved job descriptors
//!
//! A [`JobDescriptor`] is the flat parameter mapping a job template is
//! rendered with, plus the template that renders it. The output file name
//! and template are taken from the typed [`JobParams`], so plan parameters
//! can shadow template variables but never the job's identity.

use kci_catalog::Endianness;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::callback::CallbackSpec;

/// Image type reported to templates
pub const IMAGE_TYPE: &str = "kernel-ci";

/// Key under which callbacks are added
pub const CALLBACKS_KEY: &str = "callbacks";

/// Extension of job output files
pub const JOB_FILE_EXTENSION: &str = "yaml";

/// Parameters derived for one (build, plan, device type) combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobParams {
    /// Job name, also the output file stem
    pub name: String,
    pub dtb_url: Option<String>,
    /// DTB file name, flattened on arm64
    pub dtb_short: Option<String>,
    /// DTB path as declared by the device type
    pub dtb_full: Option<String>,
    pub platform: String,
    pub mach: String,
    pub kernel_url: String,
    pub image_type: &'static str,
    pub image_url: String,
    pub modules_url: Option<String>,
    pub plan: String,
    pub kernel: String,
    pub tree: String,
    pub defconfig: String,
    pub arch_defconfig: String,
    /// `"true"` or `"false"`
    pub fastboot: String,
    pub priority: String,
    pub device_type: String,
    /// Template path including the templates directory
    pub template_file: String,
    pub base_url: String,
    pub endian: Endianness,
    /// Template path relative to the templates directory
    pub short_template_file: String,
    pub arch: String,
    pub git_branch: String,
    pub git_commit: Option<String>,
    pub git_describe: String,
    pub git_url: Option<String>,
    pub defconfig_base: String,
    pub initrd_url: Option<String>,
    pub kernel_image: String,
    pub nfsrootfs_url: Option<String>,
    pub lab_name: String,
    /// Device metadata from the catalog
    pub context: Map<String, Value>,
    pub rootfs_prompt: String,
    pub plan_name: String,
    pub file_server_resource: Option<String>,
    pub build_environment: Option<String>,
}

/// A fully resolved job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    params: JobParams,
    context: Map<String, Value>,
}

impl JobDescriptor {
    /// Flatten `params`, then add plan parameters, then callbacks.
    ///
    /// Plan parameters override derived values of the same name.
    /// `callbacks` is only present when the list is non-empty.
    pub fn new(
        params: JobParams,
        plan_params: &Map<String, Value>,
        callbacks: Vec<CallbackSpec>,
    ) -> Result<Self, serde_json::Error> {
        let mut context = match serde_json::to_value(&params)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in plan_params {
            context.insert(key.clone(), value.clone());
        }
        if !callbacks.is_empty() {
            context.insert(CALLBACKS_KEY.to_string(), serde_json::to_value(callbacks)?);
        } else {
            context.remove(CALLBACKS_KEY);
        }
        Ok(Self { params, context })
    }

    pub fn name(&self) -> &str {
        &self.params.name
    }

    /// Template path relative to the templates directory
    pub fn template(&self) -> &str {
        &self.params.short_template_file
    }

    /// Output file name, `<name>.yaml`
    pub fn file_name(&self) -> PathBuf {
        PathBuf::from(format!("{}.{}", self.params.name, JOB_FILE_EXTENSION))
    }

    pub fn params(&self) -> &JobParams {
        &self.params
    }

    /// Template variables
    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }
}
