//! Job parameter derivation.

use kci_catalog::{
    DeviceFlag, Endianness, FsType, MatchFilters, MatchFlags, MatchQuery, TestConfig, TestPlan,
    LPAE_MARKER,
};
use kci_protocol::{defconfig_base, BuildRecord};
use reqwest::Url;
use std::path::Path;

use super::ResolveContext;
use crate::job::{JobParams, IMAGE_TYPE};

/// Extension a DTB must carry to get a download URL
const DTB_EXTENSION: &str = ".dtb";

/// Storage subdirectory holding device tree blobs
const DTB_DIR: &str = "dtbs";

/// Architecture whose DTBs live in vendor subfolders
const FLAT_DTB_ARCH: &str = "arm64";

#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    #[error("build has no kernel image")]
    NoKernelImage,

    #[error("cannot join '{path}' to storage URL: {reason}")]
    InvalidUrl { path: String, reason: String },
}

/// Per-build values shared by every plan.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Full defconfig, including fragments
    pub defconfig: String,
    /// `<arch>-<defconfig>`
    pub arch_defconfig: String,
    pub endian: Endianness,
    pub flags: MatchFlags,
    pub filters: MatchFilters,
}

impl BuildOptions {
    pub fn new(arch: &str, defconfig: &str, describe: &str, lab: &str) -> Self {
        let endian = Endianness::from_defconfig(defconfig);
        Self {
            defconfig: defconfig.to_string(),
            arch_defconfig: format!("{}-{}", arch, defconfig),
            endian,
            flags: MatchFlags {
                big_endian: endian == Endianness::Big,
                lpae: defconfig.contains(LPAE_MARKER),
            },
            filters: MatchFilters {
                arch: arch.to_string(),
                defconfig: defconfig.to_string(),
                kernel: describe.to_string(),
                lab: lab.to_string(),
            },
        }
    }

    pub fn query<'a>(&'a self, arch: &'a str, plan: &'a str) -> MatchQuery<'a> {
        MatchQuery {
            arch,
            plan,
            flags: self.flags,
            filters: &self.filters,
        }
    }
}

/// Derive the parameters of one job.
///
/// `short_template` is the template path relative to the templates
/// directory; its existence is checked by the caller.
pub fn derive_params(
    ctx: &ResolveContext,
    build: &BuildRecord,
    opts: &BuildOptions,
    config: &TestConfig,
    plan: &TestPlan,
    short_template: String,
) -> Result<JobParams, ParamError> {
    let device_type = &config.device_type;
    let arch = ctx.arch.as_str();
    let kernel_image = build
        .kernel_image
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or(ParamError::NoKernelImage)?;

    let dtb_full = device_type.dtb.clone();
    let dtb_short = dtb_full.as_deref().map(|dtb| {
        if arch == FLAT_DTB_ARCH {
            Path::new(dtb)
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| dtb.to_string())
        } else {
            dtb.to_string()
        }
    });

    let file_server_resource = build.file_server_resource().map(str::to_string);
    let (name_prefix, url_prefix) = match file_server_resource {
        Some(ref resource) => (resource.replace('/', "-"), resource.clone()),
        None => {
            let parts = [
                build.job.as_str(),
                build.git_branch.as_str(),
                build.kernel.as_str(),
                arch,
                opts.defconfig.as_str(),
            ];
            (parts.join("-"), parts.join("/"))
        }
    };

    // Only arm64 flattens the DTB; elsewhere a vendor directory stays in the
    // name and the emitter reports the job as failed.
    let name = [
        name_prefix.as_str(),
        dtb_short.as_deref().unwrap_or("no-dtb"),
        device_type.name.as_str(),
        plan.name.as_str(),
    ]
    .join("-");

    let base_url = storage_join(&ctx.storage, &format!("{}/", url_prefix))?;
    let kernel_url = storage_join(&ctx.storage, &format!("{}/{}", url_prefix, kernel_image))?;

    let (dtb_url, platform) = match (dtb_full.as_deref(), dtb_short.as_deref()) {
        (Some(full), Some(short)) if full.ends_with(DTB_EXTENSION) => {
            let url = storage_join(
                &ctx.storage,
                &format!("{}/{}/{}", url_prefix, DTB_DIR, full),
            )?;
            let stem = short.split('.').next().unwrap_or(short).to_string();
            (Some(url), stem)
        }
        _ => (None, device_type.name.clone()),
    };

    let modules_url = match build.modules() {
        Some(modules) => Some(storage_join(
            &ctx.storage,
            &format!("{}/{}", url_prefix, modules),
        )?),
        None => None,
    };

    let rootfs = &plan.rootfs;
    let template_file = ctx
        .templates_dir
        .join(&short_template)
        .to_string_lossy()
        .into_owned();

    Ok(JobParams {
        name,
        dtb_url,
        dtb_short,
        dtb_full,
        platform,
        mach: device_type.mach.clone(),
        kernel_url,
        image_type: IMAGE_TYPE,
        image_url: base_url.clone(),
        modules_url,
        plan: plan.name.clone(),
        kernel: ctx.describe.clone(),
        tree: ctx.tree.clone(),
        defconfig: opts.defconfig.clone(),
        arch_defconfig: opts.arch_defconfig.clone(),
        fastboot: device_type.get_flag(DeviceFlag::Fastboot).to_string(),
        priority: ctx.priority.to_string(),
        device_type: device_type.name.clone(),
        template_file,
        base_url,
        endian: opts.endian,
        short_template_file: short_template,
        arch: arch.to_string(),
        git_branch: ctx.branch.clone(),
        git_commit: build.git_commit.clone(),
        git_describe: ctx.describe.clone(),
        git_url: build.git_url.clone(),
        defconfig_base: defconfig_base(&opts.defconfig).to_string(),
        initrd_url: rootfs.get_url(FsType::Ramdisk, arch, opts.endian),
        kernel_image,
        nfsrootfs_url: rootfs.get_url(FsType::Nfs, arch, opts.endian),
        lab_name: ctx.lab.clone(),
        context: device_type.context.clone(),
        rootfs_prompt: rootfs.prompt.clone(),
        plan_name: plan.name.clone(),
        file_server_resource,
        build_environment: build.build_environment.clone(),
    })
}

fn storage_join(storage: &Url, path: &str) -> Result<String, ParamError> {
    storage
        .join(path)
        .map(String::from)
        .map_err(|e| ParamError::InvalidUrl {
            path: path.to_string(),
            reason: e.to_string(),
        })
}
