//! Test plans.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CatalogError;
use crate::filter::{all_match, Filter, FilterSpec, MatchFilters};
use crate::rootfs::RootFs;

/// Default template file name pattern.
pub const DEFAULT_TEMPLATE_PATTERN: &str =
    "{category}{method}-{protocol}-{rootfs}-{plan}-template.jinja2";

/// Job parameters that fix the output file and template; plans cannot set them.
pub const RESERVED_PARAMS: &[&str] = &["name", "template_file", "short_template_file"];

/// Test plan entry as written in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestPlanEntry {
    /// Name of a `[rootfs.*]` entry
    pub rootfs: String,

    /// Template family prefix, e.g. `generic`
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    /// Extra template parameters
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// A test scenario run on a device.
#[derive(Debug, Clone)]
pub struct TestPlan {
    pub name: String,
    pub rootfs: RootFs,
    pub category: Option<String>,
    pub pattern: String,
    pub filters: Vec<Filter>,
    pub params: Map<String, Value>,
}

impl TestPlan {
    pub(crate) fn from_entry(
        name: &str,
        entry: TestPlanEntry,
        rootfs: &RootFs,
    ) -> Result<Self, CatalogError> {
        if let Some(key) = RESERVED_PARAMS.iter().find(|k| entry.params.contains_key(**k)) {
            return Err(CatalogError::ReservedParam {
                plan: name.to_string(),
                key: key.to_string(),
            });
        }
        let owner = format!("test plan '{}'", name);
        let filters = Filter::compile_all(entry.filters, &owner)?;
        Ok(Self {
            name: name.to_string(),
            rootfs: rootfs.clone(),
            category: entry.category.filter(|c| !c.is_empty()),
            pattern: entry
                .pattern
                .unwrap_or_else(|| DEFAULT_TEMPLATE_PATTERN.to_string()),
            filters,
            params: entry.params,
        })
    }

    pub fn matches(&self, filters: &MatchFilters) -> bool {
        all_match(&self.filters, filters)
    }

    /// Template path relative to the templates directory.
    ///
    /// e.g. `boot/generic-uboot-tftp-ramdisk-boot-template.jinja2`
    pub fn template_path(&self, boot_method: &str) -> String {
        let category = self
            .category
            .as_ref()
            .map(|c| format!("{}-", c))
            .unwrap_or_default();
        let file = self
            .pattern
            .replace("{category}", &category)
            .replace("{method}", boot_method)
            .replace("{protocol}", &self.rootfs.boot_protocol)
            .replace("{rootfs}", &self.rootfs.root_type)
            .replace("{plan}", &self.name);
        format!("{}/{}", self.name, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rootfs() -> RootFs {
        let mut r: RootFs = toml::from_str("root_type = \"nfs\"").unwrap();
        r.name = "debian".to_string();
        r
    }

    fn plan(src: &str) -> TestPlan {
        let entry: TestPlanEntry = toml::from_str(src).unwrap();
        TestPlan::from_entry("boot", entry, &rootfs()).unwrap()
    }

    #[test]
    fn test_template_path_default_pattern() {
        let p = plan("rootfs = \"debian\"");
        assert_eq!(
            p.template_path("uboot"),
            "boot/uboot-tftp-nfs-boot-template.jinja2"
        );
    }

    #[test]
    fn test_template_path_with_category() {
        let p = plan("rootfs = \"debian\"\ncategory = \"generic\"");
        assert_eq!(
            p.template_path("grub"),
            "boot/generic-grub-tftp-nfs-boot-template.jinja2"
        );
    }

    #[test]
    fn test_template_path_custom_pattern() {
        let p = plan("rootfs = \"debian\"\npattern = \"{plan}-{method}.jinja2\"");
        assert_eq!(p.template_path("fastboot"), "boot/boot-fastboot.jinja2");
    }

    #[test]
    fn test_params_and_filters() {
        let p = plan(
            r#"
            rootfs = "debian"

            [params]
            job_timeout = 10
            test_suite = "baseline"

            [[filters]]
            type = "passlist"
            defconfig = ["defconfig"]
            "#,
        );
        assert_eq!(p.params["job_timeout"], 10);
        assert_eq!(p.params["test_suite"], "baseline");

        let mut f = MatchFilters::default();
        f.defconfig = "tinyconfig".to_string();
        assert!(!p.matches(&f));
        f.defconfig = "multi_v7_defconfig".to_string();
        assert!(p.matches(&f));
    }

    #[test]
    fn test_reserved_params_rejected() {
        for key in RESERVED_PARAMS {
            let src = format!("rootfs = \"debian\"\n[params]\n{} = \"custom\"", key);
            let entry: TestPlanEntry = toml::from_str(&src).unwrap();
            assert!(matches!(
                TestPlan::from_entry("boot", entry, &rootfs()),
                Err(CatalogError::ReservedParam { .. })
            ));
        }
    }

    #[test]
    fn test_misspelled_key_rejected() {
        assert!(toml::from_str::<TestPlanEntry>("rootfs = \"debian\"\nparam = {}").is_err());
    }
}
