//! Device type and test plan catalog.
//!
//! The catalog is a TOML document describing root filesystems, device
//! types, test plans and the test configs pairing them. It is validated
//! once at load time; matching against it is pure and never fails.
//!
//! ```toml
//! [rootfs.buildroot]
//! prompt = "/ #"
//! [rootfs.buildroot.url_formats]
//! ramdisk = "http://storage/rootfs/buildroot/{arch}/rootfs.cpio.gz"
//!
//! [device_type.juno]
//! arch = "arm64"
//! mach = "arm"
//! dtb = "arm/juno.dtb"
//!
//! [test_plan.boot]
//! rootfs = "buildroot"
//!
//! [[test_config]]
//! device_type = "juno"
//! test_plans = ["boot"]
//! ```

mod device;
mod error;
mod filter;
mod plan;
mod rootfs;
mod test_config;

pub use device::{DeviceFlag, DeviceType, DeviceTypeEntry, MatchFlags};
pub use error::CatalogError;
pub use filter::{
    all_match, CombinationSpec, FieldPatterns, FieldValues, Filter, FilterKey, FilterSpec,
    MatchFilters,
};
pub use plan::{TestPlan, TestPlanEntry, DEFAULT_TEMPLATE_PATTERN, RESERVED_PARAMS};
pub use rootfs::{ArchAlias, Endianness, FsType, RootFs, UrlFormats, BIG_ENDIAN_MARKER};
pub use test_config::{MatchQuery, TestConfig, TestConfigEntry};

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Substring of a defconfig name marking an LPAE build.
pub const LPAE_MARKER: &str = "LPAE";

/// Raw catalog document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    #[serde(default)]
    pub rootfs: BTreeMap<String, RootFs>,

    #[serde(default)]
    pub device_type: BTreeMap<String, DeviceTypeEntry>,

    #[serde(default)]
    pub test_plan: BTreeMap<String, TestPlanEntry>,

    #[serde(default)]
    pub test_config: Vec<TestConfigEntry>,
}

/// Validated catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    device_types: BTreeMap<String, DeviceType>,
    test_plans: BTreeMap<String, TestPlan>,
    test_configs: Vec<TestConfig>,
}

impl Catalog {
    /// Load and validate a catalog file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a catalog from a TOML string.
    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = toml::from_str(content)?;
        Self::from_document(document)
    }

    /// Resolve references and compile filters.
    pub fn from_document(document: CatalogDocument) -> Result<Self, CatalogError> {
        let rootfs: BTreeMap<String, RootFs> = document
            .rootfs
            .into_iter()
            .map(|(name, mut r)| {
                r.name = name.clone();
                (name, r)
            })
            .collect();

        let mut device_types = BTreeMap::new();
        for (name, entry) in document.device_type {
            let device = DeviceType::from_entry(&name, entry)?;
            device_types.insert(name, device);
        }

        let mut test_plans = BTreeMap::new();
        for (name, entry) in document.test_plan {
            let fs = rootfs
                .get(&entry.rootfs)
                .ok_or_else(|| CatalogError::UnknownRootFs {
                    plan: name.clone(),
                    rootfs: entry.rootfs.clone(),
                })?;
            let plan = TestPlan::from_entry(&name, entry, fs)?;
            test_plans.insert(name, plan);
        }

        let mut test_configs = Vec::with_capacity(document.test_config.len());
        for (index, entry) in document.test_config.into_iter().enumerate() {
            let device_type = device_types
                .get(&entry.device_type)
                .cloned()
                .ok_or_else(|| CatalogError::UnknownDeviceType {
                    index,
                    name: entry.device_type.clone(),
                })?;

            let mut seen = HashSet::new();
            let mut plans = Vec::with_capacity(entry.test_plans.len());
            for plan_name in &entry.test_plans {
                if !seen.insert(plan_name.as_str()) {
                    return Err(CatalogError::DuplicateTestPlan {
                        index,
                        name: plan_name.clone(),
                    });
                }
                let plan = test_plans
                    .get(plan_name)
                    .cloned()
                    .ok_or_else(|| CatalogError::UnknownTestPlan {
                        index,
                        name: plan_name.clone(),
                    })?;
                plans.push(plan);
            }

            let owner = format!("test config #{} ({})", index, entry.device_type);
            let filters = Filter::compile_all(entry.filters, &owner)?;
            test_configs.push(TestConfig {
                device_type,
                test_plans: plans,
                filters,
            });
        }

        Ok(Self {
            device_types,
            test_plans,
            test_configs,
        })
    }

    /// Test configs in document order.
    pub fn test_configs(&self) -> &[TestConfig] {
        &self.test_configs
    }

    /// Test configs that list the given plan, in document order.
    pub fn configs_for_plan<'a>(&'a self, plan: &'a str) -> impl Iterator<Item = &'a TestConfig> + 'a {
        self.test_configs.iter().filter(move |c| c.has_plan(plan))
    }

    pub fn device_type(&self, name: &str) -> Option<&DeviceType> {
        self.device_types.get(name)
    }

    pub fn test_plan(&self, name: &str) -> Option<&TestPlan> {
        self.test_plans.get(name)
    }

    pub fn len(&self) -> usize {
        self.test_configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test_configs.is_empty()
    }
}
