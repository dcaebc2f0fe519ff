//! Device types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CatalogError;
use crate::filter::{all_match, Filter, FilterSpec, MatchFilters};

/// Capability flag a device type can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFlag {
    BigEndian,
    Lpae,
    Fastboot,
}

/// Flags derived from a build; a `true` flag requires the device to declare it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchFlags {
    pub big_endian: bool,
    pub lpae: bool,
}

impl MatchFlags {
    fn required(&self) -> impl Iterator<Item = DeviceFlag> {
        [
            (self.big_endian, DeviceFlag::BigEndian),
            (self.lpae, DeviceFlag::Lpae),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .map(|(_, flag)| flag)
    }
}

/// Device type entry as written in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceTypeEntry {
    pub arch: String,

    /// Machine identifier passed to templates
    #[serde(default)]
    pub mach: String,

    /// Bootloader family, used to pick the job template
    #[serde(default = "default_boot_method")]
    pub boot_method: String,

    /// Device tree blob path relative to `dtbs/`
    #[serde(default)]
    pub dtb: Option<String>,

    #[serde(default)]
    pub flags: Vec<DeviceFlag>,

    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    /// Free-form device metadata handed to templates
    #[serde(default)]
    pub context: Map<String, Value>,
}

fn default_boot_method() -> String {
    "uboot".to_string()
}

/// A hardware target.
#[derive(Debug, Clone)]
pub struct DeviceType {
    pub name: String,
    pub arch: String,
    pub mach: String,
    pub boot_method: String,
    pub dtb: Option<String>,
    pub flags: Vec<DeviceFlag>,
    pub filters: Vec<Filter>,
    pub context: Map<String, Value>,
}

impl DeviceType {
    pub(crate) fn from_entry(name: &str, entry: DeviceTypeEntry) -> Result<Self, CatalogError> {
        let owner = format!("device type '{}'", name);
        if entry.arch.is_empty() {
            return Err(CatalogError::EmptyField {
                owner,
                field: "arch".to_string(),
            });
        }
        let filters = Filter::compile_all(entry.filters, &owner)?;
        Ok(Self {
            name: name.to_string(),
            arch: entry.arch,
            mach: entry.mach,
            boot_method: entry.boot_method,
            dtb: entry.dtb.filter(|d| !d.is_empty()),
            flags: entry.flags,
            filters,
            context: entry.context,
        })
    }

    pub fn get_flag(&self, flag: DeviceFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Required flags are declared and all device filters pass.
    pub fn matches(&self, flags: &MatchFlags, filters: &MatchFilters) -> bool {
        flags.required().all(|f| self.get_flag(f)) && all_match(&self.filters, filters)
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
