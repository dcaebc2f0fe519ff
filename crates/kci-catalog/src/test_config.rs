//! Test configs: a device type paired with the plans it runs.

use serde::{Deserialize, Serialize};

use crate::device::{DeviceType, MatchFlags};
use crate::filter::{all_match, Filter, FilterSpec, MatchFilters};
use crate::plan::TestPlan;

/// Test config entry as written in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfigEntry {
    pub device_type: String,
    pub test_plans: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

/// Typed match query.
#[derive(Debug, Clone, Copy)]
pub struct MatchQuery<'a> {
    /// Architecture the jobs are generated for
    pub arch: &'a str,
    /// Requested test plan name
    pub plan: &'a str,
    pub flags: MatchFlags,
    pub filters: &'a MatchFilters,
}

/// A device type with the test plans it can run.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub device_type: DeviceType,
    /// Plans in catalog order
    pub test_plans: Vec<TestPlan>,
    pub filters: Vec<Filter>,
}

impl TestConfig {
    pub fn plan(&self, name: &str) -> Option<&TestPlan> {
        self.test_plans.iter().find(|p| p.name == name)
    }

    pub fn has_plan(&self, name: &str) -> bool {
        self.plan(name).is_some()
    }

    /// Evaluate the full applicability rule.
    ///
    /// Matches when the plan is part of this config and its filters pass,
    /// the device arch equals the requested arch, the device declares every
    /// requested flag and passes its filters, and the config filters pass.
    pub fn matches(&self, query: &MatchQuery<'_>) -> bool {
        let plan = match self.plan(query.plan) {
            Some(plan) => plan,
            None => return false,
        };
        plan.matches(query.filters)
            && self.device_type.arch == query.arch
            && self.device_type.matches(&query.flags, query.filters)
            && all_match(&self.filters, query.filters)
    }

    /// Template path for a plan, if this config runs it.
    pub fn template_path(&self, plan: &str) -> Option<String> {
        self.plan(plan)
            .map(|p| p.template_path(&self.device_type.boot_method))
    }
}
