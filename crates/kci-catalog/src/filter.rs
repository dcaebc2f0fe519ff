//! Declarative build filters.
//!
//! Filters are attached to device types, test plans and test configs. Each
//! one inspects the four query fields (arch, defconfig, kernel, lab) and
//! returns a boolean. A field a filter does not mention is unconstrained.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Query field a filter can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKey {
    Arch,
    Defconfig,
    Kernel,
    Lab,
}

impl FilterKey {
    pub const ALL: [FilterKey; 4] = [
        FilterKey::Arch,
        FilterKey::Defconfig,
        FilterKey::Kernel,
        FilterKey::Lab,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Arch => "arch",
            FilterKey::Defconfig => "defconfig",
            FilterKey::Kernel => "kernel",
            FilterKey::Lab => "lab",
        }
    }
}

impl std::fmt::Display for FilterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values a build is checked against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFilters {
    pub arch: String,
    pub defconfig: String,
    pub kernel: String,
    pub lab: String,
}

impl MatchFilters {
    pub fn get(&self, key: FilterKey) -> &str {
        match key {
            FilterKey::Arch => &self.arch,
            FilterKey::Defconfig => &self.defconfig,
            FilterKey::Kernel => &self.kernel,
            FilterKey::Lab => &self.lab,
        }
    }
}

/// Per-field substring lists (blocklist/passlist body).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldValues {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arch: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defconfig: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kernel: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lab: Vec<String>,
}

impl FieldValues {
    fn get(&self, key: FilterKey) -> &[String] {
        match key {
            FilterKey::Arch => &self.arch,
            FilterKey::Defconfig => &self.defconfig,
            FilterKey::Kernel => &self.kernel,
            FilterKey::Lab => &self.lab,
        }
    }

    /// Fields that carry at least one value.
    fn constrained(&self) -> impl Iterator<Item = (FilterKey, &[String])> {
        FilterKey::ALL
            .into_iter()
            .map(move |k| (k, self.get(k)))
            .filter(|(_, v)| !v.is_empty())
    }
}

/// Per-field regex patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldPatterns {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defconfig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab: Option<String>,
}

impl FieldPatterns {
    fn get(&self, key: FilterKey) -> Option<&str> {
        match key {
            FilterKey::Arch => self.arch.as_deref(),
            FilterKey::Defconfig => self.defconfig.as_deref(),
            FilterKey::Kernel => self.kernel.as_deref(),
            FilterKey::Lab => self.lab.as_deref(),
        }
    }
}

/// Allowed value tuples over a fixed set of keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CombinationSpec {
    pub keys: Vec<FilterKey>,
    pub values: Vec<Vec<String>>,
}

/// Filter as written in the catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    /// Reject when any listed substring occurs in its field
    #[serde(alias = "blacklist")]
    Blocklist(FieldValues),
    /// Every listed field must contain one of its substrings
    #[serde(alias = "whitelist")]
    Passlist(FieldValues),
    /// Every listed field must match its pattern from the start
    Regex(FieldPatterns),
    /// The tuple of listed keys must equal one of the value rows
    Combination(CombinationSpec),
}

/// A validated, ready-to-evaluate filter.
#[derive(Debug, Clone)]
pub enum Filter {
    Blocklist(FieldValues),
    Passlist(FieldValues),
    Regex(Vec<(FilterKey, Regex)>),
    Combination(CombinationSpec),
}

impl Filter {
    /// Validate a filter spec. `owner` names the catalog entry for errors.
    pub fn compile(spec: FilterSpec, owner: &str) -> Result<Self, CatalogError> {
        match spec {
            FilterSpec::Blocklist(values) => Ok(Filter::Blocklist(values)),
            FilterSpec::Passlist(values) => Ok(Filter::Passlist(values)),
            FilterSpec::Regex(patterns) => {
                let mut compiled = Vec::new();
                for key in FilterKey::ALL {
                    if let Some(pattern) = patterns.get(key) {
                        let re = Regex::new(pattern).map_err(|e| CatalogError::InvalidRegex {
                            owner: owner.to_string(),
                            key: key.to_string(),
                            reason: e.to_string(),
                        })?;
                        compiled.push((key, re));
                    }
                }
                Ok(Filter::Regex(compiled))
            }
            FilterSpec::Combination(combination) => {
                for (row, values) in combination.values.iter().enumerate() {
                    if values.len() != combination.keys.len() {
                        return Err(CatalogError::CombinationArity {
                            owner: owner.to_string(),
                            row,
                            expected: combination.keys.len(),
                            actual: values.len(),
                        });
                    }
                }
                Ok(Filter::Combination(combination))
            }
        }
    }

    /// Compile a list of specs, stopping at the first invalid one.
    pub fn compile_all(specs: Vec<FilterSpec>, owner: &str) -> Result<Vec<Self>, CatalogError> {
        specs.into_iter().map(|s| Filter::compile(s, owner)).collect()
    }

    /// Evaluate the filter.
    pub fn matches(&self, query: &MatchFilters) -> bool {
        match self {
            Filter::Blocklist(values) => values
                .constrained()
                .all(|(key, blocked)| {
                    let field = query.get(key);
                    !blocked.iter().any(|b| field.contains(b.as_str()))
                }),
            Filter::Passlist(values) => values
                .constrained()
                .all(|(key, allowed)| {
                    let field = query.get(key);
                    allowed.iter().any(|a| field.contains(a.as_str()))
                }),
            Filter::Regex(patterns) => patterns.iter().all(|(key, re)| {
                re.find(query.get(*key)).is_some_and(|m| m.start() == 0)
            }),
            Filter::Combination(combination) => {
                let actual: Vec<&str> = combination.keys.iter().map(|k| query.get(*k)).collect();
                combination
                    .values
                    .iter()
                    .any(|row| row.iter().map(String::as_str).eq(actual.iter().copied()))
            }
        }
    }
}

/// Whether every filter in the list matches. An empty list matches.
pub fn all_match(filters: &[Filter], query: &MatchFilters) -> bool {
    filters.iter().all(|f| f.matches(query))
}
