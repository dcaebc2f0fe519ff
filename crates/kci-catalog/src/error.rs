//! Catalog load errors.

use std::io;
use std::path::PathBuf;

/// Errors raised while loading a catalog. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read catalog: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("test config #{index}: unknown device type '{name}'")]
    UnknownDeviceType { index: usize, name: String },

    #[error("test config #{index}: unknown test plan '{name}'")]
    UnknownTestPlan { index: usize, name: String },

    #[error("test config #{index}: test plan '{name}' listed twice")]
    DuplicateTestPlan { index: usize, name: String },

    #[error("test plan '{plan}': unknown rootfs '{rootfs}'")]
    UnknownRootFs { plan: String, rootfs: String },

    #[error("{owner}: invalid regex for '{key}': {reason}")]
    InvalidRegex {
        owner: String,
        key: String,
        reason: String,
    },

    #[error("{owner}: combination row {row} has {actual} values, expected {expected}")]
    CombinationArity {
        owner: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("test plan '{plan}': parameter '{key}' is reserved")]
    ReservedParam { plan: String, key: String },

    #[error("{owner}: field '{field}' cannot be empty")]
    EmptyField { owner: String, field: String },
}
