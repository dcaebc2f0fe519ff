//! KernelCI build API types
//!
//! Defines the build records returned by the `build` endpoint and the query
//! used to request them. The same record shape is used for pre-fetched
//! builds stored in a local JSON file.

pub mod build;
pub mod query;

pub use build::{defconfig_base, BuildRecord, BuildResponse, BuildStatus, ParseError};
pub use query::{BuildQuery, DefconfigSelector};

/// Path of the build endpoint, relative to the API root.
pub const BUILD_ENDPOINT: &str = "build";

/// Separator between a base defconfig and its extra config fragments.
pub const FRAGMENT_SEPARATOR: char = '+';
