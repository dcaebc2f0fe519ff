//! Configuration merge system
//!
//! Implements the 3-layer configuration merge:
//! 1. Built-in defaults
//! 2. One section of a TOML settings file (`--config`, `--section`)
//! 3. CLI flags
//!
//! The merged object is then read into a typed [`JobgenConfig`].

mod defaults;
mod effective;
mod jobgen;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, REDACTED};
pub use jobgen::{JobgenConfig, Priority, RetrySettings};
pub use merge::{deep_merge, merge_layers, toml_to_json};
