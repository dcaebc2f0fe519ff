//! KernelCI LAVA job generator
//!
//! Turns KernelCI build results into LAVA job definitions: builds are
//! fetched from the KernelCI API (or a local file), matched against a
//! catalog of device types and test plans, and each surviving
//! combination is rendered from a Jinja template into `<job>.yaml`.

pub mod callback;
pub mod config;
pub mod emit;
pub mod fetch;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod resolver;
pub mod summary;

pub use callback::{CallbackAssembler, CallbackSpec, CallbackValidation};
pub use config::{EffectiveConfig, JobgenConfig};
pub use emit::{EmitReport, JobEmitter};
pub use fetch::{BuildApi, BuildSource, RetryPolicy};
pub use job::{JobDescriptor, JobParams};
pub use pipeline::{run, run_with_builds, JobgenError, RunOptions};
pub use resolver::{JobResolver, ResolveContext, Resolution};
pub use summary::{ExitCode, RunSummary};
