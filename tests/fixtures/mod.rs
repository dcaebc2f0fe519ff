//! Test fixtures for the end-to-end pipeline tests
//!
//! - `test-configs.toml`: catalog with four device types and two plans
//! - `builds.json`: one passing, one failed and one big-endian build
//! - `callbacks.json`: one repairable and one URL-less callback
//! - `lava.toml`: settings file with `default` and `staging` sections
//! - `templates/`: job templates for the boot and baseline plans

#![allow(dead_code)]

use kci_lava_jobs::config::{EffectiveConfig, JobgenConfig};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn catalog_path() -> PathBuf {
    fixtures_dir().join("test-configs.toml")
}

pub fn builds_path() -> PathBuf {
    fixtures_dir().join("builds.json")
}

pub fn callbacks_path() -> PathBuf {
    fixtures_dir().join("callbacks.json")
}

pub fn settings_path() -> PathBuf {
    fixtures_dir().join("lava.toml")
}

pub fn templates_dir() -> PathBuf {
    fixtures_dir().join("templates")
}

/// Command-line layer for an arm64 run over the local fixtures.
pub fn cli_layer(jobs_dir: &Path) -> Value {
    json!({
        "lab": "lab-baylibre",
        "tree": "mainline",
        "branch": "master",
        "describe": "v5.0",
        "plans": ["boot", "baseline"],
        "arch": "arm64",
        "storage": "https://storage.kernelci.org/",
        "builds": builds_path(),
        "jobs": jobs_dir,
        "test_configs": catalog_path(),
        "templates": templates_dir(),
    })
}

/// Typed config from builtin defaults plus `cli_layer` with `overrides`.
pub fn config(jobs_dir: &Path, overrides: Value) -> JobgenConfig {
    let mut cli = cli_layer(jobs_dir);
    for (key, value) in overrides.as_object().expect("overrides must be an object") {
        cli[key] = value.clone();
    }
    EffectiveConfig::build(None, "default", Some(cli))
        .expect("config layers")
        .jobgen_config()
        .expect("valid config")
}

/// Copy the fixture templates into `dest`.
pub fn copy_templates(dest: &Path) {
    copy_dir(&templates_dir(), dest);
}

fn copy_dir(src: &Path, dest: &Path) {
    fs::create_dir_all(dest).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dest.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// Sorted names of the files in a directory.
pub fn written_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
