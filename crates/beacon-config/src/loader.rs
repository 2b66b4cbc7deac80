// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/beacon/beacon.toml`,
//! `~/.config/beacon/beacon.toml`, `./beacon.toml`, then `BEACON_*` env vars.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::BeaconConfig;

/// Sections addressable from the environment, e.g. `BEACON_DISPATCH_MAX_ATTEMPTS`.
const ENV_SECTIONS: &[&str] = &[
    "engine",
    "storage",
    "classifier",
    "matcher",
    "detector",
    "escalation",
    "dispatch",
    "transport",
    "gateway",
];

/// Config files consulted by [`load_config`], lowest precedence first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/beacon/beacon.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("beacon/beacon.toml"));
    }
    paths.push(PathBuf::from("beacon.toml"));
    paths
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<BeaconConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no env vars.
pub fn load_config_from_str(toml_content: &str) -> Result<BeaconConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BeaconConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BeaconConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BeaconConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    search_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(BeaconConfig::default())),
            |fig, path| fig.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Maps `BEACON_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys such as `max_attempts` keep their underscores.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("BEACON_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
