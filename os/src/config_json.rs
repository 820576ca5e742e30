// Licensed under the Apache-2.0 license

//! The provisioning `config.json` and the on-device jq templates that
//! rewrite it.
//!
//! The device reads this file from its boot partition; tests patch it in
//! place over SSH with the same `mktemp && jq && mv` sequence an operator
//! would use, so the file is never truncated mid-write.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where the host OS mounts the provisioning config.
pub const CONFIG_JSON_PATH: &str = "/mnt/boot/config.json";

/// The `os` section of `config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_keys: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OsSection {
    pub fn is_empty(&self) -> bool {
        self.ssh_keys.is_none() && self.extra.is_empty()
    }
}

/// Typed model of `config.json`.
///
/// Fields the suite does not own are preserved through the flattened map so
/// a configure/read-back cycle never drops provisioning data.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "OsSection::is_empty")]
    pub os: OsSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_logging: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development_mode: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigJson {
    /// The initial config for a freshly provisioned DUT.
    pub fn for_device(uuid: &str, ssh_key: &str) -> Self {
        ConfigJson {
            uuid: Some(uuid.to_string()),
            os: OsSection {
                ssh_keys: Some(vec![ssh_key.to_string()]),
                extra: Map::new(),
            },
            // persistentLogging is only read at first boot, so it has to go
            // into the image before flashing.
            persistent_logging: Some(true),
            local_mode: Some(true),
            development_mode: Some(true),
            extra: Map::new(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `config.json` is patched through a temp file so the device never sees a
/// half-written config.
fn jq_rewrite(filter: &str) -> String {
    format!(
        "tmp=$(mktemp) && jq '{filter}' {CONFIG_JSON_PATH} > $tmp && mv \"$tmp\" {CONFIG_JSON_PATH}"
    )
}

/// The device's os-config agent reads `developmentMode` as a string.
pub fn jq_set_development_mode(enabled: bool) -> String {
    jq_rewrite(&format!(".developmentMode=\"{enabled}\""))
}

pub fn jq_delete_ssh_keys() -> String {
    jq_rewrite("del(.os.sshKeys)")
}

/// Replaces the custom key set with a single key.
pub fn jq_set_ssh_keys(pub_key: &str) -> String {
    format!(
        "tmp=$(mktemp) && jq --arg keys '{pub_key}' '. + {{os: {{sshKeys: [$keys]}}}}' {CONFIG_JSON_PATH} > $tmp && mv \"$tmp\" {CONFIG_JSON_PATH}"
    )
}

/// Reads a raw jq filter result out of the live config.
pub fn jq_read(filter: &str) -> String {
    format!("jq -r '{filter}' {CONFIG_JSON_PATH}")
}
