// Licensed under the Apache-2.0 license

//! Suite configuration.
//!
//! A suite run is described by a TOML file handed to the runner, or by
//! `HIL_*` environment variables when the runner re-executes the test
//! binaries.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_SUITE_ID: &str = "HIL_SUITE_ID";
const ENV_WORKER_URL: &str = "HIL_WORKER_URL";
const ENV_API_URL: &str = "HIL_API_URL";
const ENV_API_TOKEN: &str = "HIL_API_TOKEN";
const ENV_DEVICE_UUID: &str = "HIL_DEVICE_UUID";
const ENV_DEVICE_TYPE: &str = "HIL_DEVICE_TYPE";
const ENV_BASE_OS_VERSION: &str = "HIL_BASE_OS_VERSION";
const ENV_TARGET_OS_VERSION: &str = "HIL_TARGET_OS_VERSION";
const ENV_SSH_KEY_PATH: &str = "HIL_SSH_KEY_PATH";
const ENV_TMPDIR: &str = "HIL_TMPDIR";
const ENV_WIRED: &str = "HIL_WIRED";
const ENV_WIRELESS_SSID: &str = "HIL_WIRELESS_SSID";
const ENV_WIRELESS_PSK: &str = "HIL_WIRELESS_PSK";

/// Network definition pushed to the worker before flashing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub wired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wireless: Option<WirelessConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirelessConfig {
    pub ssid: String,
    pub psk: String,
    #[serde(default = "default_nat")]
    pub nat: bool,
}

fn default_nat() -> bool {
    true
}

impl WirelessConfig {
    /// The AP a worker brings up for one suite run.
    pub fn for_suite(suite_id: &str) -> Self {
        WirelessConfig {
            ssid: suite_id.to_string(),
            psk: format!("{suite_id}_psk"),
            nat: true,
        }
    }
}

/// Everything a suite run needs to know about the DUT and its cloud.
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteConfig {
    #[serde(default = "default_suite_id")]
    pub suite_id: String,
    pub worker_url: String,
    pub api_url: String,
    #[serde(default)]
    pub api_token: String,
    pub device_uuid: String,
    pub device_type: String,
    /// The OS version flashed before a suite starts.
    pub base_os_version: String,
    /// The OS version a HUP moves the device to.
    pub target_os_version: String,
    #[serde(default = "default_ssh_key_path")]
    pub ssh_key_path: PathBuf,
    #[serde(default = "default_tmpdir")]
    pub tmpdir: PathBuf,
    #[serde(default)]
    pub network: NetworkConfig,
}

fn default_suite_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("hil-{}", &id[..8])
}

fn default_ssh_key_path() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
        .join("id")
}

fn default_tmpdir() -> PathBuf {
    env::temp_dir().join("hil-suite")
}

impl SuiteConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read suite config {}", path.display()))?;
        let config: SuiteConfig = toml::from_str(&contents)
            .with_context(|| format!("invalid suite config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the configuration the runner exported for the test binaries.
    pub fn from_env() -> Result<Self> {
        let required = |key: &str| {
            env::var(key).with_context(|| format!("{key} not set; run the suite through xtask"))
        };
        let wireless = match (env::var(ENV_WIRELESS_SSID), env::var(ENV_WIRELESS_PSK)) {
            (Ok(ssid), Ok(psk)) => Some(WirelessConfig {
                ssid,
                psk,
                nat: true,
            }),
            _ => None,
        };
        let config = SuiteConfig {
            suite_id: env::var(ENV_SUITE_ID).unwrap_or_else(|_| default_suite_id()),
            worker_url: required(ENV_WORKER_URL)?,
            api_url: required(ENV_API_URL)?,
            api_token: env::var(ENV_API_TOKEN).unwrap_or_default(),
            device_uuid: required(ENV_DEVICE_UUID)?,
            device_type: required(ENV_DEVICE_TYPE)?,
            base_os_version: required(ENV_BASE_OS_VERSION)?,
            target_os_version: required(ENV_TARGET_OS_VERSION)?,
            ssh_key_path: env::var(ENV_SSH_KEY_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_ssh_key_path()),
            tmpdir: env::var(ENV_TMPDIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_tmpdir()),
            network: NetworkConfig {
                wired: env::var(ENV_WIRED).map(|v| v == "1").unwrap_or(false),
                wireless,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// The environment the runner exports for [`Self::from_env`].
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            (ENV_SUITE_ID, self.suite_id.clone()),
            (ENV_WORKER_URL, self.worker_url.clone()),
            (ENV_API_URL, self.api_url.clone()),
            (ENV_API_TOKEN, self.api_token.clone()),
            (ENV_DEVICE_UUID, self.device_uuid.clone()),
            (ENV_DEVICE_TYPE, self.device_type.clone()),
            (ENV_BASE_OS_VERSION, self.base_os_version.clone()),
            (ENV_TARGET_OS_VERSION, self.target_os_version.clone()),
            (
                ENV_SSH_KEY_PATH,
                self.ssh_key_path.display().to_string(),
            ),
            (ENV_TMPDIR, self.tmpdir.display().to_string()),
            (ENV_WIRED, if self.network.wired { "1" } else { "0" }.to_string()),
        ];
        if let Some(wireless) = &self.network.wireless {
            vars.push((ENV_WIRELESS_SSID, wireless.ssid.clone()));
            vars.push((ENV_WIRELESS_PSK, wireless.psk.clone()));
        }
        vars
    }

    /// The mDNS name the DUT announces on the local network.
    pub fn link(&self) -> String {
        format!("{}.local", &self.device_uuid[..7])
    }

    fn validate(&self) -> Result<()> {
        if self.device_uuid.len() < 7 {
            bail!("device uuid '{}' is too short", self.device_uuid);
        }
        if self.worker_url.is_empty() {
            bail!("worker url must not be empty");
        }
        Ok(())
    }
}
