// Licensed under the Apache-2.0 license

//! Device cloud API client.
//!
//! The cloud side of a suite run: token auth, SSH key registration, OS
//! image downloads, and command execution on remote devices through the
//! cloud's SSH gateway.

use anyhow::{Context, Result};
use hil_testing_common::ssh::{run_ssh_command_with_output, SshOpts};
use hil_testing_common::{wait_until_with, PollOptions};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct WhoAmI {
    username: String,
}

#[derive(Debug, Deserialize)]
struct SshKeyRecord {
    id: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct DeviceState {
    online: bool,
}

/// Strips the scheme and any path/port from an API URL.
fn host_of(api_url: &str) -> &str {
    let host = api_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(api_url);
    host.split(['/', ':']).next().unwrap_or(host)
}

/// The SSH gateway lives next to the API: `api.` becomes `ssh.`.
fn proxy_host_for(api_url: &str) -> String {
    let host = host_of(api_url);
    match host.strip_prefix("api.") {
        Some(rest) => format!("ssh.{rest}"),
        None => format!("ssh.{host}"),
    }
}

/// The gateway multiplexes by device: `host <uuid> <command>`.
fn gateway_command(uuid: &str, command: &str) -> String {
    format!("host {uuid} {command}")
}

/// Client for the device cloud API and its SSH gateway.
pub struct CloudClient {
    api_url: String,
    token: Option<String>,
    username: Option<String>,
    gateway_identity: Option<PathBuf>,
    client: reqwest::blocking::Client,
}

impl CloudClient {
    pub fn new(api_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("failed to build cloud client")?;
        Ok(CloudClient {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: None,
            username: None,
            gateway_identity: None,
            client,
        })
    }

    /// Key used for gateway SSH sessions (the suite key).
    pub fn set_gateway_identity(&mut self, identity: &Path) {
        self.gateway_identity = Some(identity.to_path_buf());
    }

    /// Authenticates and remembers the account the token belongs to.
    pub fn login_with_token(&mut self, token: &str) -> Result<()> {
        self.token = Some(token.to_string());
        let whoami: WhoAmI = self
            .get("user/v1/whoami")?
            .json()
            .context("whoami response is not valid JSON")?;
        log::info!("logged in as {}", whoami.username);
        self.username = Some(whoami.username);
        Ok(())
    }

    pub fn create_ssh_key(&self, label: &str, pub_key: &str) -> Result<()> {
        self.authed(self.client.post(self.endpoint("v1/ssh-keys")))
            .json(&serde_json::json!({ "title": label, "public_key": pub_key }))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .context("ssh key registration failed")?;
        Ok(())
    }

    /// Deletes the key registered under `label`, if any.
    pub fn remove_ssh_key(&self, label: &str) -> Result<()> {
        let keys: Vec<SshKeyRecord> = self
            .get("v1/ssh-keys")?
            .json()
            .context("ssh key listing is not valid JSON")?;
        let Some(key) = keys.iter().find(|k| k.title == label) else {
            log::warn!("no ssh key registered under '{label}'");
            return Ok(());
        };
        self.authed(
            self.client
                .delete(self.endpoint(&format!("v1/ssh-keys/{}", key.id))),
        )
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .context("ssh key removal failed")?;
        Ok(())
    }

    /// Downloads an OS image into `cache_dir`, reusing a previous
    /// download of the same version when present.
    pub fn fetch_os(&self, version: &str, device_type: &str, cache_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(cache_dir)?;
        let dest = cache_dir.join(format!("hostos-{device_type}-{version}.img"));
        if dest.exists() {
            log::info!("using cached {}", dest.display());
            return Ok(dest);
        }
        log::info!("downloading OS {version} for {device_type}");
        let mut response = self
            .authed(self.client.get(self.endpoint("download")))
            .query(&[
                ("deviceType", device_type),
                ("version", version),
                ("fileType", ".img"),
            ])
            // Image downloads run long on slow mirrors.
            .timeout(std::time::Duration::from_secs(1800))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .context("OS download failed")?;
        // Download to a partial file so an aborted run never leaves a
        // truncated image in the cache.
        let partial = dest.with_extension("img.partial");
        let mut file = fs::File::create(&partial)?;
        io::copy(&mut response, &mut file).context("OS download interrupted")?;
        fs::rename(&partial, &dest)?;
        Ok(dest)
    }

    /// Runs a command on a device through the cloud SSH gateway.
    pub fn execute_command_in_host_os(&self, command: &str, uuid: &str) -> Result<String> {
        let username = self
            .username
            .as_deref()
            .context("not logged in; gateway sessions need an account")?;
        let mut opts = SshOpts {
            user: username.to_string(),
            port: 22,
            ..Default::default()
        };
        opts.identity = self.gateway_identity.clone();
        let proxy = proxy_host_for(&self.api_url);
        log::debug!("[{uuid} via {proxy}] {command}");
        run_ssh_command_with_output(&opts, &proxy, &gateway_command(uuid, command))
    }

    /// Polls `systemctl is-active` on the device until `unit` reports
    /// `state`. Strict: running out of attempts is an error.
    pub fn wait_for_service_state(&self, unit: &str, state: &str, uuid: &str) -> Result<()> {
        // `systemctl is-active` exits non-zero for every state but
        // "active"; the `|| true` keeps the probe from failing the poll.
        let probe = format!("systemctl is-active {unit} 2>/dev/null || true");
        log::info!("waiting for {unit} to be {state}");
        wait_until_with(
            || {
                Ok(self
                    .execute_command_in_host_os(&probe, uuid)?
                    .trim()
                    .eq(state))
            },
            true,
            PollOptions::default(),
        )?;
        Ok(())
    }

    pub fn device_online(&self, uuid: &str) -> Result<bool> {
        let state: DeviceState = self
            .get(&format!("v1/devices/{uuid}"))?
            .json()
            .context("device state is not valid JSON")?;
        Ok(state.online)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    fn authed(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> Result<reqwest::blocking::Response> {
        self.authed(self.client.get(self.endpoint(path)))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .with_context(|| format!("GET {} failed", path))
    }
}
