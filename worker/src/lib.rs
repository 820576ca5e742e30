// Licensed under the Apache-2.0 license

//! DUT control for the HIL suites.
//!
//! A [`Worker`] pairs two transports: the worker service HTTP API for
//! anything that touches the device from the outside (power, flashing,
//! network), and direct SSH into the host OS for everything that runs on
//! the device itself.

mod tunnel;

pub use tunnel::SshTunnels;

use anyhow::{bail, Context, Result};
use hil_testing_common::ssh::{
    self, run_ssh_command_with_output, rsync_to_host, SshOpts,
};
use hil_testing_common::Archiver;
use serde::Deserialize;
use serde_json::Map;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::Duration;

/// Dumps the journal of every recorded boot; failed boots must not abort
/// the capture.
pub const JOURNAL_DUMP_COMMAND: &str = "journalctl --no-pager --no-hostname --list-boots | \
     awk '{print $1}' | \
     xargs -I{} sh -c 'journalctl --no-pager --no-hostname -a -b {} || true'";

/// Reachability probe for a freshly flashed DUT.
const REACHABLE_PROBE: &str = "[[ -f /etc/hostname ]] && echo pass || echo fail";

/// What a worker reports about itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerContract {
    pub worker_type: String,
    #[serde(flatten)]
    pub extra: Map<String, serde_json::Value>,
}

impl WorkerContract {
    /// Internal-storage devices behind a qemu worker boot the unwrapped
    /// image, not the flasher wrapper.
    pub fn is_qemu(&self) -> bool {
        self.worker_type == "qemu"
    }
}

/// Handle on one worker and the DUT behind it.
pub struct Worker {
    device_type: String,
    url: String,
    ssh: SshOpts,
    client: reqwest::blocking::Client,
    tunnels: Mutex<Option<SshTunnels>>,
}

impl Worker {
    pub fn new(device_type: &str, worker_url: &str, ssh_key_path: &Path) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build worker client")?;
        Ok(Worker {
            device_type: device_type.to_string(),
            url: worker_url.trim_end_matches('/').to_string(),
            ssh: SshOpts::with_identity(ssh_key_path),
            client,
            tunnels: Mutex::new(None),
        })
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    /// Runs a shell command on the DUT host OS and returns trimmed stdout.
    pub fn execute_command_in_host_os(&self, command: &str, target: &str) -> Result<String> {
        log::debug!("[{target}] {command}");
        run_ssh_command_with_output(&self.ssh, target, command)
    }

    /// Whether the DUT answers SSH probes yet. Connection failures while
    /// the device is still booting count as "not yet", not as errors.
    pub fn is_reachable(&self, target: &str) -> bool {
        matches!(
            run_ssh_command_with_output(&self.ssh, target, REACHABLE_PROBE).as_deref(),
            Ok("pass")
        )
    }

    /// Copies a local file into `dest_dir` on the DUT.
    pub fn send_file(&self, local: &Path, dest_dir: &str, target: &str) -> Result<()> {
        log::info!("sending {} to {target}:{dest_dir}", local.display());
        rsync_to_host(&self.ssh, target, local, dest_dir)
    }

    /// Streams an OS image to the worker for flashing.
    pub fn flash(&self, image: &Path) -> Result<()> {
        log::info!("flashing {}", image.display());
        let file = File::open(image)
            .with_context(|| format!("failed to open image {}", image.display()))?;
        self.client
            .post(format!("{}/dut/flash", self.url))
            // Flashing a large image takes as long as it takes.
            .timeout(Duration::from_secs(1800))
            .body(reqwest::blocking::Body::new(file))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .context("worker flash request failed")?;
        Ok(())
    }

    pub fn on(&self) -> Result<()> {
        self.post_empty("dut/on")
    }

    pub fn off(&self) -> Result<()> {
        self.post_empty("dut/off")
    }

    /// Pushes the suite network definition to the worker.
    pub fn network(&self, network: &hil_testing_common::NetworkConfig) -> Result<()> {
        self.client
            .post(format!("{}/dut/network", self.url))
            .json(network)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .context("worker network request failed")?;
        Ok(())
    }

    pub fn capture_contract(&self) -> Result<WorkerContract> {
        self.client
            .get(format!("{}/contract", self.url))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .context("worker contract request failed")?
            .json()
            .context("worker contract is not valid JSON")
    }

    /// Makes sure the suite keypair exists and registers the public key
    /// with the worker so it can reach the DUT too.
    pub fn add_ssh_key(&self, label: &str) -> Result<String> {
        let key_path = self
            .ssh
            .identity
            .clone()
            .context("worker has no SSH identity configured")?;
        let pub_key = ensure_ssh_key(&key_path, label)?;
        self.client
            .post(format!("{}/ssh/add-key", self.url))
            .json(&serde_json::json!({ "key": pub_key }))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .context("worker add-key request failed")?;
        Ok(pub_key)
    }

    /// Opens the standard port forwards to the DUT, replacing any forwards
    /// left over from before a reflash.
    pub fn create_ssh_tunnels(&self, target: &str) -> Result<()> {
        let mut guard = self.tunnels.lock().expect("tunnel lock poisoned");
        if let Some(mut stale) = guard.take() {
            stale.close();
        }
        *guard = Some(SshTunnels::open(&self.ssh, target, tunnel::DEFAULT_FORWARDS)?);
        Ok(())
    }

    /// Captures command output from the DUT into the archive.
    pub fn archive_logs(
        &self,
        id: &str,
        target: &str,
        name: &str,
        command: &str,
        archiver: &Archiver,
    ) -> Result<()> {
        let output = self.execute_command_in_host_os(command, target)?;
        archiver.add_bytes(id, name, output.as_bytes())?;
        Ok(())
    }

    /// Reboots the DUT. The SSH session is expected to drop, so the
    /// command is detached and its exit status ignored.
    pub fn reboot(&self, target: &str) -> Result<()> {
        log::info!("rebooting {target}");
        let _ = ssh::run_ssh_command(
            &self.ssh,
            target,
            "nohup sh -c 'sleep 2 && reboot' >/dev/null 2>&1 &",
            ssh::Output::Silence,
        );
        Ok(())
    }

    /// Releases the DUT: closes tunnels and tells the worker the run is
    /// over.
    pub fn teardown(&self) -> Result<()> {
        if let Some(mut tunnels) = self.tunnels.lock().expect("tunnel lock poisoned").take() {
            tunnels.close();
        }
        self.post_empty("teardown")
    }

    fn post_empty(&self, endpoint: &str) -> Result<()> {
        self.client
            .post(format!("{}/{}", self.url, endpoint))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .with_context(|| format!("worker {endpoint} request failed"))?;
        Ok(())
    }
}

/// Generates an ed25519 keypair at `path` unless one already exists, and
/// returns the public key.
pub fn ensure_ssh_key(path: &PathBuf, label: &str) -> Result<String> {
    if !path.exists() {
        let status = Command::new("ssh-keygen")
            .args(["-t", "ed25519", "-N", "", "-C", label, "-f"])
            .arg(path)
            .status()
            .context("failed to spawn ssh-keygen")?;
        if !status.success() {
            bail!("ssh-keygen failed for {}", path.display());
        }
    }
    let pub_path = path.with_extension("pub");
    let pub_key = std::fs::read_to_string(&pub_path)
        .with_context(|| format!("failed to read {}", pub_path.display()))?;
    Ok(pub_key.trim().to_string())
}
