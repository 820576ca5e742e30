// Licensed under the Apache-2.0 license

//! Background SSH port forwards to the DUT.

use anyhow::{Context, Result};
use hil_testing_common::ssh::SshOpts;
use std::process::{Child, Command, Stdio};

/// Host OS SSH and the device supervisor API.
pub const DEFAULT_FORWARDS: &[(u16, u16)] = &[(22222, 22222), (48484, 48484)];

/// A set of `ssh -N -L` children. Closed explicitly by teardown, or on
/// drop as a backstop.
pub struct SshTunnels {
    children: Vec<(u16, Child)>,
}

fn tunnel_args(opts: &SshOpts, host: &str, local: u16, remote: u16) -> Vec<String> {
    let mut args = vec![
        "-N".to_string(),
        "-L".to_string(),
        format!("{local}:localhost:{remote}"),
    ];
    args.extend(opts.base_args(host));
    args
}

impl SshTunnels {
    pub fn open(opts: &SshOpts, host: &str, forwards: &[(u16, u16)]) -> Result<Self> {
        let mut children = Vec::new();
        for &(local, remote) in forwards {
            log::info!("tunnel {local} -> {host}:{remote}");
            let child = Command::new("ssh")
                .args(tunnel_args(opts, host, local, remote))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .with_context(|| format!("failed to open tunnel {local} -> {remote}"))?;
            children.push((local, child));
        }
        Ok(SshTunnels { children })
    }

    pub fn close(&mut self) {
        for (port, mut child) in self.children.drain(..) {
            if let Err(err) = child.kill() {
                log::warn!("failed to close tunnel on port {port}: {err}");
            }
            let _ = child.wait();
        }
    }
}

impl Drop for SshTunnels {
    fn drop(&mut self) {
        self.close();
    }
}
