// Licensed under the Apache-2.0 license

//! SSH transport to the device under test.
//!
//! Commands run through the system `ssh`/`rsync` binaries so the suite
//! behaves exactly like an operator shell would. Connection failures are
//! retried a bounded number of times; command failures are not.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

/// OpenSSH exit status for "could not connect".
const SSH_CONNECT_FAILURE: i32 = 255;

/// What to do with the child's stdio.
#[derive(Default, PartialEq)]
pub enum Output {
    Silence,
    Capture,
    #[default]
    Inherit,
}

/// Connection parameters for a DUT host OS.
#[derive(Debug, Clone)]
pub struct SshOpts {
    pub user: String,
    pub port: u16,
    pub identity: Option<PathBuf>,
    pub connect_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for SshOpts {
    fn default() -> Self {
        // The host OS exposes its SSH daemon on 22222, root only.
        SshOpts {
            user: "root".to_string(),
            port: 22222,
            identity: None,
            connect_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl SshOpts {
    pub fn with_identity(identity: &Path) -> Self {
        SshOpts {
            identity: Some(identity.to_path_buf()),
            ..Default::default()
        }
    }

    pub fn base_args(&self, host: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(format!("{}@{}", self.user, host));
        args
    }

    /// The `-e` transport argument handed to rsync.
    fn rsync_transport(&self) -> String {
        let mut transport = format!(
            "ssh -p {} -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null -o BatchMode=yes",
            self.port
        );
        if let Some(identity) = &self.identity {
            transport.push_str(&format!(" -i {}", identity.display()));
        }
        transport
    }
}

/// Runs a command on `host` over SSH, retrying connection failures.
pub fn run_ssh_command(
    opts: &SshOpts,
    host: &str,
    command: &str,
    output: Output,
) -> Result<Option<String>> {
    let mut last_connect_err = None;
    for attempt in 1..=opts.connect_attempts.max(1) {
        let mut cmd = Command::new("ssh");
        cmd.args(opts.base_args(host)).arg(command);
        match dispatch(&mut cmd, &output, command)? {
            Dispatch::Done(captured) => return Ok(captured),
            Dispatch::ConnectFailed(err) => {
                log::debug!(
                    "ssh connect to {} failed (attempt {}/{})",
                    host,
                    attempt,
                    opts.connect_attempts
                );
                last_connect_err = Some(err);
                if attempt < opts.connect_attempts {
                    std::thread::sleep(opts.retry_delay);
                }
            }
        }
    }
    bail!(
        "could not connect to '{}' after {} attempts: {}",
        host,
        opts.connect_attempts,
        last_connect_err.unwrap_or_default()
    )
}

/// Runs a command on `host` and returns trimmed stdout.
pub fn run_ssh_command_with_output(opts: &SshOpts, host: &str, command: &str) -> Result<String> {
    match run_ssh_command(opts, host, command, Output::Capture)? {
        Some(output) => Ok(output),
        None => bail!("missing command output for command: '{command}'"),
    }
}

/// Runs a command on the local machine through `sh -c`.
pub fn run_local_command(command: &str, output: Output) -> Result<Option<String>> {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    match dispatch(&mut cmd, &output, command)? {
        Dispatch::Done(captured) => Ok(captured),
        // `sh` exiting 255 is a command failure, not a transport failure.
        Dispatch::ConnectFailed(err) => bail!("command '{command}' failed: {err}"),
    }
}

/// Copies `local` to `dest_dir` on `host` over rsync.
pub fn rsync_to_host(opts: &SshOpts, host: &str, local: &Path, dest_dir: &str) -> Result<()> {
    let dest = format!("{}@{}:{}", opts.user, host, dest_dir);
    let status = Command::new("rsync")
        .args(["-az", "--partial", "-e", &opts.rsync_transport()])
        .arg(local)
        .arg(&dest)
        .status()
        .context("failed to spawn rsync")?;
    if !status.success() {
        bail!("failed rsync of {} to {}", local.display(), dest);
    }
    Ok(())
}

enum Dispatch {
    Done(Option<String>),
    ConnectFailed(String),
}

fn dispatch(cmd: &mut Command, output: &Output, command: &str) -> Result<Dispatch> {
    match output {
        Output::Capture => {
            let out = cmd
                .output()
                .with_context(|| format!("failed to spawn: {command}"))?;
            if out.status.success() {
                let stdout = String::from_utf8_lossy(&out.stdout).trim_end().to_string();
                return Ok(Dispatch::Done(Some(stdout)));
            }
            let stderr = String::from_utf8_lossy(&out.stderr).trim_end().to_string();
            if out.status.code() == Some(SSH_CONNECT_FAILURE) {
                return Ok(Dispatch::ConnectFailed(stderr));
            }
            bail!(
                "command '{}' exited with {}: {}",
                command,
                out.status,
                stderr
            )
        }
        Output::Silence | Output::Inherit => {
            let stdio = || {
                if *output == Output::Silence {
                    Stdio::null()
                } else {
                    Stdio::inherit()
                }
            };
            let status = cmd
                .stdin(Stdio::null())
                .stdout(stdio())
                .stderr(stdio())
                .status()
                .with_context(|| format!("failed to spawn: {command}"))?;
            if status.success() {
                return Ok(Dispatch::Done(None));
            }
            if status.code() == Some(SSH_CONNECT_FAILURE) {
                return Ok(Dispatch::ConnectFailed(String::new()));
            }
            bail!("command '{}' exited with {}", command, status)
        }
    }
}
