// Licensed under the Apache-2.0 license

use anyhow::{bail, Result};
use hil_testing_common::ssh::{run_local_command, Output};

/// Check that the test host has all the tools the suite flows depend on.
pub fn check_host_dependencies() -> Result<()> {
    let tools = [
        ("ssh", "'ssh' not found on PATH. Please install an OpenSSH client."),
        (
            "ssh-keygen",
            "'ssh-keygen' not found on PATH. Please install an OpenSSH client.",
        ),
        ("rsync", "'rsync' not found on PATH. Please install rsync."),
        (
            "sfdisk",
            "'sfdisk' not found on PATH. Please install util-linux.",
        ),
        ("mcopy", "'mcopy' not found on PATH. Please install mtools."),
        ("mtype", "'mtype' not found on PATH. Please install mtools."),
        (
            "debugfs",
            "'debugfs' not found on PATH. Please install e2fsprogs.",
        ),
    ];
    for (tool, error_msg) in tools {
        if run_local_command(&format!("command -v {tool}"), Output::Silence).is_err() {
            bail!(error_msg.to_string());
        }
    }
    log::info!("all host dependencies present");
    Ok(())
}
