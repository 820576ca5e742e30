// Licensed under the Apache-2.0 license

//! Boot partition access.
//!
//! The boot partition is FAT; files are read and written with mtools
//! against the partition's byte offset inside the image, so nothing needs
//! to be mounted.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Device types whose boot behavior is driven by a `config.txt` in the
/// boot partition.
const BOOT_CONFIG_DEVICE_TYPES: &[&str] = &[
    "fincm3",
    "rt-rpi-300",
    "243390-rpi3",
    "nebra-hnt",
    "revpi-connect",
    "revpi-core-3",
];

pub fn supports_boot_config(device_type: &str) -> bool {
    BOOT_CONFIG_DEVICE_TYPES.contains(&device_type) || device_type.starts_with("raspberry")
}

fn fat_target(image: &Path, byte_offset: u64) -> String {
    format!("{}@@{}", image.display(), byte_offset)
}

/// Reads `name` from the FAT partition at `byte_offset`, or `None` if the
/// file does not exist.
pub fn read_boot_file(image: &Path, byte_offset: u64, name: &str) -> Result<Option<String>> {
    let output = Command::new("mtype")
        .args(["-i", &fat_target(image, byte_offset), &format!("::{name}")])
        .output()
        .context("failed to spawn mtype")?;
    if !output.status.success() {
        // mtype only fails here when the file is absent.
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}

/// Writes `contents` as `name` into the FAT partition at `byte_offset`,
/// replacing any existing file.
pub fn write_boot_file(image: &Path, byte_offset: u64, name: &str, contents: &str) -> Result<()> {
    let mut child = Command::new("mcopy")
        .args([
            "-o",
            "-i",
            &fat_target(image, byte_offset),
            "-",
            &format!("::{name}"),
        ])
        .stdin(Stdio::piped())
        .spawn()
        .context("failed to spawn mcopy")?;
    child
        .stdin
        .take()
        .context("mcopy stdin not captured")?
        .write_all(contents.as_bytes())?;
    let status = child.wait()?;
    if !status.success() {
        bail!("mcopy of {} into {} failed", name, image.display());
    }
    Ok(())
}

/// Drops every `key=` line and appends `key=value`.
pub fn set_boot_config_value(contents: &str, key: &str, value: &str) -> String {
    let prefix = format!("{key}=");
    let kept: Vec<&str> = contents
        .lines()
        .filter(|line| !line.trim_start().starts_with(&prefix))
        .collect();
    format!("{}\n\n{}={}\n", kept.join("\n"), key, value)
}

/// Turns the serial console on in `config.txt`, if the image carries one.
pub fn enable_serial_console(image: &Path, byte_offset: u64) -> Result<bool> {
    let Some(config) = read_boot_file(image, byte_offset, "config.txt")? else {
        return Ok(false);
    };
    log::info!("setting enable_uart=1 in config.txt");
    let patched = set_boot_config_value(&config, "enable_uart", "1");
    write_boot_file(image, byte_offset, "config.txt", &patched)?;
    Ok(true)
}
