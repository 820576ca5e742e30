// Licensed under the Apache-2.0 license

//! Whole-image operations: provisioning and flasher unwrapping.

use crate::boot;
use crate::config_json::ConfigJson;
use crate::partition::PartitionTable;
use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Command;

/// The boot partition is the first partition on every supported device
/// type; the rootfs (which carries the embedded image on flasher types)
/// is the second.
const BOOT_PARTITION: usize = 1;
const ROOTFS_PARTITION: usize = 2;

/// A host OS image staged for flashing.
pub struct HostOsImage {
    pub device_type: String,
    pub path: PathBuf,
    pub config: ConfigJson,
}

impl HostOsImage {
    pub fn new(device_type: &str, path: &Path, config: ConfigJson) -> Self {
        HostOsImage {
            device_type: device_type.to_string(),
            path: path.to_path_buf(),
            config,
        }
    }

    /// Injects `config.json` (and the serial console setting where the
    /// device type honors boot config) into the boot partition.
    pub fn configure(&self) -> Result<()> {
        let table = PartitionTable::read(&self.path)?;
        let offset = table.byte_offset(table.nth(BOOT_PARTITION)?);
        log::info!(
            "writing config.json into {} at offset {}",
            self.path.display(),
            offset
        );
        boot::write_boot_file(&self.path, offset, "config.json", &self.config.to_json()?)?;
        if boot::supports_boot_config(&self.device_type)
            && !boot::enable_serial_console(&self.path, offset)?
        {
            log::warn!("{}: no config.txt in boot partition", self.device_type);
        }
        Ok(())
    }
}

/// Where a flasher image keeps the raw OS image it writes to internal
/// storage.
pub fn flasher_payload_path(device_type: &str) -> String {
    format!("/opt/hostos-image-{device_type}.img")
}

/// Extracts the raw OS image embedded in a flasher image's rootfs.
///
/// Internal-storage device types driven by a qemu worker cannot boot the
/// flasher wrapper, so the suite flashes the payload directly.
pub fn unwrap_flasher_image(image: &Path, payload: &str, dest: &Path) -> Result<PathBuf> {
    let table = PartitionTable::read(image)?;
    let rootfs = table.nth(ROOTFS_PARTITION)?;
    let offset = table.byte_offset(rootfs);
    let len = table.byte_len(rootfs);

    // debugfs wants a filesystem image, so carve the rootfs extent out
    // into its own file first.
    let rootfs_file = tempfile::NamedTempFile::new().context("failed to create rootfs scratch")?;
    extract_extent(image, offset, len, rootfs_file.path())?;

    log::info!("unwrapping {} from flasher image", payload);
    let status = Command::new("debugfs")
        .arg("-R")
        .arg(format!("dump {} {}", payload, dest.display()))
        .arg(rootfs_file.path())
        .status()
        .context("failed to spawn debugfs")?;
    if !status.success() {
        bail!("debugfs dump of {} failed", payload);
    }
    let unwrapped = dest
        .metadata()
        .with_context(|| format!("flasher image has no {payload}"))?;
    if unwrapped.len() == 0 {
        bail!("flasher image has no {payload}");
    }
    Ok(dest.to_path_buf())
}

/// Copies `len` bytes starting at `offset` out of `image` into `dest`.
fn extract_extent(image: &Path, offset: u64, len: u64, dest: &Path) -> Result<()> {
    let mut source = File::open(image)
        .with_context(|| format!("failed to open image {}", image.display()))?;
    source.seek(SeekFrom::Start(offset))?;
    let mut dest_file = File::create(dest)?;
    let copied = io::copy(&mut source.take(len), &mut dest_file)?;
    if copied != len {
        bail!(
            "image truncated: expected {} bytes at offset {}, got {}",
            len,
            offset,
            copied
        );
    }
    Ok(())
}
