// Licensed under the Apache-2.0 license

//! Partition table inspection via `sfdisk --json`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Deserialize)]
struct SfdiskReport {
    partitiontable: RawTable,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(default = "default_sector_size")]
    sectorsize: u64,
    #[serde(default)]
    partitions: Vec<PartitionEntry>,
}

fn default_sector_size() -> u64 {
    512
}

/// One partition, in sectors as sfdisk reports it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PartitionEntry {
    pub node: String,
    pub start: u64,
    pub size: u64,
    #[serde(rename = "type")]
    pub part_type: String,
}

#[derive(Debug, Clone)]
pub struct PartitionTable {
    pub sector_size: u64,
    pub partitions: Vec<PartitionEntry>,
}

impl PartitionTable {
    /// Reads the partition table of a disk image file.
    pub fn read(image: &Path) -> Result<Self> {
        let output = Command::new("sfdisk")
            .arg("--json")
            .arg(image)
            .output()
            .context("failed to spawn sfdisk")?;
        if !output.status.success() {
            bail!(
                "sfdisk --json {} failed: {}",
                image.display(),
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }

    pub fn parse(json: &str) -> Result<Self> {
        let report: SfdiskReport =
            serde_json::from_str(json).context("unexpected sfdisk output")?;
        Ok(PartitionTable {
            sector_size: report.partitiontable.sectorsize,
            partitions: report.partitiontable.partitions,
        })
    }

    /// Returns partition `number` (1-based, as in device node naming).
    pub fn nth(&self, number: usize) -> Result<&PartitionEntry> {
        if number == 0 {
            bail!("partition numbers start at 1");
        }
        self.partitions
            .get(number - 1)
            .with_context(|| format!("image has no partition {number}"))
    }

    pub fn byte_offset(&self, entry: &PartitionEntry) -> u64 {
        entry.start * self.sector_size
    }

    pub fn byte_len(&self, entry: &PartitionEntry) -> u64 {
        entry.size * self.sector_size
    }
}
