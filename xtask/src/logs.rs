// Licensed under the Apache-2.0 license

use anyhow::Result;
use hil_testing_common::{Archiver, SuiteConfig};
use hil_worker::{Worker, JOURNAL_DUMP_COMMAND};
use std::path::{Path, PathBuf};

/// Pulls the journal off the DUT and bundles everything the archiver has
/// collected so far.
pub fn archive_logs(config_path: &Path, output: Option<&Path>) -> Result<()> {
    let config = SuiteConfig::from_file(config_path)?;
    let worker = Worker::new(&config.device_type, &config.worker_url, &config.ssh_key_path)?;
    let archiver = Archiver::new(config.tmpdir.join("artifacts"))?;

    worker.archive_logs(
        &config.suite_id,
        &config.link(),
        "journal.log",
        JOURNAL_DUMP_COMMAND,
        &archiver,
    )?;

    let output = output.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(format!(
            "artifacts-{}.zip",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ))
    });
    archiver.archive(&output)?;
    log::info!("wrote {}", output.display());
    Ok(())
}
