// Licensed under the Apache-2.0 license

use anyhow::{bail, Context, Result};
use hil_cloud::CloudClient;
use hil_testing_common::SuiteConfig;
use std::path::Path;
use std::process::Command;

/// Runs the ignored HIL tests with the suite configuration exported into
/// their environment. DUT access is serialized, so the harness runs on a
/// single thread.
pub fn run_suite(config_path: &Path, filter: Option<&str>) -> Result<()> {
    crate::deps::check_host_dependencies()?;
    let config = SuiteConfig::from_file(config_path)?;
    log::info!(
        "running suite {} against {}",
        config.suite_id,
        config.link()
    );

    let mut cmd = Command::new("cargo");
    cmd.args(["test", "--release", "-p", "tests-integration", "--"])
        .args(["--ignored", "--test-threads=1"]);
    if let Some(filter) = filter {
        cmd.arg(filter);
    }
    for (key, value) in config.to_env() {
        cmd.env(key, value);
    }
    // Run the suites, then clean up cloud state no matter how they went.
    let status = cmd.status().context("failed to spawn cargo test")?;

    if !config.api_token.is_empty() {
        if let Err(err) = remove_suite_key(&config) {
            log::warn!("cloud key cleanup failed: {err:?}");
        }
    }
    if let Err(err) = release_worker(&config) {
        log::warn!("worker teardown failed: {err:?}");
    }

    if !status.success() {
        bail!("suite run failed");
    }
    Ok(())
}

fn remove_suite_key(config: &SuiteConfig) -> Result<()> {
    let mut cloud = CloudClient::new(&config.api_url)?;
    cloud.login_with_token(&config.api_token)?;
    cloud.remove_ssh_key(&config.suite_id)
}

fn release_worker(config: &SuiteConfig) -> Result<()> {
    hil_worker::Worker::new(&config.device_type, &config.worker_url, &config.ssh_key_path)?
        .teardown()
}
