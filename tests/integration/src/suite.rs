// Licensed under the Apache-2.0 license

//! Shared suite state.
//!
//! The context is built once per test binary. Cloud-side cleanup (the
//! registered SSH key) is handled by the runner after the test run, since
//! the test harness has no end-of-suite hook.

use anyhow::{Context, Result};
use hil_cloud::CloudClient;
use hil_testing_common::{Archiver, SuiteConfig};
use hil_worker::Worker;
use std::sync::{LazyLock, Mutex};

pub struct SuiteContext {
    pub config: SuiteConfig,
    pub worker: Worker,
    pub cloud: CloudClient,
    pub archiver: Archiver,
    /// The suite public key, baked into images and registered with both
    /// worker and cloud.
    pub pub_key: String,
    /// The DUT's mDNS name on the local network.
    pub link: String,
}

static SUITE: LazyLock<SuiteContext> = LazyLock::new(|| {
    init().expect("suite setup failed; configure the run through `cargo xtask run`")
});

/// One DUT, one test at a time.
pub static TEST_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub fn context() -> &'static SuiteContext {
    &SUITE
}

fn init() -> Result<SuiteContext> {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init();

    let config = SuiteConfig::from_env()?;
    std::fs::create_dir_all(&config.tmpdir).context("failed to create suite tmpdir")?;

    let worker = Worker::new(&config.device_type, &config.worker_url, &config.ssh_key_path)?;
    let pub_key = worker.add_ssh_key(&config.suite_id)?;
    worker.network(&config.network)?;

    let mut cloud = CloudClient::new(&config.api_url)?;
    cloud.set_gateway_identity(&config.ssh_key_path);
    if !config.api_token.is_empty() {
        cloud.login_with_token(&config.api_token)?;
        cloud.create_ssh_key(&config.suite_id, &pub_key)?;
    }

    let archiver = Archiver::new(config.tmpdir.join("artifacts"))?;
    let link = config.link();
    log::info!("suite {} targeting {}", config.suite_id, link);

    Ok(SuiteContext {
        worker,
        cloud,
        archiver,
        pub_key,
        link,
        config,
    })
}

/// Strict poll on a systemd unit state over the local link; used where the
/// cloud gateway is not involved.
pub fn wait_for_local_service_state(
    ctx: &SuiteContext,
    unit: &str,
    state: &str,
    target: &str,
) -> Result<()> {
    let probe = format!("systemctl is-active {unit} 2>/dev/null || true");
    hil_testing_common::wait_until(
        || {
            Ok(ctx
                .worker
                .execute_command_in_host_os(&probe, target)?
                .trim()
                .eq(state))
        },
        true,
    )?;
    Ok(())
}
