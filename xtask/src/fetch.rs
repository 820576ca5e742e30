// Licensed under the Apache-2.0 license

use anyhow::Result;
use hil_cloud::CloudClient;
use hil_testing_common::SuiteConfig;
use std::path::Path;

pub fn fetch_os(config_path: &Path, version: Option<&str>, dest: Option<&Path>) -> Result<()> {
    let config = SuiteConfig::from_file(config_path)?;
    let mut cloud = CloudClient::new(&config.api_url)?;
    if !config.api_token.is_empty() {
        cloud.login_with_token(&config.api_token)?;
    }
    let version = version.unwrap_or(&config.base_os_version);
    let default_dest = config.tmpdir.join("images");
    let dest = dest.unwrap_or(&default_dest);
    let path = cloud.fetch_os(version, &config.device_type, dest)?;
    log::info!("downloaded {}", path.display());
    Ok(())
}
