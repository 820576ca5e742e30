// Licensed under the Apache-2.0 license

//! Host OS image handling for the HIL suites.
//!
//! Images are plain disk image files. Configuration is injected into the
//! boot partition before flashing; partition extents come from
//! `sfdisk --json` and FAT access goes through mtools, so no image is ever
//! loop-mounted on the test host.

pub mod boot;
pub mod config_json;
pub mod image;
pub mod os_release;
pub mod partition;

pub use config_json::{ConfigJson, OsSection, CONFIG_JSON_PATH};
pub use image::{flasher_payload_path, unwrap_flasher_image, HostOsImage};
pub use os_release::OsRelease;
