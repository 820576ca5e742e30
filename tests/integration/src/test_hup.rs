// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::hup::{self, HupMode};
    use crate::suite::{self, wait_for_local_service_state, TEST_LOCK};
    use hil_os::{flasher_payload_path, unwrap_flasher_image, OsRelease};
    use hil_testing_common::{wait_until, Teardown};
    use std::path::PathBuf;

    /// Downloads an OS version, unwrapping the flasher wrapper when the
    /// worker is qemu-backed and the image carries an embedded payload.
    fn fetch_image(version: &str) -> PathBuf {
        let ctx = suite::context();
        let cache = ctx.config.tmpdir.join("images");
        let image = ctx
            .cloud
            .fetch_os(version, &ctx.config.device_type, &cache)
            .expect("OS download failed");

        let contract = ctx
            .worker
            .capture_contract()
            .expect("worker contract unavailable");
        if !contract.is_qemu() {
            return image;
        }
        let unwrapped = cache.join(format!("unwrapped-{version}.img"));
        match unwrap_flasher_image(
            &image,
            &flasher_payload_path(&ctx.config.device_type),
            &unwrapped,
        ) {
            Ok(path) => {
                log::info!("unwrapped flasher image for qemu worker");
                path
            }
            // Not a flasher image; boot it as-is.
            Err(_) => image,
        }
    }

    /// Full HUP smoke run: flash the base version, update to the target
    /// version, reboot, and verify the device reports the new version.
    #[test]
    #[ignore] // needs a provisioned DUT; run through `cargo xtask run`
    fn test_hup_local_smoke() {
        let _lock = TEST_LOCK.lock().unwrap();
        let ctx = suite::context();
        let mut teardown = Teardown::new();
        let target = ctx.link.clone();

        let base = fetch_image(&ctx.config.base_os_version);
        hup::init_dut(ctx, &mut teardown, &base).expect("failed to initialize DUT");

        hup::check_under_voltage(ctx, &target).expect("under-voltage check failed");

        let hostapp = fetch_image(&ctx.config.target_os_version);
        hup::do_hup(ctx, "hup-smoke", HupMode::Local, &hostapp, &target)
            .expect("host update failed");

        ctx.worker.reboot(&target).expect("reboot failed");
        wait_until(|| Ok(ctx.worker.is_reachable(&target)), true)
            .expect("DUT did not come back after the update");

        let os_release = ctx
            .worker
            .execute_command_in_host_os("cat /etc/os-release", &target)
            .expect("failed to read os-release");
        let running = OsRelease::parse(&os_release)
            .semver()
            .expect("device reports no parseable version");
        let expected = semver::Version::parse(
            ctx.config.target_os_version.trim_start_matches('v'),
        )
        .expect("target_os_version is not semver");
        assert_eq!(
            running.cmp_precedence(&expected),
            std::cmp::Ordering::Equal,
            "device should be running the HUP target version"
        );

        wait_for_local_service_state(ctx, "engine.service", "active", &target)
            .expect("engine service did not come back after the update");

        teardown.run();
    }

    /// An update pointed at an image path that does not exist on the
    /// device must fail before touching the partitions.
    #[test]
    #[ignore] // needs a provisioned DUT; run through `cargo xtask run`
    fn test_hup_missing_image_is_rejected() {
        let _lock = TEST_LOCK.lock().unwrap();
        let ctx = suite::context();
        let mut teardown = Teardown::new();
        let target = ctx.link.clone();

        let base = fetch_image(&ctx.config.base_os_version);
        hup::init_dut(ctx, &mut teardown, &base).expect("failed to initialize DUT");

        let bogus = ctx.config.tmpdir.join("does-not-exist.img");
        let result = hup::do_hup(ctx, "hup-missing", HupMode::Local, &bogus, &target);
        assert!(result.is_err(), "HUP with a missing image must fail");

        teardown.run();
    }
}
