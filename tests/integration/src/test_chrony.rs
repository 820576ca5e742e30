// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::suite::{self, TEST_LOCK};
    use hil_testing_common::wait_until;

    #[test]
    #[ignore] // needs a provisioned DUT; run through `cargo xtask run`
    fn test_chronyd_service_running() {
        let _lock = TEST_LOCK.lock().unwrap();
        let ctx = suite::context();
        let target = ctx.link.clone();

        log::info!("checking for chronyd service");
        // Settle rather than fail here; the status check below gives the
        // real verdict with a useful message.
        wait_until(
            || {
                Ok(ctx
                    .worker
                    .execute_command_in_host_os(
                        "systemctl is-active chronyd.service 2>/dev/null || true",
                        &target,
                    )?
                    .trim()
                    == "active")
            },
            false,
        )
        .expect("probe failed");

        let result = ctx
            .worker
            .execute_command_in_host_os("systemctl status chronyd | grep running || true", &target)
            .expect("failed to query chronyd status");
        assert!(!result.is_empty(), "chronyd service should be running");
    }

    #[test]
    #[ignore] // needs a provisioned DUT; run through `cargo xtask run`
    fn test_clock_synchronized() {
        let _lock = TEST_LOCK.lock().unwrap();
        let ctx = suite::context();
        let target = ctx.link.clone();

        wait_until(
            || {
                log::info!("checking system clock synchronized");
                Ok(ctx
                    .worker
                    .execute_command_in_host_os("timedatectl | grep 'System clock'", &target)?
                    .trim()
                    == "System clock synchronized: yes")
            },
            true,
        )
        .expect("system clock never synchronized");

        let result = ctx
            .worker
            .execute_command_in_host_os("timedatectl | grep 'System clock'", &target)
            .expect("failed to query timedatectl");
        assert_eq!(
            result.trim(),
            "System clock synchronized: yes",
            "system clock should be synchronized"
        );
    }

    #[test]
    #[ignore] // needs a provisioned DUT; run through `cargo xtask run`
    fn test_chrony_source_selected() {
        let _lock = TEST_LOCK.lock().unwrap();
        let ctx = suite::context();
        let target = ctx.link.clone();

        let result = ctx
            .worker
            .execute_command_in_host_os("chronyc sources -n | grep -F '^*' || true", &target)
            .expect("failed to query chrony sources");
        assert!(
            !result.is_empty(),
            "should see ^* next to a chrony source"
        );
    }
}
