// Licensed under the Apache-2.0 license

#[cfg(test)]
mod test {
    use crate::suite::{self, SuiteContext, TEST_LOCK};
    use hil_os::config_json::{
        jq_delete_ssh_keys, jq_read, jq_set_development_mode, jq_set_ssh_keys,
    };
    use hil_worker::ensure_ssh_key;

    /// SSH probe that succeeds iff the host OS accepts our key.
    const PROBE: &str = "printf pass";

    /// Flips `developmentMode` through the cloud gateway and waits for the
    /// config agent to apply it.
    fn set_development_mode(ctx: &SuiteContext, enabled: bool) {
        let uuid = &ctx.config.device_uuid;
        log::info!("waiting for os-config service to settle");
        ctx.cloud
            .wait_for_service_state("os-config.service", "inactive", uuid)
            .expect("os-config service never settled");

        log::info!("setting developmentMode={enabled} in config.json");
        ctx.cloud
            .execute_command_in_host_os(&jq_set_development_mode(enabled), uuid)
            .expect("failed to patch config.json");
        ctx.cloud
            .wait_for_service_state("engine.service", "active", uuid)
            .expect("engine service did not come back");

        let actual = ctx
            .cloud
            .execute_command_in_host_os(&jq_read(".developmentMode"), uuid)
            .expect("failed to read config.json");
        assert_eq!(
            actual,
            enabled.to_string(),
            "device should have applied the requested mode"
        );
    }

    /// Deletes custom keys and confirms the config reflects it.
    fn clear_custom_keys(ctx: &SuiteContext) {
        let uuid = &ctx.config.device_uuid;
        ctx.cloud
            .execute_command_in_host_os(&jq_delete_ssh_keys(), uuid)
            .expect("failed to delete custom keys");
        ctx.cloud
            .wait_for_service_state("vpn.service", "active", uuid)
            .expect("vpn service did not come back");

        let actual = ctx
            .cloud
            .execute_command_in_host_os(&jq_read(".os.sshKeys"), uuid)
            .expect("failed to read config.json");
        assert_eq!(actual, "null", "no custom keys should be present");
    }

    fn install_custom_key(ctx: &SuiteContext, pub_key: &str) {
        let uuid = &ctx.config.device_uuid;
        ctx.cloud
            .execute_command_in_host_os(&jq_set_ssh_keys(pub_key), uuid)
            .expect("failed to install custom key");
        ctx.cloud
            .wait_for_service_state("vpn.service", "active", uuid)
            .expect("vpn service did not come back");
    }

    #[test]
    #[ignore] // needs a provisioned DUT; run through `cargo xtask run`
    fn test_ssh_auth_production_mode() {
        let _lock = TEST_LOCK.lock().unwrap();
        let ctx = suite::context();
        let target = ctx.link.clone();

        set_development_mode(ctx, false);
        clear_custom_keys(ctx);

        assert!(
            ctx.worker.execute_command_in_host_os(PROBE, &target).is_err(),
            "local SSH without custom keys is not allowed in production mode"
        );

        install_custom_key(ctx, &ctx.pub_key);
        assert_eq!(
            ctx.worker
                .execute_command_in_host_os(PROBE, &target)
                .expect("local SSH with custom keys failed"),
            "pass",
            "local SSH with custom keys is allowed in production mode"
        );

        clear_custom_keys(ctx);
    }

    #[test]
    #[ignore] // needs a provisioned DUT; run through `cargo xtask run`
    fn test_ssh_auth_development_mode() {
        let _lock = TEST_LOCK.lock().unwrap();
        let ctx = suite::context();
        let target = ctx.link.clone();

        set_development_mode(ctx, true);
        clear_custom_keys(ctx);

        assert_eq!(
            ctx.worker
                .execute_command_in_host_os(PROBE, &target)
                .expect("local SSH without custom keys failed"),
            "pass",
            "local SSH without custom keys is allowed in development mode"
        );

        // Installing any custom key disables the development-mode default
        // acceptance, so a key we don't hold must lock us out.
        let phony_path = ctx.config.tmpdir.join("phony-id");
        let phony_key =
            ensure_ssh_key(&phony_path, "phony").expect("failed to generate phony key");
        install_custom_key(ctx, &phony_key);
        assert!(
            ctx.worker.execute_command_in_host_os(PROBE, &target).is_err(),
            "local SSH with phony custom keys is not allowed in development mode"
        );

        install_custom_key(ctx, &ctx.pub_key);
        assert_eq!(
            ctx.worker
                .execute_command_in_host_os(PROBE, &target)
                .expect("local SSH with custom keys failed"),
            "pass",
            "local SSH with custom keys is allowed in development mode"
        );

        clear_custom_keys(ctx);
    }
}
