// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial(env)]
fn resolve_env_prefers_cli_flag_over_variable() {
    std::env::set_var("APP_ENV", "staging");
    let resolved = resolve_env(Some("production")).unwrap();
    assert_eq!(resolved, EnvName::Production);
    std::env::remove_var("APP_ENV");
}

#[test]
#[serial(env)]
fn resolve_env_falls_back_to_variable_then_default() {
    std::env::remove_var("APP_ENV");
    assert_eq!(resolve_env(None).unwrap(), EnvName::Development);

    std::env::set_var("APP_ENV", "staging");
    assert_eq!(resolve_env(None).unwrap(), EnvName::Staging);
    std::env::remove_var("APP_ENV");
}

#[test]
#[serial(env)]
fn resolve_env_rejects_invalid_variable_value() {
    std::env::set_var("APP_ENV", "nope");
    assert!(resolve_env(None).is_err());
    std::env::remove_var("APP_ENV");
}

#[test]
#[serial(env)]
fn ipc_timeout_uses_override_when_set() {
    std::env::set_var("ASSISTANTD_IPC_TIMEOUT_MS", "250");
    assert_eq!(ipc_timeout(), Duration::from_millis(250));
    std::env::remove_var("ASSISTANTD_IPC_TIMEOUT_MS");
}

#[test]
#[serial(env)]
fn ipc_timeout_default_is_ten_seconds() {
    std::env::remove_var("ASSISTANTD_IPC_TIMEOUT_MS");
    assert_eq!(ipc_timeout(), Duration::from_secs(10));
}

#[test]
#[serial(env)]
fn state_root_prefers_explicit_override() {
    std::env::set_var("ASSISTANTD_STATE_DIR", "/tmp/assistantd-test-state");
    assert_eq!(state_root().unwrap(), PathBuf::from("/tmp/assistantd-test-state"));
    std::env::remove_var("ASSISTANTD_STATE_DIR");
}

#[test]
fn max_restarts_default_is_five() {
    std::env::remove_var("ASSISTANTD_MAX_RESTARTS");
    assert_eq!(max_restarts(), 5);
}

#[test]
#[serial(env)]
fn route_deadline_uses_override_when_set() {
    std::env::set_var("ASSISTANTD_ROUTE_DEADLINE_MS", "750");
    assert_eq!(route_deadline(), Duration::from_millis(750));
    std::env::remove_var("ASSISTANTD_ROUTE_DEADLINE_MS");
}

#[test]
#[serial(env)]
fn route_deadline_default_is_ten_seconds() {
    std::env::remove_var("ASSISTANTD_ROUTE_DEADLINE_MS");
    assert_eq!(route_deadline(), Duration::from_secs(10));
}
