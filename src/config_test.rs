use super::*;
use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Safety
/// Callers hold `env_lock()` so no other test touches the env concurrently.
unsafe fn clear_sync_env() {
    unsafe {
        std::env::remove_var("CHATSYNC_PROJECT_ID");
        std::env::remove_var("CHATSYNC_API_BASE_URL");
        std::env::remove_var("CHATSYNC_API_TOKEN");
        std::env::remove_var("CHATSYNC_USER_ID");
        std::env::remove_var("CHATSYNC_GUEST_USER_ID");
        std::env::remove_var("CHATSYNC_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("CHATSYNC_CONNECT_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_applies_defaults() {
    let _guard = env_lock();
    unsafe {
        clear_sync_env();
        std::env::set_var("CHATSYNC_PROJECT_ID", "7");
    }

    let cfg = SyncConfig::from_env().unwrap();
    assert_eq!(cfg.project_id, "7");
    assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(cfg.api_token, None);
    assert_eq!(cfg.user_id, None);
    assert_eq!(cfg.guest_user_id, None);
    assert_eq!(
        cfg.timeouts,
        SyncTimeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );

    unsafe { clear_sync_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = env_lock();
    unsafe {
        clear_sync_env();
        std::env::set_var("CHATSYNC_PROJECT_ID", "7");
        std::env::set_var("CHATSYNC_API_BASE_URL", "https://example.test/api/");
        std::env::set_var("CHATSYNC_API_TOKEN", "tok");
        std::env::set_var("CHATSYNC_USER_ID", "12");
        std::env::set_var("CHATSYNC_GUEST_USER_ID", "3");
        std::env::set_var("CHATSYNC_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("CHATSYNC_CONNECT_TIMEOUT_SECS", "7");
    }

    let cfg = SyncConfig::from_env().unwrap();
    assert_eq!(cfg.api_base_url, "https://example.test/api");
    assert_eq!(cfg.api_token.as_deref(), Some("tok"));
    assert_eq!(cfg.user_id, Some(12));
    assert_eq!(cfg.guest_user_id, Some(3));
    assert_eq!(cfg.timeouts, SyncTimeouts { request_secs: 42, connect_secs: 7 });

    unsafe { clear_sync_env() };
}

#[test]
fn from_env_requires_project_id() {
    let _guard = env_lock();
    unsafe { clear_sync_env() };

    let err = SyncConfig::from_env().unwrap_err();
    assert!(matches!(err, SyncError::MissingConfig { ref var } if var == "CHATSYNC_PROJECT_ID"));
}

#[test]
fn from_env_rejects_non_integer_user_id() {
    let _guard = env_lock();
    unsafe {
        clear_sync_env();
        std::env::set_var("CHATSYNC_PROJECT_ID", "7");
        std::env::set_var("CHATSYNC_USER_ID", "abc");
    }

    let err = SyncConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("CHATSYNC_USER_ID"));

    unsafe { clear_sync_env() };
}

#[test]
fn from_env_bad_timeout_falls_back_to_default() {
    let _guard = env_lock();
    unsafe {
        clear_sync_env();
        std::env::set_var("CHATSYNC_PROJECT_ID", "7");
        std::env::set_var("CHATSYNC_REQUEST_TIMEOUT_SECS", "soon");
    }

    let cfg = SyncConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_REQUEST_TIMEOUT_SECS);

    unsafe { clear_sync_env() };
}

#[test]
fn parse_user_id_treats_blank_as_absent() {
    assert_eq!(parse_user_id("K", Some("  ")).unwrap(), None);
    assert_eq!(parse_user_id("K", None).unwrap(), None);
    assert_eq!(parse_user_id("K", Some(" 5 ")).unwrap(), Some(5));
}
