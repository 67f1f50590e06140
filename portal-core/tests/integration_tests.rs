//! Integration tests for portal-core infrastructure

use portal_core::{
    init_logging, BackendConfig, LogFormat, LoggingConfig, PortalConfig, PortalError, Role,
};

#[test]
fn test_invalid_config_error_carries_context() {
    let mut config = PortalConfig::default();
    config.session.poll_interval_secs = 0;

    let error = config.validate().unwrap_err();
    assert!(matches!(error, PortalError::Config { .. }));
    assert!(!error.is_recoverable());

    let context = error.context();
    assert_eq!(context.component, "config");
    assert_eq!(context.operation.as_deref(), Some("validate"));
    assert!(!context.recovery_suggestions.is_empty());
}

#[test]
fn test_config_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portal.toml");

    let mut config = PortalConfig::default();
    config.session.poll_interval_secs = 7;
    config.save_to_file(&path).unwrap();

    let loaded = PortalConfig::from_file(&path).unwrap();
    assert_eq!(loaded.session.poll_interval_secs, 7);
    assert_eq!(loaded.backend, config.backend);
    assert_eq!(loaded.seed_accounts, config.seed_accounts);
}

#[test]
fn test_remote_backend_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portal.toml");
    std::fs::write(
        &path,
        r#"
[backend]
kind = "remote"
base_url = "http://127.0.0.1:9000/api"
"#,
    )
    .unwrap();

    let config = PortalConfig::from_file(&path).unwrap();
    assert_eq!(
        config.backend,
        BackendConfig::Remote {
            base_url: "http://127.0.0.1:9000/api".to_string(),
            timeout_seconds: 30,
            user_agent: "portal/0.1".to_string(),
            cache_dir: "~/.portal/cache".to_string(),
        }
    );
    // Omitted sections fall back to defaults
    assert_eq!(config.session.poll_interval_secs, 5);
    assert_eq!(config.seed_accounts[0].role, Role::Admin);
    assert!(config.validate().is_ok());
}

#[test]
fn test_malformed_config_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portal.toml");
    std::fs::write(&path, "backend = [").unwrap();

    match PortalConfig::from_file(&path) {
        Err(PortalError::Config { context, .. }) => {
            assert_eq!(context.operation.as_deref(), Some("parse_toml"));
        }
        other => panic!("Expected Config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Compact,
        include_location: false,
        include_thread: false,
        log_span_timings: false,
        log_file_path: None,
        filter_directives: vec!["portal_core=debug".to_string()],
    };

    // A global subscriber can only be installed once per process
    let _ = init_logging(&config);
}
