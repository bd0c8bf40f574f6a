use super::load_config;
use super::settings::Settings;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert!(settings.broker.enabled);
    assert_eq!(settings.broker.host_origin, "http://127.0.0.1:8080");
    assert!(settings.broker.accepted_origins.is_empty());
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.broker.event_capacity, 64);
    assert_eq!(settings.log.level, "info");
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // load_config reads config/default.* relative to the working directory
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000

        [broker]
        enabled = false
        host_origin = "https://shell.example.com"
        accepted_origins = ["http://host:8081"]
        max_connections = 10
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");
    let cfg = cfg.expect("load_config failed");

    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert!(!cfg.broker.enabled);
    assert_eq!(cfg.broker.host_origin, "https://shell.example.com");
    assert_eq!(cfg.broker.accepted_origins, vec!["http://host:8081"]);
    assert_eq!(cfg.broker.max_connections, 10);
    // not in the file, so the default survives
    assert_eq!(cfg.broker.event_capacity, 64);
    assert_eq!(cfg.log.level, "info");
}

#[test]
#[serial]
fn load_config_from_environment() {
    temp_env::with_vars(
        [
            ("FRAMEBUS_SERVER__PORT", Some("9100")),
            ("FRAMEBUS_BROKER__ENABLED", Some("false")),
            (
                "FRAMEBUS_BROKER__ACCEPTED_ORIGINS",
                Some("http://a.example,http://b.example:8081"),
            ),
            ("FRAMEBUS_LOG__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.port, 9100);
            assert_eq!(cfg.server.host, "127.0.0.1");
            assert!(!cfg.broker.enabled);
            assert_eq!(
                cfg.broker.accepted_origins,
                vec!["http://a.example", "http://b.example:8081"]
            );
            assert_eq!(cfg.log.level, "debug");
        },
    );
}
