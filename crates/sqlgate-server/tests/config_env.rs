use std::{env, fs};

use sqlgate_server::config::loader::load_config;

// Kept as the only test in this binary: it mutates process environment.
#[test]
fn env_overrides_win_over_file() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("sqlgate.toml");
    fs::write(
        &path,
        r#"
[server]
port = 8081

[forwarding]
enabled = true

[forwarding.retry]
max_attempts = 2
"#,
    )
    .expect("write toml");

    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert!(cfg.forwarding.enabled);

    unsafe {
        env::set_var("SQLGATE__SERVER__PORT", "9090");
        env::set_var("SQLGATE__FORWARDING__ENABLED", "false");
        env::set_var("SQLGATE__FORWARDING__RETRY__MAX_ATTEMPTS", "4");
    }
    let cfg_env = load_config(path.to_str());
    unsafe {
        env::remove_var("SQLGATE__SERVER__PORT");
        env::remove_var("SQLGATE__FORWARDING__ENABLED");
        env::remove_var("SQLGATE__FORWARDING__RETRY__MAX_ATTEMPTS");
    }

    let cfg_env = cfg_env.expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    assert!(!cfg_env.forwarding.enabled);
    assert_eq!(cfg_env.forwarding.retry.max_attempts, 4);
}
