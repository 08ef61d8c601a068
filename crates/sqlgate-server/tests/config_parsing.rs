use std::io::Write;

use serde_json::json;
use sqlgate_server::config::LogFormat;
use sqlgate_server::config::loader::load_config;
use sqlgate_server::forwarding::{ForwardingTables, TransformSpec};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn missing_file_yields_defaults() {
    let cfg = load_config(Some("/definitely/not/here/sqlgate.toml")).expect("defaults");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.logging.format, LogFormat::Pretty);
    assert!(cfg.forwarding.routes.is_empty());
}

#[test]
fn parses_full_forwarding_section() {
    let file = write_config(
        r#"
[server]
port = 9191

[logging]
level = "debug"
format = "json"

[generation]
date_tokens = ["fecha", "date", "dia"]

[forwarding]
source = "erp-bridge"

[forwarding.timeouts]
procedure_ms = 60000

[forwarding.retry]
max_attempts = 3
initial_backoff_ms = 100
max_backoff_ms = 1000

[forwarding.default_destination]
url = "http://fallback:9000/ingest"

[[forwarding.routes]]
pattern = "/api/orders*"
description = "orders service"

[forwarding.routes.destination]
url = "http://orders:8083/exec"
method = "post"
timeout_ms = 2000

[forwarding.routes.destination.headers]
x-api-key = "secret"

[[forwarding.routes]]
pattern = "/api/*"

[forwarding.routes.destination]
url = "http://catch-all:8080/run"

[[forwarding.transformers]]
pattern = "*/exec"
method = "put"

[forwarding.transformers.transform]
kind = "sql"
field = "statement"

[[forwarding.transformers]]
pattern = "catch-all:*"

[forwarding.transformers.transform]
kind = "template"

[forwarding.transformers.transform.body]
query = "$sql"
kind = "$inputType"
"#,
    );

    let cfg = load_config(file.path().to_str()).expect("valid config");
    assert_eq!(cfg.server.port, 9191);
    assert_eq!(cfg.logging.format, LogFormat::Json);
    assert_eq!(cfg.generation.date_tokens, ["fecha", "date", "dia"]);

    let fwd = &cfg.forwarding;
    assert_eq!(fwd.source, "erp-bridge");
    assert_eq!(fwd.timeouts.procedure_ms, 60_000);
    assert_eq!(fwd.timeouts.standard_ms, 30_000);
    assert_eq!(fwd.retry.max_attempts, 3);
    assert_eq!(fwd.routes.len(), 2);
    assert_eq!(fwd.routes[0].pattern, "/api/orders*");
    assert_eq!(fwd.routes[0].destination.timeout_ms, Some(2000));
    assert_eq!(
        fwd.routes[0].destination.headers.get("x-api-key").map(String::as_str),
        Some("secret")
    );
    assert_eq!(
        fwd.transformers[0].transform,
        TransformSpec::Sql {
            field: "statement".into(),
        }
    );
    assert_eq!(
        fwd.transformers[1].transform,
        TransformSpec::Template {
            body: json!({"query": "$sql", "kind": "$inputType"})
        }
    );

    let tables = ForwardingTables::from_config(&fwd.tables()).expect("compiles");
    assert_eq!(
        tables
            .routes
            .resolve("/api/orders/1")
            .map(|e| e.value.url.as_str()),
        Some("http://orders:8083/exec")
    );
    assert_eq!(
        tables
            .routes
            .resolve("/api/other")
            .map(|e| e.value.url.as_str()),
        Some("http://catch-all:8080/run")
    );
    assert!(tables.default_destination.is_some());
}

#[test]
fn invalid_route_url_is_rejected() {
    let file = write_config(
        r#"
[[forwarding.routes]]
pattern = "/api/*"

[forwarding.routes.destination]
url = "not a url"
"#,
    );
    let err = load_config(file.path().to_str()).unwrap_err();
    assert!(err.contains("forwarding.routes[0]"), "{err}");
}

#[test]
fn unknown_template_placeholder_is_rejected() {
    let file = write_config(
        r#"
[forwarding.default_transformer]
kind = "template"

[forwarding.default_transformer.body]
query = "$query"
"#,
    );
    let err = load_config(file.path().to_str()).unwrap_err();
    assert!(err.contains("$query"), "{err}");
}

#[test]
fn invalid_log_level_is_rejected() {
    let file = write_config("[logging]\nlevel = \"chatty\"\n");
    let err = load_config(file.path().to_str()).unwrap_err();
    assert!(err.contains("logging.level"), "{err}");
}
