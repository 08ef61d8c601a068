use assert_json_diff::assert_json_eq;
use serde_json::{Value, json};
use sqlgate_server::config::{AppConfig, DestinationConfig, DestinationRouteConfig};
use sqlgate_server::build_app;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_server(
    config: &AppConfig,
) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    sqlgate_server::observability::init_tracing();
    let app = build_app(config).expect("build app");

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

fn routed_config(pattern: &str, url: String) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.forwarding.routes.push(DestinationRouteConfig {
        pattern: pattern.to_string(),
        description: None,
        destination: DestinationConfig {
            url,
            ..Default::default()
        },
    });
    cfg
}

#[tokio::test]
async fn health_endpoints_and_request_id() {
    let (base, tx, handle) = start_server(&AppConfig::default()).await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.json::<Value>().await.unwrap(), json!({"status": "ok"}));

    let res = client
        .get(format!("{base}/readyz"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc-123");

    let root: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
    assert_eq!(root["service"], "SQLGate");

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn generate_object_without_destination_is_skipped() {
    let (base, tx, handle) = start_server(&AppConfig::default()).await;

    let res = reqwest::Client::new()
        .post(format!("{base}/api/generate"))
        .json(&json!({"tableName": "usuarios", "id": 1, "nombre": "Juan"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_json_eq!(
        body,
        json!({
            "success": true,
            "inputType": "object",
            "tableName": "usuarios",
            "insert": "INSERT INTO usuarios (id, nombre) VALUES (1, 'Juan');",
            "forwarded": {
                "success": false,
                "skipped": true,
                "reason": "no destination configured for /api/generate"
            }
        })
    );

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn generate_forwards_to_routed_destination() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/exec"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"executed": true})),
        )
        .expect(1)
        .mount(&downstream)
        .await;

    let cfg = routed_config("/api/*", format!("{}/exec", downstream.uri()));
    let (base, tx, handle) = start_server(&cfg).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{base}/api/generate"))
        .json(&json!([
            {"tableName": "t", "id": 1},
            {"tableName": "t", "id": 2}
        ]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["inputType"], "array");
    assert_eq!(body["tables"][0]["tableName"], "T");
    assert_eq!(body["tables"][0]["recordCount"], 2);
    assert_json_eq!(
        body["forwarded"],
        json!({
            "success": true,
            "status": 200,
            "data": {"executed": true},
            "destinationUrl": format!("{}/exec", downstream.uri()),
            "attempts": 1
        })
    );

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn forward_false_skips_downstream_call() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&downstream)
        .await;

    let cfg = routed_config("*", format!("{}/exec", downstream.uri()));
    let (base, tx, handle) = start_server(&cfg).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{base}/api/generate?forward=false"))
        .json(&json!({"procedureName": "a.b.C", "parameters": {"p": 1}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["call"], "BEGIN\n  A.B.C(p => 1);\nEND;");
    assert!(body.get("forwarded").is_none());

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn any_post_path_is_a_route_key() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&downstream)
        .await;

    let cfg = routed_config("/ingest/orders", format!("{}/orders", downstream.uri()));
    let (base, tx, handle) = start_server(&cfg).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{base}/ingest/orders"))
        .json(&json!({"tableName": "orders", "id": 5}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["forwarded"]["status"], 201);
    assert_eq!(body["forwarded"]["data"], "created");

    // only POST is routed through the fallback, whatever the query says
    let res = client.get(format!("{base}/ingest/orders")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    let res = client
        .get(format!("{base}/ingest/orders?forward=maybe"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn validation_errors_return_help_and_example() {
    let (base, tx, handle) = start_server(&AppConfig::default()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{base}/api/generate"))
        .json(&json!([]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Input array is empty");
    assert!(body["help"].is_string());
    assert!(!body["example"].is_null());

    let res = client
        .post(format!("{base}/api/generate"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["help"].is_string());

    let res = client
        .post(format!("{base}/api/generate?forward=maybe"))
        .json(&json!({"id": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Invalid query string"), "{error}");
    assert!(body["help"].is_string());
    assert!(!body["example"].is_null());

    let res = client
        .post(format!("{base}/api/generate"))
        .json(&json!({"first name": "a", "firstname": "b"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("both map to column firstname"), "{error}");

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn ddl_from_sample_record() {
    let (base, tx, handle) = start_server(&AppConfig::default()).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{base}/api/ddl"))
        .json(&json!({"tableName": "hr.empleados", "id": 1, "nombre": "Ana", "activo": true}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_json_eq!(
        body,
        json!({
            "success": true,
            "tableName": "HR.EMPLEADOS",
            "createTable": "CREATE TABLE HR.EMPLEADOS (\n  ID NUMBER(10),\n  NOMBRE VARCHAR2(255),\n  ACTIVO CHAR(1)\n);"
        })
    );

    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn routes_can_be_listed_and_swapped() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/exec"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&downstream)
        .await;

    let (base, tx, handle) = start_server(&AppConfig::default()).await;
    let client = reqwest::Client::new();

    let listed: Value = client
        .get(format!("{base}/api/forwarding/routes"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["routes"], json!([]));

    // an invalid table set is rejected and leaves the active one untouched
    let res = client
        .put(format!("{base}/api/forwarding/routes"))
        .json(&json!({"routes": [{"pattern": "", "destination": {"url": "http://x"}}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = client
        .put(format!("{base}/api/forwarding/routes"))
        .json(&json!({
            "routes": [{"pattern": "/api/*", "destination": {"url": format!("{}/exec", downstream.uri())}}],
            "transformers": [{"pattern": "*/exec", "transform": {"kind": "sql"}}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({"success": true, "routes": 1, "transformers": 1})
    );

    let listed: Value = client
        .get(format!("{base}/api/forwarding/routes"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["routes"][0]["pattern"], "/api/*");

    let body: Value = client
        .post(format!("{base}/api/generate"))
        .json(&json!({"id": 1}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["forwarded"]["success"], true);

    let requests = downstream.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        sent,
        json!({"sql": "INSERT INTO DATA_TABLE (id) VALUES (1);"})
    );

    let _ = tx.send(());
    let _ = handle.await;
}
