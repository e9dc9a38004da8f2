//! End-to-end proxy behavior against raw-TCP backends.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use openapi_cop::document::DocumentPipeline;
use openapi_cop::http::{OasRequest, ParamValue, SOURCE_REQUEST_HEADER, VALIDATION_RESULT_HEADER};
use openapi_cop::validation::ValidationResults;
use openapi_cop::HttpServer;

mod common;
use common::{fixture, Canned};

fn results_header(res: &reqwest::Response) -> ValidationResults {
    let raw = res.headers()[VALIDATION_RESULT_HEADER].to_str().unwrap();
    serde_json::from_str(raw).unwrap()
}

fn source_header(res: &reqwest::Response) -> OasRequest {
    let raw = res.headers()[SOURCE_REQUEST_HEADER].to_str().unwrap();
    serde_json::from_str(raw).unwrap()
}

#[tokio::test]
async fn test_missing_required_property_is_disclosed() {
    let backend = common::start_mock_backend(Canned::json(200, r#"{"output":"Polo!"}"#)).await;
    let proxy = common::start_proxy(common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend))).await;

    let res = common::client()
        .post(common::url(&proxy, "/echo"))
        .json(&json!({ "blurp": "BLUUURP!" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    let results = results_header(&res);
    let request = results.request.clone().unwrap();
    assert!(!request.valid);
    assert_eq!(request.errors().len(), 1);
    assert_eq!(request.errors()[0].keyword, "required");
    assert!(results.response.unwrap().valid);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["message"], "openapi-cop Proxy validation failed");
    assert_eq!(body["error"]["request"]["body"], json!({ "blurp": "BLUUURP!" }));
    assert_eq!(body["error"]["response"]["statusCode"], 200);
    assert_eq!(body["error"]["validationResults"]["request"]["errors"][0]["keyword"], "required");

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_silent_mode_is_byte_identical() {
    let upstream_body = "{ \"output\" :  \"Polo!\" }";
    let backend =
        common::start_mock_backend(Canned::json(200, upstream_body).header("X-Backend", "echo-1")).await;
    let mut config = common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend));
    config.validation.silent = true;
    let proxy = common::start_proxy(config).await;

    let client = common::client();
    let direct = client
        .post(format!("http://{}/echo", backend))
        .json(&json!({ "input": "Marco!" }))
        .send()
        .await
        .unwrap();
    let proxied = client
        .post(common::url(&proxy, "/echo"))
        .json(&json!({ "input": "Marco!" }))
        .send()
        .await
        .unwrap();

    assert_eq!(proxied.status(), direct.status());
    assert_eq!(proxied.headers()["x-backend"], "echo-1");
    assert_eq!(proxied.headers()["content-type"], "application/json");
    let results = results_header(&proxied);
    assert!(results.request.unwrap().valid);
    assert!(results.response.unwrap().valid);
    assert!(results.response_headers.unwrap().valid);
    assert_eq!(proxied.bytes().await.unwrap(), direct.bytes().await.unwrap());

    // Violations are reported but never alter the response.
    let violating = client
        .post(common::url(&proxy, "/echo"))
        .json(&json!({ "blurp": "BLUUURP!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(violating.status(), 200);
    assert!(!results_header(&violating).request.unwrap().valid);
    assert_eq!(violating.text().await.unwrap(), upstream_body);

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_strict_mode_forbids_undeclared_properties() {
    let backend = common::start_mock_backend(Canned::json(200, r#"{"output":"Polo!"}"#)).await;
    let mut config = common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend));
    config.validation.strict = true;
    let proxy = common::start_proxy(config).await;
    let client = common::client();
    let body = json!({ "input": "Marco!", "sponge": "Bob" });

    let closed = client.post(common::url(&proxy, "/echo")).json(&body).send().await.unwrap();
    assert_eq!(closed.status(), 500);
    let request = results_header(&closed).request.unwrap();
    assert!(!request.valid);
    assert!(request.errors().iter().any(|e| e.keyword == "additionalProperties"));

    let open = client.post(common::url(&proxy, "/echo-open")).json(&body).send().await.unwrap();
    assert_eq!(open.status(), 200);
    assert!(results_header(&open).request.unwrap().valid);

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_lenient_mode_allows_undeclared_properties() {
    let backend = common::start_mock_backend(Canned::json(200, r#"{"output":"Polo!"}"#)).await;
    let proxy = common::start_proxy(common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend))).await;

    let res = common::client()
        .post(common::url(&proxy, "/echo"))
        .json(&json!({ "input": "Marco!", "sponge": "Bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(results_header(&res).request.unwrap().valid);

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_target_keeps_request_results() {
    let port = common::unused_port().await;
    let proxy = common::start_proxy(common::proxy_config(&fixture("echo.yaml"), &format!("http://127.0.0.1:{}", port))).await;
    let client = common::client();

    let res = client
        .post(common::url(&proxy, "/echo"))
        .json(&json!({ "input": "Marco!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    let results = results_header(&res);
    assert!(results.request.unwrap().valid);
    assert!(results.response.is_none());
    assert!(results.response_headers.is_none());
    assert!(res.bytes().await.unwrap().is_empty());

    let res = client
        .post(common::url(&proxy, "/echo"))
        .json(&json!({ "blurp": "BLUUURP!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].get("response").is_none());
    assert_eq!(body["error"]["validationResults"]["request"]["valid"], false);

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_source_request_header_round_trip() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let backend = common::start_programmable_backend(move |req| {
        recorder.lock().unwrap().push(req);
        Canned::json(200, r#"[{"id":1,"name":"Odie"}]"#).header("X-Rate-Limit", "10")
    })
    .await;
    let proxy = common::start_proxy(common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend))).await;

    let res = common::client()
        .get(common::url(&proxy, "/pets?limit=2&tag=a&tag=b"))
        .header("X-Custom", "Zoë")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let source = source_header(&res);
    assert_eq!(source.method, "GET");
    assert_eq!(source.path, "/pets");
    assert_eq!(source.query["limit"], ParamValue::Single("2".into()));
    assert_eq!(source.query["tag"], ParamValue::Multi(vec!["a".into(), "b".into()]));
    assert_eq!(source.headers["x-custom"], ParamValue::Single("Zoë".into()));
    assert!(source.body.is_none());

    // Path, query and headers reach the target verbatim.
    let recorded = seen.lock().unwrap()[0].clone();
    assert!(recorded.head.starts_with("GET /pets?limit=2&tag=a&tag=b HTTP/1.1"));
    assert!(recorded.head.to_ascii_lowercase().contains("x-custom:"));

    let res = common::client()
        .post(common::url(&proxy, "/echo?debug=true"))
        .json(&json!({ "input": "Marco!", "nested": [1, null, { "deep": true }] }))
        .send()
        .await
        .unwrap();
    let source = source_header(&res);
    assert_eq!(source.method, "POST");
    assert_eq!(source.body, Some(json!({ "input": "Marco!", "nested": [1, null, { "deep": true }] })));
    assert_eq!(source.query["debug"], ParamValue::Single("true".into()));

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_operation_is_reported() {
    let backend = common::start_mock_backend(Canned::json(200, "{}")).await;
    let proxy = common::start_proxy(common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend))).await;

    let res = common::client().get(common::url(&proxy, "/nope")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    let request = results_header(&res).request.unwrap();
    assert_eq!(request.errors()[0].keyword, "operation");
    assert_eq!(request.errors()[0].message, "Unknown operation '/nope'");

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_response_headers_are_case_insensitive() {
    let backend = common::start_programmable_backend(|req| {
        let rate = if req.head.contains("limit=1") { "5" } else { "lots" };
        Canned::json(200, "[]").header("x-RATE-limit", rate)
    })
    .await;
    let proxy = common::start_proxy(common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend))).await;
    let client = common::client();

    let ok = client.get(common::url(&proxy, "/pets?limit=1")).send().await.unwrap();
    assert_eq!(ok.status(), 200);
    assert!(results_header(&ok).response_headers.unwrap().valid);

    let bad = client.get(common::url(&proxy, "/pets?limit=2")).send().await.unwrap();
    assert_eq!(bad.status(), 500);
    let headers = results_header(&bad).response_headers.unwrap();
    assert!(!headers.valid);
    assert_eq!(headers.errors()[0].keyword, "type");

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_swagger_v2_document() {
    let backend = common::start_mock_backend(Canned::json(201, r#"{"id":1,"name":"Tom"}"#)).await;
    let proxy =
        common::start_proxy(common::proxy_config(&fixture("petstore-v2.yaml"), &format!("http://{}", backend))).await;
    let client = common::client();

    let ok = client.post(common::url(&proxy, "/pets")).json(&json!({ "name": "Tom" })).send().await.unwrap();
    assert_eq!(ok.status(), 201);
    let results = results_header(&ok);
    assert!(results.request.unwrap().valid);
    assert!(results.response.unwrap().valid);

    let bad = client.post(common::url(&proxy, "/pets")).json(&json!({ "nom": "Tom" })).send().await.unwrap();
    assert_eq!(bad.status(), 500);
    assert_eq!(results_header(&bad).request.unwrap().errors()[0].keyword, "required");

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_frees_port() {
    let backend = common::start_mock_backend(Canned::json(200, "{}")).await;
    let proxy = common::start_proxy(common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend))).await;
    let addr = proxy.local_addr();

    let res = common::client().get(common::url(&proxy, "/pets")).send().await.unwrap();
    assert!(res.headers().contains_key(VALIDATION_RESULT_HEADER));

    proxy.shutdown().await.unwrap();
    let rebound = tokio::net::TcpListener::bind(addr).await;
    assert!(rebound.is_ok(), "port still held after shutdown");
}

#[tokio::test]
async fn test_reload_swaps_snapshot() {
    let backend = common::start_mock_backend(Canned::json(200, r#"{"output":"Polo!"}"#)).await;
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("api.yaml");
    let original = std::fs::read_to_string(fixture("echo.yaml")).unwrap();
    std::fs::write(&doc, &original).unwrap();

    let config = common::proxy_config(&doc, &format!("http://{}", backend));
    let pipeline = DocumentPipeline::new(false);
    let snapshot = pipeline.build(&doc).unwrap();
    let (tx, updates) = mpsc::unbounded_channel();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config, snapshot);
    let shared = server.snapshot();
    let handle = server.spawn(listener, updates).unwrap();

    let client = common::client();
    let body = json!({ "blurp": "BLUUURP!" });
    let before = client.post(format!("http://{}/echo", addr)).json(&body).send().await.unwrap();
    assert_eq!(before.status(), 500);

    // `input` is no longer required after the reload.
    std::fs::write(&doc, original.replacen("      required:\n        - input\n", "", 1)).unwrap();
    tx.send(pipeline.build(&doc).unwrap()).unwrap();

    let mut after = None;
    for _ in 0..50 {
        if shared.load().document.raw["components"]["schemas"]["EchoRequest"].get("required").is_none() {
            after = Some(client.post(format!("http://{}/echo", addr)).json(&body).send().await.unwrap());
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let after = after.expect("snapshot was never swapped");
    assert_eq!(after.status(), 200);
    assert!(results_header(&after).request.unwrap().valid);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_watcher_rebuilds_on_change() {
    let backend = common::start_mock_backend(Canned::json(200, r#"{"output":"Polo!"}"#)).await;
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("api.yaml");
    let original = std::fs::read_to_string(fixture("echo.yaml")).unwrap();
    std::fs::write(&doc, &original).unwrap();

    let mut config = common::proxy_config(&doc, &format!("http://{}", backend));
    config.document.watch = true;
    let proxy = common::start_proxy(config).await;
    let client = common::client();
    let body = json!({ "blurp": "BLUUURP!" });

    let before = client.post(common::url(&proxy, "/echo")).json(&body).send().await.unwrap();
    assert_eq!(before.status(), 500);

    std::fs::write(&doc, original.replacen("      required:\n        - input\n", "", 1)).unwrap();

    let mut status = 500;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let res = client.post(common::url(&proxy, "/echo")).json(&body).send().await.unwrap();
        status = res.status().as_u16();
        if status == 200 {
            break;
        }
    }
    assert_eq!(status, 200, "watcher never swapped in the rebuilt contract");

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_watch_location_triggers_rebuild() {
    let backend = common::start_mock_backend(Canned::json(200, r#"{"output":"Polo!"}"#)).await;
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("api.yaml");
    let watched = dir.path().join("parts");
    std::fs::create_dir(&watched).unwrap();
    let original = std::fs::read_to_string(fixture("echo.yaml")).unwrap();
    std::fs::write(&doc, &original).unwrap();

    let mut config = common::proxy_config(&doc, &format!("http://{}", backend));
    config.document.watch = true;
    config.document.watch_path = Some(watched.clone());
    let proxy = common::start_proxy(config).await;
    let client = common::client();
    let body = json!({ "blurp": "BLUUURP!" });

    // The document itself is not watched: editing it alone changes nothing.
    std::fs::write(&doc, original.replacen("      required:\n        - input\n", "", 1)).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let before = client.post(common::url(&proxy, "/echo")).json(&body).send().await.unwrap();
    assert_eq!(before.status(), 500);

    std::fs::write(watched.join("touched.yaml"), "x: 1\n").unwrap();

    let mut status = 500;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let res = client.post(common::url(&proxy, "/echo")).json(&body).send().await.unwrap();
        status = res.status().as_u16();
        if status == 200 {
            break;
        }
    }
    assert_eq!(status, 200, "change under the watch location never rebuilt the contract");

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_large_response_is_relayed_whole() {
    let pets: Vec<Value> = (0..40_000)
        .map(|id| json!({ "id": id, "name": format!("Odie the {:0>48}", id) }))
        .collect();
    let upstream_body = serde_json::to_vec(&pets).unwrap();
    assert!(upstream_body.len() > openapi_cop::ProxyConfig::default().limits.max_body_size);
    let backend = common::start_mock_backend(
        Canned::bytes(200, upstream_body.clone()).header("X-Rate-Limit", "10"),
    )
    .await;

    for silent in [true, false] {
        let mut config = common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend));
        config.validation.silent = silent;
        let proxy = common::start_proxy(config).await;

        let res = common::client().get(common::url(&proxy, "/pets")).send().await.unwrap();
        assert_eq!(res.status(), 200);
        let results = results_header(&res);
        assert!(results.request.unwrap().valid);
        assert!(results.response.unwrap().valid);
        let relayed = res.bytes().await.unwrap();
        assert_eq!(relayed.len(), upstream_body.len());
        assert_eq!(relayed.as_ref(), upstream_body.as_slice());

        proxy.shutdown().await.unwrap();
    }
}

#[tokio::test]
async fn test_gzip_response_is_validated_decoded() {
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(br#"{"output":"Polo!"}"#).unwrap();
    let compressed = encoder.finish().unwrap();
    let backend = common::start_mock_backend(
        Canned::bytes(200, compressed.clone()).header("Content-Encoding", "gzip"),
    )
    .await;
    let proxy = common::start_proxy(common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend))).await;

    let res = common::client()
        .post(common::url(&proxy, "/echo"))
        .header("Accept-Encoding", "gzip")
        .json(&json!({ "input": "Marco!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-encoding"], "gzip");
    let response = results_header(&res).response.unwrap();
    assert!(response.valid, "unexpected errors: {:?}", response.errors());
    assert_eq!(res.bytes().await.unwrap().as_ref(), compressed.as_slice());

    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stalled_body_times_out() {
    let backend = common::start_mock_backend(Canned::json(200, r#"{"output":"Polo!"}"#).stalled()).await;
    let mut config = common::proxy_config(&fixture("echo.yaml"), &format!("http://{}", backend));
    config.target.timeout_secs = 1;
    let proxy = common::start_proxy(config).await;

    let started = std::time::Instant::now();
    let res = common::client()
        .post(common::url(&proxy, "/echo"))
        .json(&json!({ "input": "Marco!" }))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(res.status(), 500);
    let results = results_header(&res);
    assert!(results.request.unwrap().valid);
    assert!(results.response.is_none());

    proxy.shutdown().await.unwrap();
}
