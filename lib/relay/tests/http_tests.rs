//! End-to-end tests of the pipeline over the hyper transport.

use std::time::Duration;

use assert2::{check, let_assert};
use bytes::Bytes;
use relay::{
    ClientConfig, ErrorKind, HttpClient, HttpClientExt, HyperTransport, Method, Pipeline,
    PipelineConfig, Request,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

fn fast_retries() -> PipelineConfig {
    PipelineConfig::default().with_retry(2, Duration::from_millis(10))
}

fn pipeline() -> Pipeline {
    Pipeline::builder().config(fast_retries()).build()
}

#[tokio::test]
async fn get_sends_standard_headers_and_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/protected"))
        .and(header("Authorization", "Bearer abc123"))
        .and(header("Accept", "application/json"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(header("X-App-Version", "1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = pipeline();
    pipeline.tokens().set("abc123");

    let response = pipeline
        .get(&format!("{}/api/protected", mock_server.uri()))
        .await
        .expect("response");

    check!(response.is_success());
    let body: serde_json::Value = response.json().expect("json");
    check!(body["ok"] == true);
}

#[tokio::test]
async fn repeated_get_hits_the_network_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": "1"}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = pipeline();
    let url = format!("{}/api/products?page=1", mock_server.uri());

    let first = pipeline.get(&url).await.expect("first");
    let second = pipeline.get(&url).await.expect("second");

    check!(first.body() == second.body());
    check!(pipeline.cache().len() == 1);
}

#[tokio::test]
async fn failing_get_is_retried_then_normalized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let pipeline = pipeline();
    let_assert!(
        Err(err) = pipeline
            .get(&format!("{}/api/products", mock_server.uri()))
            .await
    );

    check!(err.kind() == ErrorKind::Server);
    check!(err.status() == Some(503));
    check!(err.message() == "Service Unavailable");
    check!(pipeline.loading().count() == 0);
}

#[tokio::test]
async fn post_is_sent_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/products"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(serde_json::json!({"name": "Laptop"})))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = pipeline();
    let_assert!(
        Err(err) = pipeline
            .post_json(
                &format!("{}/api/products", mock_server.uri()),
                &serde_json::json!({"name": "Laptop"}),
            )
            .await
    );

    check!(err.status() == Some(500));
}

#[tokio::test]
async fn login_is_sent_without_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "fresh"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = pipeline();
    pipeline.tokens().set("stale");

    let response = pipeline
        .post_json(
            &format!("{}/api/auth/login", mock_server.uri()),
            &serde_json::json!({"email": "a@b.c", "password": "secret"}),
        )
        .await
        .expect("response");

    let requests = mock_server
        .received_requests()
        .await
        .expect("recording enabled");
    check!(requests.len() == 1);
    check!(!requests[0].headers.contains_key("authorization"));
    check!(response.status() == 200);
}

#[tokio::test]
async fn unreachable_server_is_client_error() {
    // Nothing listens on port 1
    let pipeline = Pipeline::builder()
        .connect_timeout(Duration::from_millis(200))
        .config(PipelineConfig::default().with_retry(0, Duration::ZERO))
        .build();

    let_assert!(Err(err) = pipeline.get("http://127.0.0.1:1/api/products").await);
    check!(err.kind() == ErrorKind::Client);
    check!(err.status().is_none());
}

#[tokio::test]
async fn transport_reports_status_without_failing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/products/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let mut transport = HyperTransport::new(ClientConfig::default());
    let url = format!("{}/api/products/1", mock_server.uri());
    let request = Request::builder(Method::Delete, url.parse().expect("url"))
        .build()
        .expect("request");

    let response = tower::Service::call(&mut transport, request)
        .await
        .expect("response");
    check!(response.status() == 404);
}

#[tokio::test]
async fn transport_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let pipeline = Pipeline::builder()
        .timeout(Duration::from_millis(50))
        .config(PipelineConfig::default().with_retry(0, Duration::ZERO))
        .build();

    let_assert!(
        Err(err) = pipeline
            .get(&format!("{}/api/slow", mock_server.uri()))
            .await
    );
    check!(err.is_client());
    check!(err.message() == "request timeout");
}

#[tokio::test]
async fn execute_accepts_prebuilt_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/products/7"))
        .and(header("X-Trace-Id", "trace-7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let pipeline = pipeline();
    let url = format!("{}/api/products/7", mock_server.uri());
    let request = Request::<Bytes>::builder(Method::Patch, url.parse().expect("url"))
        .header("X-Trace-Id", "trace-7")
        .json(&serde_json::json!({"stock_quantity": 3}))
        .expect("json")
        .build()
        .expect("request");

    let response = pipeline.execute(request).await.expect("response");
    check!(response.status() == 204);
}
