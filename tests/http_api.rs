mod support;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use formula_render::{
    application::formula::FormulaService,
    infra::http::{HttpState, build_router},
};

use formula_render::application::render::TypesettingEngine;
use support::{FakeEngine, REJECTED_FORMULA, UnavailableEngine, registry_with};

fn router_with(engine: Arc<dyn TypesettingEngine>) -> Router {
    let registry = registry_with(engine, None);
    build_router(HttpState {
        service: FormulaService::new(Arc::new(registry)),
    })
}

fn router() -> Router {
    router_with(Arc::new(FakeEngine::default()))
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    send_to(router(), request).await
}

async fn send_to(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = serde_json::from_slice(&bytes).expect("json body");
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/formula")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn get_renders_svg_from_query() {
    let (status, body) = send(get("/formula?outputType=svg&formula=x%5E2")).await;

    assert_eq!(status, StatusCode::OK);
    let svg = body["svg"].as_str().expect("svg field");
    assert!(svg.starts_with("<svg"));
}

#[tokio::test]
async fn post_renders_png_with_camel_case_fields() {
    let (status, body) = send(post_json(serde_json::json!({
        "outputType": "png",
        "formula": "x^2",
        "scale": 2,
        "uploadToCloud": false
    })))
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dpi"], 144);
    assert_eq!(body["dimensions"]["width"], 40);
    assert_eq!(body["dimensions"]["byteSize"].as_u64().map(|size| size > 0), Some(true));
    assert_eq!(body["ossUploadSucceeded"], false);
    assert!(body.get("oss").is_none());
    assert!(body.get("png").is_none());
    assert!(
        body["base64"]
            .as_str()
            .expect("base64 field")
            .starts_with("data:image/png;base64,")
    );
}

#[tokio::test]
async fn unsupported_output_type_is_bad_request() {
    let (status, body) = send(get("/formula?outputType=pdf&formula=x")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "no_renderer");
    assert_eq!(body["error"]["hint"], "no renderer for output type `pdf`");
}

#[tokio::test]
async fn out_of_range_scale_is_rejected_before_rendering() {
    let (status, body) = send(post_json(serde_json::json!({
        "outputType": "svg",
        "formula": "x",
        "scale": 250
    })))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn engine_rejection_is_bad_request() {
    let (status, body) = send(post_json(serde_json::json!({
        "outputType": "mml",
        "formula": REJECTED_FORMULA
    })))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "render_error");
    assert_eq!(
        body["error"]["hint"],
        "render failed: Undefined control sequence"
    );
}

#[tokio::test]
async fn unavailable_engine_is_internal_error() {
    let (status, body) = send_to(
        router_with(Arc::new(UnavailableEngine)),
        get("/formula?outputType=svg&formula=x"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "engine_error");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/formula")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn health_lists_registered_output_types() {
    let (status, body) = send(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["outputTypes"], serde_json::json!(["html", "mml", "svg", "png"]));
}
