mod common;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn unknown_route_is_not_found_with_error_shape() {
    let h = harness();
    let res = h
        .app
        .router
        .oneshot(Request::builder().uri("/v2/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 404);
    assert!(res.headers().get("x-request-id").is_some());
    let body = json_body(res).await;
    assert_eq!(body["name"], "NotFound");
    assert_eq!(body["code"], 404);
    assert_eq!(body["className"], "not-found");
    assert_eq!(body["message"], "Not Found");
}

#[tokio::test]
async fn non_multipart_upload_is_bad_request() {
    let h = harness();
    let res = h
        .app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/1i")
                .header("content-type", "application/json")
                .body(Body::from("{\"image\":\"x\"}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    assert!(res.headers().get("x-request-id").is_some());
    let body = json_body(res).await;
    assert_eq!(body["name"], "PayloadMissing");
    assert_eq!(body["message"], "Please choose an image to upload");
}

#[tokio::test]
async fn request_id_is_preserved_when_provided() {
    let h = harness();
    let provided = HeaderValue::from_static("req-test-123");
    let res = h
        .app
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", provided.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
}

#[tokio::test]
async fn debug_mode_returns_internal_messages() {
    let h = harness_with(
        |c| c.server.debug = true,
        std::sync::Arc::new(iris_core::Passthrough::new()),
    );
    let res = h
        .app
        .router
        .oneshot(upload_request("POST", "/v1/1i", multipart("image", &jpeg(100, 120), None)))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    let body = json_body(res).await;
    assert_eq!(body["name"], "DimensionTooSmall");
    assert_eq!(body["message"], "100x120 is below 240x240");
}
