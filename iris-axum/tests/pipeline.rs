mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use bytes::Bytes;
use iris_blob::{Fault, ObjectKeyStrategy, ShardedKeyStrategy};
use iris_core::{ImageHeader, ProcessingOptions, TransformError, Transformer};
use tower::ServiceExt;

use common::*;

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[tokio::test]
async fn health_reports_ok() {
    let h = harness();
    let res = h
        .app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(json_body(res).await["message"], "OK");
}

#[tokio::test]
async fn valid_jpeg_is_stored_under_a_sharded_key() {
    let h = harness();
    let image = jpeg(300, 300);

    let res = h
        .app
        .router
        .clone()
        .oneshot(upload_request("POST", "/v1/1i", multipart("image", &image, None)))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    let body = json_body(res).await;
    assert_eq!(body["image_width"], 300);
    assert_eq!(body["image_height"], 300);

    let image_id = body["image_id"].as_str().unwrap();
    let (stem, ext) = image_id.split_once('.').unwrap();
    assert_eq!(ext, "jpg");
    let parts = iris_core::IdGenerator::<iris_core::SystemClock>::decompose(stem.parse().unwrap());
    assert_eq!(parts.machine_id, 0x0102);
    assert_eq!(parts.reserved, 0);

    let image_url = body["image_url"].as_str().unwrap();
    let key = image_url
        .strip_prefix("http://localhost:8081/default/images/")
        .unwrap();
    let (checksum, rest) = key.split_once('-').unwrap();
    assert_eq!(checksum.len(), 32);
    assert!(is_lower_hex(checksum));
    assert_eq!(rest, image_id);
    assert_eq!(checksum, ShardedKeyStrategy::checksum(image_id));
    assert_eq!(
        body["thumb_url"],
        format!("http://localhost:8081/thumb/images/{key}")
    );

    assert_eq!(h.store.get("photos", key).unwrap(), Bytes::from(image));
    // the staging buffer went back to the pool
    let stats = h.app.state.pool.stats();
    assert_eq!(stats.acquisitions, 1);
    assert_eq!(stats.idle, 1);
}

#[tokio::test]
async fn small_image_is_rejected() {
    let h = harness();
    let res = h
        .app
        .router
        .clone()
        .oneshot(upload_request("POST", "/v1/1i", multipart("image", &jpeg(100, 100), None)))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    let body = json_body(res).await;
    assert_eq!(body["name"], "DimensionTooSmall");
    assert_eq!(body["code"], 400);
    assert!(body["message"].as_str().unwrap().contains("240x240"));
    assert!(h.store.is_empty());
    assert_eq!(h.app.state.pool.stats().idle, 1);
}

#[tokio::test]
async fn oversized_declaration_fails_before_buffering() {
    let h = harness();
    let declared = 20 * 1024 * 1024;
    let res = h
        .app
        .router
        .clone()
        .oneshot(upload_request(
            "POST",
            "/v1/1i",
            multipart("image", &jpeg(300, 300), Some(declared)),
        ))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(json_body(res).await["name"], "PayloadTooLarge");
    assert_eq!(h.app.state.pool.stats().acquisitions, 0);
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn body_longer_than_the_limit_is_cut_off() {
    let h = harness_with(
        |c| c.server.max_file_size = 4096,
        Arc::new(iris_core::Passthrough::new()),
    );
    let mut image = jpeg(300, 300);
    image.resize(8192, 0);

    let res = h
        .app
        .router
        .clone()
        .oneshot(upload_request("POST", "/v1/1i", multipart("image", &image, Some(100))))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(json_body(res).await["name"], "PayloadTooLarge");
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn other_form_fields_do_not_count_against_the_limit() {
    let h = harness_with(
        |c| c.server.max_file_size = 4096,
        Arc::new(iris_core::Passthrough::new()),
    );
    let mut body = Vec::new();
    body.extend_from_slice(
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(&vec![b'x'; 32 * 1024]);
    body.extend_from_slice(b"\r\n");
    // no part Content-Length, so only the request length is known
    body.extend_from_slice(&multipart("image", &jpeg(300, 300), None));

    let mut req = upload_request("POST", "/v1/1i", body.clone());
    req.headers_mut()
        .insert("content-length", body.len().to_string().parse().unwrap());
    let res = h.app.router.clone().oneshot(req).await.unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn non_image_is_unsupported() {
    let h = harness();
    let text = b"just some text that happens to be uploaded as an image part".to_vec();
    let res = h
        .app
        .router
        .oneshot(upload_request("POST", "/v1/1i", multipart("image", &text, None)))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(json_body(res).await["name"], "UnsupportedFormat");
}

#[tokio::test]
async fn missing_image_part() {
    let h = harness();
    let res = h
        .app
        .router
        .oneshot(upload_request("POST", "/v1/1i", multipart("avatar", &jpeg(300, 300), None)))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    let body = json_body(res).await;
    assert_eq!(body["name"], "PayloadMissing");
    assert_eq!(body["className"], "payload-missing");
}

#[tokio::test]
async fn put_stores_under_the_path_identifier() {
    let h = harness();
    let res = h
        .app
        .router
        .clone()
        .oneshot(upload_request(
            "PUT",
            "/v1/1i/7311234567890123",
            multipart("image", &jpeg(400, 300), None),
        ))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    let body = json_body(res).await;
    assert_eq!(body["image_id"], "7311234567890123.jpg");
    let key = ShardedKeyStrategy.object_key("7311234567890123.jpg");
    assert!(h.store.contains("photos", &key));
}

#[tokio::test]
async fn put_rejects_malformed_identifier() {
    let h = harness();
    let res = h
        .app
        .router
        .oneshot(upload_request(
            "PUT",
            "/v1/1i/not-an-id",
            multipart("image", &jpeg(300, 300), None),
        ))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(json_body(res).await["name"], "InvalidIdentifier");
}

#[tokio::test]
async fn delete_existing_and_unknown_both_succeed() {
    let h = harness();
    let res = h
        .app
        .router
        .clone()
        .oneshot(upload_request("POST", "/v1/1i", multipart("image", &jpeg(300, 300), None)))
        .await
        .unwrap();
    let image_id = json_body(res).await["image_id"].as_str().unwrap().to_string();
    assert_eq!(h.store.len(), 1);

    for id in [image_id.as_str(), "99999.jpg"] {
        let res = h
            .app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/v1/1i/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 200, "{id}");
        assert_eq!(json_body(res).await["message"], "OK");
    }
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn corrupted_write_is_an_integrity_error() {
    let h = harness();
    h.store.inject_fault(Fault::CorruptInTransit);

    let res = h
        .app
        .router
        .clone()
        .oneshot(upload_request("POST", "/v1/1i", multipart("image", &jpeg(300, 300), None)))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 500);
    let body = json_body(res).await;
    assert_eq!(body["name"], "IntegrityError");
    assert_eq!(body["message"], "Internal Server Error");
    assert!(h.store.is_empty());
}

struct FailingTransformer;

#[async_trait]
impl Transformer for FailingTransformer {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn transform(
        &self,
        _source: &[u8],
        header: &ImageHeader,
        _options: &ProcessingOptions,
    ) -> Result<Bytes, TransformError> {
        Err(TransformError::Decode {
            format: header.format,
            reason: "corrupt scan data".into(),
        })
    }
}

#[tokio::test]
async fn transform_failure_hides_detail_unless_debug() {
    for debug in [false, true] {
        let h = harness_with(|c| c.server.debug = debug, Arc::new(FailingTransformer));
        let res = h
            .app
            .router
            .clone()
            .oneshot(upload_request("POST", "/v1/1i", multipart("image", &jpeg(300, 300), None)))
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 500);
        let body = json_body(res).await;
        assert_eq!(body["name"], "ProcessingError");
        let message = body["message"].as_str().unwrap();
        assert_eq!(message.contains("corrupt scan data"), debug, "{message}");
        assert!(h.store.is_empty());
    }
}
