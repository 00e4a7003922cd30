#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use iris_axum::{iris, IrisApp, IrisState};
use iris_blob::{MemoryStore, ObjectStore, TransportRegistry};
use iris_core::{IdGenerator, IrisConfig, Passthrough, SystemClock, Transformer};
use serde_json::Value;

pub const BOUNDARY: &str = "iris-test-boundary";

pub const CONFIG: &str = r#"
    [server]
    storage = "memory"
    max_file_size = 10485760
    upload_buffer_size = 65536
    concurrency = 2

    [image]
    type = "jpg"
    min_dimension = 240
    max_dimension = 10000

    [storage]
    bucket = "photos"
    base_url = "http://localhost:8081"
    prefix = "images"
    format = "jpg"

    [storage.s3]
    enabled = false

    [storage.memory]
    enabled = true
"#;

pub struct Harness {
    pub app: IrisApp,
    pub store: Arc<MemoryStore>,
}

pub fn harness() -> Harness {
    harness_with(|_| {}, Arc::new(Passthrough::new()))
}

pub fn harness_with(
    tweak: impl FnOnce(&mut IrisConfig),
    transformer: Arc<dyn Transformer>,
) -> Harness {
    let mut config = IrisConfig::from_toml(CONFIG).unwrap();
    tweak(&mut config);

    let store = Arc::new(MemoryStore::new());
    let registry = TransportRegistry::builder()
        .register(store.clone() as Arc<dyn ObjectStore>)
        .build();
    let ids = IdGenerator::with_machine_id(0x0102, SystemClock);
    let state = IrisState::new(config, ids, registry, transformer, None);

    Harness {
        app: iris(state),
        store,
    }
}

/// Baseline JPEG prefix: SOI, APP0, SOF0 with the given size, EOI.
pub fn jpeg(width: u16, height: u16) -> Vec<u8> {
    let [wh, wl] = width.to_be_bytes();
    let [hh, hl] = height.to_be_bytes();
    let mut data = vec![
        0xFF, 0xD8, // SOI
        0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01,
        0x00, 0x01, 0x00, 0x00, // APP0
        0xFF, 0xC0, 0x00, 0x11, 0x08, hh, hl, wh, wl, 0x03, 0x01, 0x22, 0x00, 0x02, 0x11,
        0x01, 0x03, 0x11, 0x01, // SOF0
    ];
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// A one-part multipart body. `declared` adds a part `Content-Length`.
pub fn multipart(field: &str, data: &[u8], declared: Option<u64>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"upload.jpg\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n");
    if let Some(len) = declared {
        body.extend_from_slice(format!("Content-Length: {len}\r\n").as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(method: &str, uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
