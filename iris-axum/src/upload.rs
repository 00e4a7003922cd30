//! Multipart admission: find the `image` part without buffering the body.

use axum::body::Body;
use axum::http::{header, HeaderMap, Request};
use iris_core::{IrisError, IrisResult};

pub const IMAGE_FIELD: &str = "image";

/// Room for boundaries and part headers when sizing a buffer from the
/// request length.
pub const MULTIPART_ENVELOPE: u64 = 16 * 1024;

/// The uploaded part, positioned at its first body byte.
pub struct ImagePart {
    pub field: multer::Field<'static>,
    /// The part's own `Content-Length`. Only this is held against the size
    /// limit; other form fields share the request length.
    pub declared_size: Option<u64>,
    /// Buffer sizing guess: the declared size, else the request length minus
    /// the multipart envelope.
    pub size_hint: Option<u64>,
    pub file_name: Option<String>,
}

impl std::fmt::Debug for ImagePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePart")
            .field("declared_size", &self.declared_size)
            .field("size_hint", &self.size_hint)
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

pub async fn extract_image_part(request: Request<Body>) -> IrisResult<ImagePart> {
    let (parts, body) = request.into_parts();

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| IrisError::payload_missing("request has no content type"))?;
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| IrisError::payload_missing(format!("not a multipart upload: {e}")))?;
    let request_len = content_length(&parts.headers);

    let mut multipart = multer::Multipart::new(body.into_data_stream(), boundary);
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| IrisError::payload_missing(format!("malformed multipart body: {e}")))?;
        let Some(field) = field else {
            return Err(IrisError::payload_missing(format!(
                "no '{IMAGE_FIELD}' part in the upload"
            )));
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let declared_size = content_length(field.headers());
        let size_hint = declared_size
            .or_else(|| request_len.map(|n| n.saturating_sub(MULTIPART_ENVELOPE)));
        let file_name = field.file_name().map(str::to_owned);
        return Ok(ImagePart {
            field,
            declared_size,
            size_hint,
            file_name,
        });
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
