//! The stages of the request pipeline, in order.
//!
//! Each stage takes what it needs and returns what it produces. The first
//! error aborts the request.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use iris_blob::{ObjectUrl, StorageOperation, StorageOutcome, TransportRegistry, UrlBuilder};
use iris_core::image::probe;
use iris_core::{
    BufferPool, DimensionLimits, IdGenerator, ImageFormat, ImageHeader, IrisError, IrisResult,
    PooledBuffer, ProcessingOptions, Transformer,
};

use super::state::{Locations, UploadResponse};

/// Reject before a single body byte is buffered.
pub fn check_size(declared: Option<u64>, max: u64) -> IrisResult<()> {
    tracing::debug!(stage = "size_check", ?declared, max);
    match declared {
        Some(size) if size > max => Err(IrisError::payload_too_large(format!(
            "declared size {size} exceeds the {max} byte limit"
        ))),
        _ => Ok(()),
    }
}

/// A buffer sized to the expected body length, capped at the limit.
pub fn acquire_buffer(pool: &Arc<BufferPool>, size_hint: Option<u64>, max: u64) -> PooledBuffer {
    let expected = size_hint.unwrap_or(0).min(max);
    pool.acquire(usize::try_from(expected).unwrap_or(usize::MAX))
}

/// Buffer the whole body while peeking at its header.
///
/// The header is checked as soon as it decodes, so an oversized or unknown
/// image fails before the rest of the body is read. Bytes past `max` fail
/// the upload whatever the declared size said.
pub async fn read_validated<S, E>(
    body: S,
    buffer: &mut Vec<u8>,
    max: u64,
    limits: &DimensionLimits,
) -> IrisResult<ImageHeader>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    tracing::debug!(stage = "type_and_dimension_check", max);
    let mut body = std::pin::pin!(body);
    let mut header = None;

    while let Some(chunk) = body.next().await {
        let chunk = chunk
            .map_err(|e| IrisError::invalid_image(format!("upload body interrupted: {e}")))?;
        if buffer.len() as u64 + chunk.len() as u64 > max {
            return Err(IrisError::payload_too_large(format!(
                "upload exceeds the {max} byte limit"
            )));
        }
        buffer.extend_from_slice(&chunk);

        if header.is_none() {
            if let Some(found) = probe(buffer, false)? {
                accept(&found, limits)?;
                header = Some(found);
            }
        }
    }

    if let Some(header) = header {
        return Ok(header);
    }
    if buffer.is_empty() {
        return Err(IrisError::payload_missing("the image part is empty"));
    }
    let found = probe(buffer, true)?
        .ok_or_else(|| IrisError::unsupported_format("no image header found"))?;
    accept(&found, limits)?;
    Ok(found)
}

fn accept(header: &ImageHeader, limits: &DimensionLimits) -> IrisResult<()> {
    if !header.format.is_loadable() {
        return Err(IrisError::unsupported_format(format!(
            "{} images are not accepted",
            header.format
        )));
    }
    limits.check(header)
}

pub async fn transform(
    transformer: &dyn Transformer,
    source: &[u8],
    header: &ImageHeader,
    options: &ProcessingOptions,
) -> IrisResult<Bytes> {
    tracing::debug!(stage = "transform", transformer = transformer.name(), size = source.len());
    transformer
        .transform(source, header, options)
        .await
        .map_err(IrisError::from)
}

/// `<id>.<extension>`
pub fn identify(ids: &IdGenerator, extension: &str) -> String {
    let id = ids.next_id();
    tracing::debug!(stage = "identify", id);
    format!("{id}.{extension}")
}

/// Accept `<digits>` or `<digits>.<format>` from a path. A bare number gets
/// `default_extension`.
pub fn parse_identifier(raw: &str, default_extension: &str) -> IrisResult<String> {
    let invalid = || IrisError::invalid_identifier(format!("'{raw}' is not an image identifier"));

    let (stem, extension) = match raw.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (raw, None),
    };
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) || stem.parse::<u64>().is_err()
    {
        return Err(invalid());
    }
    match extension {
        None => Ok(format!("{stem}.{default_extension}")),
        Some(ext) if ext.parse::<ImageFormat>().is_ok() => Ok(raw.to_string()),
        Some(_) => Err(invalid()),
    }
}

pub fn derive_locations(urls: &UrlBuilder, image_id: &str) -> Locations {
    let object_key = urls.object_key(image_id);
    tracing::debug!(stage = "key_derivation", object_key = %object_key, signed = urls.is_signing());
    Locations {
        storage_url: urls.storage_url(&object_key),
        image_url: urls.image_url(&object_key),
        thumb_url: urls.thumb_url(&object_key),
        object_key,
    }
}

/// Storage address only; deletes never need the public URLs.
pub fn storage_target(urls: &UrlBuilder, image_id: &str) -> ObjectUrl {
    urls.storage_url(&urls.object_key(image_id))
}

pub async fn dispatch(
    registry: &TransportRegistry,
    operation: StorageOperation,
) -> IrisResult<StorageOutcome> {
    tracing::debug!(stage = "storage_dispatch", method = operation.method(), target = %operation.target());
    registry.execute(operation).await.map_err(IrisError::from)
}

pub fn respond(image_id: String, header: &ImageHeader, locations: Locations) -> UploadResponse {
    UploadResponse {
        image_id,
        image_width: header.width,
        image_height: header.height,
        image_url: locations.image_url,
        thumb_url: locations.thumb_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::ErrorKind;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 2, 0, 0, 0, 0, 0, 0, 0]);
        data.resize(64, 0);
        data
    }

    fn chunks(data: &[u8], size: usize) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        let parts: Vec<_> = data
            .chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        futures::stream::iter(parts)
    }

    fn limits() -> DimensionLimits {
        DimensionLimits {
            min_dimension: 240,
            max_dimension: 10_000,
            max_resolution: 50_000_000,
        }
    }

    #[test]
    fn size_check_only_rejects_declared_overflow() {
        assert!(check_size(None, 10).is_ok());
        assert!(check_size(Some(10), 10).is_ok());
        let err = check_size(Some(11), 10).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PayloadTooLarge);
    }

    #[tokio::test]
    async fn header_split_across_chunks_is_found() {
        let data = png(300, 200);
        let mut buffer = Vec::new();
        let header = read_validated(chunks(&data, 5), &mut buffer, 1024, &limits())
            .await
            .unwrap();
        assert_eq!((header.format, header.width, header.height), (ImageFormat::Png, 300, 200));
        assert_eq!(buffer, data);
    }

    #[tokio::test]
    async fn small_image_fails_before_the_body_is_drained() {
        let mut data = png(100, 100);
        data.resize(4096, 0);
        let mut buffer = Vec::new();
        let err = read_validated(chunks(&data, 64), &mut buffer, 1 << 20, &limits())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DimensionTooSmall);
        assert!(buffer.len() < data.len());
    }

    #[tokio::test]
    async fn streamed_bytes_past_the_limit_abort() {
        let mut data = png(300, 300);
        data.resize(2048, 0);
        let mut buffer = Vec::new();
        let err = read_validated(chunks(&data, 256), &mut buffer, 1000, &limits())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PayloadTooLarge);
        assert!(buffer.len() <= 1000);
    }

    #[tokio::test]
    async fn unknown_bytes_are_unsupported_and_empty_is_missing() {
        let mut buffer = Vec::new();
        let text = b"this is a plain text file and certainly not an image";
        let err = read_validated(chunks(text, 16), &mut buffer, 1024, &limits())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedFormat);

        let mut buffer = Vec::new();
        let err = read_validated(chunks(b"", 16), &mut buffer, 1024, &limits())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PayloadMissing);
    }

    #[test]
    fn identifiers_from_paths() {
        assert_eq!(parse_identifier("12345", "jpg").unwrap(), "12345.jpg");
        assert_eq!(parse_identifier("12345.png", "jpg").unwrap(), "12345.png");
        for bad in ["", "abc", "12a.jpg", "-1", "12345.exe", "99999999999999999999", ".jpg"] {
            let err = parse_identifier(bad, "jpg").unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidIdentifier, "{bad}");
        }
    }

    #[test]
    fn identify_appends_extension() {
        let ids = IdGenerator::with_machine_id(7, iris_core::SystemClock);
        let id = identify(&ids, "jpg");
        let (stem, ext) = id.split_once('.').unwrap();
        assert_eq!(ext, "jpg");
        assert_eq!(IdGenerator::<iris_core::SystemClock>::decompose(stem.parse().unwrap()).machine_id, 7);
    }
}
