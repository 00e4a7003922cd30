//! Image format table and header probing.
//!
//! Only the header is read here: enough bytes to learn the container
//! format and the pixel dimensions. Decoding is the transformer's job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ImageConfig;
use crate::errors::{IrisError, IrisResult};

/// Bytes needed before an unknown signature is treated as unsupported.
pub const MIN_SNIFF_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
    Ico,
    Svg,
    Bmp,
}

impl ImageFormat {
    /// Canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
            ImageFormat::Ico => "ico",
            ImageFormat::Svg => "svg",
            ImageFormat::Bmp => "bmp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Ico => "image/x-icon",
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::Bmp => "image/bmp",
        }
    }

    /// Formats accepted as upload sources.
    pub fn is_loadable(&self) -> bool {
        matches!(
            self,
            ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Webp | ImageFormat::Gif | ImageFormat::Bmp
        )
    }

    fn from_detected(kind: imagesize::ImageType) -> Option<Self> {
        use imagesize::ImageType;
        match kind {
            ImageType::Jpeg => Some(ImageFormat::Jpeg),
            ImageType::Png => Some(ImageFormat::Png),
            ImageType::Webp => Some(ImageFormat::Webp),
            ImageType::Gif => Some(ImageFormat::Gif),
            ImageType::Ico => Some(ImageFormat::Ico),
            ImageType::Bmp => Some(ImageFormat::Bmp),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown image format: {0}")]
pub struct UnknownFormat(pub String);

impl FromStr for ImageFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::Webp),
            "gif" => Ok(ImageFormat::Gif),
            "ico" => Ok(ImageFormat::Ico),
            "svg" => Ok(ImageFormat::Svg),
            "bmp" => Ok(ImageFormat::Bmp),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unsupported image type: {0}")]
    Unsupported(String),
    #[error("cannot read image header: {0}")]
    Invalid(String),
}

impl From<ProbeError> for IrisError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Unsupported(_) => IrisError::unsupported_format(err.to_string()),
            ProbeError::Invalid(_) => IrisError::invalid_image(err.to_string()),
        }
    }
}

/// Try to read a header from the bytes seen so far.
///
/// `Ok(None)` means more bytes are needed. Once `complete` is set the
/// prefix is the whole payload and an undecodable header is an error.
pub fn probe(data: &[u8], complete: bool) -> Result<Option<ImageHeader>, ProbeError> {
    use imagesize::ImageError;

    if data.is_empty() {
        return if complete {
            Err(ProbeError::Unsupported("empty payload".into()))
        } else {
            Ok(None)
        };
    }
    if !complete && data.len() < MIN_SNIFF_LEN {
        return Ok(None);
    }

    let kind = match imagesize::image_type(data) {
        Ok(kind) => kind,
        Err(ImageError::NotSupported) => {
            return Err(ProbeError::Unsupported("unrecognized signature".into()))
        }
        Err(e) if complete => return Err(ProbeError::Unsupported(e.to_string())),
        Err(_) => return Ok(None),
    };
    let Some(format) = ImageFormat::from_detected(kind) else {
        return Err(ProbeError::Unsupported(format!("{kind:?}")));
    };

    match imagesize::blob_size(data) {
        Ok(size) => Ok(Some(ImageHeader {
            format,
            width: clamp_dimension(size.width),
            height: clamp_dimension(size.height),
        })),
        Err(e) if complete => Err(ProbeError::Invalid(e.to_string())),
        // header spans past what we have buffered
        Err(_) => Ok(None),
    }
}

fn clamp_dimension(v: usize) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

/// Dimension thresholds. A zero bound is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DimensionLimits {
    pub min_dimension: u32,
    pub max_dimension: u32,
    pub max_resolution: u64,
}

impl DimensionLimits {
    pub fn from_config(image: &ImageConfig) -> Self {
        Self {
            min_dimension: image.min_dimension,
            max_dimension: image.max_dimension,
            max_resolution: image.max_resolution,
        }
    }

    pub fn check(&self, header: &ImageHeader) -> IrisResult<()> {
        let (w, h) = (header.width, header.height);

        if self.min_dimension > 0 && (w < self.min_dimension || h < self.min_dimension) {
            let min = self.min_dimension;
            return Err(IrisError::dimension_too_small(format!("{w}x{h} is below {min}x{min}"))
                .with_public_message(format!(
                    "The image dimensions are too small. Please upload an image of at least {min}x{min}"
                )));
        }

        if self.max_dimension > 0 && (w > self.max_dimension || h > self.max_dimension) {
            let max = self.max_dimension;
            return Err(IrisError::dimension_too_large(format!("{w}x{h} exceeds {max}x{max}"))
                .with_public_message(format!(
                    "The image dimensions are too large. Please upload an image of at most {max}x{max}"
                )));
        }

        let pixels = u64::from(w) * u64::from(h);
        if self.max_resolution > 0 && pixels > self.max_resolution {
            return Err(IrisError::resolution_too_large(format!(
                "{pixels} pixels exceeds {}",
                self.max_resolution
            )));
        }

        Ok(())
    }
}
