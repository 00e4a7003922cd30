//! # Errors
//!
//! Every failure a request can hit is an [`IrisError`]: a kind that fixes
//! the HTTP status, an internal message for the logs and a public message
//! that is safe to hand back to clients.
//!
//! Transports decide how to serialize; [`IrisError::to_json`] gives the
//! common `{name, message, code, className}` payload.

use std::fmt;

use anyhow::Error as AnyError;

pub type IrisResult<T> = std::result::Result<T, IrisError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PayloadMissing,     // 400
    PayloadTooLarge,    // 400
    UnsupportedFormat,  // 400
    DimensionTooSmall,  // 400
    DimensionTooLarge,  // 400
    ResolutionTooLarge, // 400
    InvalidImage,       // 400
    InvalidIdentifier,  // 400
    NotFound,           // 404
    ProcessingError,    // 500
    IntegrityError,     // 500
    BackendError,       // 500
    NoPrivateAddress,   // 500, fatal at startup
    Internal,           // 500
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::PayloadMissing
            | ErrorKind::PayloadTooLarge
            | ErrorKind::UnsupportedFormat
            | ErrorKind::DimensionTooSmall
            | ErrorKind::DimensionTooLarge
            | ErrorKind::ResolutionTooLarge
            | ErrorKind::InvalidImage
            | ErrorKind::InvalidIdentifier => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::ProcessingError
            | ErrorKind::IntegrityError
            | ErrorKind::BackendError
            | ErrorKind::NoPrivateAddress
            | ErrorKind::Internal => 500,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::PayloadMissing => "PayloadMissing",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::DimensionTooSmall => "DimensionTooSmall",
            ErrorKind::DimensionTooLarge => "DimensionTooLarge",
            ErrorKind::ResolutionTooLarge => "ResolutionTooLarge",
            ErrorKind::InvalidImage => "InvalidImage",
            ErrorKind::InvalidIdentifier => "InvalidIdentifier",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ProcessingError => "ProcessingError",
            ErrorKind::IntegrityError => "IntegrityError",
            ErrorKind::BackendError => "BackendError",
            ErrorKind::NoPrivateAddress => "NoPrivateAddress",
            ErrorKind::Internal => "Internal",
        }
    }

    /// Kebab-cased class name, e.g. `payload-too-large`.
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::PayloadMissing => "payload-missing",
            ErrorKind::PayloadTooLarge => "payload-too-large",
            ErrorKind::UnsupportedFormat => "unsupported-format",
            ErrorKind::DimensionTooSmall => "dimension-too-small",
            ErrorKind::DimensionTooLarge => "dimension-too-large",
            ErrorKind::ResolutionTooLarge => "resolution-too-large",
            ErrorKind::InvalidImage => "invalid-image",
            ErrorKind::InvalidIdentifier => "invalid-identifier",
            ErrorKind::NotFound => "not-found",
            ErrorKind::ProcessingError => "processing-error",
            ErrorKind::IntegrityError => "integrity-error",
            ErrorKind::BackendError => "backend-error",
            ErrorKind::NoPrivateAddress => "no-private-address",
            ErrorKind::Internal => "internal",
        }
    }

    /// Message shown to clients when debug output is off.
    pub fn default_public_message(&self) -> &'static str {
        match self {
            ErrorKind::PayloadMissing => "Please choose an image to upload",
            ErrorKind::PayloadTooLarge => "The uploaded image is too large",
            ErrorKind::UnsupportedFormat => {
                "The uploaded file is not a supported image (jpg, png, gif, webp, bmp)"
            }
            ErrorKind::DimensionTooSmall => "The image dimensions are too small",
            ErrorKind::DimensionTooLarge => "The image dimensions are too large",
            ErrorKind::ResolutionTooLarge => "The image resolution is too large",
            ErrorKind::InvalidImage => "The uploaded image could not be read",
            ErrorKind::InvalidIdentifier => "Invalid image identifier",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::ProcessingError
            | ErrorKind::IntegrityError
            | ErrorKind::BackendError
            | ErrorKind::NoPrivateAddress
            | ErrorKind::Internal => "Internal Server Error",
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

/// A structured gateway error.
///
/// `message` is what operators see in the logs. `public_message` is what
/// clients see unless the server runs in debug mode.
#[derive(Debug)]
pub struct IrisError {
    pub kind: ErrorKind,
    pub message: String,
    pub public_message: String,
    pub source: Option<AnyError>,
}

impl IrisError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            public_message: kind.default_public_message().to_string(),
            source: None,
        }
    }

    pub fn with_public_message(mut self, public: impl Into<String>) -> Self {
        self.public_message = public.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<AnyError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    /// Wrap any error as `Internal`, keeping an existing `IrisError` as is.
    pub fn normalize(err: AnyError) -> IrisError {
        match err.downcast::<IrisError>() {
            Ok(iris) => iris,
            Err(other) => IrisError::internal(other.to_string()).with_source(other),
        }
    }

    /// A copy suitable for clients: the internal message is replaced by the
    /// public one unless `debug` is set, and the source chain is dropped.
    pub fn sanitize_for_client(&self, debug: bool) -> IrisError {
        let message = if debug {
            self.message.clone()
        } else {
            self.public_message.clone()
        };
        IrisError {
            kind: self.kind,
            message,
            public_message: self.public_message.clone(),
            source: None,
        }
    }

    pub fn to_json(&self, debug: bool) -> serde_json::Value {
        let safe = self.sanitize_for_client(debug);
        serde_json::json!({
            "name": safe.name(),
            "message": safe.message,
            "code": safe.code(),
            "className": safe.class_name(),
        })
    }

    // ---- Constructors ----

    pub fn payload_missing(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadMissing, msg)
    }
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, msg)
    }
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedFormat, msg)
    }
    pub fn dimension_too_small(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::DimensionTooSmall, msg)
    }
    pub fn dimension_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::DimensionTooLarge, msg)
    }
    pub fn resolution_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResolutionTooLarge, msg)
    }
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidImage, msg)
    }
    pub fn invalid_identifier(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidIdentifier, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn processing(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProcessingError, msg)
    }
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::IntegrityError, msg)
    }
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendError, msg)
    }
    pub fn no_private_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoPrivateAddress, msg)
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }
}

impl fmt::Display for IrisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for IrisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
