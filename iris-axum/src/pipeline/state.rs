use std::time::{Duration, Instant};

use iris_blob::ObjectUrl;
use iris_core::ImageHeader;
use serde::Serialize;

/// Where the identifier of an upload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// `POST`: issue a fresh identifier.
    Generate,
    /// `PUT`: the caller names the identifier.
    Provided(String),
}

/// Per-request facts gathered as the stages run.
///
/// Stages take their inputs as arguments and return their outputs; the
/// orchestrator records what later stages and the summary log need here.
#[derive(Debug)]
pub struct RequestState {
    pub started: Instant,
    pub identity: Identity,
    pub declared_size: Option<u64>,
    pub raw_size: usize,
    pub header: Option<ImageHeader>,
    pub image_id: Option<String>,
    pub storage_url: Option<ObjectUrl>,
}

impl RequestState {
    pub fn new(identity: Identity) -> Self {
        Self {
            started: Instant::now(),
            identity,
            declared_size: None,
            raw_size: 0,
            header: None,
            image_id: None,
            storage_url: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Asset locations derived from an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
    pub object_key: String,
    pub storage_url: ObjectUrl,
    pub image_url: String,
    pub thumb_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResponse {
    pub image_id: String,
    pub image_width: u32,
    pub image_height: u32,
    pub image_url: String,
    pub thumb_url: String,
}
