use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use iris_core::IrisError;

/// An [`IrisError`] on its way to the client.
///
/// `debug` decides whether the internal message is returned in place of the
/// public one.
#[derive(Debug)]
pub struct ApiError {
    pub error: IrisError,
    pub debug: bool,
}

impl ApiError {
    pub fn new(error: IrisError, debug: bool) -> Self {
        Self { error, debug }
    }
}

impl From<IrisError> for ApiError {
    fn from(error: IrisError) -> Self {
        Self::new(error, false)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::new(IrisError::normalize(e), false)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log_error(&self.error);
        let status =
            StatusCode::from_u16(self.error.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.error.to_json(self.debug))).into_response()
    }
}

/// Every error response passes through here. 404 logs at info, server errors
/// at error with the source chain, the rest at debug.
fn log_error(error: &IrisError) {
    let code = error.code();
    match code {
        404 => tracing::info!(code, name = error.name(), message = %error.message, "not found"),
        500.. => match &error.source {
            Some(source) => tracing::error!(
                code,
                name = error.name(),
                message = %error.message,
                source = format!("{source:#}"),
                "request failed"
            ),
            None => tracing::error!(code, name = error.name(), message = %error.message, "request failed"),
        },
        _ => tracing::debug!(code, name = error.name(), message = %error.message, "request rejected"),
    }
}
