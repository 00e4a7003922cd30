//! iris-axum: the HTTP surface of the Iris gateway.
//!
//! Routes:
//!
//! | method | path           | does                              |
//! |--------|----------------|-----------------------------------|
//! | GET    | `/health`      | liveness                          |
//! | POST   | `/v1/1i`       | upload with a generated id        |
//! | PUT    | `/v1/1i/{id}`  | upload under the caller's id      |
//! | DELETE | `/v1/1i/{id}`  | delete, missing objects included  |

pub mod app;
mod error;
pub mod pipeline;
pub mod rest;
pub mod state;
pub mod upload;

pub use app::{iris, IrisApp, SHUTDOWN_GRACE};
pub use error::ApiError;
pub use pipeline::{Identity, UploadResponse};
pub use state::IrisState;
