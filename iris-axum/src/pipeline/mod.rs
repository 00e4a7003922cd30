//! Upload and delete pipelines.
//!
//! ```text
//! admission → size check → buffer → type/dimension check → transform
//!     → identify → key derivation → storage dispatch → release → respond
//! ```
//!
//! Deletes run admission, key derivation and dispatch only.

pub mod stages;
pub mod state;

use axum::body::Body;
use axum::http::Request;
use iris_blob::StorageOperation;
use iris_core::IrisResult;

use crate::upload::extract_image_part;
use crate::IrisState;

pub use state::{Identity, Locations, RequestState, UploadResponse};

pub async fn upload(
    app: &IrisState,
    identity: Identity,
    request: Request<Body>,
) -> IrisResult<UploadResponse> {
    let mut state = RequestState::new(identity);
    let max = app.config.server.max_file_size;

    let provided = match &state.identity {
        Identity::Provided(raw) => Some(stages::parse_identifier(raw, app.id_extension)?),
        Identity::Generate => None,
    };

    tracing::debug!(stage = "admission");
    let part = extract_image_part(request).await?;
    state.declared_size = part.declared_size;

    stages::check_size(state.declared_size, max)?;

    // returned to the pool on every exit path below
    let mut buffer = stages::acquire_buffer(&app.pool, part.size_hint, max);
    let header = stages::read_validated(part.field, &mut buffer, max, &app.limits).await?;
    state.raw_size = buffer.len();
    state.header = Some(header);

    let output =
        stages::transform(app.transformer.as_ref(), &buffer, &header, &app.options).await?;

    let image_id = match provided {
        Some(id) => id,
        None => stages::identify(&app.ids, app.id_extension),
    };
    let locations = stages::derive_locations(&app.urls, &image_id);
    state.image_id = Some(image_id.clone());
    state.storage_url = Some(locations.storage_url.clone());

    stages::dispatch(
        &app.registry,
        StorageOperation::Write {
            target: locations.storage_url.clone(),
            payload: output,
        },
    )
    .await?;
    drop(buffer);

    tracing::info!(
        image_id = %image_id,
        storage_url = %locations.storage_url,
        width = header.width,
        height = header.height,
        raw_size = state.raw_size,
        elapsed_ms = state.elapsed().as_millis() as u64,
        options = ?app.options,
        "upload stored"
    );
    Ok(stages::respond(image_id, &header, locations))
}

pub async fn delete(app: &IrisState, raw_id: &str) -> IrisResult<()> {
    let state = RequestState::new(Identity::Provided(raw_id.to_string()));

    let image_id = stages::parse_identifier(raw_id, app.id_extension)?;
    let target = stages::storage_target(&app.urls, &image_id);
    stages::dispatch(
        &app.registry,
        StorageOperation::Delete {
            target: target.clone(),
        },
    )
    .await?;

    tracing::info!(
        image_id = %image_id,
        storage_url = %target,
        elapsed_ms = state.elapsed().as_millis() as u64,
        "image deleted"
    );
    Ok(())
}
