use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::api::views::MetadataResponse;
use crate::error::MetadataError;
use crate::model::{Id, InstanceInfo, InstanceMetadata, RequestContext};
use crate::store::traits::Store;

pub type AppState<S> = Arc<S>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

/// Request body for create (POST) and edit (PUT): `{"metadata": {"value": v}}`
#[derive(Debug, Deserialize)]
pub struct MetadataValueBody {
    pub metadata: MetadataValue,
}

#[derive(Debug, Deserialize)]
pub struct MetadataValue {
    pub value: Value,
}

/// Request body for update (PATCH): `{"metadata": {"key": k, "value": v}}`
#[derive(Debug, Deserialize)]
pub struct MetadataRenameBody {
    pub metadata: MetadataRename,
}

#[derive(Debug, Deserialize)]
pub struct MetadataRename {
    pub key: String,
    pub value: Value,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn internal_error(message: &str) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(message)),
    )
}

fn model_error(err: MetadataError) -> HandlerError {
    // Model errors reaching the handler are either store failures or data
    // corruption; precondition/key errors are decided here before mutating.
    log::error!("Metadata model error: {}", err);
    internal_error(&err.to_string())
}

// Resolves the instance for the caller's tenant. A missing instance is a
// BadRequest, not a NotFound.
async fn resolve_instance<S: Store>(
    store: &S,
    context: &RequestContext,
    instance_id: &Id,
) -> Result<InstanceInfo, HandlerError> {
    match store.get_instance(&context.tenant_id, instance_id).await {
        Ok(Some(instance)) => Ok(instance),
        Ok(None) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(&format!(
                "Instance ID: {} not valid.",
                instance_id
            ))),
        )),
        Err(e) => Err(internal_error(&e.to_string())),
    }
}

/// Show all metadata for instance {instance_id}
pub async fn list_metadata<S: Store>(
    State(store): State<AppState<S>>,
    context: RequestContext,
    Path(instance_id): Path<Id>,
) -> Result<Json<MetadataResponse>, HandlerError> {
    log::debug!("Beginning list of instance metadata for {}.", instance_id);
    resolve_instance(&*store, &context, &instance_id).await?;

    let dbmeta = InstanceMetadata::load(&*store, &context, &instance_id)
        .await
        .map_err(model_error)?;

    log::debug!("Finished list of instance metadata for {}.", instance_id);
    Ok(Json(
        MetadataResponse::of_collection(&dbmeta).map_err(model_error)?,
    ))
}

/// Show metadata for instance {instance_id} and {key}
pub async fn show_metadata<S: Store>(
    State(store): State<AppState<S>>,
    context: RequestContext,
    Path((instance_id, key)): Path<(Id, String)>,
) -> Result<Json<MetadataResponse>, HandlerError> {
    log::debug!(
        "Beginning show metadata key {} for instance {}.",
        key,
        instance_id
    );
    resolve_instance(&*store, &context, &instance_id).await?;

    let dbmeta = InstanceMetadata::load(&*store, &context, &instance_id)
        .await
        .map_err(model_error)?;

    match dbmeta.entry_for_key(&key) {
        Some(entry) => {
            log::info!("Showing metadata key {}.", key);
            Ok(Json(MetadataResponse::of_entry(entry).map_err(model_error)?))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(&format!(
                "No metadata key {} found for instance id {}.",
                key, instance_id
            ))),
        )),
    }
}

/// Create new metadata for instance {instance_id}
///
/// body example:
/// {
///     "metadata": {
///         "value": {"foo": ["bar", "baz", 2]}
///     }
/// }
pub async fn create_metadata<S: Store>(
    State(store): State<AppState<S>>,
    context: RequestContext,
    Path((instance_id, key)): Path<(Id, String)>,
    Json(body): Json<MetadataValueBody>,
) -> Result<Json<MetadataResponse>, HandlerError> {
    log::debug!(
        "Beginning create metadata key {} for instance: {}.",
        key,
        instance_id
    );
    resolve_instance(&*store, &context, &instance_id).await?;

    let mut dbmeta = InstanceMetadata::load(&*store, &context, &instance_id)
        .await
        .map_err(model_error)?;

    if dbmeta.contains(&key) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(&format!("Key: {} already exists.", key))),
        ));
    }

    log::info!("Creating key: {}.", key);
    dbmeta
        .set(&key, &body.metadata.value)
        .await
        .map_err(model_error)?;

    let entry = dbmeta
        .entry_for_key(&key)
        .ok_or_else(|| internal_error("Metadata entry missing after create"))?;
    Ok(Json(MetadataResponse::of_entry(entry).map_err(model_error)?))
}

/// Edit metadata value for instance {instance_id} and {key}. This replaces
/// values of keys that are already present.
///
/// body example:
/// {
///     "metadata": {
///         "value": {"foo": {"bar": [2,4,3]}}
///     }
/// }
pub async fn edit_metadata<S: Store>(
    State(store): State<AppState<S>>,
    context: RequestContext,
    Path((instance_id, key)): Path<(Id, String)>,
    Json(body): Json<MetadataValueBody>,
) -> Result<StatusCode, HandlerError> {
    log::debug!(
        "Beginning edit metadata key {} for instance: {}.",
        key,
        instance_id
    );
    resolve_instance(&*store, &context, &instance_id).await?;

    let mut dbmeta = InstanceMetadata::load(&*store, &context, &instance_id)
        .await
        .map_err(model_error)?;

    if !dbmeta.contains(&key) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(&format!(
                "Key: {} not found in database, edit impossible.",
                key
            ))),
        ));
    }

    log::info!("Editing value for key: {}.", key);
    dbmeta
        .set(&key, &body.metadata.value)
        .await
        .map_err(model_error)?;

    Ok(StatusCode::OK)
}

/// Update metadata for instance {instance_id}: rename {key} to the submitted
/// key and replace its value.
///
/// body example:
/// {
///     "metadata": {
///         "key": "newKey",
///         "value": "foo"
///     }
/// }
pub async fn update_metadata<S: Store>(
    State(store): State<AppState<S>>,
    context: RequestContext,
    Path((instance_id, key)): Path<(Id, String)>,
    Json(body): Json<MetadataRenameBody>,
) -> Result<StatusCode, HandlerError> {
    log::debug!(
        "Beginning update metadata key {} for instance: {}.",
        key,
        instance_id
    );
    resolve_instance(&*store, &context, &instance_id).await?;

    let mut dbmeta = InstanceMetadata::load(&*store, &context, &instance_id)
        .await
        .map_err(model_error)?;

    if !dbmeta.contains(&key) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(&format!(
                "Metadata key: {} could not be found in the database.",
                key
            ))),
        ));
    }

    log::info!("Updating {} to {}.", key, body.metadata.key);
    // The old key is removed before the insert, even when the submitted key
    // matches it: a rename to the same key degrades to delete-then-recreate.
    dbmeta.remove(&key).await.map_err(model_error)?;
    dbmeta
        .set(&body.metadata.key, &body.metadata.value)
        .await
        .map_err(model_error)?;

    Ok(StatusCode::OK)
}

/// Delete metadata key {key} for instance {instance_id}
pub async fn delete_metadata<S: Store>(
    State(store): State<AppState<S>>,
    context: RequestContext,
    Path((instance_id, key)): Path<(Id, String)>,
) -> Result<StatusCode, HandlerError> {
    log::debug!(
        "Beginning deletion of metadata key {} for instance: {}.",
        key,
        instance_id
    );
    resolve_instance(&*store, &context, &instance_id).await?;

    let mut dbmeta = InstanceMetadata::load(&*store, &context, &instance_id)
        .await
        .map_err(model_error)?;

    if !dbmeta.contains(&key) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(&format!(
                "Metadata key: {} not present in the database.",
                key
            ))),
        ));
    }

    log::info!(
        "Deleting metadata key: {} for instance {}.",
        key,
        instance_id
    );
    dbmeta.remove(&key).await.map_err(model_error)?;

    Ok(StatusCode::OK)
}
