use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use tablestore_core::{entity::json::entity_from_json, DynamicEntity, RepositoryError};

use crate::{handlers::AppError, state::AppState};

/// Query string of the update route.
#[derive(Debug, Deserialize)]
pub struct UpdateParams {
    #[serde(rename = "tableName")]
    pub table_name: Option<String>,
}

/// List every entity of a table (GET /{table_name}).
pub async fn list_entities(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<DynamicEntity>>, AppError> {
    let Path(table_name) = path?;
    let entities = state.connector.get_full_list(Some(&table_name)).await?;
    Ok(Json(entities))
}

/// List the entities of one partition (GET /{table_name}/{partition_key}).
pub async fn list_partition(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Json<Vec<DynamicEntity>>, AppError> {
    let Path((table_name, partition_key)) = path?;
    let entities = state
        .connector
        .get_list(&partition_key, Some(&table_name))
        .await?;
    Ok(Json(entities))
}

/// Get a single entity (GET /{table_name}/{partition_key}/{row_key}).
pub async fn get_entity(
    State(state): State<AppState>,
    path: Result<Path<(String, String, String)>, PathRejection>,
) -> Result<Json<DynamicEntity>, AppError> {
    let Path((table_name, partition_key, row_key)) = path?;
    state
        .connector
        .get_item(&partition_key, &row_key, Some(&table_name))
        .await?
        .map(Json)
        .ok_or_else(|| RepositoryError::entity_not_found(&partition_key, &row_key).into())
}

/// Insert one entity, or a batch when the body is an array (POST /{table_name}).
///
/// Responds with 201 and the stored record(s), including `Timestamp` and `odata.etag`.
pub async fn create_entities(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let Path(table_name) = path?;
    let Json(body) = payload?;

    match body {
        Value::Object(map) => {
            let entity = entity_from_json(map)?;
            state.connector.insert(&entity, Some(&table_name)).await?;
            let stored = read_back(&state, entity, &table_name).await?;

            Ok((StatusCode::CREATED, Json(stored)).into_response())
        }
        Value::Array(items) => {
            let entities = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(map) => entity_from_json(map),
                    other => Err(RepositoryError::InvalidData(format!(
                        "batch item {index} must be a JSON object, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            state
                .connector
                .insert_batch(&entities, Some(&table_name))
                .await?;

            let mut stored = Vec::with_capacity(entities.len());
            for entity in entities {
                stored.push(read_back(&state, entity, &table_name).await?);
            }

            Ok((StatusCode::CREATED, Json(stored)).into_response())
        }
        other => Err(RepositoryError::InvalidData(format!(
            "request body must be a JSON object or array, got {other}"
        ))
        .into()),
    }
}

/// Insert or replace an entity (PUT /{id}?tableName=).
///
/// The entity is addressed by the keys in the body; the path segment is not used.
pub async fn update_entity(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<UpdateParams>, QueryRejection>,
    payload: Result<Json<DynamicEntity>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Path(_id) = path?;
    let Query(params) = query?;
    let Json(entity) = payload?;
    state
        .connector
        .update(&entity, params.table_name.as_deref())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete an entity (DELETE /{table_name}/{partition_key}/{row_key}).
pub async fn delete_entity(
    State(state): State<AppState>,
    path: Result<Path<(String, String, String)>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path((table_name, partition_key, row_key)) = path?;
    state
        .connector
        .delete(&partition_key, &row_key, Some(&table_name))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// The record as the store holds it after a write, or `entity` when it is already gone.
async fn read_back(
    state: &AppState,
    entity: DynamicEntity,
    table_name: &str,
) -> Result<DynamicEntity, AppError> {
    let stored = state
        .connector
        .get_item(&entity.partition_key, &entity.row_key, Some(table_name))
        .await?;
    Ok(stored.unwrap_or(entity))
}
