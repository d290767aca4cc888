use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use todo_api::v1::{FindResponse, ListMetadata, ToDoItem};

use crate::{
    auth::{requires_role, Authorizer},
    error::ApiError,
    persistence::PageRequest,
    AppState,
};

pub fn router(authorizer: &Arc<dyn Authorizer>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/todo", requires_role(post(create_todo), authorizer, "create"))
        .route("/todo", requires_role(get(get_todos), authorizer, "retrieve"))
        .route("/todo/:id", requires_role(get(get_todo), authorizer, "retrieve"))
        .route("/todo/:id", requires_role(delete(delete_todo), authorizer, "delete"))
}

// Identifiers share the range of the signed key column.
fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse::<i64>()
        .map_err(|err| err.to_string())
        .and_then(|id| u64::try_from(id).map_err(|err| err.to_string()))
        .map_err(|err| ApiError::bad_request(format!("invalid id {raw:?}: {err}")))
}

// The body is decoded by hand so that any content type is accepted and every
// decoding failure maps to a 400.
async fn create_todo(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<ToDoItem>), ApiError> {
    let mut todo: ToDoItem = serde_json::from_slice(&body).map_err(ApiError::bad_request)?;

    state.manager.create(&mut todo).await?;

    Ok((StatusCode::CREATED, Json(todo)))
}

async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;

    state.manager.delete(id).await?;

    Ok(StatusCode::OK)
}

async fn get_todos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<FindResponse>, ApiError> {
    let page = PageRequest::parse(
        params.get("offset").map(String::as_str),
        params.get("limit").map(String::as_str),
    );

    let (data, total) = state.manager.find_all(&[&page]).await?;

    Ok(Json(FindResponse {
        meta: ListMetadata { total },
        data,
    }))
}

async fn get_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ToDoItem>, ApiError> {
    let id = parse_id(&id)?;

    let todo = state.manager.find_one(id).await?;

    Ok(Json(todo))
}
