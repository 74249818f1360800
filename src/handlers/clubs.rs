use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::Value;

use crate::errors::Result;
use crate::handlers::object_id;
use crate::models::club::CreateClub;
use crate::state::AppState;

pub async fn create_club(
    State(state): State<AppState>,
    Json(body): Json<CreateClub>,
) -> Result<Json<Value>> {
    Ok(Json(state.clubs.create_club(body).await?))
}

pub async fn get_club(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    Ok(Json(state.clubs.get_club(object_id(&id)?).await?))
}
