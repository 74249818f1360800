use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use serde_with::{formats::CommaSeparator, serde_as, StringWithSeparator};

use crate::errors::{AppError, Result};
use crate::handlers::{object_id, optional_object_id};
use crate::middleware::auth::Caller;
use crate::models::game::{CreateGame, GameStatus, UpdateGame};
use crate::models::stream::{CreateStreamItem, StreamItemView, UpdateStreamItem};
use crate::search::composer::{GameFilter, GeoRadius};
use crate::services::games::{stream_author, GameRead, GameSearch};
use crate::services::stream::StreamQuery;
use crate::state::AppState;

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReadParams {
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub fields: Option<Vec<String>>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub populate: Option<Vec<String>>,
}

impl From<ReadParams> for GameRead {
    fn from(params: ReadParams) -> Self {
        GameRead {
            fields: params.fields,
            populate: params.populate,
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GameSearchParams {
    pub q: Option<String>,
    pub club: Option<String>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, GameStatus>>")]
    pub status: Option<Vec<GameStatus>>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub distance: Option<f64>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub fields: Option<Vec<String>>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub populate: Option<Vec<String>>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub sort: Option<Vec<String>>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

impl GameSearchParams {
    fn into_search(self) -> Result<GameSearch> {
        Ok(GameSearch {
            filter: GameFilter {
                q: self.q,
                club: optional_object_id(self.club.as_deref())?,
                statuses: self.status.unwrap_or_default(),
                geo: GeoRadius::from_parts(self.longitude, self.latitude, self.distance),
            },
            read: GameRead {
                fields: self.fields,
                populate: self.populate,
            },
            sort: self.sort,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    pub after: Option<String>,
    pub lastid: Option<String>,
    pub limit: Option<usize>,
}

/// `after` accepts RFC 3339 timestamps or bare dates (midnight UTC).
fn parse_after(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
        .ok_or_else(|| AppError::invalid_data(format!("after is not a date: {:?}", raw)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthorParams {
    pub fbid: Option<String>,
}

pub async fn search_games(
    State(state): State<AppState>,
    Query(params): Query<GameSearchParams>,
) -> Result<Json<Value>> {
    let games = state.games.search_games(params.into_search()?).await?;
    Ok(Json(Value::Array(games)))
}

pub async fn get_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ReadParams>,
) -> Result<Json<Value>> {
    let game = state.games.get_game(object_id(&id)?, &params.into()).await?;
    Ok(Json(game))
}

pub async fn create_game(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<CreateGame>,
) -> Result<Json<Value>> {
    let game = state.games.create_game(caller.player(), body).await?;
    let id = game.id.ok_or_else(|| AppError::internal("created game has no id"))?;
    Ok(Json(state.games.get_game(id, &GameRead::default()).await?))
}

pub async fn update_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Caller,
    Json(body): Json<UpdateGame>,
) -> Result<Json<Value>> {
    let id = object_id(&id)?;
    state.games.update_game(id, caller.player(), body).await?;
    Ok(Json(state.games.get_game(id, &GameRead::default()).await?))
}

pub async fn delete_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Caller,
) -> Result<Json<Value>> {
    state.games.soft_delete_game(object_id(&id)?, caller.player()).await?;
    Ok(Json(json!({ "success": true })))
}

// ========== STREAM ==========

pub async fn get_game_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<StreamParams>,
) -> Result<Json<Vec<StreamItemView>>> {
    let query = StreamQuery {
        after: params.after.as_deref().map(parse_after).transpose()?,
        last_id: optional_object_id(params.lastid.as_deref())?,
        limit: params.limit,
    };
    let items = state.games.get_game_stream(object_id(&id)?, &query).await?;
    Ok(Json(items))
}

pub async fn add_stream_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<AuthorParams>,
    caller: Caller,
    Json(body): Json<CreateStreamItem>,
) -> Result<Json<StreamItemView>> {
    let game_id = object_id(&id)?;
    let owner = stream_author(caller.player(), params.fbid.as_deref(), &body)?;
    let item = state.games.append_stream_item(game_id, owner, body.text()).await?;
    Ok(Json(item))
}

pub async fn update_stream_item(
    State(state): State<AppState>,
    Path((id, stream_id)): Path<(String, String)>,
    caller: Caller,
    Json(body): Json<UpdateStreamItem>,
) -> Result<Json<StreamItemView>> {
    let item = state
        .games
        .update_stream_item(object_id(&id)?, object_id(&stream_id)?, caller.player(), body)
        .await?;
    Ok(Json(item))
}

pub async fn delete_stream_item(
    State(state): State<AppState>,
    Path((id, stream_id)): Path<(String, String)>,
    caller: Caller,
) -> Result<Json<Value>> {
    state
        .games
        .soft_delete_stream_item(object_id(&id)?, object_id(&stream_id)?, caller.player())
        .await?;
    Ok(Json(json!({ "success": true })))
}
