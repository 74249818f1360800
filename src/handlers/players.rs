use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use serde_with::{formats::CommaSeparator, serde_as, StringWithSeparator};

use crate::errors::Result;
use crate::handlers::{object_id, optional_object_id};
use crate::middleware::auth::Caller;
use crate::models::game::GameStatus;
use crate::models::player::{CreatePlayer, UpdatePlayer};
use crate::search::composer::{GeoRadius, PlayerFilter};
use crate::services::games::GameRead;
use crate::services::players::{PlayerGamesQuery, PlayerSearch};
use crate::state::AppState;

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlayerSearchParams {
    pub q: Option<String>,
    pub owner: Option<String>,
    pub club: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub distance: Option<f64>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub fields: Option<Vec<String>>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub sort: Option<Vec<String>>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

impl PlayerSearchParams {
    fn into_search(self) -> Result<PlayerSearch> {
        Ok(PlayerSearch {
            filter: PlayerFilter {
                q: self.q,
                owner: optional_object_id(self.owner.as_deref())?,
                club: optional_object_id(self.club.as_deref())?,
                geo: GeoRadius::from_parts(self.longitude, self.latitude, self.distance),
            },
            fields: self.fields.unwrap_or_default(),
            sort: self.sort.unwrap_or_default(),
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlayerFieldsParams {
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub fields: Option<Vec<String>>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlayerGamesParams {
    pub owned: Option<bool>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, GameStatus>>")]
    pub status: Option<Vec<GameStatus>>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub fields: Option<Vec<String>>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub populate: Option<Vec<String>>,
    #[serde_as(as = "Option<StringWithSeparator::<CommaSeparator, String>>")]
    pub sort: Option<Vec<String>>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

impl From<PlayerGamesParams> for PlayerGamesQuery {
    fn from(params: PlayerGamesParams) -> Self {
        PlayerGamesQuery {
            owned: params.owned.unwrap_or(false),
            statuses: params.status.unwrap_or_default(),
            read: GameRead {
                fields: params.fields,
                populate: params.populate,
            },
            sort: params.sort,
            limit: params.limit,
            offset: params.offset,
        }
    }
}

pub async fn search_players(
    State(state): State<AppState>,
    Query(params): Query<PlayerSearchParams>,
) -> Result<Json<Value>> {
    let players = state.players.search_players(params.into_search()?).await?;
    Ok(Json(Value::Array(players)))
}

pub async fn autocomplete_players(
    State(state): State<AppState>,
    Query(params): Query<PlayerSearchParams>,
) -> Result<Json<Value>> {
    let players = state.players.autocomplete_players(params.into_search()?).await?;
    Ok(Json(Value::Array(players)))
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PlayerFieldsParams>,
    caller: Caller,
) -> Result<Json<Value>> {
    let fields = params.fields.unwrap_or_default();
    let player = state
        .players
        .get_player(object_id(&id)?, &fields, caller.player())
        .await?;
    Ok(Json(player))
}

pub async fn get_player_games(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PlayerGamesParams>,
) -> Result<Json<Value>> {
    let games = state
        .players
        .get_player_games(object_id(&id)?, params.into())
        .await?;
    Ok(Json(Value::Array(games)))
}

pub async fn create_player(
    State(state): State<AppState>,
    Json(body): Json<CreatePlayer>,
) -> Result<Json<Value>> {
    Ok(Json(state.players.create_player(body).await?))
}

pub async fn update_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Caller,
    Json(body): Json<UpdatePlayer>,
) -> Result<Json<Value>> {
    let player = state
        .players
        .update_player(object_id(&id)?, caller.player(), body)
        .await?;
    Ok(Json(player))
}
