use axum::{routing::get, Router};

use crate::handlers::players;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(players::search_players).post(players::create_player))
        .route("/autocomplete", get(players::autocomplete_players))
        .route("/:id", get(players::get_player).post(players::update_player))
        .route("/:id/games", get(players::get_player_games))
}
