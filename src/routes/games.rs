use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::games;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(games::search_games).post(games::create_game))
        .route(
            "/:id",
            get(games::get_game)
                .post(games::update_game)
                .delete(games::delete_game),
        )
        .route(
            "/:id/stream",
            get(games::get_game_stream).post(games::add_stream_item),
        )
        .route(
            "/:id/stream/:streamid",
            post(games::update_stream_item).delete(games::delete_stream_item),
        )
}
