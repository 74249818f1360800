pub mod clubs;
pub mod games;
pub mod players;

use axum::Router;

use crate::state::AppState;

/// Everything served under `/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/games", games::routes())
        .nest("/players", players::routes())
        .nest("/clubs", clubs::routes())
}
