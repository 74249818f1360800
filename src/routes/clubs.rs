use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::clubs;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(clubs::create_club))
        .route("/:id", get(clubs::get_club))
}
