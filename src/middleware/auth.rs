use axum::{
    async_trait,
    extract::{FromRequestParts, Query, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::errors::Result;
use crate::models::player::Player;
use crate::services::auth;
use crate::state::AppState;

/// Credentials travel as query parameters on every request.
#[derive(Debug, Default, Deserialize)]
pub struct CallerQuery {
    pub playerid: Option<String>,
    pub token: Option<String>,
}

/// The authenticated player behind a request, if any.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<Player>);

impl Caller {
    pub fn player(&self) -> Option<&Player> {
        self.0.as_ref()
    }
}

/// Resolves `playerid`/`token` once per request and stores the result as a
/// [`Caller`] extension. Anonymous requests pass through; operations that
/// need a player reject them further down.
pub async fn identify_caller(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let credentials = Query::<CallerQuery>::try_from_uri(request.uri())
        .map(|Query(credentials)| credentials)
        .unwrap_or_default();

    let player = auth::authenticate(
        state.store.as_ref(),
        credentials.playerid.as_deref(),
        credentials.token.as_deref(),
    )
    .await?;

    match (&player, &credentials.playerid) {
        (Some(player), _) => tracing::debug!(nickname = %player.nickname, "🔐 Caller authenticated"),
        (None, Some(player_id)) => tracing::debug!(player_id = %player_id, "credentials rejected"),
        (None, None) => {}
    }

    request.extensions_mut().insert(Caller(player));
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request as HttpRequest, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    use super::*;
    use crate::config::CascadeConfig;
    use crate::database::memory::MemoryStore;
    use crate::database::store::{self, EntityKind};
    use crate::models::player::PlayerType;

    async fn whoami(caller: Caller) -> String {
        caller
            .player()
            .map(|p| p.nickname.clone())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    async fn app() -> (Router, String, String) {
        let store = Arc::new(MemoryStore::new());
        let player = Player::new("ana01".into(), "Ana".into(), PlayerType::Default);
        let token = player.auth_token.clone();
        let id = store::insert_entity(store.as_ref(), EntityKind::Player, &player)
            .await
            .unwrap()
            .to_hex();

        let (state, _worker) = AppState::new(store, CascadeConfig::default());
        let router = Router::new()
            .route("/", get(whoami))
            .layer(axum::middleware::from_fn_with_state(state.clone(), identify_caller))
            .with_state(state);
        (router, id, token)
    }

    async fn body_text(router: Router, uri: &str) -> String {
        let response = router
            .oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn resolves_matching_credentials() {
        let (router, id, token) = app().await;
        let text = body_text(router, &format!("/?playerid={}&token={}", id, token)).await;
        assert_eq!(text, "ana01");
    }

    #[tokio::test]
    async fn wrong_or_missing_credentials_are_anonymous() {
        let (router, id, _) = app().await;
        assert_eq!(body_text(router.clone(), &format!("/?playerid={}&token=nope", id)).await, "anonymous");
        assert_eq!(body_text(router, "/").await, "anonymous");
    }
}
