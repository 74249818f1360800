use bson::{doc, oid::ObjectId};

use crate::database::store::{self, DocumentStore, EntityKind, FindQuery};
use crate::errors::{AppError, Result};
use crate::models::player::Player;

/// Resolves a `(playerid, token)` pair to the stored player.
///
/// Absent values, a malformed id or a pair that matches nothing all yield
/// `None`; only store failures are errors.
pub async fn authenticate(
    store: &dyn DocumentStore,
    player_id: Option<&str>,
    token: Option<&str>,
) -> Result<Option<Player>> {
    let (Some(player_id), Some(token)) = (player_id, token) else {
        return Ok(None);
    };
    if token.is_empty() {
        return Ok(None);
    }
    let Ok(player_id) = ObjectId::parse_str(player_id) else {
        tracing::debug!(player_id, "authentication with malformed player id");
        return Ok(None);
    };

    let query = FindQuery::new(doc! {
        "_id": player_id,
        "authToken": token,
        "deleted": { "$ne": true },
    })
    .limit(1);
    let mut players: Vec<Player> = store::find_typed(store, EntityKind::Player, query).await?;
    Ok(players.pop())
}

/// The authenticated caller, or `Unauthorized`.
pub fn require(caller: Option<&Player>) -> Result<(&Player, ObjectId)> {
    let player = caller.ok_or_else(|| AppError::unauthorized("authentication required"))?;
    let id = player
        .id
        .ok_or_else(|| AppError::unauthorized("authenticated player has no id"))?;
    Ok((player, id))
}

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::internal(format!("password hashing failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::models::player::PlayerType;

    #[tokio::test]
    async fn matches_id_and_token_pair() {
        let store = MemoryStore::new();
        let player = Player::new("ana01".into(), "Ana".into(), PlayerType::Default);
        let token = player.auth_token.clone();
        let id = store::insert_entity(&store, EntityKind::Player, &player).await.unwrap().to_hex();

        let found = authenticate(&store, Some(&id), Some(&token)).await.unwrap();
        assert_eq!(found.unwrap().nickname, "ana01");

        assert!(authenticate(&store, Some(&id), Some("wrong")).await.unwrap().is_none());
        assert!(authenticate(&store, Some(&id), None).await.unwrap().is_none());
        assert!(authenticate(&store, Some("not-an-id"), Some(&token)).await.unwrap().is_none());
    }

    #[test]
    fn require_rejects_anonymous_callers() {
        assert!(matches!(require(None), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn hashes_verify() {
        let hash = hash_password("secret1").unwrap();
        assert!(bcrypt::verify("secret1", &hash).unwrap());
    }
}
