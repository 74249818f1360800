use bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::geo::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerType {
    /// Self-registered player who can log in.
    #[default]
    Default,
    /// Created inline by another player, no login.
    Owned,
}

impl std::str::FromStr for PlayerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(PlayerType::Default),
            "owned" => Ok(PlayerType::Owned),
            other => Err(format!("unknown player type: {}", other)),
        }
    }
}

/// Inlined club reference. `name` is a cached copy taken when the player
/// was last written with a club change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerClub {
    pub id: ObjectId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub nickname: String,

    #[serde(default)]
    pub name: String,

    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    pub auth_token: String,

    #[serde(default)]
    pub rank: String,

    #[serde(default)]
    pub email: String,

    /// Federation licence number.
    #[serde(default)]
    pub idlicense: String,

    #[serde(default)]
    pub club: Option<PlayerClub>,

    #[serde(default)]
    pub game_ids: Vec<ObjectId>,

    #[serde(default)]
    pub owner_id: Option<ObjectId>,

    #[serde(rename = "type", default)]
    pub kind: PlayerType,

    #[serde(default)]
    pub position: Option<Position>,

    // AUTO-FIELDS, maintained by the denormalizer
    #[serde(default)]
    pub searchable_nickname: String,

    #[serde(default)]
    pub searchable_name: String,

    #[serde(default)]
    pub searchable_club_name: Option<String>,

    #[serde(default)]
    pub deleted: bool,
}

impl Player {
    pub fn new(nickname: String, name: String, kind: PlayerType) -> Self {
        let now = BsonDateTime::now();
        Self {
            id: None,
            nickname,
            name,
            created_at: now,
            updated_at: now,
            password_hash: None,
            auth_token: uuid::Uuid::new_v4().simple().to_string(),
            rank: String::new(),
            email: String::new(),
            idlicense: String::new(),
            club: None,
            game_ids: Vec::new(),
            owner_id: None,
            kind,
            position: None,
            searchable_nickname: String::new(),
            searchable_name: String::new(),
            searchable_club_name: None,
            deleted: false,
        }
    }

    pub fn club_id(&self) -> Option<ObjectId> {
        self.club.as_ref().map(|club| club.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClubRef {
    pub id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlayer {
    #[serde(default)]
    #[validate(length(max = 60, message = "Nickname must be less than 60 characters"))]
    pub nickname: String,

    #[serde(default)]
    #[validate(length(max = 120, message = "Name must be less than 120 characters"))]
    pub name: String,

    #[serde(default)]
    pub rank: String,

    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,

    #[validate(length(max = 40))]
    pub idlicense: Option<String>,

    pub club: Option<ClubRef>,

    #[serde(rename = "type")]
    pub kind: Option<String>,

    pub owner_id: Option<String>,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,

    pub position: Option<Position>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayer {
    #[validate(length(max = 60, message = "Nickname must be less than 60 characters"))]
    pub nickname: Option<String>,

    #[validate(length(max = 120, message = "Name must be less than 120 characters"))]
    pub name: Option<String>,

    pub rank: Option<String>,

    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,

    #[validate(length(max = 40))]
    pub idlicense: Option<String>,

    pub club: Option<ClubRef>,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,

    pub position: Option<Position>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_kind_under_type_key() {
        let mut player = Player::new("ana01".into(), "Ana".into(), PlayerType::Owned);
        player.owner_id = Some(ObjectId::new());
        let doc = bson::to_document(&player).unwrap();
        assert_eq!(doc.get_str("type").unwrap(), "owned");
        assert!(doc.get("_id").is_none());
        assert!(doc.get("passwordHash").is_none());
        assert_eq!(doc.get_str("authToken").unwrap().len(), 32);
    }

    #[test]
    fn missing_optional_fields_deserialize_to_defaults() {
        let doc = bson::doc! {
            "_id": ObjectId::new(),
            "createdAt": BsonDateTime::now(),
            "updatedAt": BsonDateTime::now(),
            "authToken": "t",
        };
        let player: Player = bson::from_document(doc).unwrap();
        assert_eq!(player.kind, PlayerType::Default);
        assert!(player.game_ids.is_empty());
        assert!(!player.deleted);
    }
}
