use bson::{oid::ObjectId, DateTime as BsonDateTime};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::geo::Position;
use crate::models::stream::StreamItem;

pub const TEAMS_PER_GAME: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Singles,
    Doubles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Created,
    Ongoing,
    Finished,
    Canceled,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Created => "created",
            GameStatus::Ongoing => "ongoing",
            GameStatus::Finished => "finished",
            GameStatus::Canceled => "canceled",
        }
    }
}

impl std::str::FromStr for GameStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(GameStatus::Created),
            "ongoing" => Ok(GameStatus::Ongoing),
            "finished" => Ok(GameStatus::Finished),
            "canceled" => Ok(GameStatus::Canceled),
            other => Err(format!("unknown game status: {}", other)),
        }
    }
}

/// Embedded team. References are stored under `players` so that the public
/// populate path is `teams.players`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "players", default)]
    pub player_ids: Vec<ObjectId>,

    #[serde(default)]
    pub points: String,
}

/// Free-form match details kept alongside the score sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOptions {
    #[serde(default = "default_subtype")]
    pub subtype: String,

    #[serde(default)]
    pub score: String,

    #[serde(default)]
    pub court: String,

    #[serde(default)]
    pub surface: String,

    #[serde(default)]
    pub tour: String,
}

fn default_subtype() -> String {
    "A".to_string()
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            subtype: default_subtype(),
            score: String::new(),
            court: String::new(),
            surface: String::new(),
            tour: String::new(),
        }
    }
}

impl GameOptions {
    /// Overwrites only the details present in `input`.
    pub fn apply(&mut self, input: GameOptionsInput) {
        let GameOptionsInput { subtype, score, court, surface, tour } = input;
        for (slot, value) in [
            (&mut self.subtype, subtype),
            (&mut self.score, score),
            (&mut self.court, court),
            (&mut self.surface, surface),
            (&mut self.tour, tour),
        ] {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
    pub start_at: BsonDateTime,

    #[serde(default)]
    pub end_at: Option<BsonDateTime>,

    pub owner_id: ObjectId,

    #[serde(default)]
    pub position: Option<Position>,

    #[serde(default)]
    pub country: String,

    #[serde(default)]
    pub city: String,

    pub sport: String,

    #[serde(default)]
    pub match_type: MatchType,

    #[serde(default)]
    pub sets: String,

    #[serde(default)]
    pub options: GameOptions,

    pub teams: Vec<Team>,

    #[serde(default)]
    pub stream: Vec<StreamItem>,

    #[serde(default)]
    pub status: GameStatus,

    // AUTO-FIELDS, maintained by the denormalizer
    #[serde(default)]
    pub searchable_city: String,

    #[serde(default)]
    pub searchable_player_names: Vec<String>,

    #[serde(default)]
    pub searchable_player_nicknames: Vec<String>,

    #[serde(default)]
    pub searchable_player_club_ids: Vec<ObjectId>,

    #[serde(default)]
    pub searchable_player_club_names: Vec<String>,

    #[serde(default)]
    pub deleted: bool,
}

impl Game {
    pub fn new(owner_id: ObjectId, sport: String) -> Self {
        let now = BsonDateTime::now();
        Self {
            id: None,
            created_at: now,
            updated_at: now,
            start_at: now,
            end_at: None,
            owner_id,
            position: None,
            country: String::new(),
            city: String::new(),
            sport,
            match_type: MatchType::default(),
            sets: String::new(),
            options: GameOptions::default(),
            teams: vec![Team::default(), Team::default()],
            stream: Vec::new(),
            status: GameStatus::default(),
            searchable_city: String::new(),
            searchable_player_names: Vec::new(),
            searchable_player_nicknames: Vec::new(),
            searchable_player_club_ids: Vec::new(),
            searchable_player_club_names: Vec::new(),
            deleted: false,
        }
    }

    /// Player ids across both teams, in team order, without duplicates.
    pub fn member_ids(&self) -> Vec<ObjectId> {
        member_ids_of(&self.teams)
    }

    pub fn touch(&mut self) {
        self.updated_at = BsonDateTime::now();
    }
}

pub fn member_ids_of(teams: &[Team]) -> Vec<ObjectId> {
    let mut ids: Vec<ObjectId> = Vec::new();
    for id in teams.iter().flat_map(|team| team.player_ids.iter()) {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
    ids
}

// ========== REQUEST BODIES ==========

/// A team slot is either an existing player id or an inline player that the
/// caller creates and owns.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TeamMemberInput {
    Existing(String),
    Owned(OwnedPlayerInput),
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnedPlayerInput {
    pub name: String,

    #[serde(default)]
    pub nickname: String,

    #[serde(default)]
    pub rank: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamInput {
    #[serde(default)]
    pub points: String,

    #[serde(default)]
    pub players: Vec<TeamMemberInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct GameOptionsInput {
    #[validate(length(max = 20))]
    pub subtype: Option<String>,

    #[validate(length(max = 80))]
    pub score: Option<String>,

    #[validate(length(max = 80))]
    pub court: Option<String>,

    #[validate(length(max = 80))]
    pub surface: Option<String>,

    #[validate(length(max = 80))]
    pub tour: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGame {
    pub sport: Option<String>,
    pub status: Option<GameStatus>,

    #[validate(length(max = 80))]
    pub country: Option<String>,

    #[validate(length(max = 120))]
    pub city: Option<String>,

    pub position: Option<Position>,
    pub match_type: Option<MatchType>,

    #[validate(length(max = 80))]
    pub sets: Option<String>,

    #[validate(nested)]
    pub options: Option<GameOptionsInput>,

    pub start_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub teams: Vec<TeamInput>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGame {
    pub status: Option<GameStatus>,

    #[validate(length(max = 80))]
    pub country: Option<String>,

    #[validate(length(max = 120))]
    pub city: Option<String>,

    pub position: Option<Position>,
    pub match_type: Option<MatchType>,

    #[validate(length(max = 80))]
    pub sets: Option<String>,

    #[validate(nested)]
    pub options: Option<GameOptionsInput>,

    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub teams: Option<Vec<TeamInput>>,
}
