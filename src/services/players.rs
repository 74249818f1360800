use bson::{doc, oid::ObjectId};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::database::store::{self, EntityKind, FindQuery, SharedStore};
use crate::errors::{AppError, Result};
use crate::models::game::GameStatus;
use crate::models::player::{CreatePlayer, Player, PlayerClub, PlayerType, UpdatePlayer};
use crate::search::composer::{sort_document, PlayerFilter};
use crate::search::projection::FieldSelection;
use crate::services::auth;
use crate::services::cascade::{CascadeJob, CascadeQueue};
use crate::services::denormalize::{Denormalizer, PlayerChangeSet, PlayerField};
use crate::services::games::{GameRead, GameService};
use crate::services::views::{public_view, SELF_FIELDS};

pub const DEFAULT_PLAYER_LIMIT: i64 = 10;
pub const AUTOCOMPLETE_LIMIT: i64 = 5;
pub const AUTOCOMPLETE_FIELDS: [&str; 4] = ["nickname", "name", "type", "club"];
pub const AUTOCOMPLETE_SORT: &str = "name";
pub const DEFAULT_PLAYER_GAME_STATUSES: [GameStatus; 2] = [GameStatus::Ongoing, GameStatus::Finished];
pub const DEFAULT_PLAYER_GAME_SORT: &str = "-startAt";
pub const DEFAULT_PLAYER_GAME_LIMIT: i64 = 10;

/// Players have no populatable references, so every field is primary.
fn player_projection(fields: &[String]) -> Option<bson::Document> {
    FieldSelection::build(fields, &[], &[]).projection()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSearch {
    pub filter: PlayerFilter,
    pub fields: Vec<String>,
    pub sort: Vec<String>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerGamesQuery {
    pub owned: bool,
    pub statuses: Vec<GameStatus>,
    pub read: GameRead,
    pub sort: Option<Vec<String>>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

#[derive(Clone)]
pub struct PlayerService {
    store: SharedStore,
    denormalizer: Denormalizer,
    cascade: CascadeQueue,
    games: GameService,
}

impl PlayerService {
    pub fn new(store: SharedStore, denormalizer: Denormalizer, cascade: CascadeQueue, games: GameService) -> Self {
        Self {
            store,
            denormalizer,
            cascade,
            games,
        }
    }

    pub async fn search_players(&self, search: PlayerSearch) -> Result<Vec<JsonValue>> {
        let query = FindQuery::new(search.filter.to_document())
            .projection(player_projection(&search.fields))
            .sort(sort_document(&search.sort))
            .skip(search.offset.unwrap_or(0))
            .limit(search.limit.unwrap_or(DEFAULT_PLAYER_LIMIT));
        let docs = self.store.find(EntityKind::Player, query).await?;
        Ok(docs.iter().map(|d| public_view(d, &[])).collect())
    }

    /// Name-prefix style lookup for pickers. No query, no results.
    pub async fn autocomplete_players(&self, mut search: PlayerSearch) -> Result<Vec<JsonValue>> {
        if search.filter.q.as_deref().map_or(true, |q| q.trim().is_empty()) {
            return Ok(Vec::new());
        }
        if search.fields.is_empty() {
            search.fields = AUTOCOMPLETE_FIELDS.iter().map(|f| f.to_string()).collect();
        }
        if search.sort.is_empty() {
            search.sort = vec![AUTOCOMPLETE_SORT.to_string()];
        }
        search.limit = Some(search.limit.unwrap_or(AUTOCOMPLETE_LIMIT));
        self.search_players(search).await
    }

    /// Token and email are only shown to the player themself.
    pub async fn get_player(&self, id: ObjectId, fields: &[String], caller: Option<&Player>) -> Result<JsonValue> {
        let doc = self
            .store
            .find_by_id(EntityKind::Player, id, player_projection(fields))
            .await?
            .filter(|d| !d.get_bool("deleted").unwrap_or(false))
            .ok_or_else(|| AppError::not_found(format!("player {}", id)))?;

        let is_self = caller.and_then(|p| p.id) == Some(id);
        let unhide: &[&str] = if is_self { &SELF_FIELDS } else { &[] };
        Ok(public_view(&doc, unhide))
    }

    pub async fn get_player_games(&self, id: ObjectId, query: PlayerGamesQuery) -> Result<Vec<JsonValue>> {
        if self.store.find_by_id(EntityKind::Player, id, Some(doc! { "_id": 1 })).await?.is_none() {
            return Err(AppError::not_found(format!("player {}", id)));
        }

        let statuses: Vec<&str> = if query.statuses.is_empty() {
            DEFAULT_PLAYER_GAME_STATUSES.iter().map(GameStatus::as_str).collect()
        } else {
            query.statuses.iter().map(GameStatus::as_str).collect()
        };
        let mut filter = if query.owned {
            doc! { "ownerId": id }
        } else {
            doc! { "teams.players": id }
        };
        filter.insert("status", doc! { "$in": statuses });
        filter.insert("deleted", false);

        let selection = query.read.selection();
        let sort = query.sort.unwrap_or_else(|| vec![DEFAULT_PLAYER_GAME_SORT.to_string()]);
        let find = FindQuery::new(filter)
            .projection(selection.projection())
            .sort(sort_document(&sort))
            .skip(query.offset.unwrap_or(0))
            .limit(query.limit.unwrap_or(DEFAULT_PLAYER_GAME_LIMIT));

        let docs = self.store.find(EntityKind::Game, find).await?;
        self.games.render_games(docs, &selection).await
    }

    /// Returns the stored player with its token visible.
    pub async fn create_player(&self, body: CreatePlayer) -> Result<JsonValue> {
        body.validate()?;

        let kind = match body.kind.as_deref() {
            Some(raw) => raw.parse::<PlayerType>().map_err(AppError::invalid_data)?,
            None => PlayerType::Default,
        };
        let mut player = Player::new(body.nickname, body.name, kind);
        player.rank = body.rank;
        player.email = body.email.unwrap_or_default();
        player.idlicense = body.idlicense.unwrap_or_default();
        player.position = body.position;
        player.owner_id = body.owner_id.as_deref().map(ObjectId::parse_str).transpose()?;
        if let Some(club) = body.club {
            player.club = Some(PlayerClub {
                id: ObjectId::parse_str(&club.id)?,
                name: None,
            });
        }
        if let Some(password) = body.password.as_deref() {
            player.password_hash = Some(auth::hash_password(password)?);
        }

        self.denormalizer.prepare_player(&mut player, &PlayerChangeSet::all()).await;
        let id = store::insert_entity(self.store.as_ref(), EntityKind::Player, &player).await?;
        player.id = Some(id);
        tracing::info!(player_id = %id, kind = ?player.kind, "✅ Player created");

        Ok(public_view(&bson::to_document(&player)?, &SELF_FIELDS))
    }

    pub async fn update_player(&self, id: ObjectId, caller: Option<&Player>, body: UpdatePlayer) -> Result<JsonValue> {
        let (_, caller_id) = auth::require(caller)?;
        if caller_id != id {
            return Err(AppError::unauthorized("players can only update themselves"));
        }
        body.validate()?;

        let old: Player = store::load(self.store.as_ref(), EntityKind::Player, id)
            .await?
            .filter(|p: &Player| !p.deleted)
            .ok_or_else(|| AppError::not_found(format!("player {}", id)))?;

        let mut player = old.clone();
        if let Some(nickname) = body.nickname {
            player.nickname = nickname;
        }
        if let Some(name) = body.name {
            player.name = name;
        }
        if let Some(rank) = body.rank {
            player.rank = rank;
        }
        if let Some(email) = body.email {
            player.email = email;
        }
        if let Some(idlicense) = body.idlicense {
            player.idlicense = idlicense;
        }
        if let Some(position) = body.position {
            player.position = Some(position);
        }
        if let Some(club) = body.club {
            player.club = Some(PlayerClub {
                id: ObjectId::parse_str(&club.id)?,
                name: None,
            });
        }
        if let Some(password) = body.password.as_deref() {
            player.password_hash = Some(auth::hash_password(password)?);
        }
        player.updated_at = bson::DateTime::now();

        let changes = PlayerChangeSet::between(Some(&old), &player);
        if !changes.contains(PlayerField::Club) {
            // same club id: keep the cached name
            player.club = old.club.clone();
            player.searchable_club_name = old.searchable_club_name.clone();
        }
        self.denormalizer.prepare_player(&mut player, &changes).await;
        store::replace_entity(self.store.as_ref(), EntityKind::Player, id, &player).await?;
        tracing::info!(player_id = %id, ?changes, "Player updated");

        if !changes.is_empty() {
            self.cascade.enqueue(CascadeJob::player_projection(id, changes));
        }
        Ok(public_view(&bson::to_document(&player)?, &SELF_FIELDS))
    }
}
