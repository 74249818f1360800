use std::collections::HashMap;

use bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::database::store::{self, EntityKind, FindQuery, SharedStore};
use crate::errors::{AppError, Result};
use crate::models::game::{CreateGame, Game, Team, TeamInput, TeamMemberInput, UpdateGame, TEAMS_PER_GAME};
use crate::models::player::{Player, PlayerType};
use crate::models::stream::{CreateStreamItem, StreamData, StreamItem, StreamItemView, StreamOwner, UpdateStreamItem};
use crate::search::composer::{sort_document, GameFilter};
use crate::search::projection::FieldSelection;
use crate::services::auth;
use crate::services::cascade::{CascadeJob, CascadeQueue};
use crate::services::denormalize::{Denormalizer, MembershipDelta, PlayerChangeSet};
use crate::services::stream::{self, StreamQuery};
use crate::services::views::public_view;

pub const TEAM_PLAYERS: &str = "teams.players";
pub const GAME_POPULATABLE: [&str; 1] = [TEAM_PLAYERS];

pub const DEFAULT_GAME_FIELDS: &str = "sport,status,ownerId,createdAt,startAt,updatedAt,endAt,country,city,position,matchType,sets,options,teams,teams.players.name,teams.players.nickname,teams.players.club,teams.players.rank,teams.players.type,teams.players.ownerId";
pub const DEFAULT_GAME_SORT: &str = "-startAt";
pub const DEFAULT_GAME_LIMIT: i64 = 30;

pub fn comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Field and populate directives for a game read. `None` means "use the
/// default"; an empty list means "nothing".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameRead {
    pub fields: Option<Vec<String>>,
    pub populate: Option<Vec<String>>,
}

impl GameRead {
    pub fn selection(&self) -> FieldSelection {
        let fields = self.fields.clone().unwrap_or_else(|| comma_list(DEFAULT_GAME_FIELDS));
        let populate = self.populate.clone().unwrap_or_else(|| vec![TEAM_PLAYERS.to_string()]);
        FieldSelection::build(&fields, &populate, &GAME_POPULATABLE)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameSearch {
    pub filter: GameFilter,
    pub read: GameRead,
    pub sort: Option<Vec<String>>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

#[derive(Clone)]
pub struct GameService {
    store: SharedStore,
    denormalizer: Denormalizer,
    cascade: CascadeQueue,
}

impl GameService {
    pub fn new(store: SharedStore, denormalizer: Denormalizer, cascade: CascadeQueue) -> Self {
        Self {
            store,
            denormalizer,
            cascade,
        }
    }

    // ========== READS ==========

    pub async fn search_games(&self, search: GameSearch) -> Result<Vec<JsonValue>> {
        let selection = search.read.selection();
        let sort = search.sort.unwrap_or_else(|| vec![DEFAULT_GAME_SORT.to_string()]);
        let query = FindQuery::new(search.filter.to_document())
            .projection(selection.projection())
            .sort(sort_document(&sort))
            .skip(search.offset.unwrap_or(0))
            .limit(search.limit.unwrap_or(DEFAULT_GAME_LIMIT));

        let docs = self.store.find(EntityKind::Game, query).await?;
        tracing::debug!(count = docs.len(), "games search");
        self.render_games(docs, &selection).await
    }

    pub async fn get_game(&self, id: ObjectId, read: &GameRead) -> Result<JsonValue> {
        let selection = read.selection();
        let query = FindQuery::new(doc! { "_id": id, "deleted": false })
            .projection(selection.projection())
            .limit(1);
        let docs = self.store.find(EntityKind::Game, query).await?;
        if docs.is_empty() {
            return Err(AppError::not_found(format!("game {}", id)));
        }
        let mut views = self.render_games(docs, &selection).await?;
        views
            .pop()
            .ok_or_else(|| AppError::not_found(format!("game {}", id)))
    }

    pub async fn get_game_stream(&self, id: ObjectId, query: &StreamQuery) -> Result<Vec<StreamItemView>> {
        let game = self.load_live(id).await?;
        let page = stream::select_page(&game.stream, query);
        stream::resolve_owners(self.store.as_ref(), page).await
    }

    /// Projected game documents as client JSON, with team players expanded
    /// when the selection populates them. One player lookup per call.
    pub(crate) async fn render_games(&self, docs: Vec<Document>, selection: &FieldSelection) -> Result<Vec<JsonValue>> {
        let mut views: Vec<JsonValue> = docs.iter().map(|d| public_view(d, &[])).collect();
        if !selection.populates(TEAM_PLAYERS) {
            return Ok(views);
        }

        let mut player_ids: Vec<ObjectId> = Vec::new();
        for id in docs.iter().flat_map(team_player_ids) {
            if !player_ids.contains(&id) {
                player_ids.push(id);
            }
        }
        if player_ids.is_empty() {
            return Ok(views);
        }

        let query = FindQuery::new(doc! { "_id": { "$in": player_ids } })
            .projection(selection.populated_projection(TEAM_PLAYERS));
        let players: HashMap<String, JsonValue> = self
            .store
            .find(EntityKind::Player, query)
            .await?
            .iter()
            .filter_map(|p| Some((p.get_object_id("_id").ok()?.to_hex(), public_view(p, &[]))))
            .collect();

        for view in views.iter_mut() {
            let Some(teams) = view.get_mut("teams").and_then(JsonValue::as_array_mut) else {
                continue;
            };
            for team in teams.iter_mut() {
                if let Some(refs) = team.get_mut("players").and_then(JsonValue::as_array_mut) {
                    let populated: Vec<JsonValue> = refs
                        .iter()
                        .filter_map(|id| id.as_str().and_then(|id| players.get(id)).cloned())
                        .collect();
                    *refs = populated;
                }
            }
        }
        Ok(views)
    }

    // ========== WRITES ==========

    pub async fn create_game(&self, caller: Option<&Player>, body: CreateGame) -> Result<Game> {
        let (_, caller_id) = auth::require(caller)?;
        body.validate()?;

        let (teams, owned) = self.resolve_teams(caller_id, body.teams).await?;
        let mut game = Game::new(caller_id, body.sport.unwrap_or_else(|| "tennis".to_string()));
        game.status = body.status.unwrap_or_default();
        game.country = body.country.unwrap_or_default();
        game.city = body.city.unwrap_or_default();
        game.position = body.position;
        game.match_type = body.match_type.unwrap_or_default();
        game.sets = body.sets.unwrap_or_default();
        if let Some(options) = body.options {
            game.options.apply(options);
        }
        if let Some(start_at) = body.start_at {
            game.start_at = BsonDateTime::from_chrono(start_at);
        }
        game.teams = teams;

        let delta = self.denormalizer.prepare_game(&mut game, true, &owned).await?;
        let id = store::insert_entity(self.store.as_ref(), EntityKind::Game, &game).await?;
        game.id = Some(id);
        tracing::info!(game_id = %id, owner_id = %caller_id, "✅ Game created");
        self.store_owned_players(&owned).await?;

        self.enqueue_membership(id, delta);
        Ok(game)
    }

    pub async fn update_game(&self, id: ObjectId, caller: Option<&Player>, body: UpdateGame) -> Result<Game> {
        let (_, caller_id) = auth::require(caller)?;
        body.validate()?;

        let mut game = self.load_live(id).await?;
        if game.owner_id != caller_id {
            return Err(AppError::unauthorized("you are not the owner of the game"));
        }

        if let Some(status) = body.status {
            game.status = status;
        }
        if let Some(country) = body.country {
            game.country = country;
        }
        if let Some(city) = body.city {
            game.city = city;
        }
        if let Some(position) = body.position {
            game.position = Some(position);
        }
        if let Some(match_type) = body.match_type {
            game.match_type = match_type;
        }
        if let Some(sets) = body.sets {
            game.sets = sets;
        }
        if let Some(options) = body.options {
            game.options.apply(options);
        }
        if let Some(start_at) = body.start_at {
            game.start_at = BsonDateTime::from_chrono(start_at);
        }
        if let Some(end_at) = body.end_at {
            game.end_at = Some(BsonDateTime::from_chrono(end_at));
        }
        let (teams_changed, owned) = match body.teams {
            Some(inputs) => {
                let (teams, owned) = self.resolve_teams(caller_id, inputs).await?;
                game.teams = teams;
                (true, owned)
            }
            None => (false, Vec::new()),
        };
        game.touch();

        let delta = self.denormalizer.prepare_game(&mut game, teams_changed, &owned).await?;
        store::replace_entity(self.store.as_ref(), EntityKind::Game, id, &game).await?;
        tracing::info!(game_id = %id, teams_changed, "Game updated");
        self.store_owned_players(&owned).await?;

        self.enqueue_membership(id, delta);
        Ok(game)
    }

    /// First delete flags the game and unlinks it from its players. Deleting
    /// again is a no-op.
    pub async fn soft_delete_game(&self, id: ObjectId, caller: Option<&Player>) -> Result<()> {
        let (_, caller_id) = auth::require(caller)?;

        let mut game: Game = store::load(self.store.as_ref(), EntityKind::Game, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("game {}", id)))?;
        if game.owner_id != caller_id {
            return Err(AppError::unauthorized("you are not the owner of the game"));
        }
        if game.deleted {
            tracing::debug!(game_id = %id, "game already deleted");
            return Ok(());
        }

        game.deleted = true;
        game.touch();
        store::replace_entity(self.store.as_ref(), EntityKind::Game, id, &game).await?;
        tracing::info!(game_id = %id, "🗑️ Game soft-deleted");

        self.enqueue_membership(
            id,
            MembershipDelta {
                added: Vec::new(),
                removed: game.member_ids(),
            },
        );
        Ok(())
    }

    // ========== STREAM ==========

    pub async fn append_stream_item(
        &self,
        game_id: ObjectId,
        owner: StreamOwner,
        text: Option<String>,
    ) -> Result<StreamItemView> {
        let mut game = self.load_live(game_id).await?;
        game.stream.push(StreamItem::comment(owner, text));
        game.touch();
        store::replace_entity(self.store.as_ref(), EntityKind::Game, game_id, &game).await?;

        let appended = game
            .stream
            .pop()
            .ok_or_else(|| AppError::internal("no stream item added"))?;
        tracing::info!(game_id = %game_id, item_id = %appended.id, "Stream item appended");
        self.resolve_one(appended).await
    }

    pub async fn update_stream_item(
        &self,
        game_id: ObjectId,
        item_id: ObjectId,
        caller: Option<&Player>,
        body: UpdateStreamItem,
    ) -> Result<StreamItemView> {
        auth::require(caller)?;
        body.validate()?;

        let mut game = self.load_live(game_id).await?;
        let index = stream::position(&game.stream, item_id)
            .filter(|&i| !game.stream[i].deleted)
            .ok_or_else(|| AppError::not_found(format!("stream item {}", item_id)))?;

        let item = &mut game.stream[index];
        if let Some(text) = body.data.and_then(|data| data.text) {
            item.data = Some(StreamData { text });
        }
        item.updated_at = BsonDateTime::now();
        let updated = item.clone();

        store::replace_entity(self.store.as_ref(), EntityKind::Game, game_id, &game).await?;
        self.resolve_one(updated).await
    }

    pub async fn soft_delete_stream_item(
        &self,
        game_id: ObjectId,
        item_id: ObjectId,
        caller: Option<&Player>,
    ) -> Result<()> {
        auth::require(caller)?;

        let mut game = self.load_live(game_id).await?;
        let index = stream::position(&game.stream, item_id)
            .ok_or_else(|| AppError::not_found(format!("stream item {}", item_id)))?;

        let item = &mut game.stream[index];
        if item.deleted {
            return Ok(());
        }
        item.deleted = true;
        item.updated_at = BsonDateTime::now();

        store::replace_entity(self.store.as_ref(), EntityKind::Game, game_id, &game).await?;
        tracing::info!(game_id = %game_id, item_id = %item_id, "Stream item soft-deleted");
        Ok(())
    }

    // ========== HELPERS ==========

    async fn load_live(&self, id: ObjectId) -> Result<Game> {
        match store::load::<Game>(self.store.as_ref(), EntityKind::Game, id).await? {
            Some(game) if !game.deleted => Ok(game),
            _ => Err(AppError::not_found(format!("game {}", id))),
        }
    }

    async fn resolve_one(&self, item: StreamItem) -> Result<StreamItemView> {
        stream::resolve_owners(self.store.as_ref(), vec![item])
            .await?
            .pop()
            .ok_or_else(|| AppError::internal("stream item lost during owner resolution"))
    }

    fn enqueue_membership(&self, game_id: ObjectId, delta: MembershipDelta) {
        if !delta.is_empty() {
            self.cascade.enqueue(CascadeJob::player_games(game_id, delta));
        }
    }

    /// Turns team inputs into stored teams. Referenced ids must exist; inline
    /// players are created as `owned` by the caller, only after every
    /// reference checked out.
    /// Validates team inputs and builds the teams. Inline players get their
    /// ids here but are returned unsaved; [`Self::store_owned_players`]
    /// writes them once the game itself is stored.
    async fn resolve_teams(&self, caller_id: ObjectId, inputs: Vec<TeamInput>) -> Result<(Vec<Team>, Vec<Player>)> {
        if inputs.len() != TEAMS_PER_GAME {
            return Err(AppError::invalid_data(format!("a game needs exactly {} teams", TEAMS_PER_GAME)));
        }
        if inputs.iter().any(|team| team.players.is_empty()) {
            return Err(AppError::invalid_data("every team needs at least one player"));
        }

        let mut referenced: Vec<ObjectId> = Vec::new();
        for member in inputs.iter().flat_map(|team| team.players.iter()) {
            if let TeamMemberInput::Existing(raw) = member {
                let id = ObjectId::parse_str(raw)?;
                if !referenced.contains(&id) {
                    referenced.push(id);
                }
            }
        }
        if !referenced.is_empty() {
            let found = self
                .store
                .find(
                    EntityKind::Player,
                    FindQuery::new(doc! { "_id": { "$in": referenced.clone() }, "deleted": { "$ne": true } })
                        .projection(Some(doc! { "_id": 1 })),
                )
                .await?;
            let found: Vec<ObjectId> = found.iter().filter_map(|d| d.get_object_id("_id").ok()).collect();
            if let Some(missing) = referenced.iter().find(|id| !found.contains(id)) {
                return Err(AppError::invalid_data(format!("unknown player {}", missing)));
            }
        }

        let mut teams = Vec::with_capacity(TEAMS_PER_GAME);
        let mut owned_players = Vec::new();
        for input in inputs {
            let mut team = Team {
                player_ids: Vec::with_capacity(input.players.len()),
                points: input.points,
            };
            for member in input.players {
                let id = match member {
                    TeamMemberInput::Existing(raw) => ObjectId::parse_str(&raw)?,
                    TeamMemberInput::Owned(owned) => {
                        let mut player = Player::new(owned.nickname, owned.name, PlayerType::Owned);
                        player.rank = owned.rank;
                        player.owner_id = Some(caller_id);
                        let id = ObjectId::new();
                        player.id = Some(id);
                        self.denormalizer.prepare_player(&mut player, &PlayerChangeSet::all()).await;
                        owned_players.push(player);
                        id
                    }
                };
                team.player_ids.push(id);
            }
            teams.push(team);
        }
        Ok((teams, owned_players))
    }

    async fn store_owned_players(&self, owned: &[Player]) -> Result<()> {
        for player in owned {
            let id = store::insert_entity(self.store.as_ref(), EntityKind::Player, player).await?;
            tracing::info!(player_id = %id, owner_id = ?player.owner_id, "Owned player created inline");
        }
        Ok(())
    }
}

fn team_player_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_array("teams")
        .map(|teams| {
            teams
                .iter()
                .filter_map(|team| team.as_document())
                .filter_map(|team| team.get_array("players").ok())
                .flat_map(|players| players.iter().filter_map(|p| p.as_object_id()))
                .collect()
        })
        .unwrap_or_default()
}

/// Who is writing a stream item.
///
/// `type` must be `comment`. An authenticated player always wins; otherwise
/// a Facebook identity is accepted when `fbid` matches the body's
/// `owner.facebook.id` and both id and name are present.
pub fn stream_author(caller: Option<&Player>, fbid: Option<&str>, body: &CreateStreamItem) -> Result<StreamOwner> {
    if body.kind.as_deref() != Some("comment") {
        return Err(AppError::invalid_data("type must be comment"));
    }
    body.validate()?;

    let facebook = match fbid {
        Some(fbid) => {
            let identity = body
                .owner
                .as_ref()
                .and_then(|owner| owner.facebook.as_ref())
                .ok_or_else(|| AppError::invalid_data("missing owner.facebook"))?;
            let (Some(id), Some(name)) = (identity.id.clone(), identity.name.clone()) else {
                return Err(AppError::invalid_data("missing facebook.id or facebook.name"));
            };
            if id != fbid {
                return Err(AppError::invalid_data("fbid does not match owner.facebook.id"));
            }
            Some(StreamOwner::Facebook { id, name })
        }
        None => None,
    };

    match (caller.and_then(|p| p.id), facebook) {
        (Some(id), _) => Ok(StreamOwner::Player { id }),
        (None, Some(facebook)) => Ok(facebook),
        (None, None) => Err(AppError::unauthorized("authentication required")),
    }
}
