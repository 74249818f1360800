//! Keeps searchable projections consistent across players and games.
//!
//! Pre-write work runs inline and never fails the triggering write because
//! of a missing or unreachable dependency. Post-write propagation is exposed
//! as fallible operations that the cascade worker runs and retries.

use std::collections::BTreeSet;

use bson::{doc, oid::ObjectId};

use crate::database::store::{self, EntityKind, FindQuery, SharedStore};
use crate::errors::{AppError, Result};
use crate::models::club::Club;
use crate::models::game::{member_ids_of, Game, Team};
use crate::models::player::Player;
use crate::search::normalize::searchable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlayerField {
    Nickname,
    Name,
    Club,
}

/// Which denormalized player fields a write touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerChangeSet {
    fields: BTreeSet<PlayerField>,
}

impl PlayerChangeSet {
    pub fn all() -> Self {
        [PlayerField::Nickname, PlayerField::Name, PlayerField::Club]
            .into_iter()
            .collect()
    }

    /// `old == None` means a creation: every field counts as changed.
    pub fn between(old: Option<&Player>, new: &Player) -> Self {
        let Some(old) = old else {
            return Self::all();
        };
        let mut changes = Self::default();
        if old.nickname != new.nickname {
            changes.fields.insert(PlayerField::Nickname);
        }
        if old.name != new.name {
            changes.fields.insert(PlayerField::Name);
        }
        if old.club_id() != new.club_id() {
            changes.fields.insert(PlayerField::Club);
        }
        changes
    }

    pub fn contains(&self, field: PlayerField) -> bool {
        self.fields.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<PlayerField> for PlayerChangeSet {
    fn from_iter<I: IntoIterator<Item = PlayerField>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Player ids that joined or left a game in one write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDelta {
    pub added: Vec<ObjectId>,
    pub removed: Vec<ObjectId>,
}

impl MembershipDelta {
    pub fn between(old: &[ObjectId], new: &[ObjectId]) -> Self {
        Self {
            added: new.iter().filter(|id| !old.contains(id)).copied().collect(),
            removed: old.iter().filter(|id| !new.contains(id)).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Rebuilds the game's `searchablePlayer*` arrays covered by `fields` from the
/// given players, in team member order. Members missing from `players` are
/// skipped.
pub fn apply_player_projection(game: &mut Game, players: &[Player], fields: &PlayerChangeSet) {
    let members: Vec<&Player> = game
        .member_ids()
        .iter()
        .filter_map(|id| players.iter().find(|p| p.id.as_ref() == Some(id)))
        .collect();

    if fields.contains(PlayerField::Name) {
        game.searchable_player_names = members.iter().map(|p| searchable(&p.name)).collect();
    }
    if fields.contains(PlayerField::Nickname) {
        game.searchable_player_nicknames = members.iter().map(|p| searchable(&p.nickname)).collect();
    }
    if fields.contains(PlayerField::Club) {
        let mut club_ids = Vec::new();
        let mut club_names = Vec::new();
        for club in members.iter().filter_map(|p| p.club.as_ref()) {
            if !club_ids.contains(&club.id) {
                club_ids.push(club.id);
            }
            if let Some(name) = club.name.as_deref().map(searchable) {
                if !club_names.contains(&name) {
                    club_names.push(name);
                }
            }
        }
        game.searchable_player_club_ids = club_ids;
        game.searchable_player_club_names = club_names;
    }
}

#[derive(Clone)]
pub struct Denormalizer {
    store: SharedStore,
}

impl Denormalizer {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    // ========== PRE-WRITE ==========

    pub async fn prepare_player(&self, player: &mut Player, changes: &PlayerChangeSet) {
        if changes.contains(PlayerField::Nickname) {
            player.searchable_nickname = searchable(&player.nickname);
        }
        if changes.contains(PlayerField::Name) {
            player.searchable_name = searchable(&player.name);
        }
        if changes.contains(PlayerField::Club) {
            self.inline_club(player).await;
        }
    }

    /// Copies the referenced club's name onto the player. A missing or
    /// unreachable club leaves the cached name unset.
    async fn inline_club(&self, player: &mut Player) {
        player.searchable_club_name = None;
        let Some(club) = player.club.as_mut() else {
            return;
        };
        club.name = None;

        match store::load::<Club>(self.store.as_ref(), EntityKind::Club, club.id).await {
            Ok(Some(found)) => {
                player.searchable_club_name = Some(searchable(&found.name));
                club.name = Some(found.name);
            }
            Ok(None) => {
                tracing::warn!(club_id = %club.id, "⚠️ Club not found, player written without club name");
            }
            Err(e) => {
                let e = AppError::dependency(format!("club {}: {}", club.id, e));
                tracing::warn!(error = %e, "⚠️ Club lookup failed, player written without club name");
            }
        }
    }

    /// Recomputes the game's own searchable fields. When `teams_changed`,
    /// also regenerates the player projections and returns how membership
    /// moved relative to what is currently stored. `pending` holds members
    /// that are not stored yet.
    pub async fn prepare_game(&self, game: &mut Game, teams_changed: bool, pending: &[Player]) -> Result<MembershipDelta> {
        game.searchable_city = searchable(&game.city);
        if !teams_changed {
            return Ok(MembershipDelta::default());
        }

        let previous = match game.id {
            Some(id) => self.stored_members(id).await?,
            None => Vec::new(),
        };
        let current = game.member_ids();

        match store::load_many::<Player>(self.store.as_ref(), EntityKind::Player, &current).await {
            Ok(mut players) => {
                players.extend(pending.iter().cloned());
                apply_player_projection(game, &players, &PlayerChangeSet::all());
            }
            Err(e) => {
                let e = AppError::dependency(format!("players of game: {}", e));
                tracing::warn!(error = %e, "⚠️ Player lookup failed, game projections left stale");
            }
        }

        Ok(MembershipDelta::between(&previous, &current))
    }

    async fn stored_members(&self, game_id: ObjectId) -> Result<Vec<ObjectId>> {
        let stored = self
            .store
            .find_by_id(EntityKind::Game, game_id, Some(doc! { "teams": 1 }))
            .await?;
        let Some(mut stored) = stored else {
            return Ok(Vec::new());
        };
        let teams: Vec<Team> = match stored.remove("teams") {
            Some(teams) => bson::from_bson(teams)?,
            None => Vec::new(),
        };
        Ok(member_ids_of(&teams))
    }

    // ========== POST-WRITE ==========

    /// Re-derives the changed projections of every game the player is a
    /// member of. Returns how many games were rewritten.
    pub async fn propagate_player(&self, player_id: ObjectId, fields: &PlayerChangeSet) -> Result<usize> {
        if fields.is_empty() {
            return Ok(0);
        }

        let games: Vec<Game> = store::find_typed(
            self.store.as_ref(),
            EntityKind::Game,
            FindQuery::new(doc! { "teams.players": player_id }),
        )
        .await?;

        let mut rewritten = 0;
        for mut game in games {
            let Some(game_id) = game.id else {
                continue;
            };
            let members = game.member_ids();
            let players: Vec<Player> = store::load_many(self.store.as_ref(), EntityKind::Player, &members).await?;
            apply_player_projection(&mut game, &players, fields);
            store::replace_entity(self.store.as_ref(), EntityKind::Game, game_id, &game).await?;
            rewritten += 1;
        }
        Ok(rewritten)
    }

    /// Adds the game to joining players' `gameIds` and removes it from
    /// leaving players'. Safe to re-run.
    pub async fn relink_player_games(&self, game_id: ObjectId, delta: &MembershipDelta) -> Result<()> {
        for (player_id, joined) in delta
            .added
            .iter()
            .map(|id| (*id, true))
            .chain(delta.removed.iter().map(|id| (*id, false)))
        {
            let Some(mut player) = store::load::<Player>(self.store.as_ref(), EntityKind::Player, player_id).await? else {
                tracing::warn!(player_id = %player_id, game_id = %game_id, "⚠️ Player vanished before relinking");
                continue;
            };

            let before = player.game_ids.len();
            if joined {
                if !player.game_ids.contains(&game_id) {
                    player.game_ids.push(game_id);
                }
            } else {
                player.game_ids.retain(|id| *id != game_id);
            }

            if player.game_ids.len() != before {
                store::replace_entity(self.store.as_ref(), EntityKind::Player, player_id, &player).await?;
            }
        }
        Ok(())
    }
}
