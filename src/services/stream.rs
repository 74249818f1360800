//! Paging and owner resolution for a game's embedded comment stream.
//!
//! The store cannot project a filtered slice of an embedded array, so the
//! whole stream is loaded and paged here.

use bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use chrono::{DateTime, Utc};

use crate::database::store::{self, DocumentStore, EntityKind, FindQuery};
use crate::errors::Result;
use crate::models::player::Player;
use crate::models::stream::{ResolvedOwner, StreamItem, StreamItemView, StreamOwner};

pub const DEFAULT_STREAM_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamQuery {
    pub after: Option<DateTime<Utc>>,
    pub last_id: Option<ObjectId>,
    pub limit: Option<usize>,
}

/// Filters and orders one page of the stream.
///
/// 1. soft-deleted items are dropped
/// 2. `after` keeps items created at or after that instant
/// 3. `last_id` keeps items whose id sorts after it (id order, not time)
/// 4. newest first by `createdAt`, stable on ties
/// 5. the first `limit` items are kept
pub fn select_page(stream: &[StreamItem], query: &StreamQuery) -> Vec<StreamItem> {
    let after = query.after.map(BsonDateTime::from_chrono);
    let mut page: Vec<StreamItem> = stream
        .iter()
        .filter(|item| !item.deleted)
        .filter(|item| after.map_or(true, |after| item.created_at >= after))
        .filter(|item| query.last_id.map_or(true, |last_id| item.id > last_id))
        .cloned()
        .collect();

    page.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    page.truncate(query.limit.unwrap_or(DEFAULT_STREAM_LIMIT));
    page
}

/// Index of the item with `item_id`, built by scanning the current stream.
pub fn position(stream: &[StreamItem], item_id: ObjectId) -> Option<usize> {
    stream.iter().position(|item| item.id == item_id)
}

/// Replaces player references with `{id, name}` using one batched lookup.
/// A player that no longer exists resolves without a name.
pub async fn resolve_owners(store: &dyn DocumentStore, page: Vec<StreamItem>) -> Result<Vec<StreamItemView>> {
    let mut player_ids: Vec<ObjectId> = Vec::new();
    for item in &page {
        if let StreamOwner::Player { id } = item.owner {
            if !player_ids.contains(&id) {
                player_ids.push(id);
            }
        }
    }

    let players: Vec<Player> = if player_ids.is_empty() {
        Vec::new()
    } else {
        store::find_typed(
            store,
            EntityKind::Player,
            FindQuery::new(doc! { "_id": { "$in": player_ids } }),
        )
        .await?
    };

    Ok(page
        .into_iter()
        .map(|item| {
            let owner = match &item.owner {
                StreamOwner::Player { id } => ResolvedOwner::Player {
                    id: id.to_hex(),
                    name: players
                        .iter()
                        .find(|p| p.id.as_ref() == Some(id))
                        .map(|p| p.name.clone()),
                },
                StreamOwner::Facebook { id, name } => ResolvedOwner::Facebook {
                    id: id.clone(),
                    name: name.clone(),
                },
            };
            render(item, owner)
        })
        .collect())
}

pub fn render(item: StreamItem, owner: ResolvedOwner) -> StreamItemView {
    StreamItemView {
        id: item.id.to_hex(),
        created_at: item.created_at.to_chrono().to_rfc3339(),
        updated_at: item.updated_at.to_chrono().to_rfc3339(),
        kind: item.kind,
        owner,
        data: item.data,
    }
}
