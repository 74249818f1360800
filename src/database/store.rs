//! Capability interface over the document database.
//!
//! Services only describe which queries to issue; the store decides how to
//! run them. Every write is a whole-document replace keyed by `_id`.

use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Club,
    Player,
    Game,
}

impl EntityKind {
    pub fn collection_name(&self) -> &'static str {
        match self {
            EntityKind::Club => "clubs",
            EntityKind::Player => "players",
            EntityKind::Game => "games",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Club => "club",
            EntityKind::Player => "player",
            EntityKind::Game => "game",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl FindQuery {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn projection(mut self, projection: Option<Document>) -> Self {
        self.projection = projection;
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = (!sort.is_empty()).then_some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_id(
        &self,
        kind: EntityKind,
        id: ObjectId,
        projection: Option<Document>,
    ) -> Result<Option<Document>>;

    async fn find(&self, kind: EntityKind, query: FindQuery) -> Result<Vec<Document>>;

    /// Inserts a new document and returns its id (assigned if missing).
    async fn insert(&self, kind: EntityKind, document: Document) -> Result<ObjectId>;

    /// Replaces the whole document. Returns false when nothing matched.
    async fn replace(&self, kind: EntityKind, id: ObjectId, document: Document) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

pub type SharedStore = Arc<dyn DocumentStore>;

// ========== TYPED HELPERS ==========

pub async fn load<T>(store: &dyn DocumentStore, kind: EntityKind, id: ObjectId) -> Result<Option<T>>
where
    T: DeserializeOwned + Send,
{
    match store.find_by_id(kind, id, None).await? {
        Some(document) => Ok(Some(bson::from_document(document)?)),
        None => Ok(None),
    }
}

pub async fn load_many<T>(store: &dyn DocumentStore, kind: EntityKind, ids: &[ObjectId]) -> Result<Vec<T>>
where
    T: DeserializeOwned + Send,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    find_typed(store, kind, FindQuery::new(doc! { "_id": { "$in": ids.to_vec() } })).await
}

pub async fn find_typed<T>(store: &dyn DocumentStore, kind: EntityKind, query: FindQuery) -> Result<Vec<T>>
where
    T: DeserializeOwned + Send,
{
    store
        .find(kind, query)
        .await?
        .into_iter()
        .map(|document| bson::from_document(document).map_err(AppError::from))
        .collect()
}

pub async fn insert_entity<T>(store: &dyn DocumentStore, kind: EntityKind, entity: &T) -> Result<ObjectId>
where
    T: Serialize + Sync,
{
    let document = bson::to_document(entity)?;
    store.insert(kind, document).await
}

pub async fn replace_entity<T>(store: &dyn DocumentStore, kind: EntityKind, id: ObjectId, entity: &T) -> Result<()>
where
    T: Serialize + Sync,
{
    let document = bson::to_document(entity)?;
    if store.replace(kind, id, document).await? {
        Ok(())
    } else {
        Err(AppError::not_found(format!("{} {}", kind.label(), id)))
    }
}
