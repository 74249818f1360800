use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use futures_util::TryStreamExt;
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::{Collection, Database, IndexModel};

use crate::database::store::{DocumentStore, EntityKind, FindQuery};
use crate::errors::{AppError, Result};

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self, kind: EntityKind) -> Collection<Document> {
        self.db.collection::<Document>(kind.collection_name())
    }

    /// Indexes the core queries rely on: geo radius on games, membership
    /// lookups for cascades, and token authentication.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let games = self.collection(EntityKind::Game);
        games
            .create_index(IndexModel::builder().keys(doc! { "position": "2d" }).build())
            .await?;
        games
            .create_index(IndexModel::builder().keys(doc! { "teams.players": 1 }).build())
            .await?;
        games
            .create_index(IndexModel::builder().keys(doc! { "ownerId": 1, "startAt": -1 }).build())
            .await?;

        self.collection(EntityKind::Player)
            .create_index(IndexModel::builder().keys(doc! { "authToken": 1 }).build())
            .await?;

        tracing::info!("✅ Indexes ensured on games and players");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_by_id(
        &self,
        kind: EntityKind,
        id: ObjectId,
        projection: Option<Document>,
    ) -> Result<Option<Document>> {
        let mut options = FindOneOptions::default();
        options.projection = projection;

        let document = self
            .collection(kind)
            .find_one(doc! { "_id": id })
            .with_options(options)
            .await?;
        Ok(document)
    }

    async fn find(&self, kind: EntityKind, query: FindQuery) -> Result<Vec<Document>> {
        tracing::debug!(collection = kind.collection_name(), filter = ?query.filter, "find");

        let mut options = FindOptions::default();
        options.projection = query.projection;
        options.sort = query.sort;
        options.skip = query.skip;
        options.limit = query.limit;

        let cursor = self
            .collection(kind)
            .find(query.filter)
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert(&self, kind: EntityKind, document: Document) -> Result<ObjectId> {
        let result = self.collection(kind).insert_one(document).await?;
        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::internal(format!("{} inserted without an ObjectId", kind.label())))
    }

    async fn replace(&self, kind: EntityKind, id: ObjectId, document: Document) -> Result<bool> {
        let result = self
            .collection(kind)
            .replace_one(doc! { "_id": id }, document)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
