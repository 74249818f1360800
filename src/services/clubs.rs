use bson::oid::ObjectId;
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::database::store::{self, EntityKind, SharedStore};
use crate::errors::{AppError, Result};
use crate::models::club::{Club, CreateClub};
use crate::services::views::public_view;

#[derive(Clone)]
pub struct ClubService {
    store: SharedStore,
}

impl ClubService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create_club(&self, body: CreateClub) -> Result<JsonValue> {
        body.validate()?;
        let mut club = Club::new(body);
        let id = store::insert_entity(self.store.as_ref(), EntityKind::Club, &club).await?;
        club.id = Some(id);
        tracing::info!(club_id = %id, name = %club.name, "✅ Club created");
        Ok(public_view(&bson::to_document(&club)?, &[]))
    }

    pub async fn get_club(&self, id: ObjectId) -> Result<JsonValue> {
        let club = self
            .store
            .find_by_id(EntityKind::Club, id, None)
            .await?
            .ok_or_else(|| AppError::not_found(format!("club {}", id)))?;
        Ok(public_view(&club, &[]))
    }
}
