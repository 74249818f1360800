use bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::search::normalize::searchable;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub sport: String,
    pub name: String,

    #[serde(default)]
    pub city: String,

    pub created_at: BsonDateTime,

    // derived from `name`
    #[serde(default)]
    pub searchable_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClub {
    #[serde(default = "default_sport")]
    pub sport: String,

    #[validate(length(min = 1, max = 120, message = "Club name must be 1-120 characters"))]
    pub name: String,

    #[serde(default)]
    pub city: String,
}

fn default_sport() -> String {
    "tennis".to_string()
}

impl Club {
    pub fn new(body: CreateClub) -> Self {
        Self {
            id: None,
            sport: body.sport,
            searchable_name: searchable(&body.name),
            name: body.name,
            city: body.city,
            created_at: BsonDateTime::now(),
        }
    }
}
