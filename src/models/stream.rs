use bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamItemType {
    #[default]
    Comment,
}

/// Who wrote a stream item. Exactly one representation per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamOwner {
    Player { id: ObjectId },
    Facebook { id: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamData {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamItem {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,

    #[serde(rename = "type", default)]
    pub kind: StreamItemType,

    pub owner: StreamOwner,

    #[serde(default)]
    pub data: Option<StreamData>,

    #[serde(default)]
    pub deleted: bool,
}

impl StreamItem {
    pub fn comment(owner: StreamOwner, text: Option<String>) -> Self {
        let now = BsonDateTime::now();
        Self {
            id: ObjectId::new(),
            created_at: now,
            updated_at: now,
            kind: StreamItemType::Comment,
            owner,
            data: text.map(|text| StreamData { text }),
            deleted: false,
        }
    }
}

// ========== REQUEST BODIES ==========

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacebookIdentityInput {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwnerInput {
    pub facebook: Option<FacebookIdentityInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StreamDataInput {
    #[validate(length(max = 2000, message = "Text must be less than 2000 characters"))]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStreamItem {
    #[serde(rename = "type")]
    pub kind: Option<String>,

    pub owner: Option<OwnerInput>,

    #[validate(nested)]
    pub data: Option<StreamDataInput>,
}

impl CreateStreamItem {
    pub fn text(&self) -> Option<String> {
        self.data.as_ref().and_then(|data| data.text.clone())
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateStreamItem {
    #[validate(nested)]
    pub data: Option<StreamDataInput>,
}

// ========== VIEWS ==========

/// Owner as shown to clients: player references carry the current name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedOwner {
    Player {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Facebook {
        id: String,
        name: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamItemView {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,

    #[serde(rename = "type")]
    pub kind: StreamItemType,

    pub owner: ResolvedOwner,
    pub data: Option<StreamData>,
}
