pub mod clubs;
pub mod games;
pub mod health;
pub mod players;

use bson::oid::ObjectId;

use crate::errors::Result;

/// Path and query ids arrive as hex strings; malformed ones are a 400.
pub(crate) fn object_id(raw: &str) -> Result<ObjectId> {
    Ok(ObjectId::parse_str(raw)?)
}

pub(crate) fn optional_object_id(raw: Option<&str>) -> Result<Option<ObjectId>> {
    raw.map(object_id).transpose()
}
