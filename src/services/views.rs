//! Client-facing JSON rendering of stored documents.

use bson::{Bson, Document};
use serde_json::{json, Map, Value as JsonValue};

/// Never leave the store unless explicitly unhidden.
const HIDDEN_FIELDS: [&str; 3] = ["passwordHash", "authToken", "email"];

/// Hidden fields a player may see on their own record.
pub const SELF_FIELDS: [&str; 2] = ["authToken", "email"];

pub fn bson_to_json_value(bson: &Bson) -> JsonValue {
    match bson {
        Bson::ObjectId(oid) => json!(oid.to_hex()),
        Bson::DateTime(dt) => json!(dt.to_chrono().to_rfc3339()),
        Bson::String(s) => json!(s),
        Bson::Int32(i) => json!(i),
        Bson::Int64(i) => json!(i),
        Bson::Double(d) => json!(d),
        Bson::Boolean(b) => json!(b),
        Bson::Null => JsonValue::Null,
        Bson::Array(arr) => JsonValue::Array(arr.iter().map(bson_to_json_value).collect()),
        Bson::Document(doc) => document_to_json(doc),
        _ => json!(bson.to_string()),
    }
}

pub fn document_to_json(doc: &Document) -> JsonValue {
    let mut map = Map::new();
    for (key, value) in doc {
        map.insert(key.clone(), bson_to_json_value(value));
    }
    JsonValue::Object(map)
}

/// Renders a stored document for clients.
///
/// `_id` becomes `id`. Bookkeeping fields (`deleted`, `searchable*`) and
/// hidden fields are removed at every depth, and soft-deleted elements of
/// embedded arrays are dropped. `unhide` lists hidden fields to keep.
pub fn public_view(doc: &Document, unhide: &[&str]) -> JsonValue {
    let mut map = Map::new();
    for (key, value) in doc {
        if is_private(key, unhide) {
            continue;
        }
        let name = if key == "_id" { "id".to_string() } else { key.clone() };
        map.insert(name, public_value(value, unhide));
    }
    JsonValue::Object(map)
}

fn public_value(value: &Bson, unhide: &[&str]) -> JsonValue {
    match value {
        Bson::Document(inner) => public_view(inner, unhide),
        Bson::Array(items) => JsonValue::Array(
            items
                .iter()
                .filter(|item| !is_soft_deleted(item))
                .map(|item| public_value(item, unhide))
                .collect(),
        ),
        other => bson_to_json_value(other),
    }
}

fn is_private(key: &str, unhide: &[&str]) -> bool {
    if key == "deleted" || key.starts_with("searchable") {
        return true;
    }
    HIDDEN_FIELDS.contains(&key) && !unhide.contains(&key)
}

fn is_soft_deleted(item: &Bson) -> bool {
    item.as_document()
        .and_then(|doc| doc.get_bool("deleted").ok())
        .unwrap_or(false)
}
