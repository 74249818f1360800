//! In-process `DocumentStore` used by tests.
//!
//! Evaluates the subset of the query language the services issue: `$and`,
//! `$or`, `$in`, `$ne`, `$regex`, equality (array membership and dotted paths
//! included), `$geoWithin`/`$centerSphere`, inclusion projections, multi-key
//! sort, skip and limit.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use tokio::sync::RwLock;

use crate::database::store::{DocumentStore, EntityKind, FindQuery};
use crate::errors::{AppError, Result};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<EntityKind, Vec<Document>>>,
    unavailable: RwLock<HashSet<EntityKind>>,
    fail_next_reads: AtomicUsize,
    writes: RwLock<HashMap<EntityKind, usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read and write on `kind` fails until re-enabled.
    pub async fn set_unavailable(&self, kind: EntityKind, unavailable: bool) {
        let mut set = self.unavailable.write().await;
        if unavailable {
            set.insert(kind);
        } else {
            set.remove(&kind);
        }
    }

    /// The next `count` reads fail regardless of kind.
    pub fn fail_next_reads(&self, count: usize) {
        self.fail_next_reads.store(count, AtomicOrdering::SeqCst);
    }

    pub async fn write_count(&self, kind: EntityKind) -> usize {
        self.writes.read().await.get(&kind).copied().unwrap_or(0)
    }

    pub async fn raw(&self, kind: EntityKind, id: ObjectId) -> Option<Document> {
        self.collections
            .read()
            .await
            .get(&kind)
            .and_then(|docs| docs.iter().find(|d| d.get_object_id("_id").ok() == Some(id)).cloned())
    }

    async fn check_read(&self, kind: EntityKind) -> Result<()> {
        let pending = self.fail_next_reads.load(AtomicOrdering::SeqCst);
        if pending > 0 {
            self.fail_next_reads.store(pending - 1, AtomicOrdering::SeqCst);
            return Err(AppError::internal("injected read failure"));
        }
        if self.unavailable.read().await.contains(&kind) {
            return Err(AppError::internal(format!("{} unavailable", kind.collection_name())));
        }
        Ok(())
    }

    async fn check_write(&self, kind: EntityKind) -> Result<()> {
        if self.unavailable.read().await.contains(&kind) {
            return Err(AppError::internal(format!("{} unavailable", kind.collection_name())));
        }
        Ok(())
    }

    async fn record_write(&self, kind: EntityKind) {
        *self.writes.write().await.entry(kind).or_insert(0) += 1;
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_by_id(
        &self,
        kind: EntityKind,
        id: ObjectId,
        projection: Option<Document>,
    ) -> Result<Option<Document>> {
        self.check_read(kind).await?;
        let found = self.raw(kind, id).await;
        Ok(found.map(|doc| match &projection {
            Some(projection) => project(&doc, projection),
            None => doc,
        }))
    }

    async fn find(&self, kind: EntityKind, query: FindQuery) -> Result<Vec<Document>> {
        self.check_read(kind).await?;
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(&kind)
            .map(|docs| docs.iter().filter(|d| matches(d, &query.filter)).cloned().collect())
            .unwrap_or_default();

        if let Some(sort) = &query.sort {
            docs.sort_by(|a, b| compare_documents(a, b, sort));
        }

        let skip = query.skip.unwrap_or(0) as usize;
        let limit = match query.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        Ok(docs
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match &query.projection {
                Some(projection) => project(&doc, projection),
                None => doc,
            })
            .collect())
    }

    async fn insert(&self, kind: EntityKind, document: Document) -> Result<ObjectId> {
        self.check_write(kind).await?;
        let (id, document) = match document.get_object_id("_id") {
            Ok(id) => (id, document),
            Err(_) => {
                let id = ObjectId::new();
                let mut with_id = bson::doc! { "_id": id };
                with_id.extend(document);
                (id, with_id)
            }
        };
        self.collections.write().await.entry(kind).or_default().push(document);
        self.record_write(kind).await;
        Ok(id)
    }

    async fn replace(&self, kind: EntityKind, id: ObjectId, mut document: Document) -> Result<bool> {
        self.check_write(kind).await?;
        let mut collections = self.collections.write().await;
        let Some(slot) = collections
            .entry(kind)
            .or_default()
            .iter_mut()
            .find(|d| d.get_object_id("_id").ok() == Some(id))
        else {
            return Ok(false);
        };
        document.insert("_id", id);
        *slot = document;
        drop(collections);
        self.record_write(kind).await;
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// ========== FILTERS ==========

pub(crate) fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => sub_filters(condition).iter().all(|f| matches(doc, f)),
        "$or" => sub_filters(condition).iter().any(|f| matches(doc, f)),
        path => field_matches(&lookup(doc, path), condition),
    })
}

fn sub_filters(condition: &Bson) -> Vec<Document> {
    match condition {
        Bson::Array(items) => items.iter().filter_map(|b| b.as_document().cloned()).collect(),
        _ => Vec::new(),
    }
}

/// Values reachable at a dotted path. Arrays are traversed, and an array at
/// the end of the path contributes both itself and its elements.
fn lookup(doc: &Document, path: &str) -> Vec<Bson> {
    let parts: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some(value) = doc.get(parts[0]) {
        collect(value, &parts[1..], &mut out);
    }
    out
}

fn collect(value: &Bson, rest: &[&str], out: &mut Vec<Bson>) {
    if rest.is_empty() {
        if let Bson::Array(items) = value {
            out.push(value.clone());
            out.extend(items.iter().cloned());
        } else {
            out.push(value.clone());
        }
        return;
    }
    match value {
        Bson::Document(inner) => {
            if let Some(next) = inner.get(rest[0]) {
                collect(next, &rest[1..], out);
            }
        }
        Bson::Array(items) => {
            for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                collect(item, rest, out);
            }
        }
        _ => {}
    }
}

fn field_matches(values: &[Bson], condition: &Bson) -> bool {
    match condition {
        Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
            ops.iter().all(|(op, arg)| operator_matches(values, op, arg))
        }
        Bson::RegularExpression(re) => values.iter().any(|v| regex_matches(v, &re.pattern)),
        Bson::Null => values.is_empty() || values.iter().any(|v| *v == Bson::Null),
        expected => values.iter().any(|v| bson_eq(v, expected)),
    }
}

fn operator_matches(values: &[Bson], op: &str, arg: &Bson) -> bool {
    match op {
        "$in" => match arg {
            Bson::Array(candidates) => values.iter().any(|v| candidates.iter().any(|c| bson_eq(v, c))),
            _ => false,
        },
        "$ne" => !values.iter().any(|v| bson_eq(v, arg)),
        "$regex" => match arg {
            Bson::String(pattern) => values.iter().any(|v| regex_matches(v, pattern)),
            Bson::RegularExpression(re) => values.iter().any(|v| regex_matches(v, &re.pattern)),
            _ => false,
        },
        "$geoWithin" => match arg.as_document().and_then(|d| d.get_array("$centerSphere").ok()) {
            Some(sphere) => within_sphere(values, sphere),
            None => false,
        },
        _ => false,
    }
}

fn regex_matches(value: &Bson, pattern: &str) -> bool {
    let Ok(re) = regex::Regex::new(pattern) else {
        return false;
    };
    match value {
        Bson::String(s) => re.is_match(s),
        _ => false,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Legacy coordinate pair: first two numeric entries of an array or
/// embedded document, x before y.
fn point(value: &Bson) -> Option<(f64, f64)> {
    let numbers: Vec<f64> = match value {
        Bson::Array(items) => items.iter().filter_map(as_f64).collect(),
        Bson::Document(doc) => doc.values().filter_map(as_f64).collect(),
        _ => return None,
    };
    match numbers.as_slice() {
        [x, y, ..] => Some((*x, *y)),
        _ => None,
    }
}

fn within_sphere(values: &[Bson], sphere: &[Bson]) -> bool {
    let (Some(center), Some(radius)) = (sphere.first().and_then(point), sphere.get(1).and_then(as_f64)) else {
        return false;
    };
    values
        .iter()
        .filter_map(point)
        .any(|p| central_angle(center, p) <= radius)
}

/// Haversine central angle in radians between two (long, lat) pairs.
fn central_angle((long1, lat1): (f64, f64), (long2, lat2): (f64, f64)) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (long2 - long1).to_radians();
    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

// ========== PROJECTION ==========

#[derive(Default)]
struct Tree(BTreeMap<String, Option<Tree>>);

impl Tree {
    fn insert(&mut self, parts: &[&str]) {
        let Some((head, rest)) = parts.split_first() else {
            return;
        };
        if rest.is_empty() {
            self.0.insert(head.to_string(), None);
            return;
        }
        if let Some(sub) = self.0.entry(head.to_string()).or_insert_with(|| Some(Tree::default())) {
            sub.insert(rest);
        }
    }
}

pub(crate) fn project(doc: &Document, projection: &Document) -> Document {
    let mut tree = Tree::default();
    let mut keep_id = true;
    for (path, flag) in projection {
        let included = as_f64(flag).map_or(matches!(flag, Bson::Boolean(true)), |v| v != 0.0);
        if path == "_id" {
            keep_id = included;
            continue;
        }
        if included {
            tree.insert(&path.split('.').collect::<Vec<_>>());
        }
    }
    if keep_id {
        tree.0.entry("_id".to_string()).or_insert(None);
    }
    project_document(doc, &tree)
}

fn project_document(doc: &Document, tree: &Tree) -> Document {
    let mut out = Document::new();
    for (key, value) in doc {
        match tree.0.get(key) {
            Some(None) => {
                out.insert(key.clone(), value.clone());
            }
            Some(Some(sub)) => {
                if let Some(projected) = project_value(value, sub) {
                    out.insert(key.clone(), projected);
                }
            }
            None => {}
        }
    }
    out
}

fn project_value(value: &Bson, tree: &Tree) -> Option<Bson> {
    match value {
        Bson::Document(inner) => Some(Bson::Document(project_document(inner, tree))),
        Bson::Array(items) => Some(Bson::Array(
            items
                .iter()
                .filter_map(|item| item.as_document().map(|d| Bson::Document(project_document(d, tree))))
                .collect(),
        )),
        _ => None,
    }
}

// ========== SORT ==========

fn compare_documents(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (path, direction) in sort {
        let descending = as_f64(direction).is_some_and(|d| d < 0.0);
        let left = lookup(a, path).into_iter().next();
        let right = lookup(b, path).into_iter().next();
        let ordering = compare_values(left.as_ref(), right.as_ref());
        let ordering = if descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => match (a, b) {
                (Bson::String(x), Bson::String(y)) => x.cmp(y),
                (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
                (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
                (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    use crate::search::composer::{GameFilter, GeoRadius};

    #[tokio::test]
    async fn insert_assigns_id_and_find_by_id_projects() {
        let store = MemoryStore::new();
        let id = store
            .insert(EntityKind::Player, doc! { "name": "Ana", "nickname": "ana01" })
            .await
            .unwrap();
        let found = store
            .find_by_id(EntityKind::Player, id, Some(doc! { "name": 1 }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, doc! { "_id": id, "name": "Ana" });
    }

    #[tokio::test]
    async fn replace_reports_missing_documents() {
        let store = MemoryStore::new();
        assert!(!store.replace(EntityKind::Game, ObjectId::new(), doc! {}).await.unwrap());
        assert_eq!(store.write_count(EntityKind::Game).await, 0);
    }

    #[test]
    fn matches_array_membership_on_dotted_paths() {
        let player = ObjectId::new();
        let game = doc! { "teams": [ { "players": [player] }, { "players": [ObjectId::new()] } ] };
        assert!(matches(&game, &doc! { "teams.players": player }));
        assert!(!matches(&game, &doc! { "teams.players": ObjectId::new() }));
    }

    #[test]
    fn matches_composed_game_filter() {
        let game = doc! {
            "deleted": false,
            "status": "ongoing",
            "searchableCity": "caen",
            "searchablePlayerNicknames": ["anita", "bob"],
            "position": { "long": -0.37, "lat": 49.18 },
        };
        let near = GameFilter {
            q: Some("ANITA".into()),
            geo: GeoRadius::from_parts(Some(-0.36), Some(49.18), Some(5.0)),
            ..Default::default()
        };
        assert!(matches(&game, &near.to_document()));

        let far = GameFilter {
            geo: GeoRadius::from_parts(Some(2.35), Some(48.85), Some(5.0)),
            ..Default::default()
        };
        assert!(!matches(&game, &far.to_document()));
    }

    #[test]
    fn projects_into_arrays_of_documents() {
        let doc = doc! { "_id": 1, "city": "Caen", "teams": [ { "players": [1, 2], "points": "6" } ] };
        let projected = project(&doc, &doc! { "teams.players": 1 });
        assert_eq!(projected, doc! { "_id": 1, "teams": [ { "players": [1, 2] } ] });
    }

    #[tokio::test]
    async fn sorts_skips_and_limits() {
        let store = MemoryStore::new();
        for (name, rank) in [("c", 1), ("a", 3), ("b", 2)] {
            store.insert(EntityKind::Club, doc! { "name": name, "rank": rank }).await.unwrap();
        }
        let names: Vec<String> = store
            .find(EntityKind::Club, FindQuery::new(doc! {}).sort(doc! { "rank": -1 }).skip(1).limit(5))
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.get_str("name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let store = MemoryStore::new();
        store.fail_next_reads(1);
        assert!(store.find(EntityKind::Club, FindQuery::default()).await.is_err());
        assert!(store.find(EntityKind::Club, FindQuery::default()).await.is_ok());

        store.set_unavailable(EntityKind::Club, true).await;
        assert!(store.find_by_id(EntityKind::Club, ObjectId::new(), None).await.is_err());
        assert!(store.insert(EntityKind::Club, doc! { "name": "x" }).await.is_err());
        assert_eq!(store.write_count(EntityKind::Club).await, 0);
    }
}
