use bson::{doc, oid::ObjectId, Bson, Document, Regex};

use crate::models::game::GameStatus;
use crate::search::normalize;

pub const EARTH_RADIUS_KM: f64 = 6378.137;

pub const GAME_TEXT_FIELDS: [&str; 4] = [
    "searchableCity",
    "searchablePlayerNames",
    "searchablePlayerNicknames",
    "searchablePlayerClubNames",
];

pub const PLAYER_TEXT_FIELDS: [&str; 2] = ["searchableNickname", "searchableName"];

pub const DEFAULT_GAME_STATUSES: [GameStatus; 3] = [GameStatus::Created, GameStatus::Ongoing, GameStatus::Finished];

/// Kilometers to the angular radius `$centerSphere` expects.
pub fn km_to_radians(km: f64) -> f64 {
    km / EARTH_RADIUS_KM
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRadius {
    pub long: f64,
    pub lat: f64,
    pub distance_km: f64,
}

impl GeoRadius {
    /// Only a complete triple yields a filter.
    pub fn from_parts(long: Option<f64>, lat: Option<f64>, distance_km: Option<f64>) -> Option<Self> {
        match (long, lat, distance_km) {
            (Some(long), Some(lat), Some(distance_km)) => Some(Self { long, lat, distance_km }),
            _ => None,
        }
    }

    pub fn predicate(&self, field: &str) -> Document {
        let mut predicate = Document::new();
        predicate.insert(
            field,
            doc! {
                "$geoWithin": {
                    "$centerSphere": [[self.long, self.lat], km_to_radians(self.distance_km)]
                }
            },
        );
        predicate
    }
}

/// OR of unanchored regex matches across `fields`. `None` when the query
/// normalizes to nothing.
pub fn text_predicate(query: &str, fields: &[&str]) -> Option<Document> {
    let pattern = normalize::pattern(query.trim());
    if pattern.is_empty() {
        return None;
    }
    let alternatives: Vec<Bson> = fields
        .iter()
        .map(|field| {
            let mut alternative = Document::new();
            alternative.insert(
                *field,
                Bson::RegularExpression(Regex {
                    pattern: pattern.clone(),
                    options: String::new(),
                }),
            );
            Bson::Document(alternative)
        })
        .collect();
    Some(doc! { "$or": alternatives })
}

/// `-startAt,name` → `{startAt: -1, name: 1}`.
pub fn sort_document(sort: &[String]) -> Document {
    let mut document = Document::new();
    for key in sort.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        match key.strip_prefix('-') {
            Some(field) if !field.is_empty() => document.insert(field, -1),
            _ => document.insert(key.trim_start_matches('+'), 1),
        };
    }
    document
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameFilter {
    pub q: Option<String>,
    pub club: Option<ObjectId>,
    pub statuses: Vec<GameStatus>,
    pub geo: Option<GeoRadius>,
}

impl GameFilter {
    pub fn to_document(&self) -> Document {
        let mut predicates: Vec<Bson> = vec![doc! { "deleted": false }.into()];

        if let Some(text) = self.q.as_deref().and_then(|q| text_predicate(q, &GAME_TEXT_FIELDS)) {
            predicates.push(text.into());
        }
        if let Some(club) = self.club {
            predicates.push(doc! { "searchablePlayerClubIds": club }.into());
        }

        let statuses: Vec<&str> = if self.statuses.is_empty() {
            DEFAULT_GAME_STATUSES.iter().map(GameStatus::as_str).collect()
        } else {
            self.statuses.iter().map(GameStatus::as_str).collect()
        };
        predicates.push(doc! { "status": { "$in": statuses } }.into());

        if let Some(geo) = &self.geo {
            predicates.push(geo.predicate("position").into());
        }

        doc! { "$and": predicates }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerFilter {
    pub q: Option<String>,
    /// Caller hint that widens the scope to players this owner created.
    pub owner: Option<ObjectId>,
    pub club: Option<ObjectId>,
    pub geo: Option<GeoRadius>,
}

impl PlayerFilter {
    pub fn to_document(&self) -> Document {
        let mut predicates: Vec<Bson> = vec![doc! { "deleted": { "$ne": true } }.into()];

        if let Some(text) = self.q.as_deref().and_then(|q| text_predicate(q, &PLAYER_TEXT_FIELDS)) {
            predicates.push(text.into());
        }

        let scope = match self.owner {
            Some(owner) => doc! {
                "$or": [
                    { "type": "default" },
                    { "type": "owned", "ownerId": owner },
                ]
            },
            None => doc! { "type": "default" },
        };
        predicates.push(scope.into());

        if let Some(club) = self.club {
            predicates.push(doc! { "club.id": club }.into());
        }
        if let Some(geo) = &self.geo {
            predicates.push(geo.predicate("position").into());
        }

        doc! { "$and": predicates }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predicates(filter: &Document) -> Vec<Document> {
        filter
            .get_array("$and")
            .unwrap()
            .iter()
            .map(|b| b.as_document().unwrap().clone())
            .collect()
    }

    #[test]
    fn earth_radius_converts_to_one_radian() {
        assert!((km_to_radians(6378.137) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn geo_requires_all_three_parts() {
        assert!(GeoRadius::from_parts(Some(1.0), Some(2.0), None).is_none());
        assert!(GeoRadius::from_parts(None, Some(2.0), Some(3.0)).is_none());
        let geo = GeoRadius::from_parts(Some(-0.37), Some(49.18), Some(10.0)).unwrap();
        let predicate = geo.predicate("position");
        let sphere = predicate
            .get_document("position")
            .unwrap()
            .get_document("$geoWithin")
            .unwrap()
            .get_array("$centerSphere")
            .unwrap();
        assert_eq!(sphere[0], Bson::Array(vec![Bson::Double(-0.37), Bson::Double(49.18)]));
        assert_eq!(sphere[1], Bson::Double(10.0 / EARTH_RADIUS_KM));
    }

    #[test]
    fn game_filter_defaults_to_visible_statuses_and_excludes_deleted() {
        let filter = GameFilter::default().to_document();
        let parts = predicates(&filter);
        assert_eq!(parts[0], doc! { "deleted": false });
        assert_eq!(parts[1], doc! { "status": { "$in": ["created", "ongoing", "finished"] } });
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn game_text_search_normalizes_and_ors_searchable_fields() {
        let filter = GameFilter { q: Some("Zoé".into()), ..Default::default() }.to_document();
        let text = predicates(&filter)[1].clone();
        let alternatives = text.get_array("$or").unwrap();
        assert_eq!(alternatives.len(), GAME_TEXT_FIELDS.len());
        let first = alternatives[0].as_document().unwrap();
        match first.get("searchableCity") {
            Some(Bson::RegularExpression(re)) => assert_eq!(re.pattern, "zoe"),
            other => panic!("unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn game_club_filter_matches_any_member_club() {
        let club = ObjectId::new();
        let filter = GameFilter { club: Some(club), ..Default::default() }.to_document();
        let parts = predicates(&filter);
        assert_eq!(parts[1], doc! { "searchablePlayerClubIds": club });
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn blank_query_adds_no_text_predicate() {
        assert!(text_predicate("  ", &PLAYER_TEXT_FIELDS).is_none());
    }

    #[test]
    fn player_scope_without_owner_only_matches_default_players() {
        let parts = predicates(&PlayerFilter::default().to_document());
        assert!(parts.contains(&doc! { "type": "default" }));
    }

    #[test]
    fn player_scope_with_owner_includes_owned_players() {
        let owner = ObjectId::new();
        let club = ObjectId::new();
        let filter = PlayerFilter { owner: Some(owner), club: Some(club), ..Default::default() }.to_document();
        let parts = predicates(&filter);
        assert!(parts.contains(&doc! {
            "$or": [{ "type": "default" }, { "type": "owned", "ownerId": owner }]
        }));
        assert!(parts.contains(&doc! { "club.id": club }));
    }

    #[test]
    fn sort_document_parses_direction_prefixes() {
        let sort = sort_document(&["-startAt".to_string(), "name".to_string(), "".to_string()]);
        assert_eq!(sort, doc! { "startAt": -1, "name": 1 });
    }
}
