//! Field selection for reads that may expand references.
//!
//! A request carries `fields` (dot paths) and `populate` (reference paths to
//! expand). Fields under a populated path are re-rooted onto the referenced
//! entity; fields under a populatable path that was not asked for are dropped.

use std::collections::BTreeMap;

use bson::{doc, Document};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    /// Projection of the primary entity. `None` selects every field.
    pub primary: Option<Vec<String>>,
    /// Populated reference path → projection of the referenced entity.
    /// An empty list selects every field of the referenced entity.
    pub populated: BTreeMap<String, Vec<String>>,
}

impl FieldSelection {
    pub fn build(fields: &[String], populate: &[String], populatable: &[&str]) -> Self {
        let mut populated: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for path in populate.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            if populatable.contains(&path) {
                populated.entry(path.to_string()).or_default();
            } else {
                tracing::debug!(path, "ignoring populate path that is not a reference");
            }
        }

        let mut primary: Vec<String> = Vec::new();
        for field in fields.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
            match reference_prefix(field, populatable) {
                Some((path, rest)) => {
                    if let Some(selection) = populated.get_mut(path) {
                        push_unique(selection, rest);
                    }
                }
                None => push_unique(&mut primary, field),
            }
        }

        let primary = if fields.iter().all(|f| f.trim().is_empty()) {
            None
        } else {
            Some(primary)
        };

        Self { primary, populated }
    }

    pub fn populates(&self, path: &str) -> bool {
        self.populated.contains_key(path)
    }

    /// Inclusion projection for the primary query. Populated paths are added
    /// so the references can be resolved, and paths already covered by an
    /// ancestor are collapsed.
    pub fn projection(&self) -> Option<Document> {
        let primary = self.primary.as_ref()?;
        let mut paths: Vec<&str> = primary.iter().map(String::as_str).collect();
        paths.extend(self.populated.keys().map(String::as_str));
        Some(inclusion(&paths))
    }

    /// Projection for the entity behind a populated path, if any narrowing
    /// was requested.
    pub fn populated_projection(&self, path: &str) -> Option<Document> {
        let selection = self.populated.get(path)?;
        if selection.is_empty() {
            return None;
        }
        let paths: Vec<&str> = selection.iter().map(String::as_str).collect();
        Some(inclusion(&paths))
    }
}

/// Splits `teams.players.name` into (`teams.players`, `name`) when the field
/// sits under a populatable path. The longest matching path wins.
fn reference_prefix<'a>(field: &'a str, populatable: &[&'a str]) -> Option<(&'a str, &'a str)> {
    populatable
        .iter()
        .filter_map(|path| {
            field
                .strip_prefix(path)
                .and_then(|rest| rest.strip_prefix('.'))
                .filter(|rest| !rest.is_empty())
                .map(|rest| (*path, rest))
        })
        .max_by_key(|(path, _)| path.len())
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

fn inclusion(paths: &[&str]) -> Document {
    let mut projection = Document::new();
    for path in paths {
        let covered = paths
            .iter()
            .any(|other| other.len() < path.len() && path.starts_with(other) && path[other.len()..].starts_with('.'));
        if !covered && !projection.contains_key(*path) {
            projection.insert(*path, 1);
        }
    }
    if projection.is_empty() {
        return doc! { "_id": 1 };
    }
    projection
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(s: &str) -> Vec<String> {
        s.split(',').map(str::to_string).collect()
    }

    #[test]
    fn splits_fields_between_primary_and_populated() {
        let selection = FieldSelection::build(&list("a,b,c.d"), &list("c"), &["c"]);
        assert_eq!(selection.primary, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(selection.populated.get("c"), Some(&vec!["d".to_string()]));
        assert_eq!(selection.projection(), Some(doc! { "a": 1, "b": 1, "c": 1 }));
        assert_eq!(selection.populated_projection("c"), Some(doc! { "d": 1 }));
    }

    #[test]
    fn drops_fields_under_unrequested_reference() {
        let selection = FieldSelection::build(&list("city,teams.players.name,teams.points"), &[], &["teams.players"]);
        assert_eq!(selection.primary, Some(vec!["city".to_string(), "teams.points".to_string()]));
        assert!(selection.populated.is_empty());
    }

    #[test]
    fn ignores_populate_paths_that_are_not_references() {
        let selection = FieldSelection::build(&list("city"), &list("owner"), &["teams.players"]);
        assert!(!selection.populates("owner"));
    }

    #[test]
    fn collapses_paths_covered_by_an_ancestor() {
        let selection = FieldSelection::build(&list("teams,teams.players.nickname"), &list("teams.players"), &["teams.players"]);
        assert_eq!(selection.projection(), Some(doc! { "teams": 1 }));
        assert_eq!(selection.populated_projection("teams.players"), Some(doc! { "nickname": 1 }));
    }

    #[test]
    fn empty_field_list_selects_everything() {
        let selection = FieldSelection::build(&[], &list("teams.players"), &["teams.players"]);
        assert_eq!(selection.primary, None);
        assert_eq!(selection.projection(), None);
        assert!(selection.populates("teams.players"));
        assert_eq!(selection.populated_projection("teams.players"), None);
    }

    #[test]
    fn is_deterministic() {
        let a = FieldSelection::build(&list("x,y.z,x"), &list("y"), &["y"]);
        let b = FieldSelection::build(&list("x,y.z,x"), &list("y"), &["y"]);
        assert_eq!(a, b);
        assert_eq!(a.primary, Some(vec!["x".to_string()]));
    }
}
