//! Connection manager: enrichment and cross-kind search.
//!
//! Stored tuples only carry ids. The manager joins them with live data from
//! the [`EntityDirectory`](crate::directory::EntityDirectory) and drops any
//! tuple whose entity can no longer be shown (deleted, unpublished). It also
//! searches every subtype a connection type may target and ranks the merged
//! hits.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{
    DEFAULT_PER_KIND_LIMIT, DEFAULT_SEARCH_LIMIT, PRINCIPALS_LABEL, PRINCIPAL_LABEL,
    PRINCIPAL_SUBTYPE, SEARCH_EXCERPT_WORDS, SUMMARY_EXCERPT_WORDS,
};
use crate::directory::{ItemRecord, PrincipalRecord, SearchQuery, TermRecord};
use crate::errors::TetherError;
use crate::registry::ConnectionSchema;
use crate::store::ConnectionStore;
use crate::types::{EntityId, EntityKind, EntitySummary};

// ============================================================================
// Settings and result types
// ============================================================================

/// Result caps for [`ConnectionManager::search_connectable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Merged results returned when the caller gives no limit.
    pub limit: usize,
    /// Hits requested from each searcher.
    pub per_kind_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            per_kind_limit: DEFAULT_PER_KIND_LIMIT,
        }
    }
}

/// One entry of a type filter control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeOption {
    pub value: String,
    pub label: String,
}

/// Target subtypes of a connection type, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchableTypes {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<TypeOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub principals: Vec<TypeOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub taxonomies: Vec<TypeOption>,
}

impl SearchableTypes {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.principals.is_empty() && self.taxonomies.is_empty()
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

pub struct ConnectionManager {
    store: Arc<ConnectionStore>,
    settings: SearchSettings,
}

impl ConnectionManager {
    pub fn new(store: Arc<ConnectionStore>, settings: SearchSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> SearchSettings {
        self.settings
    }

    /// Forward connections joined with live entity data.
    pub fn get_connections_full(&self, kind: EntityKind, id: EntityId, name: &str) -> Result<Vec<EntitySummary>, TetherError> {
        if !self.store.registry().exists(name) {
            return Ok(Vec::new());
        }
        let tuples = self.store.get_connections(kind, id, name)?;
        Ok(tuples
            .into_iter()
            .filter_map(|tuple| self.entity_summary(&tuple.subtype, tuple.id))
            .collect())
    }

    /// Entities pointing at this one, joined with live entity data.
    pub fn get_reverse_connections_full(&self, kind: EntityKind, id: EntityId, name: &str) -> Result<Vec<EntitySummary>, TetherError> {
        let Some(schema) = self.store.registry().get(name) else {
            return Ok(Vec::new());
        };
        let sources = self.store.get_reverse_connections(kind, id, name)?;
        Ok(sources
            .into_iter()
            .filter_map(|source_id| self.source_summary(schema, source_id))
            .collect())
    }

    /// Display data for `(subtype, id)`, or `None` if it cannot be shown.
    pub fn entity_summary(&self, subtype: &str, id: EntityId) -> Option<EntitySummary> {
        let directory = self.store.directory();
        match self.store.target_kind(subtype) {
            EntityKind::Principal => directory.principal(id).map(|p| principal_summary(&p)),
            EntityKind::Term => directory
                .term(subtype, id)
                .map(|t| term_summary(&t, SUMMARY_EXCERPT_WORDS)),
            EntityKind::Item => directory
                .item(id)
                .filter(ItemRecord::is_published)
                .map(|item| {
                    let mut summary = item_summary(&item, SUMMARY_EXCERPT_WORDS);
                    summary.subtype = subtype.to_string();
                    summary
                }),
        }
    }

    /// Reverse lists hold bare ids; the source kind comes from the schema.
    fn source_summary(&self, schema: &ConnectionSchema, id: EntityId) -> Option<EntitySummary> {
        let directory = self.store.directory();
        match schema.from_kind {
            EntityKind::Principal => self.entity_summary(PRINCIPAL_SUBTYPE, id),
            EntityKind::Term => schema
                .from_subtypes
                .iter()
                .find_map(|taxonomy| directory.term(taxonomy, id))
                .map(|t| term_summary(&t, SUMMARY_EXCERPT_WORDS)),
            EntityKind::Item => directory
                .item(id)
                .filter(ItemRecord::is_published)
                .map(|item| item_summary(&item, SUMMARY_EXCERPT_WORDS)),
        }
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Search everything a connection type may point at.
    ///
    /// `type_filter` narrows the search to one subtype when it is one of the
    /// allowed targets and is ignored otherwise. Results are ranked with
    /// [`rank_results`] and capped at `limit` (the configured default when
    /// `None`).
    pub fn search_connectable(
        &self,
        name: &str,
        query: &str,
        type_filter: Option<&str>,
        exclude_id: EntityId,
        limit: Option<usize>,
    ) -> Vec<EntitySummary> {
        let Some(schema) = self.store.registry().get(name) else {
            debug!("search_connectable: unknown connection type `{}`", name);
            return Vec::new();
        };

        let subtypes: Vec<&str> = match type_filter {
            Some(filter) if schema.to_subtypes.iter().any(|s| s == filter) => vec![filter],
            _ => schema.to_subtypes.iter().map(String::as_str).collect(),
        };

        let search = SearchQuery::new(query, exclude_id, self.settings.per_kind_limit);
        let mut results = Vec::new();
        for subtype in subtypes {
            results.extend(self.search_subtype(subtype, &search));
        }

        rank_results(&mut results, query);
        results.truncate(limit.unwrap_or(self.settings.limit));
        results
    }

    fn search_subtype(&self, subtype: &str, search: &SearchQuery) -> Vec<EntitySummary> {
        let directory = self.store.directory();
        if subtype == PRINCIPAL_SUBTYPE {
            directory
                .search_principals(search)
                .iter()
                .map(principal_summary)
                .collect()
        } else if directory.is_taxonomy(subtype) {
            match directory.search_terms(subtype, search) {
                Ok(terms) => terms
                    .iter()
                    .map(|t| term_summary(t, SEARCH_EXCERPT_WORDS))
                    .collect(),
                Err(e) => {
                    warn!("Taxonomy search in `{}` failed: {}", subtype, e);
                    Vec::new()
                }
            }
        } else if directory.is_item_type(subtype) {
            directory
                .search_items(subtype, search)
                .iter()
                .map(|item| item_summary(item, SEARCH_EXCERPT_WORDS))
                .collect()
        } else {
            debug!("Skipping unknown target subtype `{}`", subtype);
            Vec::new()
        }
    }

    // ========================================================================
    // Labels
    // ========================================================================

    /// Allowed target subtypes grouped for a type filter control.
    pub fn get_searchable_types(&self, name: &str) -> SearchableTypes {
        let mut types = SearchableTypes::default();
        let Some(schema) = self.store.registry().get(name) else {
            return types;
        };
        let directory = self.store.directory();

        for subtype in &schema.to_subtypes {
            if subtype == PRINCIPAL_SUBTYPE {
                types.principals.push(TypeOption {
                    value: subtype.clone(),
                    label: PRINCIPALS_LABEL.to_string(),
                });
            } else if let Some(labels) = directory.taxonomy_labels(subtype) {
                types.taxonomies.push(TypeOption {
                    value: subtype.clone(),
                    label: labels.name,
                });
            } else if let Some(labels) = directory.item_type_labels(subtype) {
                types.items.push(TypeOption {
                    value: subtype.clone(),
                    label: labels.name,
                });
            }
        }
        types
    }

    /// Singular label of a target subtype; the subtype itself if unknown.
    pub fn get_type_label(&self, subtype: &str) -> String {
        if subtype == PRINCIPAL_SUBTYPE {
            return PRINCIPAL_LABEL.to_string();
        }
        let directory = self.store.directory();
        directory
            .taxonomy_labels(subtype)
            .or_else(|| directory.item_type_labels(subtype))
            .map(|labels| labels.singular_name)
            .unwrap_or_else(|| subtype.to_string())
    }
}

// ============================================================================
// Ranking
// ============================================================================

/// Order search hits: titles starting with the query (ignoring case) first,
/// then case-insensitive alphabetical.
pub fn rank_results(results: &mut [EntitySummary], query: &str) {
    let query = query.to_lowercase();
    results.sort_by(|a, b| {
        let a_title = a.title.to_lowercase();
        let b_title = b.title.to_lowercase();
        let a_prefix = a_title.starts_with(&query);
        let b_prefix = b_title.starts_with(&query);
        match (a_prefix, b_prefix) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a_title.cmp(&b_title),
        }
    });
}

// ============================================================================
// Summaries
// ============================================================================

fn principal_summary(principal: &PrincipalRecord) -> EntitySummary {
    EntitySummary {
        id: principal.id,
        subtype: PRINCIPAL_SUBTYPE.to_string(),
        title: principal.display_name.clone(),
        link: principal.permalink(),
        edit_link: Some(principal.edit_permalink()),
        thumbnail: None,
        avatar: Some(principal.avatar_url()),
        excerpt: None,
        description: principal.description.clone().filter(|d| !d.is_empty()),
        count: None,
        slug: None,
    }
}

fn term_summary(term: &TermRecord, words: usize) -> EntitySummary {
    let description = trim_words(&strip_tags(&term.description), words);
    EntitySummary {
        id: term.id,
        subtype: term.taxonomy.clone(),
        title: term.name.clone(),
        link: term.permalink(),
        edit_link: Some(term.edit_permalink()),
        thumbnail: None,
        avatar: None,
        excerpt: None,
        description: (!description.is_empty()).then_some(description),
        count: Some(term.count),
        slug: Some(term.slug.clone()),
    }
}

fn item_summary(item: &ItemRecord, words: usize) -> EntitySummary {
    let excerpt = trim_words(&strip_tags(item.excerpt_source()), words);
    EntitySummary {
        id: item.id,
        subtype: item.item_type.clone(),
        title: item.title.clone(),
        link: item.permalink(),
        edit_link: Some(item.edit_permalink()),
        thumbnail: item.thumbnail.clone(),
        avatar: None,
        excerpt: (!excerpt.is_empty()).then_some(excerpt),
        description: None,
        count: None,
        slug: None,
    }
}

/// Keep the first `max` words, appending an ellipsis when text was cut.
pub fn trim_words(text: &str, max: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max {
        return words.join(" ");
    }
    format!("{}\u{2026}", words[..max].join(" "))
}

/// Drop anything between `<` and `>`.
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use crate::types::EntityRef;

    fn manager(fx: &Fixture) -> (Arc<ConnectionStore>, ConnectionManager) {
        let store = Arc::new(fx.store());
        let manager = ConnectionManager::new(store.clone(), SearchSettings::default());
        (store, manager)
    }

    fn titles(results: &[EntitySummary]) -> Vec<&str> {
        results.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_search_ranking_prefix_first() {
        let fx = Fixture::new();
        let (_, manager) = manager(&fx);

        let results = manager.search_connectable("see_also", "App", None, 0, None);
        assert_eq!(titles(&results), vec!["Apple", "Applesauce"]);
    }

    #[test]
    fn test_rank_results_ties_case_insensitive() {
        let summary = |title: &str| EntitySummary {
            id: 1,
            subtype: "article".to_string(),
            title: title.to_string(),
            link: String::new(),
            edit_link: None,
            thumbnail: None,
            avatar: None,
            excerpt: None,
            description: None,
            count: None,
            slug: None,
        };
        let mut results = vec![
            summary("Joanna"),
            summary("annual"),
            summary("Ann"),
            summary("Bannister"),
        ];
        rank_results(&mut results, "ANN");
        assert_eq!(titles(&results), vec!["Ann", "annual", "Bannister", "Joanna"]);
    }

    #[test]
    fn test_search_spans_principals_and_items() {
        let fx = Fixture::new();
        let (_, manager) = manager(&fx);

        let results = manager.search_connectable("related_people", "ann", None, 0, None);
        assert_eq!(
            titles(&results),
            vec!["Ann Berg", "Annika Holm", "Annual meeting", "Joanna Lie"]
        );
        assert_eq!(results[0].subtype, "principal");
        assert!(results[0].avatar.is_some());
        assert_eq!(results[2].subtype, "article");

        let capped = manager.search_connectable("related_people", "ann", None, 0, Some(3));
        assert_eq!(titles(&capped), vec!["Ann Berg", "Annika Holm", "Annual meeting"]);
    }

    #[test]
    fn test_search_type_filter_and_exclude() {
        let fx = Fixture::new();
        let (_, manager) = manager(&fx);

        let results = manager.search_connectable("related_people", "ann", Some("article"), 0, None);
        assert_eq!(titles(&results), vec!["Annual meeting"]);

        // A filter outside the allowed targets is ignored.
        let results = manager.search_connectable("related_people", "ann", Some("category"), 5, None);
        assert_eq!(
            titles(&results),
            vec!["Annika Holm", "Annual meeting", "Joanna Lie"]
        );
    }

    #[test]
    fn test_search_terms_and_unknown_type() {
        let fx = Fixture::new();
        let (_, manager) = manager(&fx);

        let results = manager.search_connectable("category_relations", "b", None, 31, None);
        assert_eq!(titles(&results), vec!["Bathing", "Beaches"]);
        assert_eq!(results[1].count, Some(4));
        assert_eq!(
            results[1].description.as_deref(),
            Some("Sandy and rocky beaches around the island")
        );

        assert!(manager.search_connectable("missing", "b", None, 0, None).is_empty());
    }

    #[test]
    fn test_search_skips_drafts() {
        let fx = Fixture::new();
        let (_, manager) = manager(&fx);

        let results = manager.search_connectable("see_also", "unfinished", None, 0, None);
        assert!(results.is_empty());
    }

    #[test]
    fn test_full_connections_drop_unresolvable() {
        let fx = Fixture::new();
        let (store, manager) = manager(&fx);
        let source = EntityRef::item(101);

        store.add_connection(source, "principal", 5, "related_people", true).unwrap();
        store.add_connection(source, "article", 999, "related_people", true).unwrap();
        store.add_connection(source, "content", 110, "related_people", true).unwrap();
        store.add_connection(source, "article", 201, "related_people", true).unwrap();

        let full = manager
            .get_connections_full(EntityKind::Item, 101, "related_people")
            .unwrap();
        assert_eq!(titles(&full), vec!["Ann Berg", "Apple"]);
        assert_eq!(full[0].link, "/author/ann");
        assert_eq!(full[1].subtype, "article");

        fx.directory.remove_principal(5);
        let full = manager
            .get_connections_full(EntityKind::Item, 101, "related_people")
            .unwrap();
        assert_eq!(titles(&full), vec!["Apple"]);
    }

    #[test]
    fn test_full_connections_trim_excerpt() {
        let fx = Fixture::new();
        let (store, manager) = manager(&fx);
        store
            .add_connection(EntityRef::item(102), "content", 101, "see_also", true)
            .unwrap();

        let full = manager.get_connections_full(EntityKind::Item, 102, "see_also").unwrap();
        assert_eq!(
            full[0].excerpt.as_deref(),
            Some("A short walk along the old harbour wall past the boats")
        );
        assert!(manager
            .get_connections_full(EntityKind::Item, 102, "missing")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_reverse_full_resolves_sources() {
        let fx = Fixture::new();
        let (store, manager) = manager(&fx);

        store.add_connection(EntityRef::item(101), "content", 102, "see_also", true).unwrap();
        store.add_connection(EntityRef::item(103), "content", 102, "see_also", true).unwrap();
        store
            .add_connection(EntityRef::term(30), "category", 31, "category_relations", true)
            .unwrap();

        let reverse = manager
            .get_reverse_connections_full(EntityKind::Item, 102, "see_also")
            .unwrap();
        assert_eq!(titles(&reverse), vec!["Harbour walk", "Old mill"]);
        assert_eq!(reverse[0].subtype, "content");

        let reverse = manager
            .get_reverse_connections_full(EntityKind::Term, 31, "category_relations")
            .unwrap();
        assert_eq!(titles(&reverse), vec!["Beaches"]);
        assert_eq!(reverse[0].slug.as_deref(), Some("beaches"));

        fx.directory.remove_item(103);
        let reverse = manager
            .get_reverse_connections_full(EntityKind::Item, 102, "see_also")
            .unwrap();
        assert_eq!(titles(&reverse), vec!["Harbour walk"]);
    }

    #[test]
    fn test_searchable_types_groups() {
        let fx = Fixture::new();
        let (_, manager) = manager(&fx);

        let types = manager.get_searchable_types("related_people");
        assert_eq!(
            types.principals,
            vec![TypeOption {
                value: "principal".to_string(),
                label: "Users".to_string()
            }]
        );
        assert_eq!(types.items[0].label, "Articles");
        assert!(types.taxonomies.is_empty());

        let json = serde_json::to_value(&types).unwrap();
        assert!(json.get("taxonomies").is_none());
        assert!(manager.get_searchable_types("missing").is_empty());
    }

    #[test]
    fn test_type_labels() {
        let fx = Fixture::new();
        let (_, manager) = manager(&fx);

        assert_eq!(manager.get_type_label("principal"), "User");
        assert_eq!(manager.get_type_label("category"), "Category");
        assert_eq!(manager.get_type_label("article"), "Article");
        assert_eq!(manager.get_type_label("widget"), "widget");
    }

    #[test]
    fn test_trim_words_and_strip_tags() {
        assert_eq!(trim_words("one two three", 5), "one two three");
        assert_eq!(trim_words("one  two three", 2), "one two\u{2026}");
        assert_eq!(strip_tags("<p>Hello <b>there</b></p>"), "Hello there");
        assert_eq!(strip_tags("a > b"), "a > b");
    }
}
