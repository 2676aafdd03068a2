//! Entity directory: read access to live entities.
//!
//! Entities are owned by the host platform. The connection subsystem only
//! needs to probe whether they exist, render short summaries and search them,
//! which is what [`EntityDirectory`] exposes.
//!
//! [`MemoryDirectory`] is an in-memory implementation that can be loaded from
//! a YAML or JSON snapshot:
//!
//! ```yaml
//! item_types:
//!   article: { name: Articles, singular_name: Article }
//! taxonomies:
//!   category: { name: Categories, singular_name: Category }
//! items:
//!   - { id: 201, item_type: article, title: Apple }
//! terms:
//!   - { id: 30, taxonomy: category, name: Beaches, slug: beaches }
//! principals:
//!   - { id: 5, login: ann, display_name: Ann Berg }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::TetherError;
use crate::types::EntityId;

// ============================================================================
// Records
// ============================================================================

/// Publication status of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Published,
    Draft,
    Private,
    Trashed,
}

/// A content item as known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: EntityId,
    pub item_type: String,
    pub title: String,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub edit_link: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl ItemRecord {
    pub fn new(id: EntityId, item_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            item_type: item_type.into(),
            title: title.into(),
            status: ItemStatus::Published,
            content: String::new(),
            excerpt: None,
            link: None,
            edit_link: None,
            thumbnail: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_published(&self) -> bool {
        self.status == ItemStatus::Published
    }

    pub fn permalink(&self) -> String {
        self.link.clone().unwrap_or_else(|| format!("/?p={}", self.id))
    }

    pub fn edit_permalink(&self) -> String {
        self.edit_link
            .clone()
            .unwrap_or_else(|| format!("/admin/post.php?post={}&action=edit", self.id))
    }

    /// Explicit excerpt, or the content when none was written.
    pub fn excerpt_source(&self) -> &str {
        match self.excerpt.as_deref() {
            Some(excerpt) if !excerpt.trim().is_empty() => excerpt,
            _ => &self.content,
        }
    }
}

/// A taxonomy node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRecord {
    pub id: EntityId,
    pub taxonomy: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    /// Number of items classified under this node.
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub edit_link: Option<String>,
}

impl TermRecord {
    pub fn new(id: EntityId, taxonomy: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            taxonomy: taxonomy.into(),
            slug: name.to_lowercase().replace(' ', "-"),
            name,
            description: String::new(),
            count: 0,
            link: None,
            edit_link: None,
        }
    }

    pub fn permalink(&self) -> String {
        self.link
            .clone()
            .unwrap_or_else(|| format!("/{}/{}", self.taxonomy, self.slug))
    }

    pub fn edit_permalink(&self) -> String {
        self.edit_link.clone().unwrap_or_else(|| {
            format!("/admin/term.php?taxonomy={}&tag_ID={}", self.taxonomy, self.id)
        })
    }
}

/// A principal (user account).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    pub id: EntityId,
    pub login: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub email: String,
    pub display_name: String,
    /// Short free-form line shown under the name in search results.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub edit_link: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl PrincipalRecord {
    pub fn new(id: EntityId, login: impl Into<String>, display_name: impl Into<String>) -> Self {
        let login = login.into();
        Self {
            id,
            handle: login.clone(),
            email: format!("{}@example.org", login),
            login,
            display_name: display_name.into(),
            description: None,
            link: None,
            edit_link: None,
            avatar: None,
        }
    }

    pub fn permalink(&self) -> String {
        let handle = if self.handle.is_empty() {
            &self.login
        } else {
            &self.handle
        };
        self.link
            .clone()
            .unwrap_or_else(|| format!("/author/{}", handle))
    }

    pub fn edit_permalink(&self) -> String {
        self.edit_link
            .clone()
            .unwrap_or_else(|| format!("/admin/user-edit.php?user_id={}", self.id))
    }

    pub fn avatar_url(&self) -> String {
        self.avatar
            .clone()
            .unwrap_or_else(|| format!("/avatar/{}?s=40", self.id))
    }
}

/// Display labels of an item type or taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtypeLabels {
    /// Plural label ("Articles").
    pub name: String,
    /// Singular label ("Article").
    pub singular_name: String,
}

impl SubtypeLabels {
    pub fn new(name: impl Into<String>, singular_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            singular_name: singular_name.into(),
        }
    }
}

/// Parameters shared by all searchers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    /// Entity id left out of the results; `0` excludes nothing.
    pub exclude_id: EntityId,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, exclude_id: EntityId, limit: usize) -> Self {
        Self {
            text: text.into(),
            exclude_id,
            limit,
        }
    }

    fn excludes(&self, id: EntityId) -> bool {
        self.exclude_id != 0 && self.exclude_id == id
    }
}

// ============================================================================
// EntityDirectory
// ============================================================================

/// Read-only view of the platform's live entities.
pub trait EntityDirectory: Send + Sync {
    fn principal(&self, id: EntityId) -> Option<PrincipalRecord>;

    /// Any item with this id, whatever its status.
    fn item(&self, id: EntityId) -> Option<ItemRecord>;

    /// The node `id` if it belongs to `taxonomy`.
    fn term(&self, taxonomy: &str, id: EntityId) -> Option<TermRecord>;

    fn is_taxonomy(&self, name: &str) -> bool;

    fn is_item_type(&self, name: &str) -> bool;

    fn taxonomy_labels(&self, name: &str) -> Option<SubtypeLabels>;

    fn item_type_labels(&self, name: &str) -> Option<SubtypeLabels>;

    /// Principals whose login, handle, email or display name contains the text.
    fn search_principals(&self, query: &SearchQuery) -> Vec<PrincipalRecord>;

    /// Nodes of `taxonomy` whose name contains the text.
    ///
    /// Fails for unknown taxonomies.
    fn search_terms(&self, taxonomy: &str, query: &SearchQuery) -> Result<Vec<TermRecord>, TetherError>;

    /// Published items of `item_type`, most relevant first.
    fn search_items(&self, item_type: &str, query: &SearchQuery) -> Vec<ItemRecord>;
}

// ============================================================================
// MemoryDirectory
// ============================================================================

/// Serialized form of a [`MemoryDirectory`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySnapshot {
    pub item_types: BTreeMap<String, SubtypeLabels>,
    pub taxonomies: BTreeMap<String, SubtypeLabels>,
    pub items: Vec<ItemRecord>,
    pub terms: Vec<TermRecord>,
    pub principals: Vec<PrincipalRecord>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    item_types: BTreeMap<String, SubtypeLabels>,
    taxonomies: BTreeMap<String, SubtypeLabels>,
    items: BTreeMap<EntityId, ItemRecord>,
    terms: BTreeMap<EntityId, TermRecord>,
    principals: BTreeMap<EntityId, PrincipalRecord>,
}

/// In-memory entity directory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        let state = DirectoryState {
            item_types: snapshot.item_types,
            taxonomies: snapshot.taxonomies,
            items: snapshot.items.into_iter().map(|r| (r.id, r)).collect(),
            terms: snapshot.terms.into_iter().map(|r| (r.id, r)).collect(),
            principals: snapshot.principals.into_iter().map(|r| (r.id, r)).collect(),
        };
        Self {
            state: RwLock::new(state),
        }
    }

    /// Load a snapshot file. YAML and JSON are both accepted.
    pub fn from_path(path: &Path) -> Result<Self, TetherError> {
        let contents = fs::read_to_string(path).map_err(|e| TetherError::DirectoryLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let snapshot: DirectorySnapshot =
            serde_yaml::from_str(&contents).map_err(|e| TetherError::DirectoryLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        debug!(
            "Loaded directory snapshot from {:?}: {} items, {} terms, {} principals",
            path,
            snapshot.items.len(),
            snapshot.terms.len(),
            snapshot.principals.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn add_item_type(&self, name: &str, labels: SubtypeLabels) {
        self.write().item_types.insert(name.to_string(), labels);
    }

    pub fn add_taxonomy(&self, name: &str, labels: SubtypeLabels) {
        self.write().taxonomies.insert(name.to_string(), labels);
    }

    pub fn insert_item(&self, record: ItemRecord) {
        self.write().items.insert(record.id, record);
    }

    pub fn insert_term(&self, record: TermRecord) {
        self.write().terms.insert(record.id, record);
    }

    pub fn insert_principal(&self, record: PrincipalRecord) {
        self.write().principals.insert(record.id, record);
    }

    pub fn remove_item(&self, id: EntityId) -> Option<ItemRecord> {
        self.write().items.remove(&id)
    }

    pub fn remove_term(&self, id: EntityId) -> Option<TermRecord> {
        self.write().terms.remove(&id)
    }

    pub fn remove_principal(&self, id: EntityId) -> Option<PrincipalRecord> {
        self.write().principals.remove(&id)
    }

    // The state is plain data, so a panic mid-write cannot leave it in a
    // shape readers would choke on.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, DirectoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DirectoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Relevance of an item for the given lowercase search terms.
///
/// Every term must occur in the title or body; title hits weigh more, and a
/// title containing the whole phrase gets a bonus.
fn item_relevance(item: &ItemRecord, phrase: &str, terms: &[String]) -> Option<u32> {
    let title = item.title.to_lowercase();
    let body = format!("{} {}", item.excerpt.as_deref().unwrap_or(""), item.content).to_lowercase();

    let mut score = 0;
    for term in terms {
        if title.contains(term.as_str()) {
            score += 2;
        } else if body.contains(term.as_str()) {
            score += 1;
        } else {
            return None;
        }
    }
    if !phrase.is_empty() && title.contains(phrase) {
        score += 3;
    }
    Some(score)
}

impl EntityDirectory for MemoryDirectory {
    fn principal(&self, id: EntityId) -> Option<PrincipalRecord> {
        self.read().principals.get(&id).cloned()
    }

    fn item(&self, id: EntityId) -> Option<ItemRecord> {
        self.read().items.get(&id).cloned()
    }

    fn term(&self, taxonomy: &str, id: EntityId) -> Option<TermRecord> {
        self.read()
            .terms
            .get(&id)
            .filter(|term| term.taxonomy == taxonomy)
            .cloned()
    }

    fn is_taxonomy(&self, name: &str) -> bool {
        self.read().taxonomies.contains_key(name)
    }

    fn is_item_type(&self, name: &str) -> bool {
        self.read().item_types.contains_key(name)
    }

    fn taxonomy_labels(&self, name: &str) -> Option<SubtypeLabels> {
        self.read().taxonomies.get(name).cloned()
    }

    fn item_type_labels(&self, name: &str) -> Option<SubtypeLabels> {
        self.read().item_types.get(name).cloned()
    }

    fn search_principals(&self, query: &SearchQuery) -> Vec<PrincipalRecord> {
        let needle = query.text.trim().to_lowercase();
        let mut hits: Vec<PrincipalRecord> = self
            .read()
            .principals
            .values()
            .filter(|p| !query.excludes(p.id))
            .filter(|p| {
                contains_ci(&p.login, &needle)
                    || contains_ci(&p.handle, &needle)
                    || contains_ci(&p.email, &needle)
                    || contains_ci(&p.display_name, &needle)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.login.cmp(&b.login));
        hits.truncate(query.limit);
        hits
    }

    fn search_terms(&self, taxonomy: &str, query: &SearchQuery) -> Result<Vec<TermRecord>, TetherError> {
        let state = self.read();
        if !state.taxonomies.contains_key(taxonomy) {
            return Err(TetherError::DirectoryQuery {
                message: format!("Invalid taxonomy `{}`", taxonomy),
            });
        }

        let needle = query.text.trim().to_lowercase();
        let mut hits: Vec<TermRecord> = state
            .terms
            .values()
            .filter(|t| t.taxonomy == taxonomy && !query.excludes(t.id))
            .filter(|t| contains_ci(&t.name, &needle))
            .cloned()
            .collect();
        hits.sort_by_key(|t| t.name.to_lowercase());
        hits.truncate(query.limit);
        Ok(hits)
    }

    fn search_items(&self, item_type: &str, query: &SearchQuery) -> Vec<ItemRecord> {
        let phrase = query.text.trim().to_lowercase();
        let terms: Vec<String> = phrase.split_whitespace().map(str::to_string).collect();

        let mut scored: Vec<(u32, ItemRecord)> = self
            .read()
            .items
            .values()
            .filter(|item| item.item_type == item_type && item.is_published())
            .filter(|item| !query.excludes(item.id))
            .filter_map(|item| item_relevance(item, &phrase, &terms).map(|s| (s, item.clone())))
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| a.title.cmp(&b.title)));
        scored.truncate(query.limit);
        scored.into_iter().map(|(_, item)| item).collect()
    }
}
