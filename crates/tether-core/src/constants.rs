//! Well-known names and defaults shared across tether-core.

// ============================================================================
// Attribute keys
// ============================================================================

/// Prefix of every connection attribute key.
pub const CONNECTION_KEY_PREFIX: &str = "_conn_";

/// Suffix appended to a forward key to form the reverse key.
pub const REVERSE_KEY_SUFFIX: &str = "_rev";

// ============================================================================
// Subtypes
// ============================================================================

/// Subtype literal used for principal targets in forward tuples.
pub const PRINCIPAL_SUBTYPE: &str = "principal";

/// Source subtype assumed when a schema does not name one.
pub const DEFAULT_ITEM_SUBTYPE: &str = "post";

/// Singular display label for principals.
pub const PRINCIPAL_LABEL: &str = "User";

/// Plural display label for principals.
pub const PRINCIPALS_LABEL: &str = "Users";

// ============================================================================
// Search
// ============================================================================

/// Default number of merged search results returned.
pub const DEFAULT_SEARCH_LIMIT: usize = 30;

/// Default number of hits asked from each individual searcher.
pub const DEFAULT_PER_KIND_LIMIT: usize = 20;

/// Words kept in excerpts of search hits.
pub const SEARCH_EXCERPT_WORDS: usize = 15;

/// Words kept in excerpts of enriched connections.
pub const SUMMARY_EXCERPT_WORDS: usize = 20;

// ============================================================================
// Paths
// ============================================================================

/// Directory under the user's home holding tether state.
pub const TETHER_HOME_DIR: &str = ".tether";

/// File name of the global configuration.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Default data directory name (under [`TETHER_HOME_DIR`]).
pub const DATA_DIR: &str = "data";
