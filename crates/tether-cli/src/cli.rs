//! CLI definition and command dispatch for tether.
//!
//! ## Configuration Precedence
//!
//! 1. CLI flags (`--config`, `--verbose`)
//! 2. Environment variables (`TETHER_CONFIG`, `TETHER_VERBOSE`, `TETHER_COLOR`)
//! 3. Config file (`~/.tether/config.yaml`)
//! 4. Built-in defaults

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::ui::format::{count_noun, format_elapsed};
use crate::ui::{color, table, ColorMode, MessageType, Style};

use tether_core::{
    migrate_connections, AddedTarget, AllowAll, ConnectionApi, ConnectionRequest, ConnectionSchema,
    ConnectionTuple, Connections, DeletionEvent, EntityId, EntityKind, EntityRef, EntitySummary,
    LegacyKeys, MigrationOptions, TetherConfig, TetherError, TracingListener,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Version string including git commit hash
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")");

/// Typed connections between content items, taxonomy nodes and principals
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "TETHER_VERBOSE")]
    pub verbose: bool,

    /// Suppress informational messages
    #[arg(short, long, global = true, env = "TETHER_QUIET")]
    pub quiet: bool,

    /// Path to configuration file (default: ~/.tether/config.yaml)
    #[arg(long, global = true, env = "TETHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Color output mode: always, never, or auto (default: auto)
    #[arg(long, global = true, env = "TETHER_COLOR", default_value = "auto")]
    pub color: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered connection types
    #[command(after_help = r#"EXAMPLES:
    tether types
    tether types --json
"#)]
    Types {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the connections of an entity
    #[command(after_help = r#"EXAMPLES:
    # What does item 12 point at?
    tether list see_also item 12

    # Who points at principal 7?
    tether list related_people principal 7 --reverse
"#)]
    List {
        /// Connection type name
        connection: String,
        /// Entity kind: item, term or principal
        kind: EntityKind,
        /// Entity id
        id: EntityId,
        /// List the entities pointing at this one instead
        #[arg(long)]
        reverse: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Connect an entity to a target
    #[command(after_help = r#"EXAMPLES:
    tether add see_also item 12 article:40
    tether add related_people item 12 principal:7
"#)]
    Add {
        /// Connection type name
        connection: String,
        /// Source entity kind: item, term or principal
        kind: EntityKind,
        /// Source entity id
        id: EntityId,
        /// Target as `type:id`
        target: ConnectionTuple,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Remove a connection
    #[command(after_help = r#"EXAMPLES:
    tether rm see_also item 12 article:40
"#)]
    Rm {
        /// Connection type name
        connection: String,
        /// Source entity kind: item, term or principal
        kind: EntityKind,
        /// Source entity id
        id: EntityId,
        /// Target as `type:id`
        target: ConnectionTuple,
    },

    /// Replace all connections of an entity
    #[command(after_help = r#"EXAMPLES:
    # Exactly these two targets, in this order
    tether set see_also item 12 article:40 page:41

    # Clear everything
    tether set see_also item 12
"#)]
    Set {
        /// Connection type name
        connection: String,
        /// Source entity kind: item, term or principal
        kind: EntityKind,
        /// Source entity id
        id: EntityId,
        /// Targets as `type:id`
        targets: Vec<ConnectionTuple>,
    },

    /// Search for entities a connection type may point at
    #[command(after_help = r#"EXAMPLES:
    tether search related_people ann
    tether search related_people ann --type principal --limit 5
"#)]
    Search {
        /// Connection type name
        connection: String,
        /// Search text
        query: String,
        /// Only search this target subtype
        #[arg(long = "type")]
        type_filter: Option<String>,
        /// Leave this id out of the results
        #[arg(long, default_value_t = 0)]
        exclude: EntityId,
        /// Maximum number of results (default: search.limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the target subtypes of a connection type, grouped for filtering
    Filters {
        /// Connection type name
        connection: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Count the stored connections of an entity
    Count {
        /// Connection type name
        connection: String,
        /// Entity kind: item, term or principal
        kind: EntityKind,
        /// Entity id
        id: EntityId,
    },

    /// Validate the configuration
    Check {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Remove every connection touching an entity that is being deleted
    #[command(after_help = r#"EXAMPLES:
    tether delete item 12
    tether delete term 30 --subtype category
"#)]
    Delete {
        /// Entity kind: item, term or principal
        kind: EntityKind,
        /// Entity id
        id: EntityId,
        /// Item type or taxonomy, if the directory does not know the entity
        #[arg(long)]
        subtype: Option<String>,
    },

    /// Rewrite stored connection lists into the canonical layout
    #[command(after_help = r#"EXAMPLES:
    # Normalize existing lists only
    tether migrate see_also

    # Fold in the legacy keys and preview the result
    tether migrate location_content --legacy --dry-run

    # Custom legacy key names
    tether migrate location_content --legacy-forward _links --legacy-reverse _linked_from
"#)]
    Migrate {
        /// Connection type name
        connection: String,
        /// Fold in legacy keys with their default names
        #[arg(long)]
        legacy: bool,
        /// Legacy forward key (default: _connections)
        #[arg(long)]
        legacy_forward: Option<String>,
        /// Legacy term forward key (default: _term_connections)
        #[arg(long)]
        legacy_terms: Option<String>,
        /// Legacy reverse key (default: _connected_locations)
        #[arg(long)]
        legacy_reverse: Option<String>,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Run function
// ============================================================================

/// Run the CLI application.
///
/// Loads the configuration, opens the connection store and dispatches to the
/// command handler. `check` runs before storage is opened so it can report on
/// a configuration that would not open.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always, debug output only with --verbose
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = format!(
        "tether_core={},tether_db={},tether_cli={}",
        log_level, log_level, log_level
    );

    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let color_mode = ColorMode::parse(&cli.color).unwrap_or_default();
    let style = Style::new(color_mode);

    let config_hint = match &cli.config {
        Some(path) => format!("Check your config at {}", path.display()),
        None => "Check your config at ~/.tether/config.yaml".to_string(),
    };
    let config = match &cli.config {
        Some(path) => TetherConfig::from_path(path),
        None => TetherConfig::load_default(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", config_error(&style, "Failed to load configuration", &e, &config_hint));
            return ExitCode::FAILURE;
        }
    };

    if let Command::Check { json } = cli.command {
        return finish(&style, handle_check(&style, &config, cli.config.as_deref(), json));
    }

    let connections = match Connections::from_config(&config) {
        Ok(connections) => Arc::new(connections),
        Err(e) => {
            eprintln!("{}", config_error(&style, "Failed to open connection storage", &e, &config_hint));
            return ExitCode::FAILURE;
        }
    };
    connections.subscribe(Arc::new(TracingListener));

    let ctx = Context {
        style: &style,
        connections: &connections,
        api: ConnectionApi::new(connections.clone()),
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Command::Types { json } => handle_types(&ctx, json),
        Command::List {
            connection,
            kind,
            id,
            reverse,
            json,
        } => handle_list(&ctx, &connection, kind, id, reverse, json),
        Command::Add {
            connection,
            kind,
            id,
            target,
            json,
        } => handle_add(&ctx, &connection, EntityRef::new(kind, id), target, json),
        Command::Rm {
            connection,
            kind,
            id,
            target,
        } => handle_rm(&ctx, &connection, EntityRef::new(kind, id), target),
        Command::Set {
            connection,
            kind,
            id,
            targets,
        } => handle_set(&ctx, &connection, EntityRef::new(kind, id), &targets),
        Command::Search {
            connection,
            query,
            type_filter,
            exclude,
            limit,
            json,
        } => handle_search(&ctx, &connection, &query, type_filter.as_deref(), exclude, limit, json),
        Command::Filters { connection, json } => handle_filters(&ctx, &connection, json),
        Command::Count { connection, kind, id } => handle_count(&ctx, &connection, EntityRef::new(kind, id)),
        Command::Delete { kind, id, subtype } => handle_delete(&ctx, kind, id, subtype),
        Command::Migrate {
            connection,
            legacy,
            legacy_forward,
            legacy_terms,
            legacy_reverse,
            dry_run,
            json,
        } => {
            let legacy = legacy_keys(legacy, legacy_forward, legacy_terms, legacy_reverse);
            handle_migrate(&ctx, &connection, MigrationOptions { legacy, dry_run }, json)
        }
        Command::Check { .. } => Ok(()),
    };

    let result = result.and_then(|()| connections.flush().map_err(anyhow::Error::from));
    finish(&style, result)
}

fn finish(style: &Style, result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style.message(MessageType::Err, &e.to_string()));
            ExitCode::FAILURE
        }
    }
}

fn config_error(style: &Style, msg: &str, err: &TetherError, default_hint: &str) -> String {
    match err {
        TetherError::InvalidConfiguration { message, hint } => {
            style.error_with_context(msg, Some(message.as_str()), Some(hint.as_str()))
        }
        other => style.error_with_context(msg, Some(other.to_string().as_str()), Some(default_hint)),
    }
}

/// Legacy keys from the migrate flags; `None` when no legacy flag was given.
fn legacy_keys(
    legacy: bool,
    forward: Option<String>,
    terms: Option<String>,
    reverse: Option<String>,
) -> Option<LegacyKeys> {
    if !legacy && forward.is_none() && terms.is_none() && reverse.is_none() {
        return None;
    }
    let defaults = LegacyKeys::default();
    Some(LegacyKeys {
        forward: forward.unwrap_or(defaults.forward),
        term_forward: terms.unwrap_or(defaults.term_forward),
        reverse: reverse.unwrap_or(defaults.reverse),
    })
}

// ============================================================================
// Command handlers
// ============================================================================

struct Context<'a> {
    style: &'a Style,
    connections: &'a Connections,
    api: ConnectionApi,
    quiet: bool,
}

impl Context<'_> {
    fn info(&self, text: &str) {
        if !self.quiet {
            println!("{}", self.style.message(MessageType::Info, text));
        }
    }

    /// Fail early on unknown connection types so typos are not silently empty.
    fn require_connection(&self, name: &str) -> Result<&ConnectionSchema> {
        self.connections
            .registry()
            .get(name)
            .ok_or_else(|| TetherError::UnknownConnectionType(name.to_string()).into())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_summaries(rows: &[EntitySummary]) {
    let max_title = table::title_budget(color::terminal_width());
    println!("{}", table::render_summaries_table(rows, max_title));
}

fn handle_types(ctx: &Context<'_>, json: bool) -> Result<()> {
    let schemas: Vec<&ConnectionSchema> = ctx.connections.registry().get_all().collect();

    if json {
        return print_json(&schemas);
    }
    if schemas.is_empty() {
        ctx.info("No connection types registered");
        println!(
            "{}",
            ctx.style.message(MessageType::Hint, "Add a `connections` section to the config")
        );
        return Ok(());
    }
    println!("{}", ctx.style.section("CONNECTION TYPES"));
    println!();
    println!("{}", table::render_types_table(&schemas));
    Ok(())
}

fn handle_list(
    ctx: &Context<'_>,
    connection: &str,
    kind: EntityKind,
    id: EntityId,
    reverse: bool,
    json: bool,
) -> Result<()> {
    let entity = EntityRef::new(kind, id);
    let rows = if reverse {
        ctx.require_connection(connection)?;
        ctx.connections.get_reverse_connections_full(kind, id, connection)
    } else {
        let list = ctx.api.list(connection, kind, id)?;
        if json {
            return print_json(&list);
        }
        list.connections
    };

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        ctx.info(&format!(
            "{} has no {} connections{}",
            ctx.style.entity(entity),
            ctx.style.connection(connection),
            if reverse { " pointing at it" } else { "" }
        ));
        return Ok(());
    }
    print_summaries(&rows);
    Ok(())
}

fn handle_add(
    ctx: &Context<'_>,
    connection: &str,
    source: EntityRef,
    target: ConnectionTuple,
    json: bool,
) -> Result<()> {
    let request = ConnectionRequest {
        entity_type: source.kind,
        entity_id: source.id,
        target_type: target.subtype.clone(),
        target_id: target.id,
    };
    let response = ctx.api.add(&AllowAll, connection, &request)?;

    if json {
        return print_json(&response);
    }
    let label = match &response.connection {
        AddedTarget::Resolved(summary) => format!("{} ({}:{})", summary.title, target.subtype, target.id),
        AddedTarget::Unresolved { .. } => format!("{}:{}", target.subtype, target.id),
    };
    println!(
        "{}",
        ctx.style.message(
            MessageType::Ok,
            &format!(
                "Connected {} to {} under {}",
                ctx.style.entity(source),
                label,
                ctx.style.connection(connection)
            )
        )
    );
    Ok(())
}

fn handle_rm(ctx: &Context<'_>, connection: &str, source: EntityRef, target: ConnectionTuple) -> Result<()> {
    let existed = ctx
        .connections
        .are_connected(source, &target.subtype, target.id, connection);
    let request = ConnectionRequest {
        entity_type: source.kind,
        entity_id: source.id,
        target_type: target.subtype.clone(),
        target_id: target.id,
    };
    ctx.api.remove(&AllowAll, connection, &request)?;

    let (msg_type, verb) = if existed {
        (MessageType::Ok, "Disconnected")
    } else {
        (MessageType::Skip, "Was not connected:")
    };
    println!(
        "{}",
        ctx.style.message(
            msg_type,
            &format!(
                "{} {} from {}:{} under {}",
                verb,
                ctx.style.entity(source),
                target.subtype,
                target.id,
                ctx.style.connection(connection)
            )
        )
    );
    Ok(())
}

fn handle_set(ctx: &Context<'_>, connection: &str, source: EntityRef, targets: &[ConnectionTuple]) -> Result<()> {
    ctx.require_connection(connection)?;
    let before = ctx.connections.get_connections(source.kind, source.id, connection);

    if !ctx.connections.set_connections(source, targets, connection) {
        anyhow::bail!("Could not update connections of {}", source);
    }

    let after = ctx.connections.get_connections(source.kind, source.id, connection);
    println!(
        "{}",
        ctx.style.message(
            MessageType::Ok,
            &format!(
                "{} now has {} under {}",
                ctx.style.entity(source),
                count_noun(after.len(), "connection", "connections"),
                ctx.style.connection(connection)
            )
        )
    );
    if !ctx.quiet {
        for tuple in before.iter().filter(|t| !after.contains(t)) {
            println!("{}", ctx.style.list_item("-", &format!("{}:{}", tuple.subtype, tuple.id)));
        }
        for tuple in after.iter().filter(|t| !before.contains(t)) {
            println!("{}", ctx.style.list_item("+", &format!("{}:{}", tuple.subtype, tuple.id)));
        }
    }
    Ok(())
}

fn handle_search(
    ctx: &Context<'_>,
    connection: &str,
    query: &str,
    type_filter: Option<&str>,
    exclude: EntityId,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    ctx.require_connection(connection)?;
    let results = ctx
        .connections
        .search_connectable(connection, query, type_filter, exclude, limit);

    if json {
        return print_json(&results);
    }
    if results.is_empty() {
        let schema = ctx.require_connection(connection)?;
        ctx.info(&schema.labels.no_results);
        return Ok(());
    }
    print_summaries(&results);
    Ok(())
}

fn handle_filters(ctx: &Context<'_>, connection: &str, json: bool) -> Result<()> {
    let types = ctx.api.types(&AllowAll, connection)?;
    if json {
        return print_json(&types);
    }
    if types.is_empty() {
        ctx.info(&format!(
            "{} targets no known subtypes",
            ctx.style.connection(connection)
        ));
        return Ok(());
    }
    println!("{}", table::render_filters_table(&types));
    Ok(())
}

fn handle_count(ctx: &Context<'_>, connection: &str, source: EntityRef) -> Result<()> {
    ctx.require_connection(connection)?;
    println!("{}", ctx.connections.connection_count(source, connection));
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    config_path: Option<PathBuf>,
    valid: bool,
    warnings: Vec<String>,
    errors: Vec<String>,
    connection_types: usize,
}

fn handle_check(
    style: &Style,
    config: &TetherConfig,
    explicit_path: Option<&std::path::Path>,
    json: bool,
) -> Result<()> {
    let (warnings, errors) = match config.validate() {
        Ok(warnings) => (warnings, Vec::new()),
        Err(e) => (Vec::new(), vec![e.to_string()]),
    };
    let report = CheckReport {
        config_path: explicit_path
            .map(|p| p.to_path_buf())
            .or_else(TetherConfig::default_path),
        valid: errors.is_empty(),
        warnings,
        errors,
        connection_types: config.connections.len(),
    };

    if json {
        print_json(&report)?;
    } else {
        if let Some(path) = &report.config_path {
            println!("  {}", style.key_value("Config", &path.display().to_string()));
        }
        println!(
            "  {}",
            style.key_value("Connection types", &report.connection_types.to_string())
        );
        for warning in &report.warnings {
            println!("{}", style.message(MessageType::Warn, warning));
        }
        for error in &report.errors {
            println!("{}", style.message(MessageType::Err, error));
        }
        if report.valid {
            println!("{}", style.message(MessageType::Ok, "Configuration is valid"));
        }
    }

    if report.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration has {}", count_noun(report.errors.len(), "error", "errors"))
    }
}

fn handle_delete(ctx: &Context<'_>, kind: EntityKind, id: EntityId, subtype: Option<String>) -> Result<()> {
    let mut event = DeletionEvent::new(kind, id);
    if let Some(subtype) = subtype {
        event = event.with_subtype(subtype);
    }
    let entity = EntityRef::new(kind, id);
    let summary = ctx.connections.handle_deletion(&event);

    if summary.is_empty() {
        println!(
            "{}",
            ctx.style.message(
                MessageType::Skip,
                &format!("No connections touched {}", ctx.style.entity(entity))
            )
        );
        return Ok(());
    }
    println!(
        "{}",
        ctx.style.message(MessageType::Ok, &format!("Cleaned up {}", ctx.style.entity(entity)))
    );
    println!(
        "{}",
        ctx.style.message_detail(
            "Forward edges removed",
            &summary.forward_edges_removed.to_string()
        )
    );
    println!(
        "{}",
        ctx.style.message_detail(
            "Reverse entries removed",
            &summary.reverse_entries_removed.to_string()
        )
    );
    Ok(())
}

fn handle_migrate(ctx: &Context<'_>, connection: &str, options: MigrationOptions, json: bool) -> Result<()> {
    let report = migrate_connections(ctx.connections.store(), connection, &options)?;

    if json {
        return print_json(&report);
    }

    let headline = format!(
        "{} {} in {}",
        if report.dry_run { "Would migrate" } else { "Migrated" },
        count_noun(report.entities_processed, "entity", "entities"),
        format_elapsed(report.started_at, report.finished_at)
    );
    println!("{}", ctx.style.message(MessageType::Ok, &headline));
    println!(
        "{}",
        ctx.style
            .message_detail("Connections", &report.connections_migrated.to_string())
    );
    println!(
        "{}",
        ctx.style
            .message_detail("Term connections", &report.term_connections_migrated.to_string())
    );
    println!(
        "{}",
        ctx.style
            .message_detail("Reverse lists", &report.reverse_lists_migrated.to_string())
    );
    if report.dropped > 0 {
        println!(
            "{}",
            ctx.style.message(
                MessageType::Warn,
                &format!(
                    "{} could not be resolved and were dropped",
                    count_noun(report.dropped, "entry", "entries")
                )
            )
        );
    }
    for error in &report.errors {
        println!("{}", ctx.style.message(MessageType::Warn, error));
    }
    if report.dry_run {
        println!(
            "{}",
            ctx.style.message(MessageType::Hint, "Run again without --dry-run to write the changes")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_keys_from_flags() {
        assert!(legacy_keys(false, None, None, None).is_none());
        assert_eq!(legacy_keys(true, None, None, None), Some(LegacyKeys::default()));

        let keys = legacy_keys(false, None, None, Some("_linked_from".to_string())).unwrap();
        assert_eq!(keys.reverse, "_linked_from");
        assert_eq!(keys.forward, "_connections");
    }

    #[test]
    fn test_cli_parses_targets() {
        let cli = Cli::try_parse_from(["tether", "set", "see_also", "post", "12", "article:40", "principal:7"]).unwrap();
        let Command::Set { kind, id, targets, .. } = cli.command else {
            panic!("expected set");
        };
        assert_eq!(kind, EntityKind::Item);
        assert_eq!(id, 12);
        assert_eq!(targets, vec![ConnectionTuple::new(40, "article"), ConnectionTuple::new(7, "principal")]);
    }

    #[test]
    fn test_cli_rejects_bad_target() {
        assert!(Cli::try_parse_from(["tether", "add", "see_also", "item", "12", "article"]).is_err());
        assert!(Cli::try_parse_from(["tether", "add", "see_also", "widget", "12", "article:4"]).is_err());
    }
}
