//! Table rendering for CLI output using comfy-table.
//!
//! | Command          | Table Function              |
//! |------------------|-----------------------------|
//! | `tether types`   | `render_types_table()`      |
//! | `tether list`    | `render_summaries_table()`  |
//! | `tether search`  | `render_summaries_table()`  |
//! | `tether filters` | `render_filters_table()`    |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};
use tether_core::{ConnectionSchema, EntitySummary, SearchableTypes};

use super::format::truncate_str;

/// Narrowest title column regardless of terminal width.
const MIN_TITLE_WIDTH: usize = 16;

/// Width left for titles after the ID, TYPE and LINK columns.
pub fn title_budget(terminal_width: usize) -> usize {
    terminal_width.saturating_sub(60).max(MIN_TITLE_WIDTH)
}

/// Connected or found entities.
///
/// ```text
/// ID    TYPE       TITLE          LINK
///  102  content    Lighthouse     /?p=102
///    7  principal  Joanna Lie     /author/jlie
/// ```
pub fn render_summaries_table(rows: &[EntitySummary], max_title: usize) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("ID").set_alignment(CellAlignment::Right),
        Cell::new("TYPE"),
        Cell::new("TITLE"),
        Cell::new("LINK"),
    ]);
    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(4)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
        ColumnConstraint::LowerBoundary(Width::Fixed(12)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
    ]);

    for row in rows {
        table.add_row(vec![
            Cell::new(row.id).set_alignment(CellAlignment::Right),
            Cell::new(&row.subtype),
            Cell::new(truncate_str(&row.title, max_title)),
            Cell::new(&row.link),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Registered connection types.
///
/// ```text
/// NAME            FROM                  TO                    DIRECTION  CARDINALITY
/// see_also        item: article, page   item: article, page   both       many-to-many
/// ```
pub fn render_types_table(schemas: &[&ConnectionSchema]) -> String {
    if schemas.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec!["NAME", "FROM", "TO", "DIRECTION", "CARDINALITY"]);

    for schema in schemas {
        let direction = if schema.bidirectional { "both" } else { "forward" };
        table.add_row(vec![
            Cell::new(&schema.name),
            Cell::new(format!("{}: {}", schema.from_kind, schema.from_subtypes.join(", "))),
            Cell::new(format!("{}: {}", schema.to_kind, schema.to_subtypes.join(", "))),
            Cell::new(direction),
            Cell::new(schema.cardinality),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Searchable target subtypes of one connection type.
pub fn render_filters_table(types: &SearchableTypes) -> String {
    if types.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec!["GROUP", "VALUE", "LABEL"]);

    let groups = [
        ("items", &types.items),
        ("principals", &types.principals),
        ("taxonomies", &types.taxonomies),
    ];
    for (group, options) in groups {
        for option in options {
            table.add_row(vec![group, option.value.as_str(), option.label.as_str()]);
        }
    }

    table.trim_fmt().to_string()
}
