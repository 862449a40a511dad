//! Static grid configuration: which columns exist, how wide they are and
//! which fields get a render rule. This is the code level counterpart of
//! a config file; it is not editable at runtime.

use serde::{Deserialize, Serialize};

use crate::render::{Matcher, RenderRule};

/// Describes one column of the grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Text label for the column header.
    pub label: String,
    /// Record field this column reads from. Unique across the schema.
    pub field: String,
    /// Opaque layout hint. The ui interprets "N%" as a share of the grid
    /// width and falls back to an equal split for anything else.
    pub width: String,
    /// Whether cell text may wrap over more than one line.
    pub is_multiline: bool,
    /// Whether the column takes part in sort toggling.
    pub sortable: bool,
    /// Hidden columns are loaded and filterable but never drawn.
    pub is_hidden: bool,
}

impl ColumnDef {
    pub fn new(label: &str, field: &str, width: &str) -> Self {
        ColumnDef {
            label: label.to_string(),
            field: field.to_string(),
            width: width.to_string(),
            is_multiline: false,
            sortable: false,
            is_hidden: false,
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn multiline(mut self) -> Self {
        self.is_multiline = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }
}

/// The built-in column schema, modeled on a road event feed: the hidden
/// district column is loaded so it can be filtered on without being drawn.
pub fn default_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("Type", "eventType", "7%").sortable(),
        ColumnDef::new("Severity", "severity", "7%").sortable(),
        ColumnDef::new("Route", "road", "13%").sortable(),
        ColumnDef::new("Description", "description", "58%")
            .sortable()
            .multiline(),
        ColumnDef::new("Last Updated", "lastUpdated", "15%").sortable(),
        ColumnDef::new("District", "district", "0%").hidden(),
    ]
}

/// Render rules for the built-in schema. Event types with a known tag are
/// shown as "<tag> <value>"; everything else falls back to the raw value
/// (empty default template).
pub fn default_render_rules() -> Vec<RenderRule> {
    vec![RenderRule {
        field: "eventType".to_string(),
        template: "@tag@ @value@".to_string(),
        default_template: String::new(),
        matchers: vec![
            Matcher::new("incident", &[("tag", "[!]")]),
            Matcher::new("future planned", &[("tag", "[+]")]),
            Matcher::new("road conditions", &[("tag", "[~]")]),
        ],
    }]
}
