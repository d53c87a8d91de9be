//! Presentation of query results.
//!
//! The renderer turns a [`TabularResult`] into the two shapes the console
//! shows: a display table for the result pane and an [`ExplorerPayload`] for
//! the visual explorer. Both conversions are pure and keep column and row
//! order.

pub mod explorer;

pub use explorer::{ExplorerHandle, JsonFileExplorer, VisualExplorer};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::db::{TabularResult, Value};

/// Maximum width for any column.
pub const MAX_COLUMN_WIDTH: usize = 40;

/// Minimum width for any column.
pub const MIN_COLUMN_WIDTH: usize = 4;

/// One rendered cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCell {
    pub text: String,
    pub is_null: bool,
}

impl DisplayCell {
    fn from_value(value: &Value) -> Self {
        Self {
            text: value.to_display_string(),
            is_null: value.is_null(),
        }
    }
}

/// A result laid out for display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<DisplayCell>>,
    /// Column widths in characters, between the min and max width.
    pub widths: Vec<usize>,
    /// Row count and execution time.
    pub footer: String,
    /// Set when the row cap was hit.
    pub warning: Option<String>,
}

impl DisplayTable {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Renders the table as box-drawn text, for one-shot output.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        if self.is_empty() {
            out.push_str("(empty result)\n");
        } else {
            out.push_str(&self.border('┌', '┬', '┐'));
            out.push_str(&self.line(self.headers.iter().map(String::as_str)));
            out.push_str(&self.border('├', '┼', '┤'));
            for row in &self.rows {
                out.push_str(&self.line(row.iter().map(|c| c.text.as_str())));
            }
            out.push_str(&self.border('└', '┴', '┘'));
        }
        out.push_str(&self.footer);
        out.push('\n');
        if let Some(warning) = &self.warning {
            out.push_str(warning);
            out.push('\n');
        }
        out
    }

    fn border(&self, left: char, mid: char, right: char) -> String {
        let segments: Vec<String> = self.widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}\n", left, segments.join(&mid.to_string()), right)
    }

    fn line<'a>(&self, cells: impl Iterator<Item = &'a str>) -> String {
        let mut out = String::from("│");
        for (cell, &width) in cells.zip(&self.widths) {
            out.push_str(&format!(" {:width$} │", truncate(cell, width), width = width));
        }
        out.push('\n');
        out
    }
}

/// Truncates to `max_width` characters, ending in an ellipsis when cut.
pub fn truncate(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let kept: String = s.chars().take(max_width - 3).collect();
        format!("{}...", kept)
    }
}

/// How the explorer should treat a field's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Quantitative,
    Temporal,
    Nominal,
}

impl SemanticType {
    /// Infers the semantic type from the engine's type name.
    pub fn from_engine_type(data_type: &str) -> Self {
        match data_type.to_ascii_lowercase().as_str() {
            "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "float4" | "float8"
            | "real" | "double precision" | "numeric" | "decimal" | "money" | "oid" => {
                Self::Quantitative
            }
            "date" | "time" | "timetz" | "timestamp" | "timestamptz" | "interval" => Self::Temporal,
            _ => Self::Nominal,
        }
    }
}

/// Whether a field is aggregated or grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticRole {
    Measure,
    Dimension,
}

/// Description of one explorer field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub data_type: String,
    pub semantic: SemanticType,
    pub analytic: AnalyticRole,
}

/// Input of the visual explorer: field specs plus one record per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerPayload {
    pub fields: Vec<FieldSpec>,
    pub records: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl ExplorerPayload {
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Converts results for display and exploration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultRenderer;

impl ResultRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Lays out `result` for the result pane.
    pub fn to_table(&self, result: &TabularResult) -> DisplayTable {
        let headers: Vec<String> = result.columns().iter().map(|c| c.name.clone()).collect();
        let rows: Vec<Vec<DisplayCell>> = result
            .rows()
            .iter()
            .map(|row| row.iter().map(DisplayCell::from_value).collect())
            .collect();

        let mut widths: Vec<usize> = headers
            .iter()
            .map(|h| h.chars().count().max(MIN_COLUMN_WIDTH))
            .collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.text.chars().count());
            }
        }
        let widths = widths.into_iter().map(|w| w.min(MAX_COLUMN_WIDTH)).collect();

        let count = result.row_count();
        let footer = format!(
            "{} row{} returned ({}ms)",
            count,
            if count == 1 { "" } else { "s" },
            result.execution_time().as_millis()
        );

        DisplayTable {
            headers,
            rows,
            widths,
            footer,
            warning: result.truncation_warning(),
        }
    }

    /// Builds the explorer input from `result`.
    ///
    /// Records are keyed by column name, so duplicate names get a numeric
    /// suffix (`x`, `x_2`) instead of overwriting each other.
    pub fn to_explorer_input(&self, result: &TabularResult) -> ExplorerPayload {
        let names = unique_names(result.columns().iter().map(|c| c.name.as_str()));

        let fields = result
            .columns()
            .iter()
            .zip(&names)
            .map(|(column, name)| {
                let semantic = SemanticType::from_engine_type(&column.data_type);
                FieldSpec {
                    name: name.clone(),
                    data_type: column.data_type.clone(),
                    semantic,
                    analytic: match semantic {
                        SemanticType::Quantitative => AnalyticRole::Measure,
                        SemanticType::Temporal | SemanticType::Nominal => AnalyticRole::Dimension,
                    },
                }
            })
            .collect();

        let records = result
            .rows()
            .iter()
            .map(|row| {
                names
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Value::to_json))
                    .collect()
            })
            .collect();

        ExplorerPayload { fields, records }
    }
}

fn unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let names: Vec<&str> = names.collect();
    let mut taken: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());

    for name in names {
        let mut candidate = name.to_string();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{}_{}", name, n);
            n += 1;
        }
        taken.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
