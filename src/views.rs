//! Tree Views
//!
//! Full-tree row listings for the display side: every attached node in
//! parents-before-children order, with its path, depth, label, and child count.
//! Also formats rows and batch reports as text.

use crate::merge::{BatchReport, MergeEngine};
use crate::types::{NodeKey, Path};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

/// One renderable row of the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRow {
    pub key: NodeKey,
    pub path: Path,
    /// 0 for roots
    pub depth: usize,
    pub label: String,
    pub child_count: usize,
    pub is_placeholder: bool,
}

/// List every attached node depth-first: roots in arrival order, children in
/// sibling order. Orphans and their descendants are not listed.
pub fn tree_rows(engine: &MergeEngine) -> Vec<TreeRow> {
    let store = engine.store();
    let mut rows = Vec::with_capacity(store.len());
    let mut stack: Vec<&NodeKey> = store.roots().into_iter().rev().collect();

    while let Some(key) = stack.pop() {
        let Some(node) = store.get(key) else {
            continue;
        };
        let Ok(path) = engine.path_of(key) else {
            continue;
        };
        let children = store.children_of(key);
        rows.push(TreeRow {
            key: key.clone(),
            depth: path.len().saturating_sub(1),
            path,
            label: node.label().to_string(),
            child_count: children.len(),
            is_placeholder: node.is_placeholder,
        });
        stack.extend(children.iter().rev());
    }
    rows
}

/// Rows for an applied batch, in the batch's rendering order
pub fn batch_rows(engine: &MergeEngine, report: &BatchReport) -> Vec<TreeRow> {
    report
        .rows()
        .filter_map(|(key, path, _)| {
            let node = engine.get(key)?;
            Some(TreeRow {
                key: key.clone(),
                path: path.clone(),
                depth: path.len().saturating_sub(1),
                label: node.label().to_string(),
                child_count: engine.children_of(key).len(),
                is_placeholder: node.is_placeholder,
            })
        })
        .collect()
}

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Indented tree table: label (with child count), key, placeholder marker.
pub fn format_tree_text(rows: &[TreeRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Hierarchy")));
    if rows.is_empty() {
        out.push_str("No attached nodes.\n");
        return out;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Name", "Key", "Placeholder"]);
    for row in rows {
        let name = if row.child_count > 0 {
            format!("{}{}  ({})", "  ".repeat(row.depth), row.label, row.child_count)
        } else {
            format!("{}{}", "  ".repeat(row.depth), row.label)
        };
        let placeholder = if row.is_placeholder { "yes" } else { "" };
        table.add_row(vec![name, row.key.clone(), placeholder.to_string()]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

/// Human-readable batch report
pub fn format_report_text(report: &BatchReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", format_section_heading("Batch")));
    out.push_str(&format!("  {}\n", report.summary()));

    if !report.attached.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Key", "Change", "Path"]);
        for (key, path, change) in report.rows() {
            let change = change
                .map(|c| format!("{:?}", c))
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![key.clone(), change, path.join(" / ")]);
        }
        out.push_str(&format!("{}\n", table));
    }
    for key in &report.removed {
        out.push_str(&format!("  removed: {}\n", key));
    }
    for key in &report.orphaned {
        out.push_str(&format!("  orphaned: {}\n", key));
    }
    for rejection in &report.rejected {
        out.push_str(&format!(
            "  rejected #{} {}: {}\n",
            rejection.index,
            rejection.key.as_deref().unwrap_or("-"),
            rejection.reason
        ));
    }
    out
}
