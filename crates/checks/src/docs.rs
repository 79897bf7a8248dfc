//! Check command documentation for `--check-docs` and `--check-docs-md`.

use crate::plugin::{CheckDocs, CheckPluginRegistry};
use std::fmt::Write as _;

fn resources(doc: &CheckDocs) -> String {
    doc.resources
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Plain text docs suitable for a terminal
pub fn render_text(registry: &CheckPluginRegistry) -> String {
    let mut out = String::from("\nChecks Command Documentation\n\n");
    for doc in registry.docs() {
        let _ = write!(
            out,
            "{id}\n{underline}\n\nResources: {resources}\n\n{description}\n\n{flags}\n\n",
            id = doc.id,
            underline = "=".repeat(doc.id.len()),
            resources = resources(&doc),
            description = doc.usage.description,
            flags = doc.usage.flags.trim_end(),
        );
    }
    out
}

/// Markdown docs intended for publishing
pub fn render_markdown(registry: &CheckPluginRegistry) -> String {
    let mut out = String::from(
        "\nChecks Command Documentation\n============================\n\nGet latest docs via: `check-bridge --check-docs`\n\n",
    );
    for doc in registry.docs() {
        let _ = write!(
            out,
            "### `{id}`\n\n**Resources**: {resources}\n\n{description}\n\n```\n{flags}\n```\n\n",
            id = doc.id,
            resources = resources(&doc),
            description = doc.usage.description,
            flags = doc.usage.flags.trim_end(),
        );
    }
    out
}
