//! Rendering derived documents to markdown next to their JSON.

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::documents::{DerivedDocument, DocumentKind, Entry};
use crate::io::paths::LoomPaths;
use crate::io::state_store::{write_json_atomic, write_text_atomic};

/// Turns the entries of one document into a human-readable page.
pub trait Renderer {
    fn render(&self, kind: DocumentKind, entries: &[Entry]) -> Result<String>;
}

/// One `##` heading per entry followed by the entry's JSON in a fenced block.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, kind: DocumentKind, entries: &[Entry]) -> Result<String> {
        let mut out = format!("# {}\n\n", kind.title());
        if entries.is_empty() {
            out.push_str("_No entries._\n");
            return Ok(out);
        }
        for entry in entries {
            let body = serde_json::to_string_pretty(&entry.value)
                .with_context(|| format!("serialize entry {}", entry.id))?;
            if entry.title.is_empty() || entry.title == entry.id {
                out.push_str(&format!("## {}\n\n", entry.id));
            } else {
                out.push_str(&format!("## {}: {}\n\n", entry.id, entry.title));
            }
            out.push_str(&format!("```json\n{body}\n```\n\n"));
        }
        Ok(out)
    }
}

/// Write `<stem>.json` and the rendered `<stem>.md` for `document`.
pub fn write_document<D, R>(paths: &LoomPaths, document: &D, renderer: &R) -> Result<()>
where
    D: DerivedDocument,
    R: Renderer + ?Sized,
{
    let kind = D::KIND;
    let json_path = paths.document_json(kind);
    write_json_atomic(&json_path, document)?;

    let entries = document
        .entries()
        .with_context(|| format!("collect entries of {}", kind.file_stem()))?;
    let markdown = renderer.render(kind, &entries)?;
    write_text_atomic(&paths.document_markdown(kind), &markdown)?;
    debug!(document = kind.file_stem(), entries = entries.len(), "document written");
    Ok(())
}
