//! Reading the source documents a pipeline derives from.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::core::phase::fingerprint;

const SEPARATOR: &str = "\n\n---\n\n";
const DECISIONS_FILE: &str = "decisions.md";

/// Combined input text plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBundle {
    pub content: String,
    pub files: Vec<PathBuf>,
}

impl InputBundle {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.content)
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|p| p.display().to_string()).collect()
    }
}

/// One markdown file, prefixed with its source marker.
pub fn read_input_file(path: &Path) -> Result<InputBundle> {
    let content = read_source(path)?;
    Ok(InputBundle {
        content,
        files: vec![path.to_path_buf()],
    })
}

/// Top-level `.md` files of `dir` in name order, skipping `decisions.md`.
pub fn read_input_dir(dir: &Path) -> Result<InputBundle> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read input dir {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }
        if path.file_name().is_some_and(|name| name == DECISIONS_FILE) {
            continue;
        }
        files.push(path);
    }
    if files.is_empty() {
        bail!("no markdown files found in {}", dir.display());
    }
    files.sort();

    let sections = files
        .iter()
        .map(|path| read_source(path))
        .collect::<Result<Vec<_>>>()?;
    debug!(dir = %dir.display(), files = files.len(), "input directory read");
    Ok(InputBundle {
        content: sections.join(SEPARATOR),
        files,
    })
}

fn read_source(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path).with_context(|| format!("read input {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(format!("<!-- SOURCE: {name} -->\n{text}"))
}
