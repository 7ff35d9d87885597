//! Canonical file locations under an output directory.

use std::path::{Path, PathBuf};

use crate::core::documents::DocumentKind;
use crate::core::phase::PhaseName;

/// All canonical paths for one pipeline output directory.
#[derive(Debug, Clone)]
pub struct LoomPaths {
    pub output_dir: PathBuf,
    pub loom_dir: PathBuf,
    pub config_path: PathBuf,
    pub pipeline_state_path: PathBuf,
    pub analysis_path: PathBuf,
    pub interview_state_path: PathBuf,
    pub l1_dir: PathBuf,
    pub l2_dir: PathBuf,
    pub l3_dir: PathBuf,
}

impl LoomPaths {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        let loom_dir = output_dir.join(".loom");
        Self {
            config_path: loom_dir.join("config.toml"),
            pipeline_state_path: loom_dir.join("pipeline_state.json"),
            analysis_path: loom_dir.join("analysis.json"),
            interview_state_path: loom_dir.join("interview_state.json"),
            l1_dir: output_dir.join("l1"),
            l2_dir: output_dir.join("l2"),
            l3_dir: output_dir.join("l3"),
            loom_dir,
            output_dir,
        }
    }

    fn level_dir(&self, phase: PhaseName) -> &Path {
        match phase {
            PhaseName::DeriveL2 => &self.l2_dir,
            PhaseName::DeriveL3 => &self.l3_dir,
            _ => &self.l1_dir,
        }
    }

    pub fn document_json(&self, kind: DocumentKind) -> PathBuf {
        self.level_dir(kind.phase())
            .join(format!("{}.json", kind.file_stem()))
    }

    pub fn document_markdown(&self, kind: DocumentKind) -> PathBuf {
        self.level_dir(kind.phase())
            .join(format!("{}.md", kind.file_stem()))
    }

    pub fn decisions_markdown(&self) -> PathBuf {
        self.l1_dir.join("decisions.md")
    }
}
