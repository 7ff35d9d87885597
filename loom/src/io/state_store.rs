//! Persistence for pipeline, analysis and interview documents.
//!
//! Every document is a complete snapshot, rewritten wholesale (temp file +
//! rename) on each mutation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::phase::PipelineState;
use crate::core::questionnaire::InterviewState;
use crate::core::types::{AnalysisResult, Decision, DomainModel};
use crate::error::LoomError;
use crate::io::paths::LoomPaths;

/// Documents that feed derivation, told apart by their `kind` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisDocument {
    Analysis(AnalysisResult),
    Interview(InterviewState),
}

/// Borrowed twin of [`AnalysisDocument`] for writing without cloning.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum AnalysisDocumentRef<'a> {
    Analysis(&'a AnalysisResult),
    Interview(&'a InterviewState),
}

impl AnalysisDocument {
    pub fn domain_model(&self) -> Option<&DomainModel> {
        match self {
            AnalysisDocument::Analysis(analysis) => Some(&analysis.domain_model),
            AnalysisDocument::Interview(state) => state.domain_model.as_ref(),
        }
    }

    pub fn input_content(&self) -> &str {
        match self {
            AnalysisDocument::Analysis(analysis) => &analysis.input_content,
            AnalysisDocument::Interview(state) => &state.input_content,
        }
    }

    /// Decisions available to derivation.
    pub fn decisions(&self) -> Vec<Decision> {
        match self {
            AnalysisDocument::Analysis(analysis) => analysis.existing_decisions.clone(),
            AnalysisDocument::Interview(state) => state.effective_decisions(),
        }
    }
}

/// Serialize `value` as pretty JSON with a trailing newline, atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    write_text_atomic(path, &buf)
}

pub fn write_text_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Read and parse a JSON document. Shape errors become [`LoomError::StateLoad`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).map_err(|err| state_load(path, err.to_string()))
}

fn state_load(path: &Path, reason: impl Into<String>) -> anyhow::Error {
    LoomError::StateLoad {
        path: path.display().to_string(),
        reason: reason.into(),
    }
    .into()
}

pub fn load_pipeline_state(path: &Path) -> Result<PipelineState> {
    debug!(path = %path.display(), "loading pipeline state");
    let mut state: PipelineState = read_json(path)?;
    state
        .normalize()
        .map_err(|err| state_load(path, err.to_string()))?;
    Ok(state)
}

pub fn write_pipeline_state(path: &Path, state: &PipelineState) -> Result<()> {
    debug!(path = %path.display(), next = ?state.next_phase(), "writing pipeline state");
    write_json_atomic(path, state)
}

pub fn load_analysis_document(path: &Path) -> Result<AnalysisDocument> {
    let document: AnalysisDocument = read_json(path)?;
    if let AnalysisDocument::Interview(state) = &document {
        state
            .validate()
            .map_err(|err| state_load(path, err.to_string()))?;
    }
    Ok(document)
}

pub fn write_analysis(path: &Path, analysis: &AnalysisResult) -> Result<()> {
    write_json_atomic(path, &AnalysisDocumentRef::Analysis(analysis))
}

pub fn load_analysis(path: &Path) -> Result<AnalysisResult> {
    match load_analysis_document(path)? {
        AnalysisDocument::Analysis(analysis) => Ok(analysis),
        AnalysisDocument::Interview(_) => Err(state_load(
            path,
            "expected an analysis document, found an interview state",
        )),
    }
}

pub fn write_interview_state(path: &Path, state: &InterviewState) -> Result<()> {
    debug!(path = %path.display(), decisions = state.decisions.len(), complete = state.complete, "writing interview state");
    write_json_atomic(path, &AnalysisDocumentRef::Interview(state))
}

pub fn load_interview_state(path: &Path) -> Result<InterviewState> {
    match load_analysis_document(path)? {
        AnalysisDocument::Interview(state) => Ok(state),
        AnalysisDocument::Analysis(_) => Err(state_load(
            path,
            "expected an interview state, found an analysis document",
        )),
    }
}

/// Input for derive-l1: the interview state when one exists, else the analysis.
pub fn load_derive_input(paths: &LoomPaths) -> Result<AnalysisDocument> {
    let path = if paths.interview_state_path.exists() {
        &paths.interview_state_path
    } else {
        &paths.analysis_path
    };
    debug!(path = %path.display(), "loading derive input");
    load_analysis_document(path)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::core::phase::{PhaseName, PipelineConfig};
    use crate::test_support::{analysis_with, question};

    #[test]
    fn pipeline_state_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".loom/pipeline_state.json");
        let mut state = PipelineState::new("feed".to_string(), PipelineConfig::default(), Utc::now());
        state.mark_running(PhaseName::Discover, Utc::now());

        write_pipeline_state(&path, &state).expect("write");
        let loaded = load_pipeline_state(&path).expect("load");
        assert_eq!(loaded, state);
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.ends_with("}\n"));
        assert!(!temp.path().join(".loom/pipeline_state.json.tmp").exists());
    }

    #[test]
    fn malformed_state_is_a_state_load_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        fs::write(&path, "{\"version\": \"1.0\"}").expect("write");
        let err = load_pipeline_state(&path).expect_err("invalid");
        assert!(matches!(
            err.downcast_ref::<LoomError>(),
            Some(LoomError::StateLoad { .. })
        ));
    }

    #[test]
    fn documents_resolve_by_discriminant() {
        let temp = tempfile::tempdir().expect("tempdir");
        let analysis_path = temp.path().join("analysis.json");
        let interview_path = temp.path().join("interview.json");
        let analysis = analysis_with(vec![question("Q1")]);
        let interview = InterviewState::from_analysis("s", &analysis).expect("state");

        write_analysis(&analysis_path, &analysis).expect("write analysis");
        write_interview_state(&interview_path, &interview).expect("write interview");

        let raw = fs::read_to_string(&interview_path).expect("read");
        assert!(raw.contains("\"kind\": \"interview\""));
        assert_eq!(load_analysis(&analysis_path).expect("analysis"), analysis);
        assert_eq!(load_interview_state(&interview_path).expect("state"), interview);

        let err = load_interview_state(&analysis_path).expect_err("wrong kind");
        assert!(matches!(
            err.downcast_ref::<LoomError>(),
            Some(LoomError::StateLoad { .. })
        ));
    }

    #[test]
    fn document_without_kind_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("analysis.json");
        let analysis = analysis_with(vec![question("Q1")]);
        fs::write(&path, serde_json::to_string(&analysis).expect("json")).expect("write");
        assert!(load_analysis_document(&path).is_err());
    }

    #[test]
    fn derive_input_prefers_interview_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = LoomPaths::new(temp.path());
        let analysis = analysis_with(vec![question("Q1")]);
        write_analysis(&paths.analysis_path, &analysis).expect("write");
        assert!(matches!(
            load_derive_input(&paths).expect("load"),
            AnalysisDocument::Analysis(_)
        ));

        let interview = InterviewState::from_analysis("s", &analysis).expect("state");
        write_interview_state(&paths.interview_state_path, &interview).expect("write");
        assert!(matches!(
            load_derive_input(&paths).expect("load"),
            AnalysisDocument::Interview(_)
        ));
    }
}
