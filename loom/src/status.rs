//! `loom status`: one line per phase from the checkpoint.

use std::path::Path;

use anyhow::Result;
use chrono::SecondsFormat;

use crate::core::phase::{PhaseName, PipelineState};
use crate::error::LoomError;
use crate::io::paths::LoomPaths;
use crate::io::state_store::load_pipeline_state;

pub fn render_status(state: &PipelineState) -> String {
    let mut out = format!("input {}\n", state.input_fingerprint);
    for phase in PhaseName::ALL {
        let entry = state.phases.get(&phase);
        let status = state.status(phase);
        let updated = entry
            .and_then(|e| e.updated_at)
            .map_or_else(|| "-".to_string(), |at| at.to_rfc3339_opts(SecondsFormat::Secs, true));
        let error = entry.and_then(|e| e.error.as_deref()).unwrap_or("");
        let line = format!("{:<10}{:<11}{:<22}{}", phase.as_str(), status.as_str(), updated, error);
        out.push_str(line.trim_end());
        out.push('\n');
    }
    match state.next_phase() {
        Some(next) => out.push_str(&format!("next {next}\n")),
        None => out.push_str("complete\n"),
    }
    out
}

pub fn load_status(output_dir: &Path) -> Result<String> {
    let paths = LoomPaths::new(output_dir);
    if !paths.pipeline_state_path.exists() {
        return Err(LoomError::NothingToResume {
            path: paths.pipeline_state_path.display().to_string(),
        }
        .into());
    }
    let state = load_pipeline_state(&paths.pipeline_state_path)?;
    Ok(render_status(&state))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::core::phase::PipelineConfig;
    use crate::io::state_store::write_pipeline_state;

    #[test]
    fn lists_every_phase_with_failure_message() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut state = PipelineState::new("0123456789abcdef".to_string(), PipelineConfig::default(), at);
        state.mark_completed(PhaseName::Discover, at);
        state.mark_failed(PhaseName::Clarify, "boom".to_string(), at);

        let text = render_status(&state);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "input 0123456789abcdef");
        assert_eq!(lines[1], "discover  completed  2024-05-01T12:00:00Z");
        assert_eq!(lines[2], "clarify   failed     2024-05-01T12:00:00Z  boom");
        assert_eq!(lines[3], "derive-l1 pending    -");
        assert_eq!(lines[6], "next clarify");
    }

    #[test]
    fn missing_checkpoint_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_status(temp.path()).is_err());

        let paths = LoomPaths::new(temp.path());
        let state = PipelineState::new("fp".to_string(), PipelineConfig::default(), Utc::now());
        write_pipeline_state(&paths.pipeline_state_path, &state).expect("write");
        assert!(load_status(temp.path()).expect("status").ends_with("next discover\n"));
    }
}
