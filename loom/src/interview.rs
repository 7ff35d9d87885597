//! `loom interview`: answer the questions raised by discovery.
//!
//! Every invocation loads the interview state, applies one action, saves the
//! state and prints an [`InterviewOutput`] as JSON on stdout. The exit code
//! tells scripts whether more answers are needed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use crate::core::questionnaire::InterviewState;
use crate::core::types::{AnswerInput, Question, QuestionGroup};
use crate::exit_codes;
use crate::io::state_store::{load_analysis, load_interview_state, write_interview_state};

const COMPLETE_MESSAGE: &str =
    "all questions answered; continue with `loom cascade --resume`";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStatus {
    Question,
    Group,
    Complete,
}

/// What `loom interview` prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterviewOutput {
    pub status: OutputStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<QuestionGroup>,
    /// `answered/total`.
    pub progress: String,
    pub remaining_count: usize,
    pub skipped_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InterviewOutput {
    pub fn exit_code(&self) -> i32 {
        match self.status {
            OutputStatus::Complete => exit_codes::OK,
            OutputStatus::Question | OutputStatus::Group => exit_codes::QUESTIONS_PENDING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterviewAction {
    /// Start a new interview from an analysis document.
    Init { analysis: PathBuf },
    Answer(AnswerInput),
    Answers(Vec<AnswerInput>),
    /// Accept the suggested answer for the current question.
    Skip,
    /// Show the next question without changing anything.
    Next,
}

#[derive(Debug, Clone)]
pub struct InterviewRequest {
    pub state_path: PathBuf,
    pub action: InterviewAction,
    pub grouped: bool,
}

pub fn parse_answer(raw: &str) -> Result<AnswerInput> {
    serde_json::from_str(raw).with_context(|| format!("parse answer {raw}"))
}

pub fn parse_answers(raw: &str) -> Result<Vec<AnswerInput>> {
    serde_json::from_str(raw).context("parse answers (expected a JSON array)")
}

#[instrument(skip_all, fields(state = %request.state_path.display(), grouped = request.grouped))]
pub fn run_interview(request: &InterviewRequest) -> Result<InterviewOutput> {
    let now = Utc::now();
    let (mut state, message) = match &request.action {
        InterviewAction::Init { analysis } => {
            let analysis_result = load_analysis(analysis)
                .with_context(|| format!("load analysis {}", analysis.display()))?;
            let session_id = format!("interview-{}", now.format("%Y%m%d%H%M%S"));
            let state = InterviewState::from_analysis(session_id, &analysis_result)?;
            info!(questions = state.questions.len(), "interview created");
            (state, None)
        }
        InterviewAction::Answer(input) => {
            let mut state = load(request)?;
            state.record(input, now)?;
            (state, Some(format!("recorded answer for {}", input.question_id)))
        }
        InterviewAction::Answers(inputs) => {
            let mut state = load(request)?;
            state.record_batch(inputs, now)?;
            (state, Some(format!("recorded {} answer(s)", inputs.len())))
        }
        InterviewAction::Skip => {
            let mut state = load(request)?;
            let message = state
                .skip_current(now)?
                .map(|id| format!("skipped {id} with its suggested answer"));
            (state, message)
        }
        InterviewAction::Next => (load(request)?, None),
    };

    let output = next_output(&mut state, request.grouped, message);
    write_interview_state(&request.state_path, &state)?;
    info!(progress = %output.progress, remaining = output.remaining_count, "interview saved");
    Ok(output)
}

fn load(request: &InterviewRequest) -> Result<InterviewState> {
    load_interview_state(&request.state_path).with_context(|| {
        format!(
            "load interview state {} (start one with --init)",
            request.state_path.display()
        )
    })
}

/// Advance to the next question (or group) and describe where the interview stands.
pub fn next_output(
    state: &mut InterviewState,
    grouped: bool,
    message: Option<String>,
) -> InterviewOutput {
    state.refresh_skips();
    let (status, question, group) = if grouped {
        match state.next_group() {
            Some(group) => (OutputStatus::Group, None, Some(group)),
            None => (OutputStatus::Complete, None, None),
        }
    } else {
        match state.next_unanswered().cloned() {
            Some(question) => (OutputStatus::Question, Some(question), None),
            None => (OutputStatus::Complete, None, None),
        }
    };

    let progress = state.progress();
    let message = if status == OutputStatus::Complete {
        Some(match message {
            Some(message) => format!("{message}; {COMPLETE_MESSAGE}"),
            None => COMPLETE_MESSAGE.to_string(),
        })
    } else {
        message
    };
    InterviewOutput {
        status,
        question,
        group,
        progress: progress.to_string(),
        remaining_count: progress.remaining,
        skipped_count: progress.skipped,
        message,
    }
}
