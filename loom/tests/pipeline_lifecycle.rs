//! Pipeline lifecycle tests driven by a scripted assistant.
//!
//! These run the real phase sequence against a temp output directory:
//! discovery, the clarify pause, answering through the interview API,
//! resuming, re-running from a phase, and recovering after a failure.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use loom::core::phase::{PhaseName, PhaseStatus};
use loom::core::retry::RetryConfig;
use loom::core::types::AnswerInput;
use loom::error::LoomError;
use loom::interview::{InterviewAction, InterviewRequest, OutputStatus, run_interview};
use loom::io::assistant::Assistant;
use loom::io::input::InputBundle;
use loom::io::paths::LoomPaths;
use loom::io::prompt::PromptCatalog;
use loom::io::render::MarkdownRenderer;
use loom::io::state_store::{load_analysis, load_interview_state, load_pipeline_state};
use loom::pipeline::{Pipeline, PipelineOutcome, PipelineRequest, PipelineStop};
use loom::test_support::{RecordingSleeper, ScriptedAssistant};

const DOMAIN: &str = r#"Here is the model:
```json
{"entities": [{"name": "Order", "mentioned_states": ["open", "paid"]}],
 "operations": [{"name": "Place order", "actor": "Customer"}]}
```"#;
const ENTITY_QUESTIONS: &str = r#"{"ambiguities": [
  {"id": "AMB-ENT-001", "category": "entity", "subject": "Order",
   "question": "Can an order be deleted?", "severity": "critical",
   "suggested_answer": "Orders cannot be deleted"}]}"#;
const OPERATION_QUESTIONS: &str = r#"{"ambiguities": [
  {"id": "AMB-OP-001", "category": "operation", "subject": "Order",
   "question": "What happens to invoices after deletion?", "severity": "minor"},
  {"id": "AMB-OP-002", "category": "operation", "subject": "Payment",
   "question": "Which payment methods are accepted?", "severity": "important",
   "suggested_answer": "Card only"}]}"#;
const NO_QUESTIONS: &str = r#"{"ambiguities": []}"#;

const L1: &str = r#"```json
{"acceptance_criteria": [{"id": "AC-001", "title": "Place order", "given": "a cart",
  "when": "the customer checks out", "then": "an order is created"}],
 "business_rules": [{"id": "BR-001", "title": "No deletion", "rule": "Orders cannot be deleted"}]}
```"#;
const L2: [&str; 6] = [
    r#"{"test_cases": [{"id": "TC-001", "title": "Checkout", "ac_ref": "AC-001",
        "steps": ["add item", "check out"], "expected": "order created"}]}"#,
    r#"{"tech_specs": [{"id": "TS-001", "title": "Deletion guard", "rule": "BR-001",
        "implementation": "reject deletes"}]}"#,
    r#"{"interface_contracts": [{"id": "IC-001", "service": "OrderService",
        "operations": [{"name": "placeOrder"}]}]}"#,
    r#"{"aggregates": [{"id": "AGG-001", "name": "Order", "root": "Order"}]}"#,
    r#"{"sequences": [{"id": "SEQ-001", "name": "Checkout", "steps": ["validate", "persist"]}]}"#,
    r#"{"tables": [{"name": "orders", "columns": [{"name": "id", "type": "uuid"}]}]}"#,
];
const L3: [&str; 4] = [
    r#"{"services": [{"id": "SVC-001", "name": "Ordering", "responsibility": "orders"}]}"#,
    r#"{"events": [{"id": "EVT-001", "name": "OrderPlaced", "producer": "Ordering"}]}"#,
    r#"{"tickets": [{"id": "FT-001", "title": "Checkout", "description": "Build checkout"}]}"#,
    r#"{"nodes": [{"id": "FT-001", "name": "Checkout"}], "edges": []}"#,
];

fn input(text: &str) -> InputBundle {
    InputBundle {
        content: format!("<!-- SOURCE: orders.md -->\n{text}"),
        files: vec!["orders.md".into()],
    }
}

fn run(
    assistant: &ScriptedAssistant,
    request: &PipelineRequest,
) -> anyhow::Result<PipelineOutcome> {
    let sleeper = RecordingSleeper::default();
    let prompts = PromptCatalog::builtin().expect("prompts");
    let pipeline = Pipeline {
        assistant,
        sleeper: &sleeper,
        // One attempt: a scripted failure or an empty script fails the phase at once.
        retry: RetryConfig {
            max_attempts: 1,
            ..RetryConfig::default()
        },
        prompts: &prompts,
        renderer: &MarkdownRenderer,
    };
    pipeline.run(request)
}

fn derivation_replies() -> Vec<&'static str> {
    let mut replies = vec![L1];
    replies.extend(L2);
    replies.extend(L3);
    replies
}

fn request(root: &Path) -> PipelineRequest {
    PipelineRequest {
        output_dir: root.to_path_buf(),
        input: Some(input("Customers place orders. Orders are paid by card.")),
        ..PipelineRequest::default()
    }
}

/// Full lifecycle: discover, pause for answers, answer, resume to completion,
/// then a no-op rerun.
#[test]
fn clarify_pauses_until_interview_completes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let paths = LoomPaths::new(root);

    let assistant = ScriptedAssistant::replies([DOMAIN, ENTITY_QUESTIONS, OPERATION_QUESTIONS]);
    let outcome = run(&assistant, &request(root)).expect("first run");
    assert_eq!(outcome.phases_run, vec![PhaseName::Discover]);
    match &outcome.stop {
        PipelineStop::AwaitingAnswers {
            state_path,
            pending,
        } => {
            assert_eq!(state_path, &paths.interview_state_path);
            assert_eq!(*pending, 3);
        }
        other => panic!("unexpected stop {other:?}"),
    }

    let analysis = load_analysis(&paths.analysis_path).expect("analysis");
    assert_eq!(analysis.questions.len(), 3);
    assert_eq!(analysis.questions[1].depends_on[0].question_id, "AMB-ENT-001");
    let state = load_pipeline_state(&paths.pipeline_state_path).expect("state");
    assert_eq!(state.status(PhaseName::Discover), PhaseStatus::Completed);
    assert_eq!(state.status(PhaseName::Clarify), PhaseStatus::Pending);

    // The deletion answer skips the follow-up; one question stays open.
    let answer = InterviewRequest {
        state_path: paths.interview_state_path.clone(),
        action: InterviewAction::Answer(AnswerInput::user(
            "AMB-ENT-001",
            "No, orders cannot be deleted",
        )),
        grouped: false,
    };
    let output = run_interview(&answer).expect("answer");
    assert_eq!(output.status, OutputStatus::Question);
    assert_eq!(output.question.map(|q| q.id), Some("AMB-OP-002".to_string()));

    // Resuming while a question is open pauses again without calling the assistant.
    let idle = ScriptedAssistant::default();
    let resume = PipelineRequest {
        resume: true,
        input: None,
        ..request(root)
    };
    let outcome = run(&idle, &resume).expect("second run");
    assert!(matches!(outcome.stop, PipelineStop::AwaitingAnswers { pending: 1, .. }));
    assert!(idle.prompts().is_empty());

    let skip = InterviewRequest {
        action: InterviewAction::Skip,
        ..answer
    };
    assert_eq!(run_interview(&skip).expect("skip").status, OutputStatus::Complete);

    let assistant = ScriptedAssistant::replies(derivation_replies());
    let outcome = run(&assistant, &resume).expect("third run");
    assert_eq!(outcome.stop, PipelineStop::Completed);
    assert_eq!(
        outcome.phases_run,
        vec![
            PhaseName::Clarify,
            PhaseName::DeriveL1,
            PhaseName::DeriveL2,
            PhaseName::DeriveL3
        ]
    );
    assert_eq!(assistant.pending(), 0);

    let prompts = assistant.prompts();
    let l1_prompt = &prompts[0];
    assert!(l1_prompt.contains("No, orders cannot be deleted"));
    assert!(l1_prompt.contains("Card only"));

    for file in [
        "l1/acceptance-criteria.json",
        "l1/business-rules.md",
        "l1/decisions.md",
        "l2/initial-data-model.md",
        "l3/dependency-graph.json",
    ] {
        assert!(root.join(file).exists(), "{file}");
    }
    let decisions = fs::read_to_string(root.join("l1/decisions.md")).expect("decisions");
    assert!(decisions.contains("## AMB-ENT-001: Order"));
    assert!(decisions.contains("**Answer:** Card only"));

    let state = load_pipeline_state(&paths.pipeline_state_path).expect("state");
    assert!(state.is_complete());
    assert!(state.timestamps.completed.is_some());

    let idle = ScriptedAssistant::default();
    let outcome = run(&idle, &request(root)).expect("rerun");
    assert_eq!(outcome.stop, PipelineStop::AlreadyComplete);
    assert!(idle.prompts().is_empty());
}

/// `--from derive-l3` re-runs only that phase and keeps the earlier ones.
#[test]
fn from_phase_reruns_only_later_phases() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    let mut replies = vec![DOMAIN, NO_QUESTIONS, NO_QUESTIONS];
    replies.extend(derivation_replies());
    let assistant = ScriptedAssistant::replies(replies);
    let outcome = run(&assistant, &request(root)).expect("first run");
    assert_eq!(outcome.stop, PipelineStop::Completed);
    assert_eq!(outcome.phases_run.len(), 5);

    let assistant = ScriptedAssistant::replies(L3);
    let rerun = PipelineRequest {
        from: Some(PhaseName::DeriveL3),
        input: None,
        ..request(root)
    };
    let outcome = run(&assistant, &rerun).expect("rerun");
    assert_eq!(outcome.phases_run, vec![PhaseName::DeriveL3]);
    assert_eq!(assistant.prompts().len(), 4);

    let state = load_pipeline_state(&LoomPaths::new(root).pipeline_state_path).expect("state");
    assert_eq!(state.status(PhaseName::DeriveL2), PhaseStatus::Completed);
    assert!(state.is_complete());
}

/// A failure mid-phase is recorded; the next run resumes at that phase.
#[test]
fn failed_phase_resumes_where_it_stopped() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let paths = LoomPaths::new(root);

    let mut replies: Vec<Result<String, String>> = [DOMAIN, NO_QUESTIONS, NO_QUESTIONS, L1, L2[0]]
        .iter()
        .map(|r| Ok((*r).to_string()))
        .collect();
    replies.push(Err("403 forbidden".to_string()));
    let assistant = ScriptedAssistant::new(replies);
    let err = run(&assistant, &request(root)).expect_err("derive-l2 fails");
    assert!(matches!(
        err.downcast_ref::<LoomError>(),
        Some(LoomError::PhaseFailed {
            phase: PhaseName::DeriveL2,
            ..
        })
    ));

    let state = load_pipeline_state(&paths.pipeline_state_path).expect("state");
    assert_eq!(state.status(PhaseName::DeriveL1), PhaseStatus::Completed);
    assert_eq!(state.status(PhaseName::DeriveL2), PhaseStatus::Failed);
    assert!(
        state.phases[&PhaseName::DeriveL2]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("forbidden"))
    );

    let mut replies = L2.to_vec();
    replies.extend(L3);
    let assistant = ScriptedAssistant::replies(replies);
    let resume = PipelineRequest {
        resume: true,
        ..request(root)
    };
    let outcome = run(&assistant, &resume).expect("resume");
    assert_eq!(
        outcome.phases_run,
        vec![PhaseName::DeriveL2, PhaseName::DeriveL3]
    );
}

#[test]
fn skip_clarify_answers_with_defaults() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    let mut replies = vec![DOMAIN, ENTITY_QUESTIONS, OPERATION_QUESTIONS];
    replies.extend(derivation_replies());
    let assistant = ScriptedAssistant::replies(replies);
    let outcome = run(
        &assistant,
        &PipelineRequest {
            skip_clarify: true,
            ..request(root)
        },
    )
    .expect("run");
    assert_eq!(outcome.stop, PipelineStop::Completed);

    let interview =
        load_interview_state(&LoomPaths::new(root).interview_state_path).expect("interview");
    assert!(interview.complete);
    let answers: Vec<&str> = interview.decisions.iter().map(|d| d.answer.as_str()).collect();
    assert_eq!(answers, vec!["Orders cannot be deleted", "Card only"]);
}

#[test]
fn analyze_stops_after_discover() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let assistant = ScriptedAssistant::replies([DOMAIN, NO_QUESTIONS, NO_QUESTIONS]);
    let outcome = run(
        &assistant,
        &PipelineRequest {
            until: Some(PhaseName::Discover),
            ..request(root)
        },
    )
    .expect("analyze");
    assert_eq!(
        outcome.stop,
        PipelineStop::Paused {
            next: PhaseName::Clarify
        }
    );
    assert!(LoomPaths::new(root).analysis_path.exists());
}

#[test]
fn changed_input_is_rejected_on_rerun() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let assistant = ScriptedAssistant::replies([DOMAIN, NO_QUESTIONS, NO_QUESTIONS]);
    run(
        &assistant,
        &PipelineRequest {
            until: Some(PhaseName::Discover),
            ..request(root)
        },
    )
    .expect("analyze");

    let changed = PipelineRequest {
        input: Some(input("Customers place orders and may cancel them.")),
        ..request(root)
    };
    let err = run(&ScriptedAssistant::default(), &changed).expect_err("mismatch");
    assert!(matches!(
        err.downcast_ref::<LoomError>(),
        Some(LoomError::FingerprintMismatch { .. })
    ));
}

/// Records the discover status found on disk at each call, then replies
/// from its script.
struct CheckpointReader {
    state_path: PathBuf,
    script: ScriptedAssistant,
    seen: RefCell<Vec<PhaseStatus>>,
}

impl Assistant for CheckpointReader {
    fn invoke(&self, prompt: &str, session_id: Option<&str>) -> anyhow::Result<String> {
        let state = load_pipeline_state(&self.state_path)?;
        self.seen.borrow_mut().push(state.status(PhaseName::Discover));
        self.script.invoke(prompt, session_id)
    }
}

/// The checkpoint says `running` while discover is still talking to the
/// assistant, so a crash mid-phase is visible on disk.
#[test]
fn running_phase_is_on_disk_before_the_first_call() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let assistant = CheckpointReader {
        state_path: LoomPaths::new(root).pipeline_state_path,
        script: ScriptedAssistant::replies([DOMAIN, NO_QUESTIONS, NO_QUESTIONS]),
        seen: RefCell::new(Vec::new()),
    };
    let sleeper = RecordingSleeper::default();
    let prompts = PromptCatalog::builtin().expect("prompts");
    let pipeline = Pipeline {
        assistant: &assistant,
        sleeper: &sleeper,
        retry: RetryConfig::default(),
        prompts: &prompts,
        renderer: &MarkdownRenderer,
    };
    let outcome = pipeline
        .run(&PipelineRequest {
            until: Some(PhaseName::Discover),
            ..request(root)
        })
        .expect("analyze");
    assert!(matches!(outcome.stop, PipelineStop::Paused { .. }));
    assert_eq!(*assistant.seen.borrow(), vec![PhaseStatus::Running; 3]);

    let state = load_pipeline_state(&assistant.state_path).expect("state");
    assert_eq!(state.status(PhaseName::Discover), PhaseStatus::Completed);
}
