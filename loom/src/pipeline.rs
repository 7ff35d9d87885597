//! Resumable phase pipeline for `loom cascade` and `loom analyze`.
//!
//! The checkpoint in `.loom/pipeline_state.json` is rewritten right before a
//! phase starts and right after it completes or fails, so an interrupted run
//! resumes from the last phase that did not complete.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{info, instrument, warn};

use crate::core::documents::{
    AcceptanceCriteria, Aggregates, BusinessRules, DataModel, DependencyGraph, DerivedDocument,
    DocumentKind, EventDesign, FeatureTickets, InterfaceContracts, L1Documents, Sequences,
    ServiceBoundaries, TechSpecs, TestCases,
};
use crate::core::phase::{PhaseName, PipelineConfig, PipelineState};
use crate::core::questionnaire::{
    InterviewState, filter_resolved, find_skip_cycle, infer_skip_conditions,
};
use crate::core::retry::{RetryConfig, Sleeper};
use crate::core::types::{AnalysisResult, Decision, DomainModel, Question, QuestionSet};
use crate::error::LoomError;
use crate::io::assistant::{Assistant, request_structured};
use crate::io::decisions::format_decisions;
use crate::io::input::InputBundle;
use crate::io::paths::LoomPaths;
use crate::io::prompt::{PromptCatalog, PromptKind};
use crate::io::render::{Renderer, write_document};
use crate::io::state_store::{
    load_analysis, load_derive_input, load_interview_state, load_pipeline_state, write_analysis,
    write_interview_state, write_pipeline_state, write_text_atomic,
};

const L2_DOCUMENTS: [DocumentKind; 6] = [
    DocumentKind::TestCases,
    DocumentKind::TechSpecs,
    DocumentKind::InterfaceContracts,
    DocumentKind::Aggregates,
    DocumentKind::Sequences,
    DocumentKind::DataModel,
];

const L3_DOCUMENTS: [DocumentKind; 4] = [
    DocumentKind::ServiceBoundaries,
    DocumentKind::EventDesign,
    DocumentKind::FeatureTickets,
    DocumentKind::DependencyGraph,
];

/// What one invocation should do.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub output_dir: PathBuf,
    /// Required to create a pipeline and to run `discover`; checked against
    /// the stored fingerprint whenever given.
    pub input: Option<InputBundle>,
    /// Decisions from an earlier decision log, used to drop resolved questions.
    pub existing_decisions: Vec<Decision>,
    /// Require an existing checkpoint.
    pub resume: bool,
    /// Reset this phase and every later one, then resume.
    pub from: Option<PhaseName>,
    pub skip_clarify: bool,
    /// Stop once this phase has completed.
    pub until: Option<PhaseName>,
}

/// Why `run` returned without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStop {
    /// Every phase is completed.
    Completed,
    /// Nothing ran: the checkpoint was already complete.
    AlreadyComplete,
    /// `until` was reached; `next` is the first phase not run.
    Paused { next: PhaseName },
    /// `clarify` has open questions; answer them with `loom interview`.
    AwaitingAnswers { state_path: PathBuf, pending: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub phases_run: Vec<PhaseName>,
    pub stop: PipelineStop,
}

enum PhaseResult {
    Completed,
    AwaitingAnswers(usize),
}

/// Collaborators the pipeline drives. Built once by the caller.
pub struct Pipeline<'a> {
    pub assistant: &'a dyn Assistant,
    pub sleeper: &'a dyn Sleeper,
    pub retry: RetryConfig,
    pub prompts: &'a PromptCatalog,
    pub renderer: &'a dyn Renderer,
}

impl Pipeline<'_> {
    /// Run phases in order from the first incomplete one.
    ///
    /// A failing phase is recorded as failed on disk and surfaces as
    /// [`LoomError::PhaseFailed`].
    #[instrument(skip_all, fields(output = %request.output_dir.display()))]
    pub fn run(&self, request: &PipelineRequest) -> Result<PipelineOutcome> {
        let paths = LoomPaths::new(&request.output_dir);
        let mut state = prepare_state(&paths, request)?;
        let mut phases_run = Vec::new();

        if state.is_complete() {
            info!("pipeline already complete");
            return Ok(PipelineOutcome {
                phases_run,
                stop: PipelineStop::AlreadyComplete,
            });
        }

        while let Some(phase) = state.next_phase() {
            if request.until.is_some_and(|until| phase > until) {
                return Ok(PipelineOutcome {
                    phases_run,
                    stop: PipelineStop::Paused { next: phase },
                });
            }

            info!(%phase, "phase starting");
            state.mark_running(phase, Utc::now());
            write_pipeline_state(&paths.pipeline_state_path, &state)?;

            match self.run_phase(phase, &paths, request, &state.config) {
                Ok(PhaseResult::Completed) => {
                    state.mark_completed(phase, Utc::now());
                    write_pipeline_state(&paths.pipeline_state_path, &state)?;
                    info!(%phase, "phase completed");
                    phases_run.push(phase);
                }
                Ok(PhaseResult::AwaitingAnswers(pending)) => {
                    state.mark_pending(phase, Utc::now());
                    write_pipeline_state(&paths.pipeline_state_path, &state)?;
                    info!(%phase, pending, "waiting for interview answers");
                    return Ok(PipelineOutcome {
                        phases_run,
                        stop: PipelineStop::AwaitingAnswers {
                            state_path: paths.interview_state_path.clone(),
                            pending,
                        },
                    });
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    warn!(%phase, error = %message, "phase failed");
                    state.mark_failed(phase, message.clone(), Utc::now());
                    write_pipeline_state(&paths.pipeline_state_path, &state)?;
                    return Err(LoomError::PhaseFailed { phase, message }.into());
                }
            }
        }

        Ok(PipelineOutcome {
            phases_run,
            stop: PipelineStop::Completed,
        })
    }

    #[instrument(skip_all, fields(phase = %phase))]
    fn run_phase(
        &self,
        phase: PhaseName,
        paths: &LoomPaths,
        request: &PipelineRequest,
        config: &PipelineConfig,
    ) -> Result<PhaseResult> {
        match phase {
            PhaseName::Discover => {
                let input = request
                    .input
                    .as_ref()
                    .context("discover needs input; pass --input-file or --input-dir")?;
                self.discover(paths, input, &request.existing_decisions)?;
                Ok(PhaseResult::Completed)
            }
            PhaseName::Clarify => clarify(paths, config),
            PhaseName::DeriveL1 => {
                self.derive_l1(paths)?;
                Ok(PhaseResult::Completed)
            }
            PhaseName::DeriveL2 => {
                let context = read_documents(
                    paths,
                    &[DocumentKind::AcceptanceCriteria, DocumentKind::BusinessRules],
                )?;
                for kind in L2_DOCUMENTS {
                    self.derive_kind(kind, paths, &context)?;
                }
                Ok(PhaseResult::Completed)
            }
            PhaseName::DeriveL3 => {
                let mut kinds = vec![DocumentKind::AcceptanceCriteria];
                kinds.extend(L2_DOCUMENTS);
                let context = read_documents(paths, &kinds)?;
                for kind in L3_DOCUMENTS {
                    self.derive_kind(kind, paths, &context)?;
                }
                Ok(PhaseResult::Completed)
            }
        }
    }

    fn ask<T: DeserializeOwned, S: AsRef<str>>(&self, kind: PromptKind, documents: &[S]) -> Result<T> {
        let prompt = self.prompts.render(kind, documents)?;
        request_structured(self.assistant, self.sleeper, &self.retry, &prompt, None)
            .with_context(|| format!("{} request", kind.template_name()))
    }

    fn discover(
        &self,
        paths: &LoomPaths,
        input: &InputBundle,
        existing: &[Decision],
    ) -> Result<()> {
        let domain_model: DomainModel =
            self.ask(PromptKind::DomainDiscovery, &[input.content.as_str()])?;
        let model_json =
            serde_json::to_string_pretty(&domain_model).context("serialize domain model")?;
        info!(
            entities = domain_model.entities.len(),
            operations = domain_model.operations.len(),
            "domain model discovered"
        );

        let context = [model_json.as_str(), input.content.as_str()];
        let entity: QuestionSet = self.ask(PromptKind::EntityAnalysis, &context)?;
        let operation: QuestionSet = self.ask(PromptKind::OperationAnalysis, &context)?;

        let raised = entity.ambiguities.len() + operation.ambiguities.len();
        let questions = dedup_questions(entity.ambiguities.into_iter().chain(operation.ambiguities));
        let mut questions = filter_resolved(questions, existing);
        infer_skip_conditions(&mut questions);
        if let Some(ids) = find_skip_cycle(&questions) {
            return Err(LoomError::SkipCycle { ids }.into());
        }
        info!(raised, kept = questions.len(), "questions collected");

        let analysis = AnalysisResult {
            domain_model,
            questions,
            existing_decisions: existing.to_vec(),
            input_files: input.file_names(),
            input_content: input.content.clone(),
        };
        write_analysis(&paths.analysis_path, &analysis)?;

        // An interview built on the previous analysis no longer applies.
        if paths.interview_state_path.exists() {
            fs::remove_file(&paths.interview_state_path).with_context(|| {
                format!("remove stale {}", paths.interview_state_path.display())
            })?;
        }
        Ok(())
    }

    fn derive_l1(&self, paths: &LoomPaths) -> Result<()> {
        let source = load_derive_input(paths)?;
        let domain_model = source
            .domain_model()
            .ok_or_else(|| anyhow!("derive input carries no domain model"))?;
        let decisions = source.decisions();
        let context = [
            serde_json::to_string_pretty(domain_model).context("serialize domain model")?,
            serde_json::to_string_pretty(&decisions).context("serialize decisions")?,
            source.input_content().to_string(),
        ];

        let documents: L1Documents = self.ask(PromptKind::DeriveL1, &context)?;
        let (acceptance, rules) = documents.split();
        write_document(paths, &acceptance, self.renderer)?;
        write_document(paths, &rules, self.renderer)?;
        write_text_atomic(&paths.decisions_markdown(), &format_decisions(&decisions))?;
        info!(
            acceptance_criteria = acceptance.acceptance_criteria.len(),
            business_rules = rules.business_rules.len(),
            decisions = decisions.len(),
            "l1 documents written"
        );
        Ok(())
    }

    fn derive_kind(&self, kind: DocumentKind, paths: &LoomPaths, context: &[String]) -> Result<()> {
        match kind {
            DocumentKind::AcceptanceCriteria => self.derive::<AcceptanceCriteria>(paths, context),
            DocumentKind::BusinessRules => self.derive::<BusinessRules>(paths, context),
            DocumentKind::TestCases => self.derive::<TestCases>(paths, context),
            DocumentKind::TechSpecs => self.derive::<TechSpecs>(paths, context),
            DocumentKind::InterfaceContracts => self.derive::<InterfaceContracts>(paths, context),
            DocumentKind::Aggregates => self.derive::<Aggregates>(paths, context),
            DocumentKind::Sequences => self.derive::<Sequences>(paths, context),
            DocumentKind::DataModel => self.derive::<DataModel>(paths, context),
            DocumentKind::ServiceBoundaries => self.derive::<ServiceBoundaries>(paths, context),
            DocumentKind::EventDesign => self.derive::<EventDesign>(paths, context),
            DocumentKind::FeatureTickets => self.derive::<FeatureTickets>(paths, context),
            DocumentKind::DependencyGraph => self.derive::<DependencyGraph>(paths, context),
        }
    }

    fn derive<D: DerivedDocument>(&self, paths: &LoomPaths, context: &[String]) -> Result<()> {
        let document: D = self.ask(PromptKind::Document(D::KIND), context)?;
        write_document(paths, &document, self.renderer)?;
        info!(document = D::KIND.file_stem(), "document written");
        Ok(())
    }
}

/// Load or create the checkpoint according to the request flags.
fn prepare_state(paths: &LoomPaths, request: &PipelineRequest) -> Result<PipelineState> {
    let exists = paths.pipeline_state_path.exists();
    let resuming = request.resume || request.from.is_some();
    if resuming && !exists {
        return Err(LoomError::NothingToResume {
            path: paths.pipeline_state_path.display().to_string(),
        }
        .into());
    }

    if !exists {
        let input = request
            .input
            .as_ref()
            .context("no pipeline to resume; pass --input-file or --input-dir")?;
        let state = PipelineState::new(
            input.fingerprint(),
            PipelineConfig {
                skip_clarify: request.skip_clarify,
            },
            Utc::now(),
        );
        info!(fingerprint = %state.input_fingerprint, "pipeline created");
        return Ok(state);
    }

    let mut state = load_pipeline_state(&paths.pipeline_state_path)
        .with_context(|| format!("load {}", paths.pipeline_state_path.display()))?;
    if let Some(input) = &request.input {
        let actual = input.fingerprint();
        if actual != state.input_fingerprint {
            return Err(LoomError::FingerprintMismatch {
                expected: state.input_fingerprint.clone(),
                actual,
            }
            .into());
        }
    }
    if request.skip_clarify {
        state.config.skip_clarify = true;
    }
    if let Some(from) = request.from {
        info!(%from, "resetting phases");
        state.reset_from(from, Utc::now());
        write_pipeline_state(&paths.pipeline_state_path, &state)?;
    }
    Ok(state)
}

/// Open (or reuse) the interview and decide whether derivation can proceed.
fn clarify(paths: &LoomPaths, config: &PipelineConfig) -> Result<PhaseResult> {
    let mut interview = if paths.interview_state_path.exists() {
        load_interview_state(&paths.interview_state_path)?
    } else {
        let analysis = load_analysis(&paths.analysis_path)?;
        let session_id = format!("interview-{}", Utc::now().format("%Y%m%d%H%M%S"));
        InterviewState::from_analysis(session_id, &analysis)?
    };

    if config.skip_clarify {
        let answered = interview.auto_answer_remaining(Utc::now())?;
        info!(answered, "questions answered with suggested defaults");
    }
    interview.refresh_skips();
    let pending = interview.remaining().len();
    interview.complete = pending == 0;
    write_interview_state(&paths.interview_state_path, &interview)?;

    if pending == 0 {
        Ok(PhaseResult::Completed)
    } else {
        Ok(PhaseResult::AwaitingAnswers(pending))
    }
}

/// Keep the first question for each id.
fn dedup_questions(questions: impl IntoIterator<Item = Question>) -> Vec<Question> {
    let mut out: Vec<Question> = Vec::new();
    for question in questions {
        if out.iter().any(|q| q.id == question.id) {
            warn!(id = %question.id, "dropping duplicate question id");
            continue;
        }
        out.push(question);
    }
    out
}

fn read_documents(paths: &LoomPaths, kinds: &[DocumentKind]) -> Result<Vec<String>> {
    kinds
        .iter()
        .map(|kind| {
            let path = paths.document_json(*kind);
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
        })
        .collect()
}

/// Human-readable summary line for a finished run.
pub fn describe(outcome: &PipelineOutcome) -> String {
    match &outcome.stop {
        PipelineStop::Completed => format!(
            "pipeline complete ({} phase(s) run)",
            outcome.phases_run.len()
        ),
        PipelineStop::AlreadyComplete => "pipeline already complete; nothing to do".to_string(),
        PipelineStop::Paused { next } => format!("stopped before {next}; resume with --resume"),
        PipelineStop::AwaitingAnswers {
            state_path,
            pending,
        } => format!(
            "{pending} question(s) need answers: run `loom interview --state {}` then resume with --resume",
            state_path.display()
        ),
    }
}
