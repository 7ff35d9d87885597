//! `loom`: derive design documents from requirement text through a resumable,
//! assistant-driven pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::debug;

use loom::core::phase::PhaseName;
use loom::core::retry::ThreadSleeper;
use loom::core::traceability::ValidationLevel;
use loom::core::types::Decision;
use loom::error::LoomError;
use loom::exit_codes;
use loom::interview::{
    InterviewAction, InterviewRequest, parse_answer, parse_answers, run_interview,
};
use loom::io::assistant::ClaudeAssistant;
use loom::io::config::load_config;
use loom::io::decisions::load_decisions;
use loom::io::input::{InputBundle, read_input_dir, read_input_file};
use loom::io::paths::LoomPaths;
use loom::io::prompt::PromptCatalog;
use loom::io::render::MarkdownRenderer;
use loom::logging;
use loom::pipeline::{Pipeline, PipelineRequest, PipelineStop, describe};
use loom::status::load_status;
use loom::validate::{render_report, run_validate};

#[derive(Parser)]
#[command(
    name = "loom",
    version,
    about = "Resumable document-derivation pipeline driven by an AI assistant"
)]
struct Cli {
    /// Debug-level logs on stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every phase: discover, clarify, derive-l1, derive-l2, derive-l3.
    Cascade {
        #[command(flatten)]
        source: SourceArgs,
        /// Require an existing checkpoint and continue from it.
        #[arg(long)]
        resume: bool,
        /// Re-run this phase and every later one (implies --resume).
        #[arg(long, value_name = "PHASE")]
        from: Option<PhaseName>,
        /// Answer every question with its suggested default.
        #[arg(long)]
        skip_clarify: bool,
    },
    /// Run only the discover phase and write the analysis document.
    Analyze {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Answer open questions; prints JSON and exits 100 while questions remain.
    #[command(group(
        ArgGroup::new("action")
            .args(["init", "answer", "answers", "skip"])
            .multiple(false)
    ))]
    Interview {
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Interview state file (default: <output-dir>/.loom/interview_state.json).
        #[arg(long)]
        state: Option<PathBuf>,
        /// Start a new interview from an analysis document.
        #[arg(long, value_name = "ANALYSIS")]
        init: Option<PathBuf>,
        /// One answer: '{"question_id": "...", "answer": "..."}'.
        #[arg(long, value_name = "JSON")]
        answer: Option<String>,
        /// Several answers as a JSON array.
        #[arg(long, value_name = "JSON")]
        answers: Option<String>,
        /// Accept the suggested answer for the current question.
        #[arg(long)]
        skip: bool,
        /// Show the next group of related questions instead of one question.
        #[arg(long)]
        grouped: bool,
    },
    /// Print per-phase status of the checkpoint.
    Status {
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Check traceability between derived documents; exits 1 on errors.
    Validate {
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Documents to check: l1, l2, l3 or all.
        #[arg(long, default_value = "all")]
        level: ValidationLevel,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
#[group(id = "input", multiple = false)]
struct InputArgs {
    /// Single markdown input file.
    #[arg(long)]
    input_file: Option<PathBuf>,
    /// Directory of markdown input files (top level only).
    #[arg(long)]
    input_dir: Option<PathBuf>,
}

#[derive(Args)]
struct SourceArgs {
    #[command(flatten)]
    input: InputArgs,
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
    /// Existing decision log; defaults to decisions.md inside --input-dir.
    #[arg(long)]
    decisions: Option<PathBuf>,
    /// Config file (default: <output-dir>/.loom/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let code = match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            report(&err);
            exit_codes::ERROR
        }
    };
    std::process::exit(code);
}

fn report(err: &anyhow::Error) {
    eprintln!("error: {err:#}");
    match err.downcast_ref::<LoomError>() {
        Some(LoomError::FingerprintMismatch { .. }) => {
            eprintln!("hint: the input changed since this pipeline started; use a new --output-dir");
        }
        Some(LoomError::PhaseFailed { .. }) => {
            eprintln!("hint: fix the cause and rerun with --resume");
        }
        _ => {}
    }
}

fn run(command: Command) -> Result<i32> {
    match command {
        Command::Cascade {
            source,
            resume,
            from,
            skip_clarify,
        } => cmd_pipeline(&source, resume, from, skip_clarify, None),
        Command::Analyze { source } => {
            cmd_pipeline(&source, false, None, false, Some(PhaseName::Discover))
        }
        Command::Interview {
            output_dir,
            state,
            init,
            answer,
            answers,
            skip,
            grouped,
        } => {
            let action = if let Some(analysis) = init {
                InterviewAction::Init { analysis }
            } else if let Some(raw) = answer {
                InterviewAction::Answer(parse_answer(&raw)?)
            } else if let Some(raw) = answers {
                InterviewAction::Answers(parse_answers(&raw)?)
            } else if skip {
                InterviewAction::Skip
            } else {
                InterviewAction::Next
            };
            let request = InterviewRequest {
                state_path: state.unwrap_or_else(|| LoomPaths::new(output_dir).interview_state_path),
                action,
                grouped,
            };
            let output = run_interview(&request)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("serialize interview output")?
            );
            Ok(output.exit_code())
        }
        Command::Status { output_dir } => {
            print!("{}", load_status(&output_dir)?);
            Ok(exit_codes::OK)
        }
        Command::Validate {
            output_dir,
            level,
            json,
        } => {
            let report = run_validate(&output_dir, level)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("serialize validation report")?
                );
            } else {
                print!("{}", render_report(&report));
            }
            Ok(if report.is_ok() {
                exit_codes::OK
            } else {
                exit_codes::ERROR
            })
        }
    }
}

fn cmd_pipeline(
    source: &SourceArgs,
    resume: bool,
    from: Option<PhaseName>,
    skip_clarify: bool,
    until: Option<PhaseName>,
) -> Result<i32> {
    let paths = LoomPaths::new(&source.output_dir);
    let config_path = source.config.as_ref().unwrap_or(&paths.config_path);
    let config = load_config(config_path)?;
    debug!(config = %config_path.display(), "config loaded");

    let input = read_input(&source.input)?;
    let request = PipelineRequest {
        output_dir: source.output_dir.clone(),
        input,
        existing_decisions: read_existing_decisions(source)?,
        resume,
        from,
        skip_clarify,
        until,
    };

    let assistant = ClaudeAssistant::new(config.assistant.clone());
    let prompts = PromptCatalog::builtin()?;
    let pipeline = Pipeline {
        assistant: &assistant,
        sleeper: &ThreadSleeper,
        retry: config.retry.to_retry_config(),
        prompts: &prompts,
        renderer: &MarkdownRenderer,
    };
    let outcome = pipeline.run(&request)?;
    println!("{}", describe(&outcome));
    match outcome.stop {
        PipelineStop::AwaitingAnswers { .. } => Ok(exit_codes::QUESTIONS_PENDING),
        PipelineStop::Completed | PipelineStop::AlreadyComplete | PipelineStop::Paused { .. } => {
            Ok(exit_codes::OK)
        }
    }
}

fn read_input(args: &InputArgs) -> Result<Option<InputBundle>> {
    match (&args.input_file, &args.input_dir) {
        (Some(file), _) => read_input_file(file).map(Some),
        (None, Some(dir)) => read_input_dir(dir).map(Some),
        (None, None) => Ok(None),
    }
}

fn read_existing_decisions(source: &SourceArgs) -> Result<Vec<Decision>> {
    if let Some(path) = &source.decisions {
        return load_decisions(path);
    }
    match source.input.input_dir.as_deref().map(|dir| dir.join("decisions.md")) {
        Some(path) if path.exists() => load_decisions(&path),
        _ => Ok(Vec::new()),
    }
}
