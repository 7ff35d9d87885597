//! Test-only helpers: scripted assistants, a recording sleeper and
//! deterministic question/decision builders.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

use crate::core::retry::Sleeper;
use crate::core::types::{
    AnalysisResult, Decision, DecisionSource, DomainModel, Entity, Question, Severity,
};
use crate::io::assistant::Assistant;

/// Assistant that replays queued replies and records every request.
#[derive(Debug, Default)]
pub struct ScriptedAssistant {
    replies: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
    sessions: RefCell<Vec<Option<String>>>,
}

impl ScriptedAssistant {
    /// `Err` entries become assistant failures carrying that message.
    pub fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            ..Self::default()
        }
    }

    /// Queue successful replies only.
    pub fn replies<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn push(&self, reply: Result<String, String>) {
        self.replies.borrow_mut().push_back(reply);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn sessions(&self) -> Vec<Option<String>> {
        self.sessions.borrow().clone()
    }

    pub fn pending(&self) -> usize {
        self.replies.borrow().len()
    }
}

impl Assistant for ScriptedAssistant {
    fn invoke(&self, prompt: &str, session_id: Option<&str>) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.sessions
            .borrow_mut()
            .push(session_id.map(str::to_string));
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted assistant has no reply queued")),
        }
    }
}

/// Sleeper that records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Question with deterministic defaults and no skip conditions.
pub fn question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        category: "general".to_string(),
        subject: String::new(),
        question: format!("{id} question?"),
        severity: Severity::Important,
        suggested_answer: None,
        options: Vec::new(),
        checklist_item: None,
        depends_on: Vec::new(),
    }
}

pub fn question_on(id: &str, subject: &str, text: &str) -> Question {
    Question {
        subject: subject.to_string(),
        question: text.to_string(),
        ..question(id)
    }
}

/// User decision for `id` with the question text [`question`] would produce.
pub fn decision(id: &str, answer: &str, at: DateTime<Utc>) -> Decision {
    Decision {
        id: id.to_string(),
        question: format!("{id} question?"),
        answer: answer.to_string(),
        decided_at: at,
        source: DecisionSource::User,
        category: "general".to_string(),
        subject: String::new(),
    }
}

/// Analysis over a one-entity domain model with the given questions.
pub fn analysis_with(questions: Vec<Question>) -> AnalysisResult {
    AnalysisResult {
        domain_model: DomainModel {
            entities: vec![Entity {
                name: "Order".to_string(),
                ..Entity::default()
            }],
            ..DomainModel::default()
        },
        questions,
        existing_decisions: Vec::new(),
        input_files: vec!["spec.md".to_string()],
        input_content: "<!-- SOURCE: spec.md -->\nOrders are placed by customers.".to_string(),
    }
}
