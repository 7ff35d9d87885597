//! Shared deterministic types for the questionnaire and discovery phases.
//!
//! These types are persisted inside the analysis and interview documents, so
//! field names are part of the on-disk contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How much an open question blocks derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Important,
    Minor,
}

/// Skip a question when another question's answer contains any trigger phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCondition {
    pub question_id: String,
    pub skip_if_answer: Vec<String>,
}

/// An open question (ambiguity) raised during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub category: String,
    pub subject: String,
    pub question: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist_item: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<SkipCondition>,
}

/// Where a recorded answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    #[serde(alias = "user_accepted_suggested")]
    User,
    Default,
    Existing,
}

/// Append-only log entry recording one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub decided_at: DateTime<Utc>,
    pub source: DecisionSource,
    pub category: String,
    pub subject: String,
}

/// Answer submitted through `loom interview --answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerInput {
    pub question_id: String,
    pub answer: String,
    #[serde(default = "default_answer_source")]
    pub source: DecisionSource,
}

fn default_answer_source() -> DecisionSource {
    DecisionSource::User
}

impl AnswerInput {
    pub fn user(question_id: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            answer: answer.into(),
            source: DecisionSource::User,
        }
    }
}

/// Read-only projection of up to [`MAX_GROUP_SIZE`] questions sharing a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionGroup {
    pub id: String,
    pub subject: String,
    pub category: String,
    pub questions: Vec<Question>,
}

/// Upper bound on questions per [`QuestionGroup`].
pub const MAX_GROUP_SIZE: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub name: String,
    pub mentioned_attributes: Vec<String>,
    pub mentioned_operations: Vec<String>,
    pub mentioned_states: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Operation {
    pub name: String,
    pub actor: String,
    pub trigger: String,
    pub target: String,
    pub mentioned_inputs: Vec<String>,
    pub mentioned_rules: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub cardinality: String,
}

/// Domain model discovered from the input documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainModel {
    pub entities: Vec<Entity>,
    pub operations: Vec<Operation>,
    pub relationships: Vec<Relationship>,
    pub business_rules: Vec<String>,
    pub ui_mentions: Vec<String>,
}

/// Reply shape for the entity and operation analysis prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSet {
    #[serde(default)]
    pub ambiguities: Vec<Question>,
}

/// Output of the discover phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub domain_model: DomainModel,
    #[serde(alias = "ambiguities")]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub existing_decisions: Vec<Decision>,
    #[serde(default)]
    pub input_files: Vec<String>,
    pub input_content: String,
}
