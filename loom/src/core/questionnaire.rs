//! Dependency-aware questionnaire engine.
//!
//! [`InterviewState`] owns the questions, the append-only decision log, the
//! cursor and the skipped set. All operations are deterministic; callers pass
//! the timestamp for new decisions.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{
    AnalysisResult, AnswerInput, Decision, DecisionSource, DomainModel, MAX_GROUP_SIZE, Question,
    QuestionGroup, SkipCondition,
};
use crate::error::LoomError;

const SKIPPED_ANSWER: &str = "[SKIPPED]";
const AUTO_ANSWER: &str = "[AI-suggested default]";

/// Persisted interview session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewState {
    pub session_id: String,
    #[serde(default)]
    pub domain_model: Option<DomainModel>,
    pub questions: Vec<Question>,
    /// Append-only. The latest entry per id is the effective answer.
    #[serde(default)]
    pub decisions: Vec<Decision>,
    /// Decisions carried in from an earlier decision log. Not part of the
    /// questionnaire; passed through to derivation.
    #[serde(default)]
    pub existing_decisions: Vec<Decision>,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub skipped: Vec<String>,
    #[serde(default)]
    pub input_content: String,
    #[serde(default)]
    pub complete: bool,
}

/// Derived counters; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub answered: usize,
    pub skipped: usize,
    pub remaining: usize,
    pub total: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.answered, self.total)
    }
}

impl InterviewState {
    /// Build a validated state. Rejects duplicate ids and skip-condition cycles.
    pub fn new(
        session_id: impl Into<String>,
        questions: Vec<Question>,
        input_content: impl Into<String>,
    ) -> Result<Self, LoomError> {
        let state = Self {
            session_id: session_id.into(),
            domain_model: None,
            questions,
            decisions: Vec::new(),
            existing_decisions: Vec::new(),
            current_index: 0,
            skipped: Vec::new(),
            input_content: input_content.into(),
            complete: false,
        };
        state.validate()?;
        Ok(state)
    }

    pub fn from_analysis(
        session_id: impl Into<String>,
        analysis: &AnalysisResult,
    ) -> Result<Self, LoomError> {
        let mut state = Self::new(
            session_id,
            analysis.questions.clone(),
            analysis.input_content.clone(),
        )?;
        state.domain_model = Some(analysis.domain_model.clone());
        state.existing_decisions = analysis.existing_decisions.clone();
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), LoomError> {
        let mut seen = HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(LoomError::DuplicateQuestion {
                    id: question.id.clone(),
                });
            }
        }
        if let Some(ids) = find_skip_cycle(&self.questions) {
            return Err(LoomError::SkipCycle { ids });
        }
        Ok(())
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Effective answer for `id`: the decision with the latest timestamp.
    pub fn latest_decision(&self, id: &str) -> Option<&Decision> {
        latest_decision(&self.decisions, id)
    }

    pub fn is_answered(&self, id: &str) -> bool {
        self.decisions.iter().any(|d| d.id == id)
    }

    pub fn is_skipped(&self, id: &str) -> bool {
        self.skipped.iter().any(|s| s == id)
    }

    /// Record one answer, then mark newly skippable questions.
    pub fn record(&mut self, input: &AnswerInput, now: DateTime<Utc>) -> Result<(), LoomError> {
        self.append_decision(input, now)?;
        self.refresh_skips();
        Ok(())
    }

    /// Record answers in order, followed by a single skip pass.
    ///
    /// Every id is checked before anything is appended, so an unknown id leaves
    /// the state untouched.
    pub fn record_batch(
        &mut self,
        inputs: &[AnswerInput],
        now: DateTime<Utc>,
    ) -> Result<(), LoomError> {
        if let Some(unknown) = inputs.iter().find(|i| self.question(&i.question_id).is_none()) {
            return Err(LoomError::QuestionNotFound {
                id: unknown.question_id.clone(),
            });
        }
        for input in inputs {
            self.append_decision(input, now)?;
        }
        self.refresh_skips();
        Ok(())
    }

    fn append_decision(&mut self, input: &AnswerInput, now: DateTime<Utc>) -> Result<(), LoomError> {
        let index = self
            .questions
            .iter()
            .position(|q| q.id == input.question_id)
            .ok_or_else(|| LoomError::QuestionNotFound {
                id: input.question_id.clone(),
            })?;
        let question = &self.questions[index];
        self.decisions.push(Decision {
            id: question.id.clone(),
            question: question.question.clone(),
            answer: input.answer.clone(),
            decided_at: now,
            source: input.source,
            category: question.category.clone(),
            subject: question.subject.clone(),
        });
        if index == self.current_index {
            self.current_index += 1;
        }
        debug!(id = %input.question_id, source = ?input.source, "decision recorded");
        Ok(())
    }

    /// Mark unanswered questions whose skip conditions now hold. Idempotent.
    pub fn refresh_skips(&mut self) {
        let newly: Vec<String> = self
            .questions
            .iter()
            .filter(|q| !self.is_answered(&q.id) && !self.is_skipped(&q.id))
            .filter(|q| should_skip(q, &self.decisions))
            .map(|q| q.id.clone())
            .collect();
        for id in newly {
            debug!(%id, "question skipped by condition");
            self.skipped.push(id);
        }
    }

    /// Next question needing an answer, walking forward from the cursor.
    ///
    /// Sets the completion flag when nothing remains.
    pub fn next_unanswered(&mut self) -> Option<&Question> {
        let index = self.advance_cursor()?;
        self.questions.get(index)
    }

    fn advance_cursor(&mut self) -> Option<usize> {
        while self.current_index < self.questions.len() {
            let question = &self.questions[self.current_index];
            if self.is_answered(&question.id) || self.is_skipped(&question.id) {
                self.current_index += 1;
                continue;
            }
            if should_skip(question, &self.decisions) {
                let id = question.id.clone();
                self.skipped.push(id);
                self.current_index += 1;
                continue;
            }
            return Some(self.current_index);
        }
        // Out-of-order answers can leave earlier questions open behind the cursor.
        if let Some(index) = self.questions.iter().position(|q| self.is_open(q)) {
            self.current_index = index;
            return Some(index);
        }
        self.complete = true;
        None
    }

    fn is_open(&self, question: &Question) -> bool {
        !self.is_answered(&question.id)
            && !self.is_skipped(&question.id)
            && !should_skip(question, &self.decisions)
    }

    /// Questions still needing an answer, in questionnaire order.
    pub fn remaining(&self) -> Vec<&Question> {
        self.questions.iter().filter(|q| self.is_open(q)).collect()
    }

    /// First group of the remaining questions. Sets the completion flag when
    /// nothing remains.
    pub fn next_group(&mut self) -> Option<QuestionGroup> {
        self.refresh_skips();
        let group = group_questions(self.remaining(), MAX_GROUP_SIZE)
            .into_iter()
            .next();
        if group.is_none() {
            self.complete = true;
        }
        group
    }

    pub fn progress(&self) -> Progress {
        let answered = self
            .questions
            .iter()
            .filter(|q| self.is_answered(&q.id) && !self.is_skipped(&q.id))
            .count();
        Progress {
            answered,
            skipped: self.skipped.len(),
            remaining: self.remaining().len(),
            total: self.questions.len(),
        }
    }

    /// Answer the current question with its suggested answer (or a marker)
    /// and add it to the skipped set. Returns the skipped id.
    pub fn skip_current(&mut self, now: DateTime<Utc>) -> Result<Option<String>, LoomError> {
        let Some(question) = self.next_unanswered() else {
            return Ok(None);
        };
        let id = question.id.clone();
        let answer = question
            .suggested_answer
            .clone()
            .unwrap_or_else(|| SKIPPED_ANSWER.to_string());
        self.append_decision(
            &AnswerInput {
                question_id: id.clone(),
                answer,
                source: DecisionSource::Default,
            },
            now,
        )?;
        self.skipped.push(id.clone());
        self.refresh_skips();
        Ok(Some(id))
    }

    /// Answer every remaining question with its suggested answer, honoring
    /// skip conditions as answers accumulate. Returns how many were answered.
    pub fn auto_answer_remaining(&mut self, now: DateTime<Utc>) -> Result<usize, LoomError> {
        let mut answered = 0usize;
        while let Some(question) = self.next_unanswered() {
            let input = AnswerInput {
                question_id: question.id.clone(),
                answer: question
                    .suggested_answer
                    .clone()
                    .unwrap_or_else(|| AUTO_ANSWER.to_string()),
                source: DecisionSource::Default,
            };
            self.record(&input, now)?;
            answered += 1;
        }
        Ok(answered)
    }

    /// Decisions for derivation: carried-in entries first, then this session's
    /// effective answers in questionnaire order.
    pub fn effective_decisions(&self) -> Vec<Decision> {
        let mut out = self.existing_decisions.clone();
        out.extend(
            self.questions
                .iter()
                .filter_map(|q| self.latest_decision(&q.id).cloned()),
        );
        out
    }
}

/// Latest decision for `id`; among equal timestamps the later entry wins.
pub fn latest_decision<'a>(decisions: &'a [Decision], id: &str) -> Option<&'a Decision> {
    decisions
        .iter()
        .filter(|d| d.id == id)
        .max_by_key(|d| d.decided_at)
}

/// True when any skip condition of `question` is triggered by the log.
pub fn should_skip(question: &Question, decisions: &[Decision]) -> bool {
    question.depends_on.iter().any(|condition| {
        latest_decision(decisions, &condition.question_id).is_some_and(|decision| {
            let answer = decision.answer.to_lowercase();
            condition
                .skip_if_answer
                .iter()
                .any(|trigger| answer.contains(&trigger.to_lowercase()))
        })
    })
}

/// Partition by subject in first-seen order, then chunk each subject.
///
/// Questions without a subject group under their category.
pub fn group_questions<'a, I>(questions: I, max_size: usize) -> Vec<QuestionGroup>
where
    I: IntoIterator<Item = &'a Question>,
{
    let max_size = max_size.max(1);
    let mut order: Vec<String> = Vec::new();
    let mut by_subject: HashMap<String, Vec<Question>> = HashMap::new();
    for question in questions {
        let key = if question.subject.trim().is_empty() {
            question.category.clone()
        } else {
            question.subject.clone()
        };
        let bucket = by_subject.entry(key.clone()).or_default();
        if bucket.is_empty() {
            order.push(key);
        }
        bucket.push(question.clone());
    }

    let mut groups = Vec::new();
    for subject in order {
        let Some(members) = by_subject.remove(&subject) else {
            continue;
        };
        for chunk in members.chunks(max_size) {
            let first = &chunk[0].category;
            let category = if chunk.iter().all(|q| &q.category == first) {
                first.clone()
            } else {
                "mixed".to_string()
            };
            groups.push(QuestionGroup {
                id: format!("GRP-{:03}", groups.len() + 1),
                subject: subject.clone(),
                category,
                questions: chunk.to_vec(),
            });
        }
    }
    groups
}

/// Ids along the first skip-condition cycle found, closing id repeated.
pub fn find_skip_cycle(questions: &[Question]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Active,
        Done,
    }

    let index: HashMap<&str, usize> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| (q.id.as_str(), i))
        .collect();
    let mut marks = vec![Mark::Unvisited; questions.len()];

    for root in 0..questions.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        // (node, next edge to explore)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::Active;
        while let Some(top) = stack.last_mut() {
            let (node, edge) = *top;
            let deps = &questions[node].depends_on;
            if edge >= deps.len() {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            }
            top.1 += 1;
            let Some(&target) = index.get(deps[edge].question_id.as_str()) else {
                continue;
            };
            match marks[target] {
                Mark::Active => {
                    let start = stack.iter().position(|(n, _)| *n == target).unwrap_or(0);
                    let mut ids: Vec<String> = stack[start..]
                        .iter()
                        .map(|(n, _)| questions[*n].id.clone())
                        .collect();
                    ids.push(questions[target].id.clone());
                    return Some(ids);
                }
                Mark::Unvisited => {
                    marks[target] = Mark::Active;
                    stack.push((target, 0));
                }
                Mark::Done => {}
            }
        }
    }
    None
}

struct FollowUpRule {
    kind: &'static str,
    gate: fn(&str) -> bool,
    follow_up: &'static [&'static str],
    triggers: &'static [&'static str],
}

fn is_delete_gate(q: &str) -> bool {
    q.contains("can") && q.contains("deleted")
}

fn is_modify_gate(q: &str) -> bool {
    q.contains("can") && q.contains("modified")
}

fn is_expire_gate(q: &str) -> bool {
    (q.contains("have") || q.contains("support")) && q.contains("expir")
}

const FOLLOW_UP_RULES: &[FollowUpRule] = &[
    FollowUpRule {
        kind: "delete",
        gate: is_delete_gate,
        follow_up: &[
            "after delet",
            "when delet",
            "deletion cascade",
            "upon deletion",
        ],
        triggers: &[
            "cannot be deleted",
            "no deletion",
            "not deletable",
            "cannot delete",
            "soft delete only",
        ],
    },
    FollowUpRule {
        kind: "modify",
        gate: is_modify_gate,
        follow_up: &["after modif", "when modif", "modification trigger"],
        triggers: &[
            "cannot be modified",
            "immutable",
            "no modification",
            "cannot modify",
        ],
    },
    FollowUpRule {
        kind: "expire",
        gate: is_expire_gate,
        follow_up: &["when expir", "after expir", "expiration notification"],
        triggers: &["no expiration", "does not expire", "never expires"],
    },
];

/// Wire follow-up questions to the earlier capability question on the same
/// subject, so a "cannot be deleted" style answer skips them.
///
/// Only earlier questions act as gates, so inferred conditions never form a
/// cycle. Existing conditions are kept.
pub fn infer_skip_conditions(questions: &mut [Question]) {
    let lowered: Vec<String> = questions.iter().map(|q| q.question.to_lowercase()).collect();
    let mut gates: HashMap<(String, &'static str), usize> = HashMap::new();

    for index in 0..questions.len() {
        for rule in FOLLOW_UP_RULES {
            let text = &lowered[index];
            if rule.follow_up.iter().any(|phrase| text.contains(phrase)) {
                let key = (questions[index].subject.clone(), rule.kind);
                if let Some(&gate) = gates.get(&key) {
                    let gate_id = questions[gate].id.clone();
                    let question = &mut questions[index];
                    if !question.depends_on.iter().any(|c| c.question_id == gate_id) {
                        debug!(id = %question.id, gate = %gate_id, kind = rule.kind, "inferred skip condition");
                        question.depends_on.push(SkipCondition {
                            question_id: gate_id,
                            skip_if_answer: rule.triggers.iter().map(|t| (*t).to_string()).collect(),
                        });
                    }
                }
            }
        }
        for rule in FOLLOW_UP_RULES {
            if (rule.gate)(&lowered[index]) {
                gates.insert((questions[index].subject.clone(), rule.kind), index);
            }
        }
    }
}

/// Lowercase, collapse whitespace and drop a trailing question mark.
pub fn normalize_question(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches('?').trim_end().to_lowercase()
}

/// Drop questions already settled by an existing decision (matched on text).
pub fn filter_resolved(questions: Vec<Question>, existing: &[Decision]) -> Vec<Question> {
    let resolved: HashSet<String> = existing
        .iter()
        .map(|d| normalize_question(&d.question))
        .collect();
    questions
        .into_iter()
        .filter(|q| !resolved.contains(&normalize_question(&q.question)))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::test_support::{decision, question, question_on};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .expect("timestamp")
    }

    fn deletion_pair() -> Vec<Question> {
        let gate = question_on("Q1", "Order", "Can an order be deleted?");
        let mut follow = question_on("Q2", "Order", "What happens to line items after deletion?");
        follow.depends_on.push(SkipCondition {
            question_id: "Q1".to_string(),
            skip_if_answer: vec!["cannot be deleted".to_string()],
        });
        vec![gate, follow]
    }

    /// Verifies the follow-up leaves the remaining set once its gate is
    /// answered with a trigger phrase.
    #[test]
    fn skip_condition_removes_follow_up() {
        let mut state = InterviewState::new("s", deletion_pair(), "").expect("state");
        let ids: Vec<&str> = state.remaining().iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["Q1", "Q2"]);

        state
            .record(&AnswerInput::user("Q1", "No, orders Cannot Be Deleted once placed"), at(0))
            .expect("record");

        assert!(state.remaining().is_empty());
        assert!(state.is_skipped("Q2"));
        assert!(state.next_unanswered().is_none());
        assert!(state.complete);
    }

    #[test]
    fn non_trigger_answer_keeps_follow_up() {
        let mut state = InterviewState::new("s", deletion_pair(), "").expect("state");
        state
            .record(&AnswerInput::user("Q1", "Yes, by admins"), at(0))
            .expect("record");
        let next = state.next_unanswered().expect("next");
        assert_eq!(next.id, "Q2");
        assert!(!state.complete);
    }

    #[test]
    fn unknown_question_is_rejected() {
        let mut state = InterviewState::new("s", deletion_pair(), "").expect("state");
        let err = state
            .record(&AnswerInput::user("Q9", "x"), at(0))
            .expect_err("unknown");
        assert!(matches!(err, LoomError::QuestionNotFound { id } if id == "Q9"));
        assert!(state.decisions.is_empty());
    }

    /// Later timestamps win; a re-answer can un-trigger a condition.
    #[test]
    fn latest_answer_wins() {
        let questions = deletion_pair();
        let decisions = vec![
            decision("Q1", "cannot be deleted", at(10)),
            decision("Q1", "yes", at(20)),
        ];
        assert!(!should_skip(&questions[1], &decisions));

        let reordered = vec![
            decision("Q1", "yes", at(20)),
            decision("Q1", "cannot be deleted", at(10)),
        ];
        assert!(!should_skip(&questions[1], &reordered));
    }

    #[test]
    fn condition_on_unanswered_question_is_not_triggered() {
        let questions = deletion_pair();
        assert!(!should_skip(&questions[1], &[]));
    }

    /// Twelve questions on one subject group as 5, 5, 2 in order.
    #[test]
    fn groups_are_chunked_by_five() {
        let questions: Vec<Question> = (1..=12)
            .map(|i| question_on(&format!("Q{i}"), "Invoice", &format!("question {i}")))
            .collect();
        let groups = group_questions(&questions, MAX_GROUP_SIZE);

        let sizes: Vec<usize> = groups.iter().map(|g| g.questions.len()).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
        assert_eq!(groups[0].id, "GRP-001");
        assert_eq!(groups[2].id, "GRP-003");
        assert_eq!(groups[1].questions[0].id, "Q6");
        assert_eq!(groups[2].questions[1].id, "Q12");
        assert!(groups.iter().all(|g| g.subject == "Invoice"));
    }

    #[test]
    fn groups_keep_subject_order_and_mark_mixed_categories() {
        let mut a1 = question_on("A1", "Cart", "a1");
        a1.category = "entity".to_string();
        let b1 = question_on("B1", "User", "b1");
        let mut a2 = question_on("A2", "Cart", "a2");
        a2.category = "operation".to_string();
        let groups = group_questions([&a1, &b1, &a2], MAX_GROUP_SIZE);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].subject, "Cart");
        assert_eq!(groups[0].category, "mixed");
        assert_eq!(groups[1].subject, "User");
    }

    #[test]
    fn batch_records_all_then_skips() {
        let mut questions = deletion_pair();
        questions.push(question("Q3"));
        let mut state = InterviewState::new("s", questions, "").expect("state");
        state
            .record_batch(
                &[
                    AnswerInput::user("Q3", "three"),
                    AnswerInput::user("Q1", "cannot be deleted"),
                ],
                at(0),
            )
            .expect("batch");

        assert_eq!(state.decisions.len(), 2);
        assert_eq!(state.skipped, vec!["Q2".to_string()]);
        let progress = state.progress();
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.skipped, 1);
        assert_eq!(progress.remaining, 0);
        assert_eq!(progress.to_string(), "2/3");
    }

    #[test]
    fn batch_with_unknown_id_changes_nothing() {
        let mut state = InterviewState::new("s", deletion_pair(), "").expect("state");
        let err = state
            .record_batch(
                &[AnswerInput::user("Q1", "yes"), AnswerInput::user("nope", "x")],
                at(0),
            )
            .expect_err("unknown");
        assert!(matches!(err, LoomError::QuestionNotFound { .. }));
        assert!(state.decisions.is_empty());
    }

    /// Answering out of order leaves the earlier question reachable.
    #[test]
    fn out_of_order_answers_do_not_lose_questions() {
        let questions = vec![question("Q1"), question("Q2"), question("Q3")];
        let mut state = InterviewState::new("s", questions, "").expect("state");
        state.record(&AnswerInput::user("Q2", "b"), at(0)).expect("record");
        assert_eq!(state.next_unanswered().expect("next").id, "Q1");
        state.record(&AnswerInput::user("Q1", "a"), at(1)).expect("record");
        assert_eq!(state.next_unanswered().expect("next").id, "Q3");
    }

    #[test]
    fn skip_current_uses_suggested_answer() {
        let mut first = question("Q1");
        first.suggested_answer = Some("use UTC".to_string());
        let mut state =
            InterviewState::new("s", vec![first, question("Q2")], "").expect("state");

        let skipped = state.skip_current(at(0)).expect("skip");
        assert_eq!(skipped.as_deref(), Some("Q1"));
        let decision = state.latest_decision("Q1").expect("decision");
        assert_eq!(decision.answer, "use UTC");
        assert_eq!(decision.source, DecisionSource::Default);

        state.skip_current(at(1)).expect("skip");
        assert_eq!(state.latest_decision("Q2").expect("q2").answer, "[SKIPPED]");
        assert_eq!(state.skip_current(at(2)).expect("skip"), None);
        assert!(state.complete);
    }

    #[test]
    fn auto_answer_honors_skip_conditions() {
        let mut pair = deletion_pair();
        pair[0].suggested_answer = Some("Orders cannot be deleted".to_string());
        let mut state = InterviewState::new("s", pair, "").expect("state");

        let answered = state.auto_answer_remaining(at(0)).expect("auto");
        assert_eq!(answered, 1);
        assert!(state.is_skipped("Q2"));
        assert!(state.complete);
        assert_eq!(state.effective_decisions().len(), 1);
    }

    #[test]
    fn cycles_are_rejected_at_construction() {
        let mut a = question("A");
        let mut b = question("B");
        a.depends_on.push(SkipCondition {
            question_id: "B".to_string(),
            skip_if_answer: vec!["x".to_string()],
        });
        b.depends_on.push(SkipCondition {
            question_id: "A".to_string(),
            skip_if_answer: vec!["y".to_string()],
        });
        let err = InterviewState::new("s", vec![a, b], "").expect_err("cycle");
        match err {
            LoomError::SkipCycle { ids } => assert_eq!(ids, vec!["A", "B", "A"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = InterviewState::new("s", vec![question("A"), question("A")], "")
            .expect_err("duplicate");
        assert!(matches!(err, LoomError::DuplicateQuestion { id } if id == "A"));
    }

    #[test]
    fn dangling_condition_is_not_a_cycle() {
        let mut a = question("A");
        a.depends_on.push(SkipCondition {
            question_id: "missing".to_string(),
            skip_if_answer: vec!["x".to_string()],
        });
        assert!(find_skip_cycle(&[a]).is_none());
    }

    #[test]
    fn inference_links_follow_ups_to_earlier_gate() {
        let mut questions = vec![
            question_on("Q1", "Order", "Can an order be deleted by the customer?"),
            question_on("Q2", "Order", "What happens to invoices after deletion?"),
            question_on("Q3", "Invoice", "What happens to payments after deletion?"),
            question_on("Q4", "Coupon", "Does a coupon have an expiration date?"),
            question_on("Q5", "Coupon", "Who is notified when expiring coupons lapse?"),
        ];
        infer_skip_conditions(&mut questions);

        assert_eq!(questions[1].depends_on.len(), 1);
        assert_eq!(questions[1].depends_on[0].question_id, "Q1");
        assert!(
            questions[1].depends_on[0]
                .skip_if_answer
                .contains(&"cannot be deleted".to_string())
        );
        assert!(questions[2].depends_on.is_empty());
        assert_eq!(questions[4].depends_on[0].question_id, "Q4");
        assert!(find_skip_cycle(&questions).is_none());
    }

    #[test]
    fn resolved_questions_are_filtered_by_text() {
        let questions = vec![
            question_on("Q1", "Order", "Can  an order be DELETED?"),
            question_on("Q2", "Order", "Who approves refunds?"),
        ];
        let mut existing = decision("AMB-OLD-1", "no", at(0));
        existing.question = "can an order be deleted".to_string();
        let kept = filter_resolved(questions, &[existing]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "Q2");
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = InterviewState::new("s", deletion_pair(), "input").expect("state");
        state
            .record(&AnswerInput::user("Q1", "yes"), at(0) + Duration::seconds(5))
            .expect("record");
        let json = serde_json::to_string(&state).expect("serialize");
        let loaded: InterviewState = serde_json::from_str(&json).expect("parse");
        assert_eq!(loaded, state);
    }
}
