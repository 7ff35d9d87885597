//! The markdown decision log (`decisions.md`).
//!
//! derive-l1 renders the effective decisions with [`format_decisions`];
//! `--decisions` reads such a file back with [`parse_decisions`] so earlier
//! answers are not asked again.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use tracing::debug;

use crate::core::types::{Decision, DecisionSource};

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^##\s+([^\s:]+)\s*(?::\s*(.*))?$").expect("heading regex")
});
static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\*\*(Question|Answer|Category|Source|Decided):\*\*\s*(.*)$").expect("field regex")
});

pub fn format_decisions(decisions: &[Decision]) -> String {
    let mut out = String::from("# Design Decisions\n\n");
    if decisions.is_empty() {
        out.push_str("_No decisions recorded._\n");
        return out;
    }
    for decision in decisions {
        if decision.subject.is_empty() {
            out.push_str(&format!("## {}\n\n", decision.id));
        } else {
            out.push_str(&format!("## {}: {}\n\n", decision.id, decision.subject));
        }
        out.push_str(&format!("**Question:** {}\n", single_line(&decision.question)));
        out.push_str(&format!("**Answer:** {}\n", single_line(&decision.answer)));
        if !decision.category.is_empty() {
            out.push_str(&format!("**Category:** {}\n", decision.category));
        }
        out.push_str(&format!("**Source:** {}\n", source_label(decision.source)));
        out.push_str(&format!(
            "**Decided:** {}\n\n---\n\n",
            decision.decided_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
    }
    out
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn source_label(source: DecisionSource) -> &'static str {
    match source {
        DecisionSource::User => "user",
        DecisionSource::Default => "default",
        DecisionSource::Existing => "existing",
    }
}

/// Parse a decision log. Every entry becomes source `existing`; entries
/// without a question are dropped and a missing timestamp falls back to `now`.
pub fn parse_decisions(text: &str, now: DateTime<Utc>) -> Vec<Decision> {
    let mut decisions = Vec::new();
    let mut current: Option<Decision> = None;

    for line in text.lines().map(str::trim) {
        if let Some(caps) = HEADING.captures(line) {
            flush(&mut decisions, current.take());
            current = Some(Decision {
                id: caps[1].to_string(),
                question: String::new(),
                answer: String::new(),
                decided_at: now,
                source: DecisionSource::Existing,
                category: String::new(),
                subject: caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
            });
            continue;
        }
        let (Some(decision), Some(caps)) = (current.as_mut(), FIELD.captures(line)) else {
            continue;
        };
        let value = caps[2].trim().to_string();
        match &caps[1] {
            "Question" => decision.question = value,
            "Answer" => decision.answer = value,
            "Category" => decision.category = value,
            "Decided" => {
                if let Ok(at) = DateTime::parse_from_rfc3339(&value) {
                    decision.decided_at = at.with_timezone(&Utc);
                }
            }
            _ => {}
        }
    }
    flush(&mut decisions, current);
    decisions
}

fn flush(decisions: &mut Vec<Decision>, decision: Option<Decision>) {
    if let Some(decision) = decision.filter(|d| !d.question.is_empty()) {
        decisions.push(decision);
    }
}

pub fn load_decisions(path: &Path) -> Result<Vec<Decision>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read decisions {}", path.display()))?;
    let decisions = parse_decisions(&text, Utc::now());
    debug!(path = %path.display(), count = decisions.len(), "existing decisions loaded");
    Ok(decisions)
}
