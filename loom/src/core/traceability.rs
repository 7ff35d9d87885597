//! Traceability rules over the derived documents.
//!
//! Every rule is a pure function of a [`DocumentSet`]. A rule that finds
//! problems fails its check; only error-severity findings fail the report.
//! Loading the set from an output directory lives in [`crate::validate`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{Result, bail};
use regex::Regex;
use serde::Serialize;

use crate::core::documents::{
    AcceptanceCriteria, Aggregates, BusinessRules, DataModel, DependencyGraph, DocumentKind,
    EventDesign, FeatureTickets, InterfaceContracts, Sequences, ServiceBoundaries, TechSpecs,
    TestCases,
};
use crate::core::phase::PhaseName;

/// Share of test cases that must exercise failure paths.
pub const MIN_NEGATIVE_RATIO: f64 = 0.20;

/// Test case categories counted as negative tests.
const NEGATIVE_CATEGORIES: [&str; 2] = ["error", "negative"];
const HALLUCINATION_CATEGORY: &str = "hallucination";

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+)(?:-[A-Z0-9]+)+$").expect("id regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Rule {
    V001,
    V002,
    V003,
    V004,
    V005,
    V006,
    V007,
    V008,
    V009,
    V010,
}

impl Rule {
    pub const ALL: [Rule; 10] = [
        Rule::V001,
        Rule::V002,
        Rule::V003,
        Rule::V004,
        Rule::V005,
        Rule::V006,
        Rule::V007,
        Rule::V008,
        Rule::V009,
        Rule::V010,
    ];

    pub fn describe(self) -> &'static str {
        match self {
            Rule::V001 => "every document has entries",
            Rule::V002 => "ids follow their document's pattern",
            Rule::V003 => "references resolve to existing ids",
            Rule::V004 => "every business rule has a tech spec",
            Rule::V005 => "every acceptance criterion has a test case",
            Rule::V006 => "every domain entity belongs to an aggregate",
            Rule::V007 => "every service has an interface contract",
            Rule::V008 => "negative tests make up at least 20% of test cases",
            Rule::V009 => "every acceptance criterion has a hallucination test",
            Rule::V010 => "ids are unique",
        }
    }

    /// Phase whose documents a cross-document rule inspects. `None` means the
    /// rule runs over every document in the level.
    fn phase(self) -> Option<PhaseName> {
        match self {
            Rule::V001 | Rule::V002 | Rule::V003 | Rule::V010 => None,
            Rule::V004 | Rule::V005 | Rule::V006 | Rule::V008 | Rule::V009 => {
                Some(PhaseName::DeriveL2)
            }
            Rule::V007 => Some(PhaseName::DeriveL3),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which documents a validation run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    L1,
    L2,
    L3,
    All,
}

impl ValidationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationLevel::L1 => "l1",
            ValidationLevel::L2 => "l2",
            ValidationLevel::L3 => "l3",
            ValidationLevel::All => "all",
        }
    }

    pub fn covers(self, phase: PhaseName) -> bool {
        match self {
            ValidationLevel::L1 => phase == PhaseName::DeriveL1,
            ValidationLevel::L2 => phase == PhaseName::DeriveL2,
            ValidationLevel::L3 => phase == PhaseName::DeriveL3,
            ValidationLevel::All => true,
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "l1" | "derive-l1" => ValidationLevel::L1,
            "l2" | "derive-l2" => ValidationLevel::L2,
            "l3" | "derive-l3" => ValidationLevel::L3,
            "all" => ValidationLevel::All,
            other => bail!("unknown level {other:?} (expected l1, l2, l3 or all)"),
        };
        Ok(level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skip,
}

impl CheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub rule: Rule,
    pub status: CheckStatus,
    pub message: String,
    /// Items the rule looked at.
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: Rule,
    pub severity: FindingSeverity,
    /// File stem of the document the finding is about.
    pub document: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
}

impl Finding {
    fn new(
        rule: Rule,
        severity: FindingSeverity,
        kind: DocumentKind,
        id: Option<&str>,
        message: String,
    ) -> Self {
        Self {
            rule,
            severity,
            document: kind.file_stem().to_string(),
            id: id.map(str::to_string),
            message,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub level: ValidationLevel,
    pub checks: Vec<Check>,
    pub findings: Vec<Finding>,
    pub summary: Summary,
}

impl ValidationReport {
    /// True when no finding is an error. Warnings do not fail a report.
    pub fn is_ok(&self) -> bool {
        self.summary.errors == 0
    }
}

/// The documents of one output directory. Absent documents are `None`.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    pub acceptance_criteria: Option<AcceptanceCriteria>,
    pub business_rules: Option<BusinessRules>,
    pub test_cases: Option<TestCases>,
    pub tech_specs: Option<TechSpecs>,
    pub interface_contracts: Option<InterfaceContracts>,
    pub aggregates: Option<Aggregates>,
    pub sequences: Option<Sequences>,
    pub data_model: Option<DataModel>,
    pub services: Option<ServiceBoundaries>,
    pub events: Option<EventDesign>,
    pub tickets: Option<FeatureTickets>,
    pub dependency_graph: Option<DependencyGraph>,
    /// Entity names from the domain model, when discovery has run.
    pub entities: Option<Vec<String>>,
}

struct Loaded<'a> {
    kind: DocumentKind,
    ids: Vec<&'a str>,
    entries: usize,
}

impl<'a> Loaded<'a> {
    fn identified(kind: DocumentKind, ids: impl Iterator<Item = &'a str>) -> Self {
        let ids: Vec<&str> = ids.collect();
        Self {
            kind,
            entries: ids.len(),
            ids,
        }
    }

    fn unidentified(kind: DocumentKind, entries: usize) -> Self {
        Self {
            kind,
            ids: Vec::new(),
            entries,
        }
    }
}

impl DocumentSet {
    pub fn is_empty(&self) -> bool {
        self.loaded().is_empty()
    }

    fn loaded(&self) -> Vec<Loaded<'_>> {
        let mut out = Vec::new();
        if let Some(doc) = &self.acceptance_criteria {
            out.push(Loaded::identified(
                DocumentKind::AcceptanceCriteria,
                doc.acceptance_criteria.iter().map(|i| i.id.as_str()),
            ));
        }
        if let Some(doc) = &self.business_rules {
            out.push(Loaded::identified(
                DocumentKind::BusinessRules,
                doc.business_rules.iter().map(|i| i.id.as_str()),
            ));
        }
        if let Some(doc) = &self.test_cases {
            out.push(Loaded::identified(
                DocumentKind::TestCases,
                doc.test_cases.iter().map(|i| i.id.as_str()),
            ));
        }
        if let Some(doc) = &self.tech_specs {
            out.push(Loaded::identified(
                DocumentKind::TechSpecs,
                doc.tech_specs.iter().map(|i| i.id.as_str()),
            ));
        }
        if let Some(doc) = &self.interface_contracts {
            out.push(Loaded::identified(
                DocumentKind::InterfaceContracts,
                doc.interface_contracts.iter().map(|i| i.id.as_str()),
            ));
        }
        if let Some(doc) = &self.aggregates {
            out.push(Loaded::identified(
                DocumentKind::Aggregates,
                doc.aggregates.iter().map(|i| i.id.as_str()),
            ));
        }
        if let Some(doc) = &self.sequences {
            out.push(Loaded::identified(
                DocumentKind::Sequences,
                doc.sequences.iter().map(|i| i.id.as_str()),
            ));
        }
        if let Some(doc) = &self.data_model {
            out.push(Loaded::unidentified(
                DocumentKind::DataModel,
                doc.tables.len() + doc.enums.len(),
            ));
        }
        if let Some(doc) = &self.services {
            out.push(Loaded::identified(
                DocumentKind::ServiceBoundaries,
                doc.services.iter().map(|i| i.id.as_str()),
            ));
        }
        if let Some(doc) = &self.events {
            out.push(Loaded::identified(
                DocumentKind::EventDesign,
                doc.events.iter().map(|i| i.id.as_str()),
            ));
        }
        if let Some(doc) = &self.tickets {
            out.push(Loaded::identified(
                DocumentKind::FeatureTickets,
                doc.tickets.iter().map(|i| i.id.as_str()),
            ));
        }
        if let Some(doc) = &self.dependency_graph {
            out.push(Loaded::unidentified(
                DocumentKind::DependencyGraph,
                doc.nodes.len(),
            ));
        }
        out
    }
}

/// What a rule looked at and what it found.
struct Evaluation {
    checked: usize,
    findings: Vec<Finding>,
}

/// Why a rule did not run.
type Skipped = String;

struct Scope<'a> {
    docs: &'a DocumentSet,
    level: ValidationLevel,
    loaded: Vec<Loaded<'a>>,
}

impl<'a> Scope<'a> {
    fn in_level(&self) -> impl Iterator<Item = &Loaded<'a>> {
        self.loaded
            .iter()
            .filter(|doc| self.level.covers(doc.kind.phase()))
    }

    fn ids_of(&self, kind: DocumentKind) -> Option<HashSet<&'a str>> {
        self.loaded
            .iter()
            .find(|doc| doc.kind == kind)
            .map(|doc| doc.ids.iter().copied().collect())
    }
}

/// Run every rule at `level` and summarize.
pub fn validate(docs: &DocumentSet, level: ValidationLevel) -> ValidationReport {
    let scope = Scope {
        docs,
        level,
        loaded: docs.loaded(),
    };
    let mut checks = Vec::new();
    let mut findings = Vec::new();

    for rule in Rule::ALL {
        let evaluation = match rule.phase() {
            Some(phase) if !level.covers(phase) => {
                Err(format!("not checked at level {level}"))
            }
            _ => evaluate(rule, &scope),
        };
        let check = match evaluation {
            Err(reason) => Check {
                rule,
                status: CheckStatus::Skip,
                message: format!("{}: {reason}", rule.describe()),
                count: 0,
            },
            Ok(evaluation) if evaluation.findings.is_empty() => Check {
                rule,
                status: CheckStatus::Pass,
                message: format!("{} ({} checked)", rule.describe(), evaluation.checked),
                count: evaluation.checked,
            },
            Ok(evaluation) => {
                let message = format!(
                    "{} ({} problem(s) in {} checked)",
                    rule.describe(),
                    evaluation.findings.len(),
                    evaluation.checked
                );
                findings.extend(evaluation.findings);
                Check {
                    rule,
                    status: CheckStatus::Fail,
                    message,
                    count: evaluation.checked,
                }
            }
        };
        checks.push(check);
    }

    let summary = summarize(&checks, &findings);
    ValidationReport {
        level,
        checks,
        findings,
        summary,
    }
}

fn evaluate(rule: Rule, scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    match rule {
        Rule::V001 => documents_have_entries(scope),
        Rule::V002 => ids_follow_pattern(scope),
        Rule::V003 => references_resolve(scope),
        Rule::V004 => rules_have_tech_specs(scope),
        Rule::V005 => criteria_have_test_cases(scope),
        Rule::V006 => entities_have_aggregates(scope),
        Rule::V007 => services_have_contracts(scope),
        Rule::V008 => negative_ratio(scope),
        Rule::V009 => criteria_have_hallucination_tests(scope),
        Rule::V010 => ids_are_unique(scope),
    }
}

fn summarize(checks: &[Check], findings: &[Finding]) -> Summary {
    let count_status = |status: CheckStatus| checks.iter().filter(|c| c.status == status).count();
    let count_severity = |severity: FindingSeverity| findings.iter().filter(|f| f.severity == severity).count();
    Summary {
        total_checks: checks.len(),
        passed: count_status(CheckStatus::Pass),
        failed: count_status(CheckStatus::Fail),
        skipped: count_status(CheckStatus::Skip),
        errors: count_severity(FindingSeverity::Error),
        warnings: count_severity(FindingSeverity::Warning),
    }
}

fn documents_have_entries(scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    let docs: Vec<&Loaded> = scope.in_level().collect();
    if docs.is_empty() {
        return Err("no documents found".to_string());
    }
    let findings = docs
        .iter()
        .filter(|doc| doc.entries == 0)
        .map(|doc| {
            Finding::new(
                Rule::V001,
                FindingSeverity::Error,
                doc.kind,
                None,
                "document has no entries".to_string(),
            )
        })
        .collect();
    Ok(Evaluation {
        checked: docs.len(),
        findings,
    })
}

fn ids_follow_pattern(scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    let mut checked = 0;
    let mut findings = Vec::new();
    for doc in scope.in_level() {
        let Some(prefix) = doc.kind.id_prefix() else {
            continue;
        };
        for id in &doc.ids {
            checked += 1;
            let matches = ID_PATTERN
                .captures(id)
                .is_some_and(|caps| &caps[1] == prefix);
            if !matches {
                findings.push(Finding::new(
                    Rule::V002,
                    FindingSeverity::Warning,
                    doc.kind,
                    Some(*id),
                    format!("id does not match {prefix}-<SEGMENT>, e.g. {prefix}-001"),
                ));
            }
        }
    }
    if checked == 0 {
        return Err("no identified entries".to_string());
    }
    Ok(Evaluation { checked, findings })
}

fn ids_are_unique(scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    let mut first_seen: HashMap<&str, DocumentKind> = HashMap::new();
    let mut checked = 0;
    let mut findings = Vec::new();
    for doc in scope.in_level() {
        for id in &doc.ids {
            checked += 1;
            if let Some(first) = first_seen.get(id) {
                findings.push(Finding::new(
                    Rule::V010,
                    FindingSeverity::Error,
                    doc.kind,
                    Some(*id),
                    format!("duplicate id (first used in {})", first.file_stem()),
                ));
            } else {
                first_seen.insert(*id, doc.kind);
            }
        }
    }
    if checked == 0 {
        return Err("no identified entries".to_string());
    }
    Ok(Evaluation { checked, findings })
}

/// One outgoing link from an entry.
struct Reference<'a> {
    from: DocumentKind,
    from_id: &'a str,
    target: &'a str,
    to: DocumentKind,
}

fn references_resolve(scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    let docs = scope.docs;
    let level = scope.level;
    let mut refs: Vec<Reference> = Vec::new();

    if level.covers(PhaseName::DeriveL2) {
        if let Some(doc) = &docs.test_cases {
            refs.extend(doc.test_cases.iter().map(|tc| Reference {
                from: DocumentKind::TestCases,
                from_id: &tc.id,
                target: &tc.ac_ref,
                to: DocumentKind::AcceptanceCriteria,
            }));
        }
        if let Some(doc) = &docs.tech_specs {
            refs.extend(doc.tech_specs.iter().filter_map(|ts| {
                ts.br_ref.as_deref().map(|target| Reference {
                    from: DocumentKind::TechSpecs,
                    from_id: &ts.id,
                    target,
                    to: DocumentKind::BusinessRules,
                })
            }));
        }
    }
    if level.covers(PhaseName::DeriveL3) {
        if let Some(doc) = &docs.tickets {
            for ticket in &doc.tickets {
                refs.extend(ticket.acceptance_refs.iter().map(|target| Reference {
                    from: DocumentKind::FeatureTickets,
                    from_id: &ticket.id,
                    target: target.as_str(),
                    to: DocumentKind::AcceptanceCriteria,
                }));
                refs.extend(ticket.depends_on.iter().map(|target| Reference {
                    from: DocumentKind::FeatureTickets,
                    from_id: &ticket.id,
                    target: target.as_str(),
                    to: DocumentKind::FeatureTickets,
                }));
            }
        }
    }

    let mut checked = refs.len();
    let mut findings = Vec::new();
    for reference in &refs {
        let message = match scope.ids_of(reference.to) {
            Some(ids) if ids.contains(reference.target) => continue,
            Some(_) => format!(
                "references {} which is not in {}",
                reference.target,
                reference.to.file_stem()
            ),
            None => format!(
                "references {} but {} is missing",
                reference.target,
                reference.to.file_stem()
            ),
        };
        findings.push(Finding::new(
            Rule::V003,
            FindingSeverity::Error,
            reference.from,
            Some(reference.from_id),
            message,
        ));
    }

    // Services name their dependencies by id or by name; graph edges join
    // the graph's own nodes.
    if level.covers(PhaseName::DeriveL3) {
        if let Some(doc) = &docs.services {
            let known: HashSet<String> = doc
                .services
                .iter()
                .flat_map(|s| [s.id.to_lowercase(), s.name.to_lowercase()])
                .collect();
            for service in &doc.services {
                for target in &service.depends_on {
                    checked += 1;
                    if !known.contains(&target.to_lowercase()) {
                        findings.push(Finding::new(
                            Rule::V003,
                            FindingSeverity::Error,
                            DocumentKind::ServiceBoundaries,
                            Some(service.id.as_str()),
                            format!("depends on unknown service {target}"),
                        ));
                    }
                }
            }
        }
        if let Some(graph) = &docs.dependency_graph {
            let nodes: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
            for edge in &graph.edges {
                for end in [&edge.from, &edge.to] {
                    checked += 1;
                    if !nodes.contains(end.as_str()) {
                        findings.push(Finding::new(
                            Rule::V003,
                            FindingSeverity::Error,
                            DocumentKind::DependencyGraph,
                            Some(end.as_str()),
                            format!("edge {} -> {} names an unknown node", edge.from, edge.to),
                        ));
                    }
                }
            }
        }
    }

    if checked == 0 {
        return Err("no references found".to_string());
    }
    Ok(Evaluation { checked, findings })
}

fn rules_have_tech_specs(scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    let (Some(rules), Some(specs)) = (&scope.docs.business_rules, &scope.docs.tech_specs) else {
        return Err("needs business-rules and tech-specs".to_string());
    };
    let realized: HashSet<&str> = specs
        .tech_specs
        .iter()
        .filter_map(|ts| ts.br_ref.as_deref())
        .collect();
    let findings = rules
        .business_rules
        .iter()
        .filter(|br| !realized.contains(br.id.as_str()))
        .map(|br| {
            Finding::new(
                Rule::V004,
                FindingSeverity::Warning,
                DocumentKind::BusinessRules,
                Some(br.id.as_str()),
                "no tech spec references this rule".to_string(),
            )
        })
        .collect();
    Ok(Evaluation {
        checked: rules.business_rules.len(),
        findings,
    })
}

fn criteria_have_test_cases(scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    let (Some(criteria), Some(cases)) = (&scope.docs.acceptance_criteria, &scope.docs.test_cases)
    else {
        return Err("needs acceptance-criteria and test-cases".to_string());
    };
    let covered: HashSet<&str> = cases.test_cases.iter().map(|tc| tc.ac_ref.as_str()).collect();
    let findings = criteria
        .acceptance_criteria
        .iter()
        .filter(|ac| !covered.contains(ac.id.as_str()))
        .map(|ac| {
            Finding::new(
                Rule::V005,
                FindingSeverity::Error,
                DocumentKind::AcceptanceCriteria,
                Some(ac.id.as_str()),
                "no test case references this criterion".to_string(),
            )
        })
        .collect();
    Ok(Evaluation {
        checked: criteria.acceptance_criteria.len(),
        findings,
    })
}

fn entities_have_aggregates(scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    let (Some(entities), Some(aggregates)) = (&scope.docs.entities, &scope.docs.aggregates) else {
        return Err("needs a domain model and aggregate-design".to_string());
    };
    let members: HashSet<String> = aggregates
        .aggregates
        .iter()
        .flat_map(|agg| {
            [agg.name.as_str(), agg.root.as_str()]
                .into_iter()
                .chain(agg.entities.iter().map(String::as_str))
        })
        .map(str::to_lowercase)
        .collect();
    let findings = entities
        .iter()
        .filter(|name| !members.contains(&name.to_lowercase()))
        .map(|name| {
            Finding::new(
                Rule::V006,
                FindingSeverity::Warning,
                DocumentKind::Aggregates,
                None,
                format!("entity {name} is not part of any aggregate"),
            )
        })
        .collect();
    Ok(Evaluation {
        checked: entities.len(),
        findings,
    })
}

fn services_have_contracts(scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    let (Some(services), Some(contracts)) =
        (&scope.docs.services, &scope.docs.interface_contracts)
    else {
        return Err("needs service-boundaries and interface-contracts".to_string());
    };
    let contracted: HashSet<String> = contracts
        .interface_contracts
        .iter()
        .map(|ic| ic.service.to_lowercase())
        .collect();
    let findings = services
        .services
        .iter()
        .filter(|svc| {
            !contracted.contains(&svc.name.to_lowercase())
                && !contracted.contains(&svc.id.to_lowercase())
        })
        .map(|svc| {
            Finding::new(
                Rule::V007,
                FindingSeverity::Error,
                DocumentKind::ServiceBoundaries,
                Some(svc.id.as_str()),
                format!("service {} has no interface contract", svc.name),
            )
        })
        .collect();
    Ok(Evaluation {
        checked: services.services.len(),
        findings,
    })
}

fn negative_ratio(scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    let cases = match &scope.docs.test_cases {
        Some(doc) if !doc.test_cases.is_empty() => &doc.test_cases,
        _ => return Err("no test cases found".to_string()),
    };
    let negatives = cases
        .iter()
        .filter(|tc| {
            NEGATIVE_CATEGORIES
                .iter()
                .any(|c| tc.category.eq_ignore_ascii_case(c))
        })
        .count();
    let ratio = negatives as f64 / cases.len() as f64;
    let mut findings = Vec::new();
    if ratio < MIN_NEGATIVE_RATIO {
        findings.push(Finding::new(
            Rule::V008,
            FindingSeverity::Error,
            DocumentKind::TestCases,
            None,
            format!(
                "negative test ratio {:.1}% ({negatives} of {}) is below {:.0}%",
                ratio * 100.0,
                cases.len(),
                MIN_NEGATIVE_RATIO * 100.0
            ),
        ));
    }
    Ok(Evaluation {
        checked: cases.len(),
        findings,
    })
}

fn criteria_have_hallucination_tests(scope: &Scope<'_>) -> Result<Evaluation, Skipped> {
    let (Some(criteria), Some(cases)) = (&scope.docs.acceptance_criteria, &scope.docs.test_cases)
    else {
        return Err("needs acceptance-criteria and test-cases".to_string());
    };
    let guarded: HashSet<&str> = cases
        .test_cases
        .iter()
        .filter(|tc| tc.category.eq_ignore_ascii_case(HALLUCINATION_CATEGORY))
        .map(|tc| tc.ac_ref.as_str())
        .collect();
    let findings = criteria
        .acceptance_criteria
        .iter()
        .filter(|ac| !guarded.contains(ac.id.as_str()))
        .map(|ac| {
            Finding::new(
                Rule::V009,
                FindingSeverity::Warning,
                DocumentKind::AcceptanceCriteria,
                Some(ac.id.as_str()),
                "no hallucination test references this criterion".to_string(),
            )
        })
        .collect();
    Ok(Evaluation {
        checked: criteria.acceptance_criteria.len(),
        findings,
    })
}
