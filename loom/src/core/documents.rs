//! Typed shapes for the derived documents.
//!
//! Each document is what the assistant must return for one prompt. Typed
//! deserialization is the schema check: a reply missing a required field is
//! an extraction failure, not malformed data further down the pipeline.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::phase::PhaseName;

/// Every document the derive phases produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    AcceptanceCriteria,
    BusinessRules,
    TestCases,
    TechSpecs,
    InterfaceContracts,
    Aggregates,
    Sequences,
    DataModel,
    ServiceBoundaries,
    EventDesign,
    FeatureTickets,
    DependencyGraph,
}

impl DocumentKind {
    /// File name without extension; `.json` and `.md` share it.
    pub fn file_stem(self) -> &'static str {
        match self {
            DocumentKind::AcceptanceCriteria => "acceptance-criteria",
            DocumentKind::BusinessRules => "business-rules",
            DocumentKind::TestCases => "test-cases",
            DocumentKind::TechSpecs => "tech-specs",
            DocumentKind::InterfaceContracts => "interface-contracts",
            DocumentKind::Aggregates => "aggregate-design",
            DocumentKind::Sequences => "sequence-design",
            DocumentKind::DataModel => "initial-data-model",
            DocumentKind::ServiceBoundaries => "service-boundaries",
            DocumentKind::EventDesign => "event-design",
            DocumentKind::FeatureTickets => "feature-tickets",
            DocumentKind::DependencyGraph => "dependency-graph",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            DocumentKind::AcceptanceCriteria => "Acceptance Criteria",
            DocumentKind::BusinessRules => "Business Rules",
            DocumentKind::TestCases => "Test Cases",
            DocumentKind::TechSpecs => "Technical Specifications",
            DocumentKind::InterfaceContracts => "Interface Contracts",
            DocumentKind::Aggregates => "Aggregate Design",
            DocumentKind::Sequences => "Sequence Design",
            DocumentKind::DataModel => "Initial Data Model",
            DocumentKind::ServiceBoundaries => "Service Boundaries",
            DocumentKind::EventDesign => "Event Design",
            DocumentKind::FeatureTickets => "Feature Tickets",
            DocumentKind::DependencyGraph => "Dependency Graph",
        }
    }

    /// Leading segment every entry id of this document carries. The data
    /// model and the dependency graph have no ids of their own.
    pub fn id_prefix(self) -> Option<&'static str> {
        match self {
            DocumentKind::AcceptanceCriteria => Some("AC"),
            DocumentKind::BusinessRules => Some("BR"),
            DocumentKind::TestCases => Some("TC"),
            DocumentKind::TechSpecs => Some("TS"),
            DocumentKind::InterfaceContracts => Some("IC"),
            DocumentKind::Aggregates => Some("AGG"),
            DocumentKind::Sequences => Some("SEQ"),
            DocumentKind::ServiceBoundaries => Some("SVC"),
            DocumentKind::EventDesign => Some("EVT"),
            DocumentKind::FeatureTickets => Some("FT"),
            DocumentKind::DataModel | DocumentKind::DependencyGraph => None,
        }
    }

    pub fn phase(self) -> PhaseName {
        match self {
            DocumentKind::AcceptanceCriteria | DocumentKind::BusinessRules => PhaseName::DeriveL1,
            DocumentKind::TestCases
            | DocumentKind::TechSpecs
            | DocumentKind::InterfaceContracts
            | DocumentKind::Aggregates
            | DocumentKind::Sequences
            | DocumentKind::DataModel => PhaseName::DeriveL2,
            DocumentKind::ServiceBoundaries
            | DocumentKind::EventDesign
            | DocumentKind::FeatureTickets
            | DocumentKind::DependencyGraph => PhaseName::DeriveL3,
        }
    }
}

/// One renderable entry of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub title: String,
    pub value: Value,
}

/// A document that can be written to disk and rendered item by item.
pub trait DerivedDocument: Serialize + DeserializeOwned {
    const KIND: DocumentKind;

    fn entries(&self) -> serde_json::Result<Vec<Entry>>;
}

fn entries_of<T: Serialize>(
    items: &[T],
    id: impl Fn(&T) -> &str,
    title: impl Fn(&T) -> &str,
) -> serde_json::Result<Vec<Entry>> {
    items
        .iter()
        .map(|item| {
            Ok(Entry {
                id: id(item).to_string(),
                title: title(item).to_string(),
                value: serde_json::to_value(item)?,
            })
        })
        .collect()
}

// ---- derive-l1 ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    pub id: String,
    pub title: String,
    pub given: String,
    pub when: String,
    pub then: String,
    #[serde(default)]
    pub error_cases: Vec<String>,
    #[serde(default)]
    pub source_refs: Vec<String>,
    #[serde(default)]
    pub decision_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRule {
    pub id: String,
    pub title: String,
    pub rule: String,
    #[serde(default)]
    pub invariant: String,
    #[serde(default)]
    pub enforcement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default)]
    pub source_refs: Vec<String>,
    #[serde(default)]
    pub decision_refs: Vec<String>,
}

/// Reply shape for the derive-l1 prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1Documents {
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    pub business_rules: Vec<BusinessRule>,
}

impl L1Documents {
    pub fn split(self) -> (AcceptanceCriteria, BusinessRules) {
        (
            AcceptanceCriteria {
                acceptance_criteria: self.acceptance_criteria,
            },
            BusinessRules {
                business_rules: self.business_rules,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriteria {
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
}

impl DerivedDocument for AcceptanceCriteria {
    const KIND: DocumentKind = DocumentKind::AcceptanceCriteria;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        entries_of(&self.acceptance_criteria, |i| i.id.as_str(), |i| i.title.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRules {
    pub business_rules: Vec<BusinessRule>,
}

impl DerivedDocument for BusinessRules {
    const KIND: DocumentKind = DocumentKind::BusinessRules;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        entries_of(&self.business_rules, |i| i.id.as_str(), |i| i.title.as_str())
    }
}

// ---- derive-l2 ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    /// Acceptance criterion this case exercises.
    pub ac_ref: String,
    /// happy, error, edge, ...
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub preconditions: Vec<String>,
    pub steps: Vec<String>,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCases {
    pub test_cases: Vec<TestCase>,
}

impl DerivedDocument for TestCases {
    const KIND: DocumentKind = DocumentKind::TestCases;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        entries_of(&self.test_cases, |i| i.id.as_str(), |i| i.title.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub br_ref: Option<String>,
    pub rule: String,
    pub implementation: String,
    #[serde(default)]
    pub validation_points: Vec<String>,
    #[serde(default)]
    pub error_handling: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechSpecs {
    pub tech_specs: Vec<TechSpec>,
}

impl DerivedDocument for TechSpecs {
    const KIND: DocumentKind = DocumentKind::TechSpecs;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        entries_of(&self.tech_specs, |i| i.id.as_str(), |i| i.title.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractOperation {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceContract {
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub purpose: String,
    pub operations: Vec<ContractOperation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceContracts {
    pub interface_contracts: Vec<InterfaceContract>,
}

impl DerivedDocument for InterfaceContracts {
    const KIND: DocumentKind = DocumentKind::InterfaceContracts;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        entries_of(&self.interface_contracts, |i| i.id.as_str(), |i| i.service.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub id: String,
    pub name: String,
    pub root: String,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub invariants: Vec<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregates {
    pub aggregates: Vec<Aggregate>,
}

impl DerivedDocument for Aggregates {
    const KIND: DocumentKind = DocumentKind::Aggregates;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        entries_of(&self.aggregates, |i| i.id.as_str(), |i| i.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub participants: Vec<String>,
    pub steps: Vec<String>,
    #[serde(default)]
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequences {
    pub sequences: Vec<Sequence>,
}

impl DerivedDocument for Sequences {
    const KIND: DocumentKind = DocumentKind::Sequences;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        entries_of(&self.sequences, |i| i.id.as_str(), |i| i.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub indexes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataModel {
    pub tables: Vec<Table>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
}

impl DerivedDocument for DataModel {
    const KIND: DocumentKind = DocumentKind::DataModel;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        let mut entries = entries_of(&self.tables, |t| t.name.as_str(), |t| t.name.as_str())?;
        entries.extend(entries_of(&self.enums, |e| e.name.as_str(), |e| e.name.as_str())?);
        Ok(entries)
    }
}

// ---- derive-l3 ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBoundary {
    pub id: String,
    pub name: String,
    pub responsibility: String,
    #[serde(default)]
    pub owns: Vec<String>,
    #[serde(default)]
    pub exposes: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBoundaries {
    pub services: Vec<ServiceBoundary>,
}

impl DerivedDocument for ServiceBoundaries {
    const KIND: DocumentKind = DocumentKind::ServiceBoundaries;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        entries_of(&self.services, |i| i.id.as_str(), |i| i.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: String,
    pub name: String,
    pub producer: String,
    #[serde(default)]
    pub consumers: Vec<String>,
    #[serde(default)]
    pub payload: Vec<String>,
    #[serde(default)]
    pub trigger: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDesign {
    pub events: Vec<DomainEvent>,
}

impl DerivedDocument for EventDesign {
    const KIND: DocumentKind = DocumentKind::EventDesign;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        entries_of(&self.events, |i| i.id.as_str(), |i| i.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTicket {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub acceptance_refs: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTickets {
    pub tickets: Vec<FeatureTicket>,
}

impl DerivedDocument for FeatureTickets {
    const KIND: DocumentKind = DocumentKind::FeatureTickets;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        entries_of(&self.tickets, |i| i.id.as_str(), |i| i.title.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl DerivedDocument for DependencyGraph {
    const KIND: DocumentKind = DocumentKind::DependencyGraph;

    fn entries(&self) -> serde_json::Result<Vec<Entry>> {
        let mut entries = entries_of(&self.nodes, |n| n.id.as_str(), |n| n.name.as_str())?;
        if !self.edges.is_empty() {
            entries.push(Entry {
                id: "edges".to_string(),
                title: "Edges".to_string(),
                value: serde_json::to_value(&self.edges)?,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extract::extract;

    #[test]
    fn l1_reply_requires_both_lists() {
        let reply = r#"{"acceptance_criteria": []}"#;
        assert!(extract::<L1Documents>(reply).is_err());

        let reply = r#"```json
{"acceptance_criteria": [{"id": "AC-1", "title": "Place order", "given": "a cart",
  "when": "checkout", "then": "order created"}], "business_rules": []}
```"#;
        let (acs, brs) = extract::<L1Documents>(reply).expect("extract").split();
        assert_eq!(acs.acceptance_criteria[0].id, "AC-1");
        assert!(acs.acceptance_criteria[0].error_cases.is_empty());
        assert!(brs.business_rules.is_empty());
    }

    #[test]
    fn entries_follow_document_order() {
        let model: DataModel = serde_json::from_str(
            r#"{"tables": [{"name": "orders", "columns": [{"name": "id", "type": "uuid"}]}],
                "enums": [{"name": "order_status", "values": ["open", "paid"]}]}"#,
        )
        .expect("parse");
        let entries = model.entries().expect("entries");
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["orders", "order_status"]);
        assert_eq!(entries[0].value["columns"][0]["type"], "uuid");
    }

    #[test]
    fn kinds_map_to_their_phase() {
        assert_eq!(DocumentKind::BusinessRules.phase(), PhaseName::DeriveL1);
        assert_eq!(DocumentKind::DataModel.phase(), PhaseName::DeriveL2);
        assert_eq!(DocumentKind::FeatureTickets.phase(), PhaseName::DeriveL3);
    }
}
