//! Prompt catalog rendered with minijinja.
//!
//! The catalog is built once and never mutated. The pipeline receives it at
//! construction; tests swap individual templates through
//! [`PromptCatalog::with_overrides`].

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::documents::DocumentKind;

const CONTEXT_PARTIAL: &str = include_str!("prompts/context.md");

/// Every prompt the pipeline sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    DomainDiscovery,
    EntityAnalysis,
    OperationAnalysis,
    DeriveL1,
    /// One prompt per derive-l2/l3 document.
    Document(DocumentKind),
}

impl PromptKind {
    pub const ALL: [PromptKind; 14] = [
        PromptKind::DomainDiscovery,
        PromptKind::EntityAnalysis,
        PromptKind::OperationAnalysis,
        PromptKind::DeriveL1,
        PromptKind::Document(DocumentKind::TestCases),
        PromptKind::Document(DocumentKind::TechSpecs),
        PromptKind::Document(DocumentKind::InterfaceContracts),
        PromptKind::Document(DocumentKind::Aggregates),
        PromptKind::Document(DocumentKind::Sequences),
        PromptKind::Document(DocumentKind::DataModel),
        PromptKind::Document(DocumentKind::ServiceBoundaries),
        PromptKind::Document(DocumentKind::EventDesign),
        PromptKind::Document(DocumentKind::FeatureTickets),
        PromptKind::Document(DocumentKind::DependencyGraph),
    ];

    /// Template name; also the bundled file name.
    pub fn template_name(self) -> &'static str {
        self.template().0
    }

    fn template(self) -> (&'static str, &'static str) {
        match self {
            PromptKind::DomainDiscovery => (
                "domain_discovery.md",
                include_str!("prompts/domain_discovery.md"),
            ),
            PromptKind::EntityAnalysis => (
                "entity_analysis.md",
                include_str!("prompts/entity_analysis.md"),
            ),
            PromptKind::OperationAnalysis => (
                "operation_analysis.md",
                include_str!("prompts/operation_analysis.md"),
            ),
            // Acceptance criteria and business rules come from one prompt.
            PromptKind::DeriveL1
            | PromptKind::Document(DocumentKind::AcceptanceCriteria)
            | PromptKind::Document(DocumentKind::BusinessRules) => {
                ("derive_l1.md", include_str!("prompts/derive_l1.md"))
            }
            PromptKind::Document(DocumentKind::TestCases) => (
                "derive_test_cases.md",
                include_str!("prompts/derive_test_cases.md"),
            ),
            PromptKind::Document(DocumentKind::TechSpecs) => (
                "derive_tech_specs.md",
                include_str!("prompts/derive_tech_specs.md"),
            ),
            PromptKind::Document(DocumentKind::InterfaceContracts) => (
                "derive_interface_contracts.md",
                include_str!("prompts/derive_interface_contracts.md"),
            ),
            PromptKind::Document(DocumentKind::Aggregates) => (
                "derive_aggregate_design.md",
                include_str!("prompts/derive_aggregate_design.md"),
            ),
            PromptKind::Document(DocumentKind::Sequences) => (
                "derive_sequence_design.md",
                include_str!("prompts/derive_sequence_design.md"),
            ),
            PromptKind::Document(DocumentKind::DataModel) => (
                "derive_data_model.md",
                include_str!("prompts/derive_data_model.md"),
            ),
            PromptKind::Document(DocumentKind::ServiceBoundaries) => (
                "derive_service_boundaries.md",
                include_str!("prompts/derive_service_boundaries.md"),
            ),
            PromptKind::Document(DocumentKind::EventDesign) => (
                "derive_event_design.md",
                include_str!("prompts/derive_event_design.md"),
            ),
            PromptKind::Document(DocumentKind::FeatureTickets) => (
                "derive_feature_tickets.md",
                include_str!("prompts/derive_feature_tickets.md"),
            ),
            PromptKind::Document(DocumentKind::DependencyGraph) => (
                "derive_dependency_graph.md",
                include_str!("prompts/derive_dependency_graph.md"),
            ),
        }
    }
}

/// Immutable set of compiled prompt templates.
pub struct PromptCatalog {
    env: Environment<'static>,
}

impl PromptCatalog {
    /// Catalog of the bundled templates.
    pub fn builtin() -> Result<Self> {
        Self::with_overrides(std::iter::empty())
    }

    /// Bundled templates with some replaced. Replacements may use the
    /// `documents` variable and `{% include "context.md" %}`.
    pub fn with_overrides<I>(overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (PromptKind, String)>,
    {
        let mut env = Environment::new();
        env.add_template("context.md", CONTEXT_PARTIAL)
            .context("compile context.md")?;
        for kind in PromptKind::ALL {
            let (name, source) = kind.template();
            env.add_template(name, source)
                .with_context(|| format!("compile {name}"))?;
        }
        for (kind, source) in overrides {
            env.add_template_owned(kind.template_name(), source)
                .with_context(|| format!("compile override {}", kind.template_name()))?;
        }
        Ok(Self { env })
    }

    /// Render `kind` with `documents` placed in its `<context>` block,
    /// separated by `---` rules.
    pub fn render<S: AsRef<str>>(&self, kind: PromptKind, documents: &[S]) -> Result<String> {
        let documents: Vec<&str> = documents.iter().map(|d| d.as_ref().trim()).collect();
        let template = self
            .env
            .get_template(kind.template_name())
            .with_context(|| format!("missing template {}", kind.template_name()))?;
        let rendered = template
            .render(context! { documents => documents })
            .with_context(|| format!("render {}", kind.template_name()))?;
        debug!(template = kind.template_name(), bytes = rendered.len(), "prompt rendered");
        Ok(rendered)
    }
}
