//! `loom validate`: traceability checks over the documents on disk.

use std::path::Path;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::core::documents::DerivedDocument;
use crate::core::traceability::{
    DocumentSet, FindingSeverity, ValidationLevel, ValidationReport, validate,
};
use crate::io::paths::LoomPaths;
use crate::io::state_store::{load_derive_input, read_json};

fn load<D: DerivedDocument>(paths: &LoomPaths) -> Result<Option<D>> {
    let path = paths.document_json(D::KIND);
    if !path.exists() {
        debug!(document = D::KIND.file_stem(), "document absent");
        return Ok(None);
    }
    read_json(&path).map(Some)
}

/// Read every document under `output_dir`, plus the domain model's entity
/// names when discovery has left an analysis behind.
pub fn load_documents(output_dir: &Path) -> Result<DocumentSet> {
    let paths = LoomPaths::new(output_dir);
    let entities = if paths.interview_state_path.exists() || paths.analysis_path.exists() {
        load_derive_input(&paths)?
            .domain_model()
            .map(|model| model.entities.iter().map(|e| e.name.clone()).collect())
    } else {
        None
    };
    Ok(DocumentSet {
        acceptance_criteria: load(&paths)?,
        business_rules: load(&paths)?,
        test_cases: load(&paths)?,
        tech_specs: load(&paths)?,
        interface_contracts: load(&paths)?,
        aggregates: load(&paths)?,
        sequences: load(&paths)?,
        data_model: load(&paths)?,
        services: load(&paths)?,
        events: load(&paths)?,
        tickets: load(&paths)?,
        dependency_graph: load(&paths)?,
        entities,
    })
}

pub fn run_validate(output_dir: &Path, level: ValidationLevel) -> Result<ValidationReport> {
    let docs = load_documents(output_dir)?;
    if docs.is_empty() {
        bail!("no derived documents under {}", output_dir.display());
    }
    let report = validate(&docs, level);
    info!(
        level = %level,
        errors = report.summary.errors,
        warnings = report.summary.warnings,
        "validation finished"
    );
    Ok(report)
}

pub fn render_report(report: &ValidationReport) -> String {
    let mut out = format!("validation level {}\n", report.level);
    for check in &report.checks {
        out.push_str(&format!("{:<5}{}  {}\n", check.status.as_str(), check.rule, check.message));
    }
    for (severity, heading) in [
        (FindingSeverity::Error, "errors"),
        (FindingSeverity::Warning, "warnings"),
    ] {
        let findings: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.severity == severity)
            .collect();
        if findings.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{heading}\n"));
        for finding in findings {
            let id = finding.id.as_deref().map(|id| format!(" {id}")).unwrap_or_default();
            out.push_str(&format!(
                "  [{}] {}{id}: {}\n",
                finding.rule, finding.document, finding.message
            ));
        }
    }
    let summary = &report.summary;
    out.push_str(&format!(
        "\n{} checks: {} passed, {} failed, {} skipped; {} error(s), {} warning(s)\n",
        summary.total_checks,
        summary.passed,
        summary.failed,
        summary.skipped,
        summary.errors,
        summary.warnings
    ));
    out
}
