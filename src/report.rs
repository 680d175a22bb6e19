use serde_sarif::sarif::{
    ArtifactLocation, Location, LogicalLocation, Message, MultiformatMessageString,
    PhysicalLocation, Region, ReportingDescriptor, Result as SarifResult,
};

use crate::diagnostics::{Finding, FindingKind};
use crate::ir::Procedure;

/// SARIF rule descriptors for every finding kind, sorted by id.
pub fn rule_descriptors() -> Vec<ReportingDescriptor> {
    let mut rules: Vec<ReportingDescriptor> = FindingKind::ALL
        .iter()
        .map(|kind| rule_descriptor(*kind))
        .collect();
    rules.sort_by(|left, right| left.id.cmp(&right.id));
    rules
}

fn rule_descriptor(kind: FindingKind) -> ReportingDescriptor {
    ReportingDescriptor::builder()
        .id(kind.rule_id())
        .name(kind.name())
        .short_description(
            MultiformatMessageString::builder()
                .text(kind.description())
                .build(),
        )
        .build()
}

/// Convert one finding of `procedure` into a SARIF result.
pub fn finding_result(procedure: &Procedure, finding: &Finding) -> SarifResult {
    let line = finding
        .anchor
        .and_then(|anchor| procedure.anchor_line(anchor));
    let location = procedure_location(procedure, line);
    SarifResult::builder()
        .rule_id(finding.kind.rule_id())
        .level(finding.kind.level())
        .message(result_message(finding_text(procedure, finding)))
        .locations(vec![location])
        .build()
}

fn finding_text(procedure: &Procedure, finding: &Finding) -> String {
    let summary = match finding.kind {
        FindingKind::NullAssignment => "null may be assigned to a not-null variable".to_string(),
        FindingKind::NullableReturn => "method may return null".to_string(),
        FindingKind::FieldNpe => "field access may produce NullPointerException".to_string(),
        FindingKind::CallNpe => "method invocation may produce NullPointerException".to_string(),
        FindingKind::UnboxingNpe => "unboxing may produce NullPointerException".to_string(),
        FindingKind::NullArgument => format!(
            "argument {} might be null but the parameter is not-null",
            argument_number(finding)
        ),
        FindingKind::NullArgumentUnannotated => format!(
            "argument {} might be null but the parameter is not annotated",
            argument_number(finding)
        ),
        FindingKind::InvalidCast => "cast may produce ClassCastException".to_string(),
        FindingKind::ConstantCondition { value } => format!("condition is always {value}"),
        FindingKind::RedundantInstanceof { can_be_null: false } => {
            "instanceof is always true".to_string()
        }
        FindingKind::RedundantInstanceof { can_be_null: true } => {
            "instanceof can be replaced with a null check".to_string()
        }
        FindingKind::AnalysisTooComplex => "procedure is too complex to analyze".to_string(),
    };
    let anchor_text = finding
        .anchor
        .and_then(|anchor| procedure.anchor(anchor))
        .map(|anchor| anchor.text.as_str())
        .filter(|text| !text.is_empty());
    match anchor_text {
        Some(text) => format!("Nullness issue in {}: {summary} at `{text}`", procedure.name),
        None => format!("Nullness issue in {}: {summary}", procedure.name),
    }
}

fn argument_number(finding: &Finding) -> usize {
    finding.argument.map_or(0, |argument| argument + 1)
}

fn procedure_location(procedure: &Procedure, line: Option<u32>) -> Location {
    let logical = LogicalLocation::builder()
        .name(procedure.name.clone())
        .kind("function")
        .build();
    let Some(uri) = procedure.source_file.as_deref() else {
        return Location::builder().logical_locations(vec![logical]).build();
    };
    let artifact_location = ArtifactLocation::builder().uri(uri.to_string()).build();
    let physical = if let Some(line) = line {
        let region = Region::builder().start_line(line as i64).build();
        PhysicalLocation::builder()
            .artifact_location(artifact_location)
            .region(region)
            .build()
    } else {
        PhysicalLocation::builder()
            .artifact_location(artifact_location)
            .build()
    };
    Location::builder()
        .logical_locations(vec![logical])
        .physical_location(physical)
        .build()
}

pub fn result_message(text: impl Into<String>) -> Message {
    Message::builder().text(text.into()).build()
}
