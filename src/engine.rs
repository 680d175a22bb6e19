use std::sync::Arc;

use anyhow::{Context, Result};
use opentelemetry::{Context as OtelContext, KeyValue};
use rayon::prelude::*;
use serde_sarif::sarif::{ReportingDescriptor, Result as SarifResult};
use tracing::{debug, info};

use crate::classpath::ClassHierarchy;
use crate::config::AnalysisConfig;
use crate::dataflow::runner::{DataFlowRunner, RunnerResult};
use crate::dataflow::visitor::{InstructionVisitor, VisitStats};
use crate::diagnostics::{Finding, FindingCollector, FindingKind};
use crate::ir::{BinaryOperator, Instruction, InstructionKind, Procedure};
use crate::nullability::{AnnotationResolver, NullabilityResolver};
use crate::program::{MethodIndex, Program};
use crate::report::{finding_result, rule_descriptors};
use crate::telemetry::{Telemetry, add_current_span_event, with_span};

/// Outcome of analyzing a single procedure.
#[derive(Clone, Debug)]
pub struct ProcedureAnalysis {
    pub result: RunnerResult,
    pub findings: Vec<Finding>,
    pub states_visited: usize,
    pub stats: VisitStats,
}

/// Program-wide counters reported alongside the SARIF output.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AnalysisSummary {
    pub procedures: usize,
    pub too_complex: usize,
    pub states_visited: usize,
}

/// Aggregated SARIF payload from one analysis.
pub struct EngineOutput {
    pub rules: Vec<ReportingDescriptor>,
    pub results: Vec<SarifResult>,
    pub summary: AnalysisSummary,
}

/// Analysis engine over a validated program document.
pub struct Engine {
    config: AnalysisConfig,
    resolver: AnnotationResolver,
}

impl Engine {
    pub fn new(config: AnalysisConfig) -> Self {
        let resolver = AnnotationResolver::from_config(&config);
        Self { config, resolver }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(
        &self,
        program: &Program,
        telemetry: Option<&Telemetry>,
    ) -> Result<EngineOutput> {
        let hierarchy =
            Arc::new(ClassHierarchy::new(&program.classes).context("build class hierarchy")?);
        let methods = MethodIndex::new(&program.methods).context("index methods")?;
        info!(
            procedures = program.procedures.len(),
            classes = program.classes.len(),
            methods = methods.len(),
            "analysis started"
        );

        let analyses = with_span(
            telemetry,
            "analysis",
            &[KeyValue::new(
                "nullflow.procedure_count",
                program.procedures.len() as i64,
            )],
            || {
                let parent_cx = OtelContext::current();
                program
                    .procedures
                    .par_iter()
                    .map(|procedure| {
                        let run = || {
                            let analysis = analyze_procedure(
                                procedure,
                                &methods,
                                &self.resolver,
                                Arc::clone(&hierarchy),
                                &self.config,
                            );
                            record_visitor_summary(procedure, &analysis);
                            analysis
                        };
                        match telemetry {
                            Some(telemetry) => {
                                telemetry.in_procedure_span(&procedure.name, &parent_cx, run)
                            }
                            None => run(),
                        }
                    })
                    .collect::<Vec<_>>()
            },
        );

        let mut summary = AnalysisSummary {
            procedures: program.procedures.len(),
            ..AnalysisSummary::default()
        };
        let mut results = Vec::new();
        for (procedure, analysis) in program.procedures.iter().zip(&analyses) {
            if analysis.result == RunnerResult::TooComplex {
                summary.too_complex += 1;
            }
            summary.states_visited += analysis.states_visited;
            results.extend(
                analysis
                    .findings
                    .iter()
                    .map(|finding| finding_result(procedure, finding)),
            );
        }

        results.sort_by(|left, right| {
            let left_id = left.rule_id.as_deref().unwrap_or("");
            let right_id = right.rule_id.as_deref().unwrap_or("");
            let left_msg = left.message.text.as_deref().unwrap_or("");
            let right_msg = right.message.text.as_deref().unwrap_or("");
            left_id.cmp(right_id).then(left_msg.cmp(right_msg))
        });
        info!(
            results = results.len(),
            too_complex = summary.too_complex,
            states = summary.states_visited,
            "analysis finished"
        );

        Ok(EngineOutput {
            rules: rule_descriptors(),
            results,
            summary,
        })
    }
}

/// Run the visitor over one procedure and collect every finding.
///
/// A run that exhausts the state budget yields only an
/// [`FindingKind::AnalysisTooComplex`] finding.
pub fn analyze_procedure(
    procedure: &Procedure,
    methods: &MethodIndex,
    resolver: &dyn NullabilityResolver,
    hierarchy: Arc<ClassHierarchy>,
    config: &AnalysisConfig,
) -> ProcedureAnalysis {
    let mut visitor = InstructionVisitor::new(procedure, methods, resolver, hierarchy);
    let mut collector = FindingCollector::new(config.report_unannotated);
    let mut runner = DataFlowRunner::new(config.max_states);
    let result = runner.analyze(&mut visitor, &mut collector);

    let findings = match result {
        RunnerResult::TooComplex => vec![Finding {
            kind: FindingKind::AnalysisTooComplex,
            instruction: 0,
            anchor: None,
            argument: None,
        }],
        RunnerResult::Ok => {
            report_post_run(&visitor, &mut collector);
            collector.into_findings()
        }
    };

    ProcedureAnalysis {
        result,
        findings,
        states_visited: runner.states_visited(),
        stats: visitor.stats().clone(),
    }
}

/// Constant comparisons and redundant instanceof checks, known only after a full run.
fn report_post_run(visitor: &InstructionVisitor<'_>, collector: &mut FindingCollector) {
    for instruction in &visitor.procedure().instructions {
        let InstructionKind::Binop(binop) = &instruction.kind else {
            continue;
        };
        let index = instruction.index;
        let branching = match binop.operator {
            Some(BinaryOperator::InstanceOf) => {
                if visitor.is_instanceof_redundant(index) {
                    collector.push(Finding {
                        kind: FindingKind::RedundantInstanceof {
                            can_be_null: visitor.can_be_null(index),
                        },
                        instruction: index,
                        anchor: instruction.anchor,
                        argument: None,
                    });
                    continue;
                }
                true
            }
            Some(
                BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Le
                | BinaryOperator::Gt
                | BinaryOperator::Ge,
            ) => true,
            _ => false,
        };
        if branching {
            report_constant_condition(visitor, instruction, collector);
        }
    }
}

fn report_constant_condition(
    visitor: &InstructionVisitor<'_>,
    instruction: &Instruction,
    collector: &mut FindingCollector,
) {
    let index = instruction.index;
    if !visitor.is_reachable(index) || visitor.silence_constant_condition(instruction.anchor) {
        return;
    }
    let Some(branch) = visitor.branch_reachability(index) else {
        return;
    };
    if branch.is_condition_const() {
        collector.push(Finding {
            kind: FindingKind::ConstantCondition {
                value: branch.true_reachable,
            },
            instruction: index,
            anchor: instruction.anchor,
            argument: None,
        });
    }
}

fn record_visitor_summary(procedure: &Procedure, analysis: &ProcedureAnalysis) {
    let stats = &analysis.stats;
    debug!(
        procedure = %procedure.name,
        visits = stats.total_visits(),
        forks = stats.forks,
        pruned = stats.pruned_branches,
        states = analysis.states_visited,
        too_complex = analysis.result == RunnerResult::TooComplex,
        "visitor summary"
    );
    let mut attributes = vec![
        KeyValue::new("nullflow.visits", stats.total_visits() as i64),
        KeyValue::new("nullflow.forks", stats.forks as i64),
        KeyValue::new("nullflow.pruned_branches", stats.pruned_branches as i64),
        KeyValue::new("nullflow.states", analysis.states_visited as i64),
    ];
    for (kind, count) in &stats.visits {
        attributes.push(KeyValue::new(
            format!("nullflow.visits.{kind}"),
            *count as i64,
        ));
    }
    add_current_span_event("visitor_summary", &attributes);
}
