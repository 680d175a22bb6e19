use serde_sarif::sarif::ResultLevel;

use crate::ir::{AnchorId, Instruction};

/// Receives the defects the visitor detects while interpreting a procedure.
///
/// Every hook defaults to doing nothing so a sink only overrides what it
/// reports.
pub trait DiagnosticSink {
    fn on_assigning_to_not_nullable_variable(&mut self, _instruction: &Instruction) {}

    fn on_nullable_return(&mut self, _instruction: &Instruction) {}

    /// A field access whose qualifier may be null.
    fn on_field_npe(&mut self, _instruction: &Instruction) {}

    /// A method call whose qualifier may be null.
    fn on_method_call_npe(&mut self, _instruction: &Instruction) {}

    fn on_unboxing_nullable(&mut self, _instruction: &Instruction) {}

    fn on_passing_null_argument(&mut self, _instruction: &Instruction, _argument: usize) {}

    fn on_passing_null_argument_to_unannotated(
        &mut self,
        _instruction: &Instruction,
        _argument: usize,
    ) {
    }

    fn on_invalid_cast(&mut self, _instruction: &Instruction) {}
}

/// Sink that discards every finding.
#[derive(Debug, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {}

/// Category of a reported defect.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FindingKind {
    NullAssignment,
    NullableReturn,
    FieldNpe,
    CallNpe,
    UnboxingNpe,
    NullArgument,
    NullArgumentUnannotated,
    InvalidCast,
    ConstantCondition { value: bool },
    RedundantInstanceof { can_be_null: bool },
    AnalysisTooComplex,
}

impl FindingKind {
    pub const ALL: [FindingKind; 11] = [
        FindingKind::NullAssignment,
        FindingKind::NullableReturn,
        FindingKind::FieldNpe,
        FindingKind::CallNpe,
        FindingKind::UnboxingNpe,
        FindingKind::NullArgument,
        FindingKind::NullArgumentUnannotated,
        FindingKind::InvalidCast,
        FindingKind::ConstantCondition { value: true },
        FindingKind::RedundantInstanceof { can_be_null: false },
        FindingKind::AnalysisTooComplex,
    ];

    pub fn rule_id(self) -> &'static str {
        match self {
            Self::NullAssignment => "NULL_ASSIGNMENT",
            Self::NullableReturn => "NULLABLE_RETURN",
            Self::FieldNpe => "FIELD_NPE",
            Self::CallNpe => "CALL_NPE",
            Self::UnboxingNpe => "UNBOXING_NPE",
            Self::NullArgument => "NULL_ARGUMENT",
            Self::NullArgumentUnannotated => "NULL_ARGUMENT_UNANNOTATED",
            Self::InvalidCast => "INVALID_CAST",
            Self::ConstantCondition { .. } => "CONSTANT_CONDITION",
            Self::RedundantInstanceof { .. } => "REDUNDANT_INSTANCEOF",
            Self::AnalysisTooComplex => "ANALYSIS_TOO_COMPLEX",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NullAssignment => "Null assigned to not-null variable",
            Self::NullableReturn => "Nullable value returned",
            Self::FieldNpe => "Field access may produce NullPointerException",
            Self::CallNpe => "Method call may produce NullPointerException",
            Self::UnboxingNpe => "Unboxing may produce NullPointerException",
            Self::NullArgument => "Null passed to not-null parameter",
            Self::NullArgumentUnannotated => "Null passed to unannotated parameter",
            Self::InvalidCast => "Cast may produce ClassCastException",
            Self::ConstantCondition { .. } => "Constant condition",
            Self::RedundantInstanceof { .. } => "Redundant instanceof",
            Self::AnalysisTooComplex => "Analysis too complex",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::NullAssignment => {
                "A value that may be null is assigned to a variable annotated as not-null."
            }
            Self::NullableReturn => {
                "A value that may be null is returned from a method whose result is checked for nullness."
            }
            Self::FieldNpe => "A field is dereferenced through a qualifier that may be null.",
            Self::CallNpe => "A method is invoked on a receiver that may be null.",
            Self::UnboxingNpe => "A boxed value that may be null is unboxed.",
            Self::NullArgument => {
                "An argument that may be null is passed to a parameter annotated as not-null."
            }
            Self::NullArgumentUnannotated => {
                "An argument known to be nullable is passed to a parameter without nullability annotations."
            }
            Self::InvalidCast => "A reference cast can never succeed for a non-null value.",
            Self::ConstantCondition { .. } => "A comparison always evaluates to the same value.",
            Self::RedundantInstanceof { .. } => {
                "An instanceof check always succeeds for non-null operands."
            }
            Self::AnalysisTooComplex => {
                "The procedure exceeded the state budget and was not fully analyzed."
            }
        }
    }

    pub fn level(self) -> ResultLevel {
        match self {
            Self::NullArgumentUnannotated | Self::AnalysisTooComplex => ResultLevel::Note,
            _ => ResultLevel::Warning,
        }
    }
}

/// One detected defect, located by instruction.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Finding {
    pub kind: FindingKind,
    pub instruction: usize,
    pub anchor: Option<AnchorId>,
    pub argument: Option<usize>,
}

/// Sink that records every hook call as a [`Finding`].
#[derive(Debug, Default)]
pub struct FindingCollector {
    findings: Vec<Finding>,
    report_unannotated: bool,
}

impl FindingCollector {
    pub fn new(report_unannotated: bool) -> Self {
        Self {
            findings: Vec::new(),
            report_unannotated,
        }
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Findings sorted with exact duplicates removed.
    pub fn into_findings(mut self) -> Vec<Finding> {
        self.findings.sort();
        self.findings.dedup();
        self.findings
    }

    fn record(&mut self, kind: FindingKind, instruction: &Instruction) {
        self.push(Finding {
            kind,
            instruction: instruction.index,
            anchor: instruction.anchor,
            argument: None,
        });
    }

    fn record_argument(&mut self, kind: FindingKind, instruction: &Instruction, argument: usize) {
        let anchor = match &instruction.kind {
            crate::ir::InstructionKind::MethodCall(call) => call
                .args
                .get(argument)
                .and_then(|arg| arg.anchor)
                .or(instruction.anchor),
            _ => instruction.anchor,
        };
        self.push(Finding {
            kind,
            instruction: instruction.index,
            anchor,
            argument: Some(argument),
        });
    }
}

impl DiagnosticSink for FindingCollector {
    fn on_assigning_to_not_nullable_variable(&mut self, instruction: &Instruction) {
        self.record(FindingKind::NullAssignment, instruction);
    }

    fn on_nullable_return(&mut self, instruction: &Instruction) {
        self.record(FindingKind::NullableReturn, instruction);
    }

    fn on_field_npe(&mut self, instruction: &Instruction) {
        self.record(FindingKind::FieldNpe, instruction);
    }

    fn on_method_call_npe(&mut self, instruction: &Instruction) {
        self.record(FindingKind::CallNpe, instruction);
    }

    fn on_unboxing_nullable(&mut self, instruction: &Instruction) {
        self.record(FindingKind::UnboxingNpe, instruction);
    }

    fn on_passing_null_argument(&mut self, instruction: &Instruction, argument: usize) {
        self.record_argument(FindingKind::NullArgument, instruction, argument);
    }

    fn on_passing_null_argument_to_unannotated(
        &mut self,
        instruction: &Instruction,
        argument: usize,
    ) {
        if self.report_unannotated {
            self.record_argument(FindingKind::NullArgumentUnannotated, instruction, argument);
        }
    }

    fn on_invalid_cast(&mut self, instruction: &Instruction) {
        self.record(FindingKind::InvalidCast, instruction);
    }
}
