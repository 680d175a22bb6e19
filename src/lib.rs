//! Symbolic nullness and cast analysis over linearized JVM-style procedures.
//!
//! A [`program::Program`] document is interpreted path by path by the
//! [`dataflow::visitor::InstructionVisitor`], driven by the
//! [`dataflow::runner::DataFlowRunner`]. Defects are delivered through the
//! [`diagnostics::DiagnosticSink`] hooks and turned into SARIF by [`engine`].

pub mod classpath;
pub mod config;
pub mod dataflow;
pub mod descriptor;
pub mod diagnostics;
pub mod engine;
pub mod ir;
pub mod nullability;
pub mod program;
pub mod report;
pub mod telemetry;

#[cfg(test)]
mod test_harness;
