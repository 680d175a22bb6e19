use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::dataflow::memory::MemoryState;
use crate::dataflow::visitor::{InstructionState, InstructionVisitor};
use crate::diagnostics::DiagnosticSink;
use crate::ir::{Nullness, VariableId, VariableKind};

/// How a run over one procedure ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunnerResult {
    Ok,
    /// The state budget ran out; facts gathered so far are incomplete.
    TooComplex,
}

/// Breadth-first worklist driver over `(instruction index, memory state)` pairs.
#[derive(Clone, Debug)]
pub struct DataFlowRunner {
    max_states: usize,
    states_visited: usize,
}

impl DataFlowRunner {
    pub fn new(max_states: usize) -> Self {
        Self {
            max_states,
            states_visited: 0,
        }
    }

    pub fn states_visited(&self) -> usize {
        self.states_visited
    }

    /// Explore every feasible path of the visitor's procedure.
    pub fn analyze(
        &mut self,
        visitor: &mut InstructionVisitor<'_>,
        sink: &mut dyn DiagnosticSink,
    ) -> RunnerResult {
        let procedure = visitor.procedure();
        let entry = initial_state(visitor);
        let mut queue = VecDeque::from([InstructionState {
            index: 0,
            state: entry,
        }]);
        let mut visited = BTreeSet::new();
        self.states_visited = 0;

        while let Some(InstructionState { index, state }) = queue.pop_front() {
            // Falling off the end of the stream ends the path.
            let Some(instruction) = procedure.instruction_at(index) else {
                continue;
            };
            if !visited.insert((index, state.clone())) {
                continue;
            }
            self.states_visited += 1;
            if self.states_visited > self.max_states {
                debug!(
                    procedure = %procedure.name,
                    max_states = self.max_states,
                    "state budget exhausted"
                );
                return RunnerResult::TooComplex;
            }
            queue.extend(visitor.visit(instruction, state, sink));
        }
        RunnerResult::Ok
    }
}

/// Entry state with parameter nullness taken from declaration annotations.
fn initial_state(visitor: &mut InstructionVisitor<'_>) -> MemoryState {
    let procedure = visitor.procedure();
    let resolver = visitor.resolver();
    let mut state = MemoryState::new();
    for (index, decl) in procedure.variables.iter().enumerate() {
        if decl.kind != VariableKind::Parameter || !decl.ty.is_reference() {
            continue;
        }
        let nullness = resolver.element_nullness(&decl.annotations, &[]);
        let factory = visitor.factory_mut();
        let value = match nullness {
            Nullness::NonNull => factory.not_null(decl.ty.clone()),
            Nullness::Nullable => factory.type_value(decl.ty.clone(), Nullness::Nullable),
            Nullness::Unknown => continue,
        };
        let variable = factory.variable(VariableId(index), false);
        state.set_var_value(visitor.factory(), variable, value);
    }
    state
}
