use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::classpath::ClassHierarchy;
use crate::config::visitor_debug_enabled;
use crate::dataflow::memory::MemoryState;
use crate::dataflow::value::{SymbolicValue, ValueFactory, ValueId};
use crate::descriptor::JvmType;
use crate::diagnostics::DiagnosticSink;
use crate::ir::{
    AnchorId, BinaryOperator, BinopInstruction, ConstValue, Instruction, InstructionKind,
    MethodCallInstruction, MethodType, Nullness, Procedure, TypeCastInstruction,
};
use crate::nullability::NullabilityResolver;
use crate::program::{MethodDecl, MethodIndex};

/// Successor produced by a visit: where to continue and with which state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstructionState {
    pub index: usize,
    pub state: MemoryState,
}

/// Outcomes a branching binop has been observed to produce.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BranchReachability {
    pub true_reachable: bool,
    pub false_reachable: bool,
}

impl BranchReachability {
    /// At most one outcome was ever reached.
    pub fn is_condition_const(&self) -> bool {
        !self.true_reachable || !self.false_reachable
    }
}

/// Counters collected while visiting one procedure.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VisitStats {
    pub visits: BTreeMap<&'static str, u64>,
    pub forks: u64,
    pub pruned_branches: u64,
}

impl VisitStats {
    pub fn total_visits(&self) -> u64 {
        self.visits.values().sum()
    }
}

/// Abstract interpreter for one procedure's instructions.
///
/// Owns the value factory and the per-call caches of one run, and accumulates
/// the reachability facts queried after the run.
pub struct InstructionVisitor<'a> {
    procedure: &'a Procedure,
    methods: &'a MethodIndex,
    resolver: &'a dyn NullabilityResolver,
    factory: ValueFactory,
    argument_nullness: HashMap<usize, BTreeMap<usize, Nullness>>,
    return_nullness: HashMap<usize, Nullness>,
    reachable: BTreeSet<usize>,
    can_be_null_in_instanceof: BTreeSet<usize>,
    useful_instanceofs: BTreeSet<usize>,
    not_to_report: BTreeSet<AnchorId>,
    branches: BTreeMap<usize, BranchReachability>,
    stats: VisitStats,
}

impl<'a> InstructionVisitor<'a> {
    pub fn new(
        procedure: &'a Procedure,
        methods: &'a MethodIndex,
        resolver: &'a dyn NullabilityResolver,
        hierarchy: Arc<ClassHierarchy>,
    ) -> Self {
        Self {
            procedure,
            methods,
            resolver,
            factory: ValueFactory::new(procedure, hierarchy),
            argument_nullness: HashMap::new(),
            return_nullness: HashMap::new(),
            reachable: BTreeSet::new(),
            can_be_null_in_instanceof: BTreeSet::new(),
            useful_instanceofs: BTreeSet::new(),
            not_to_report: BTreeSet::new(),
            branches: BTreeMap::new(),
            stats: VisitStats::default(),
        }
    }

    pub fn factory(&self) -> &ValueFactory {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut ValueFactory {
        &mut self.factory
    }

    pub fn procedure(&self) -> &'a Procedure {
        self.procedure
    }

    pub fn resolver(&self) -> &'a dyn NullabilityResolver {
        self.resolver
    }

    pub fn stats(&self) -> &VisitStats {
        &self.stats
    }

    /// Interpret one instruction against a state and return its successors.
    pub fn visit(
        &mut self,
        instruction: &Instruction,
        mut state: MemoryState,
        sink: &mut dyn DiagnosticSink,
    ) -> Vec<InstructionState> {
        *self.stats.visits.entry(instruction.kind.name()).or_insert(0) += 1;
        if visitor_debug_enabled() {
            debug!(
                procedure = %self.procedure.name,
                index = instruction.index,
                op = instruction.kind.name(),
                stack = state.stack().len(),
                "visit instruction"
            );
        }
        match &instruction.kind {
            InstructionKind::Assign => self.visit_assign(instruction, state, sink),
            InstructionKind::CheckReturnValue => {
                let value = state.pop();
                if !state.check_not_nullable(&self.factory, value) {
                    sink.on_nullable_return(instruction);
                }
                next(instruction, state)
            }
            InstructionKind::FieldReference { physical } => {
                state.field_referenced();
                let qualifier = state.pop();
                if *physical && !state.apply_not_null(&self.factory, qualifier) {
                    sink.on_field_npe(instruction);
                    self.rebind_not_null(&mut state, qualifier);
                }
                next(instruction, state)
            }
            InstructionKind::TypeCast(cast) => self.visit_type_cast(instruction, cast, state, sink),
            InstructionKind::MethodCall(call) => {
                self.visit_method_call(instruction, call, state, sink)
            }
            InstructionKind::Binop(binop) => self.visit_binop(instruction, binop, state),
            InstructionKind::Push { value } => {
                let value = self.factory.create_value(value);
                state.push(value);
                next(instruction, state)
            }
            InstructionKind::Pop => {
                state.pop();
                next(instruction, state)
            }
            InstructionKind::Dup => {
                let top = state.peek().unwrap_or(ValueId::UNKNOWN);
                state.push(top);
                next(instruction, state)
            }
            InstructionKind::Goto { target } => vec![InstructionState {
                index: *target,
                state,
            }],
            InstructionKind::ConditionalGoto { target, negated } => {
                self.visit_conditional_goto(instruction, *target, *negated, state)
            }
            InstructionKind::FlushVariable { variable } => {
                state.flush_variable(&self.factory, *variable);
                next(instruction, state)
            }
            InstructionKind::Return => Vec::new(),
        }
    }

    fn visit_assign(
        &mut self,
        instruction: &Instruction,
        mut state: MemoryState,
        sink: &mut dyn DiagnosticSink,
    ) -> Vec<InstructionState> {
        let source = state.pop();
        let destination = state.pop();

        if let Some(decl) = self
            .factory
            .as_variable(destination)
            .and_then(|variable| self.procedure.variable(variable))
        {
            if self.resolver.is_not_null(&decl.annotations)
                && !state.apply_not_null(&self.factory, source)
            {
                sink.on_assigning_to_not_nullable_variable(instruction);
            }
            if !decl.is_untracked_on_assignment() {
                state.set_var_value(&self.factory, destination, source);
            }
        }

        state.push(destination);
        next(instruction, state)
    }

    fn visit_type_cast(
        &mut self,
        instruction: &Instruction,
        cast: &TypeCastInstruction,
        mut state: MemoryState,
        sink: &mut dyn DiagnosticSink,
    ) -> Vec<InstructionState> {
        if let Some(casted) = &cast.casted {
            let value = self.factory.create_value(casted);
            let target = self
                .factory
                .type_value(cast.cast_to.clone(), Nullness::Unknown);
            let instanceof =
                self.factory
                    .create_relation(value, target, BinaryOperator::InstanceOf, false);
            if let Some(instanceof) = instanceof {
                if !state.apply_instanceof_or_null(&self.factory, instanceof) {
                    sink.on_invalid_cast(instruction);
                }
            }
        }

        if cast.cast_to.is_primitive() {
            let top = state.pop();
            let unboxed = self.factory.create_unboxed(top);
            state.push(unboxed);
        }

        next(instruction, state)
    }

    fn visit_method_call(
        &mut self,
        instruction: &Instruction,
        call: &MethodCallInstruction,
        mut state: MemoryState,
        sink: &mut dyn DiagnosticSink,
    ) -> Vec<InstructionState> {
        let argument_nullness = self.argument_nullness(instruction.index, call);
        for position in (0..call.args.len()).rev() {
            let argument = state.pop();
            match argument_nullness.get(&position) {
                Some(Nullness::NonNull) => {
                    if !state.apply_not_null(&self.factory, argument) {
                        sink.on_passing_null_argument(instruction, position);
                        self.rebind_not_null(&mut state, argument);
                    }
                }
                Some(Nullness::Unknown) => {
                    if !state.check_not_nullable(&self.factory, argument) {
                        sink.on_passing_null_argument_to_unannotated(instruction, position);
                    }
                }
                Some(Nullness::Nullable) | None => {}
            }
        }

        let qualifier = state.pop();
        if !state.apply_not_null(&self.factory, qualifier) {
            if call.method_type == MethodType::Unboxing {
                sink.on_unboxing_nullable(instruction);
            } else {
                sink.on_method_call_npe(instruction);
            }
            self.rebind_not_null(&mut state, qualifier);
        }

        let result = self.method_result_value(instruction.index, call, qualifier);
        state.push(result);
        if call.flush_fields {
            state.flush_fields(&self.factory);
        }
        next(instruction, state)
    }

    fn method_result_value(
        &mut self,
        index: usize,
        call: &MethodCallInstruction,
        qualifier: ValueId,
    ) -> ValueId {
        if let Some(precalculated) = &call.precalculated {
            return self.factory.constant(precalculated.clone());
        }

        if let Some(result_type) = call.result_type.as_ref().filter(|ty| ty.is_reference()) {
            return match self.return_nullness(index, call) {
                Nullness::NonNull => self.factory.not_null(result_type.clone()),
                Nullness::Nullable => self
                    .factory
                    .type_value(result_type.clone(), Nullness::Nullable),
                Nullness::Unknown => self
                    .factory
                    .type_value(result_type.clone(), Nullness::Unknown),
            };
        }

        match call.method_type {
            MethodType::Unboxing => self.factory.create_unboxed(qualifier),
            MethodType::Boxing => self
                .factory
                .create_boxed(qualifier)
                .unwrap_or(ValueId::UNKNOWN),
            MethodType::Cast => match self.factory.as_constant(qualifier).cloned() {
                Some(constant) => self.factory.constant(constant.cast_to_integral()),
                None => qualifier,
            },
            MethodType::Regular => ValueId::UNKNOWN,
        }
    }

    /// Argument positions checked at a call site and their declared nullness.
    fn argument_nullness(
        &mut self,
        index: usize,
        call: &MethodCallInstruction,
    ) -> BTreeMap<usize, Nullness> {
        if let Some(cached) = self.argument_nullness.get(&index) {
            return cached.clone();
        }
        let computed = match self.resolve(call) {
            Some(method) => {
                let var_arg = is_var_arg_call(method, call, self.factory.hierarchy());
                let checked = call
                    .args
                    .len()
                    .min(method.parameters.len())
                    .saturating_sub(usize::from(var_arg));
                method.parameters[..checked]
                    .iter()
                    .enumerate()
                    .map(|(position, parameter)| {
                        let ty = parameter.annotated_type().substitute(&call.type_bindings);
                        let nullness = self
                            .resolver
                            .element_nullness(&parameter.annotations, &ty.annotations);
                        (position, nullness)
                    })
                    .collect()
            }
            None => BTreeMap::new(),
        };
        self.argument_nullness.insert(index, computed.clone());
        computed
    }

    fn return_nullness(&mut self, index: usize, call: &MethodCallInstruction) -> Nullness {
        if let Some(cached) = self.return_nullness.get(&index) {
            return *cached;
        }
        let computed = if call.is_constructor {
            Nullness::NonNull
        } else {
            match self.resolve(call) {
                Some(method) => {
                    let ty = method
                        .annotated_return_type()
                        .substitute(&call.type_bindings);
                    self.resolver
                        .element_nullness(&method.annotations, &ty.annotations)
                }
                None => Nullness::Unknown,
            }
        };
        self.return_nullness.insert(index, computed);
        computed
    }

    fn resolve(&self, call: &MethodCallInstruction) -> Option<&'a MethodDecl> {
        let methods: &'a MethodIndex = self.methods;
        call.method.as_ref().and_then(|key| methods.resolve(key))
    }

    fn visit_binop(
        &mut self,
        instruction: &Instruction,
        binop: &BinopInstruction,
        mut state: MemoryState,
    ) -> Vec<InstructionState> {
        self.reachable.insert(instruction.index);

        let right = state.pop();
        let left = state.pop();

        let Some(operator) = binop.operator else {
            state.push(ValueId::UNKNOWN);
            self.mark_both_branches(instruction.index);
            return next(instruction, state);
        };

        if matches!(operator, BinaryOperator::Eq | BinaryOperator::Ne)
            && self.factory.as_constant(left).is_some()
            && self.factory.as_constant(right).is_some()
        {
            return self.compare_constants(instruction, operator, state, left, right);
        }

        let negated = state.can_be_nan(&self.factory, left) || state.can_be_nan(&self.factory, right);
        if let Some(relation) = self
            .factory
            .create_relation(left, right, operator, negated)
        {
            return self.fork_on_relation(instruction, binop, state, left, right, relation);
        }

        let result = match operator {
            BinaryOperator::Plus => self.factory.not_null(JvmType::string()),
            BinaryOperator::InstanceOf => {
                self.check_instanceof_types(instruction.index, left, right);
                ValueId::UNKNOWN
            }
            _ => ValueId::UNKNOWN,
        };
        state.push(result);
        // Not a branching instruction in this case.
        self.mark_both_branches(instruction.index);
        next(instruction, state)
    }

    fn compare_constants(
        &mut self,
        instruction: &Instruction,
        operator: BinaryOperator,
        mut state: MemoryState,
        left: ValueId,
        right: ValueId,
    ) -> Vec<InstructionState> {
        let nan = state.can_be_nan(&self.factory, left) || state.can_be_nan(&self.factory, right);
        let negated = (operator == BinaryOperator::Ne) ^ nan;
        let outcome = (left == right) ^ negated;
        state.push(self.factory.boolean(outcome));
        self.mark_branch(instruction.index, outcome);
        next(instruction, state)
    }

    fn fork_on_relation(
        &mut self,
        instruction: &Instruction,
        binop: &BinopInstruction,
        mut state: MemoryState,
        left: ValueId,
        right: ValueId,
        relation: ValueId,
    ) -> Vec<InstructionState> {
        if self.factory.is_via_methods(left) || self.factory.is_via_methods(right) {
            self.skip_constant_condition_reporting(instruction.anchor);
        }
        self.can_be_null_in_instanceof.insert(instruction.index);
        self.branches.entry(instruction.index).or_default();
        let relation_negated = self
            .factory
            .relation(relation)
            .is_some_and(|relation| relation.negated);
        let negation = self.factory.negate(relation);
        let next_index = instruction.index + 1;
        let mut states = Vec::with_capacity(2);

        let mut true_copy = state.create_copy();
        if true_copy.apply_condition(&self.factory, relation) {
            if !relation_negated {
                self.check_one_operand_not_null(right, left, &mut true_copy);
            }
            true_copy.push(self.factory.boolean(true));
            self.mark_branch(instruction.index, true);
            states.push(InstructionState {
                index: next_index,
                state: true_copy,
            });
        } else {
            self.stats.pruned_branches += 1;
        }

        if state.apply_condition(&self.factory, negation) {
            if relation_negated {
                self.check_one_operand_not_null(right, left, &mut state);
            }
            if binop.is_instanceof() && !state.is_null(&self.factory, left) {
                self.useful_instanceofs.insert(instruction.index);
            }
            state.push(self.factory.boolean(false));
            self.mark_branch(instruction.index, false);
            states.push(InstructionState {
                index: next_index,
                state,
            });
        } else {
            self.stats.pruned_branches += 1;
        }

        if states.len() > 1 {
            self.stats.forks += 1;
        }
        states
    }

    /// When one side of an equality is known non-null, so is the other.
    fn check_one_operand_not_null(&mut self, first: ValueId, second: ValueId, state: &mut MemoryState) {
        let now_not_null = if self.is_not_null_expression(second, state) {
            first
        } else if self.is_not_null_expression(first, state) {
            second
        } else {
            return;
        };
        let null = self.factory.null();
        if let Some(condition) =
            self.factory
                .create_relation(now_not_null, null, BinaryOperator::Eq, true)
        {
            state.apply_condition(&self.factory, condition);
        }
    }

    fn is_not_null_expression(&self, value: ValueId, state: &MemoryState) -> bool {
        match self.factory.get(value) {
            SymbolicValue::Variable { .. } => state.is_not_null(&self.factory, value),
            SymbolicValue::Constant(ConstValue::EnumConstant { .. }) => true,
            _ => false,
        }
    }

    /// Redundancy of an instanceof whose operand is only known by type.
    fn check_instanceof_types(&mut self, index: usize, left: ValueId, right: ValueId) {
        if let SymbolicValue::Type { ty: checked, .. } = self.factory.get(right) {
            let operand = match self.factory.get(left) {
                SymbolicValue::NotNull { ty } => Some(ty),
                SymbolicValue::Type { ty, .. } => {
                    self.can_be_null_in_instanceof.insert(index);
                    Some(ty)
                }
                _ => None,
            };
            if let Some(operand) = operand {
                if self.factory.hierarchy().is_assignable(checked, operand) {
                    return;
                }
            }
        }
        self.useful_instanceofs.insert(index);
    }

    fn visit_conditional_goto(
        &mut self,
        instruction: &Instruction,
        target: usize,
        negated: bool,
        mut state: MemoryState,
    ) -> Vec<InstructionState> {
        let condition = state.pop();
        let fall_through = instruction.index + 1;

        if let SymbolicValue::Constant(ConstValue::Boolean(value)) = self.factory.get(condition) {
            let index = if *value != negated { target } else { fall_through };
            return vec![InstructionState { index, state }];
        }

        if self.factory.relation(condition).is_none() {
            return vec![
                InstructionState {
                    index: target,
                    state: state.create_copy(),
                },
                InstructionState {
                    index: fall_through,
                    state,
                },
            ];
        }

        let jump_condition = if negated {
            self.factory.negate(condition)
        } else {
            condition
        };
        let stay_condition = self.factory.negate(jump_condition);
        let mut states = Vec::with_capacity(2);
        let mut taken = state.create_copy();
        if taken.apply_condition(&self.factory, jump_condition) {
            states.push(InstructionState {
                index: target,
                state: taken,
            });
        } else {
            self.stats.pruned_branches += 1;
        }
        if state.apply_condition(&self.factory, stay_condition) {
            states.push(InstructionState {
                index: fall_through,
                state,
            });
        } else {
            self.stats.pruned_branches += 1;
        }
        if states.len() > 1 {
            self.stats.forks += 1;
        }
        states
    }

    /// Rebind a variable that just failed a not-null check so the same path
    /// reports it only once.
    fn rebind_not_null(&mut self, state: &mut MemoryState, value: ValueId) {
        if let Some(variable) = self.factory.as_variable(value) {
            let ty = self.factory.variable_type(variable);
            let not_null = self.factory.not_null(ty);
            state.set_var_value(&self.factory, value, not_null);
        }
    }

    fn mark_branch(&mut self, index: usize, outcome: bool) {
        let branch = self.branches.entry(index).or_default();
        if outcome {
            branch.true_reachable = true;
        } else {
            branch.false_reachable = true;
        }
    }

    fn mark_both_branches(&mut self, index: usize) {
        self.mark_branch(index, true);
        self.mark_branch(index, false);
    }

    /// Suppress constant-condition reports for this anchor and what encloses it.
    pub fn skip_constant_condition_reporting(&mut self, anchor: Option<AnchorId>) {
        if let Some(anchor) = anchor {
            self.not_to_report.insert(anchor);
        }
    }

    /// Returns whether some suppressed anchor lies inside `anchor`.
    pub fn silence_constant_condition(&self, anchor: Option<AnchorId>) -> bool {
        let Some(anchor) = anchor else {
            return false;
        };
        self.not_to_report
            .iter()
            .any(|skipped| self.procedure.is_ancestor(anchor, *skipped))
    }

    /// Returns whether the operand of an instanceof binop could have been null.
    pub fn can_be_null(&self, index: usize) -> bool {
        self.can_be_null_in_instanceof.contains(&index)
    }

    /// An instanceof is redundant when it was reached, never useful, and not constant.
    pub fn is_instanceof_redundant(&self, index: usize) -> bool {
        !self.useful_instanceofs.contains(&index)
            && !self.is_condition_const(index)
            && self.reachable.contains(&index)
    }

    pub fn is_condition_const(&self, index: usize) -> bool {
        self.branches
            .get(&index)
            .is_some_and(BranchReachability::is_condition_const)
    }

    pub fn branch_reachability(&self, index: usize) -> Option<BranchReachability> {
        self.branches.get(&index).copied()
    }

    pub fn is_reachable(&self, index: usize) -> bool {
        self.reachable.contains(&index)
    }
}

fn next(instruction: &Instruction, state: MemoryState) -> Vec<InstructionState> {
    vec![InstructionState {
        index: instruction.index + 1,
        state,
    }]
}

/// Whether trailing arguments are packed into the variable-arity parameter.
fn is_var_arg_call(
    method: &MethodDecl,
    call: &MethodCallInstruction,
    hierarchy: &ClassHierarchy,
) -> bool {
    if !method.var_args {
        return false;
    }
    let arg_count = call.args.len();
    let param_count = method.parameters.len();
    if arg_count > param_count {
        return true;
    }
    if param_count == 0 || arg_count != param_count {
        return false;
    }
    let Some(last_arg_type) = call.args[arg_count - 1].ty.as_ref() else {
        return false;
    };
    let last_param_type = method.parameters[param_count - 1]
        .annotated_type()
        .substitute(&call.type_bindings)
        .ty;
    !hierarchy.is_assignable(&last_param_type, last_arg_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PrimitiveType;
    use crate::diagnostics::{FindingCollector, FindingKind, NoopSink};
    use crate::ir::{Argument, MethodKey, Operand, VariableId};
    use crate::nullability::AnnotationResolver;
    use crate::test_harness::{NOT_NULL, NULLABLE, ProcedureBuilder, hierarchy_of, method_decl};

    struct Fixture {
        procedure: Procedure,
        methods: MethodIndex,
        resolver: AnnotationResolver,
        hierarchy: Arc<ClassHierarchy>,
    }

    impl Fixture {
        fn new(procedure: Procedure) -> Self {
            Self::with_methods(procedure, Vec::new())
        }

        fn with_methods(procedure: Procedure, methods: Vec<MethodDecl>) -> Self {
            Self {
                procedure,
                methods: MethodIndex::new(&methods).expect("methods"),
                resolver: AnnotationResolver::default(),
                hierarchy: Arc::new(hierarchy_of(&["com/example/A", "com/example/B"])),
            }
        }

        fn visitor(&self) -> InstructionVisitor<'_> {
            InstructionVisitor::new(
                &self.procedure,
                &self.methods,
                &self.resolver,
                Arc::clone(&self.hierarchy),
            )
        }
    }

    /// Visit instructions `from..to` expecting a single successor each time.
    fn run_straight(
        visitor: &mut InstructionVisitor<'_>,
        procedure: &Procedure,
        range: std::ops::Range<usize>,
        mut state: MemoryState,
        sink: &mut dyn DiagnosticSink,
    ) -> MemoryState {
        for index in range {
            let instruction = procedure.instruction_at(index).expect("instruction");
            let mut successors = visitor.visit(instruction, state, sink);
            assert_eq!(successors.len(), 1, "instruction {index} forked");
            state = successors.remove(0).state;
        }
        state
    }

    fn kinds(collector: FindingCollector) -> Vec<FindingKind> {
        collector
            .into_findings()
            .into_iter()
            .map(|finding| finding.kind)
            .collect()
    }

    #[test]
    fn assignment_binds_variable_to_source() {
        let procedure = ProcedureBuilder::new("m")
            .local("x", JvmType::string())
            .push_var(0)
            .push_not_null(JvmType::string())
            .op(InstructionKind::Assign)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..3,
            MemoryState::new(),
            &mut NoopSink,
        );

        let x = visitor.factory_mut().variable(VariableId(0), false);
        let not_null = visitor.factory_mut().not_null(JvmType::string());
        assert_eq!(state.var_value(VariableId(0)), Some(not_null));
        assert!(state.is_not_null(visitor.factory(), x));
        assert_eq!(state.peek(), Some(x));
    }

    #[test]
    fn assigning_null_to_not_null_variable_is_reported() {
        let procedure = ProcedureBuilder::new("m")
            .annotated_local("x", JvmType::string(), &[NOT_NULL])
            .push_var(0)
            .push_null()
            .op(InstructionKind::Assign)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();
        let mut sink = FindingCollector::new(false);

        run_straight(&mut visitor, &fixture.procedure, 0..3, MemoryState::new(), &mut sink);

        assert_eq!(kinds(sink), vec![FindingKind::NullAssignment]);
    }

    #[test]
    fn volatile_fields_are_not_bound_on_assignment() {
        let procedure = ProcedureBuilder::new("m")
            .field("f", JvmType::object(), true)
            .push_var(0)
            .push_null()
            .op(InstructionKind::Assign)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..3,
            MemoryState::new(),
            &mut NoopSink,
        );

        let f = visitor.factory_mut().variable(VariableId(0), false);
        assert_eq!(state.var_value(VariableId(0)), None);
        assert!(!state.is_null(visitor.factory(), f));
    }

    #[test]
    fn field_npe_is_reported_once_per_path() {
        let procedure = ProcedureBuilder::new("m")
            .local("x", JvmType::string())
            .push_var(0)
            .push_type(JvmType::string(), Nullness::Nullable)
            .op(InstructionKind::Assign)
            .op(InstructionKind::Pop)
            .push_var(0)
            .op(InstructionKind::FieldReference { physical: true })
            .push_var(0)
            .op(InstructionKind::FieldReference { physical: true })
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();
        let mut sink = FindingCollector::new(false);

        let state = run_straight(&mut visitor, &fixture.procedure, 0..8, MemoryState::new(), &mut sink);

        assert_eq!(kinds(sink), vec![FindingKind::FieldNpe]);
        let x = visitor.factory_mut().variable(VariableId(0), false);
        assert!(state.is_not_null(visitor.factory(), x));
        assert!(state.is_field_referenced());
    }

    #[test]
    fn non_physical_field_reference_is_not_checked() {
        let procedure = ProcedureBuilder::new("m")
            .push_null()
            .op(InstructionKind::FieldReference { physical: false })
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();
        let mut sink = FindingCollector::new(false);

        run_straight(&mut visitor, &fixture.procedure, 0..2, MemoryState::new(), &mut sink);

        assert!(sink.findings().is_empty());
    }

    #[test]
    fn null_check_forks_into_both_outcomes() {
        let procedure = ProcedureBuilder::new("m")
            .local("x", JvmType::string())
            .push_var(0)
            .push_null()
            .binop(BinaryOperator::Eq)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..2,
            MemoryState::new(),
            &mut NoopSink,
        );
        let successors = visitor.visit(&fixture.procedure.instructions[2], state, &mut NoopSink);

        assert_eq!(successors.len(), 2);
        let x = visitor.factory_mut().variable(VariableId(0), false);
        let factory = visitor.factory();
        let (on_true, on_false) = (&successors[0].state, &successors[1].state);
        assert_eq!(on_true.peek(), Some(factory.boolean(true)));
        assert!(on_true.is_null(factory, x));
        assert_eq!(on_false.peek(), Some(factory.boolean(false)));
        assert!(on_false.is_not_null(factory, x));
        assert!(!visitor.is_condition_const(2));
        assert_eq!(visitor.stats().forks, 1);
    }

    #[test]
    fn infeasible_branch_is_pruned() {
        let procedure = ProcedureBuilder::new("m")
            .local("x", JvmType::string())
            .push_var(0)
            .push_not_null(JvmType::string())
            .op(InstructionKind::Assign)
            .op(InstructionKind::Pop)
            .push_var(0)
            .push_null()
            .binop(BinaryOperator::Eq)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..6,
            MemoryState::new(),
            &mut NoopSink,
        );
        let successors = visitor.visit(&fixture.procedure.instructions[6], state, &mut NoopSink);

        assert_eq!(successors.len(), 1);
        assert_eq!(
            successors[0].state.peek(),
            Some(visitor.factory().boolean(false))
        );
        assert!(visitor.is_condition_const(6));
        assert_eq!(visitor.stats().pruned_branches, 1);
    }

    #[test]
    fn branch_known_null_keeps_only_true_outcome() {
        let procedure = ProcedureBuilder::new("m")
            .local("x", JvmType::string())
            .push_var(0)
            .push_null()
            .op(InstructionKind::Assign)
            .op(InstructionKind::Pop)
            .push_var(0)
            .push_null()
            .binop(BinaryOperator::Eq)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..6,
            MemoryState::new(),
            &mut NoopSink,
        );
        let successors = visitor.visit(&fixture.procedure.instructions[6], state, &mut NoopSink);

        assert_eq!(successors.len(), 1);
        assert_eq!(
            successors[0].state.peek(),
            Some(visitor.factory().boolean(true))
        );
        assert_eq!(
            visitor.branch_reachability(6),
            Some(BranchReachability {
                true_reachable: true,
                false_reachable: false,
            })
        );
    }

    #[test]
    fn equal_constants_are_never_unequal() {
        let procedure = ProcedureBuilder::new("m")
            .push_const(ConstValue::Integer(5))
            .push_const(ConstValue::Integer(5))
            .binop(BinaryOperator::Ne)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..2,
            MemoryState::new(),
            &mut NoopSink,
        );
        let successors = visitor.visit(&fixture.procedure.instructions[2], state, &mut NoopSink);

        assert_eq!(successors.len(), 1);
        assert_eq!(
            successors[0].state.peek(),
            Some(visitor.factory().boolean(false))
        );
        assert!(visitor.is_condition_const(2));
    }

    #[test]
    fn condition_with_no_feasible_outcome_counts_as_constant() {
        assert!(BranchReachability::default().is_condition_const());
        assert!(
            !BranchReachability {
                true_reachable: true,
                false_reachable: true,
            }
            .is_condition_const()
        );
    }

    #[test]
    fn constant_comparisons_fold_with_nan_rules() {
        let procedure = ProcedureBuilder::new("m")
            .push_const(ConstValue::Integer(1))
            .push_const(ConstValue::Integer(1))
            .binop(BinaryOperator::Eq)
            .push_const(ConstValue::double(f64::NAN))
            .push_const(ConstValue::double(f64::NAN))
            .binop(BinaryOperator::Eq)
            .push_const(ConstValue::double(f64::NAN))
            .push_const(ConstValue::double(f64::NAN))
            .binop(BinaryOperator::Ne)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..9,
            MemoryState::new(),
            &mut NoopSink,
        );

        let factory = visitor.factory();
        assert_eq!(
            state.stack(),
            &[factory.boolean(true), factory.boolean(false), factory.boolean(true)]
        );
        assert!(visitor.is_condition_const(2));
        assert!(visitor.is_condition_const(5));
    }

    #[test]
    fn instanceof_on_typed_operand_is_redundant_when_assignable() {
        let procedure = ProcedureBuilder::new("m")
            .push_type(JvmType::string(), Nullness::Unknown)
            .push_type(JvmType::object(), Nullness::Unknown)
            .binop(BinaryOperator::InstanceOf)
            .push_not_null(JvmType::object())
            .push_type(JvmType::string(), Nullness::Unknown)
            .binop(BinaryOperator::InstanceOf)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        run_straight(
            &mut visitor,
            &fixture.procedure,
            0..6,
            MemoryState::new(),
            &mut NoopSink,
        );

        assert!(visitor.is_instanceof_redundant(2));
        assert!(visitor.can_be_null(2));
        assert!(!visitor.is_instanceof_redundant(5));
        assert!(!visitor.can_be_null(5));
    }

    #[test]
    fn instanceof_on_variable_is_useful_when_false_branch_survives() {
        let procedure = ProcedureBuilder::new("m")
            .local("o", JvmType::object())
            .push_var(0)
            .push_type(JvmType::class("com/example/A"), Nullness::Unknown)
            .binop(BinaryOperator::InstanceOf)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..2,
            MemoryState::new(),
            &mut NoopSink,
        );
        let successors = visitor.visit(&fixture.procedure.instructions[2], state, &mut NoopSink);

        assert_eq!(successors.len(), 2);
        assert!(!visitor.is_instanceof_redundant(2));
    }

    #[test]
    fn impossible_cast_is_reported() {
        let procedure = ProcedureBuilder::new("m")
            .local("o", JvmType::object())
            .push_var(0)
            .push_type(JvmType::class("com/example/A"), Nullness::Unknown)
            .binop(BinaryOperator::InstanceOf)
            .op(InstructionKind::Pop)
            .push_var(0)
            .op(InstructionKind::TypeCast(TypeCastInstruction {
                casted: Some(Operand::Variable {
                    variable: VariableId(0),
                    via_methods: false,
                }),
                cast_to: JvmType::class("com/example/B"),
            }))
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();
        let mut sink = FindingCollector::new(false);

        let state = run_straight(&mut visitor, &fixture.procedure, 0..2, MemoryState::new(), &mut NoopSink);
        let mut successors = visitor.visit(&fixture.procedure.instructions[2], state, &mut NoopSink);
        let on_true = successors.remove(0).state;
        run_straight(&mut visitor, &fixture.procedure, 3..6, on_true, &mut sink);

        assert_eq!(kinds(sink), vec![FindingKind::InvalidCast]);
    }

    #[test]
    fn primitive_cast_unboxes_stack_top() {
        let procedure = ProcedureBuilder::new("m")
            .local("boxed", JvmType::class("java/lang/Integer"))
            .push_var(0)
            .op(InstructionKind::TypeCast(TypeCastInstruction {
                casted: None,
                cast_to: JvmType::Primitive(PrimitiveType::Int),
            }))
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..2,
            MemoryState::new(),
            &mut NoopSink,
        );

        let top = state.peek().expect("top");
        assert!(matches!(
            visitor.factory().get(top),
            SymbolicValue::Unboxed { .. }
        ));
    }

    fn format_method(var_args: bool) -> MethodDecl {
        let mut method = method_decl(
            "com/example/Text",
            "format",
            "(Ljava/lang/String;Ljava/lang/Object;[Ljava/lang/Object;)Ljava/lang/String;",
        );
        method.var_args = var_args;
        for parameter in &mut method.parameters {
            parameter.annotations = vec![NOT_NULL.to_string()];
        }
        method
    }

    fn call_with_null_arguments(arg_types: &[JvmType]) -> Procedure {
        let method = format_method(true);
        let mut builder = ProcedureBuilder::new("m").push_unknown();
        for _ in arg_types {
            builder = builder.push_null();
        }
        builder
            .op(InstructionKind::MethodCall(MethodCallInstruction {
                method: Some(method.key()),
                args: arg_types
                    .iter()
                    .map(|ty| Argument {
                        ty: Some(ty.clone()),
                        anchor: None,
                    })
                    .collect(),
                ..MethodCallInstruction::default()
            }))
            .build()
    }

    fn null_argument_positions(arg_types: &[JvmType]) -> Vec<usize> {
        let procedure = call_with_null_arguments(arg_types);
        let fixture = Fixture::with_methods(procedure, vec![format_method(true)]);
        let mut visitor = fixture.visitor();
        let mut sink = FindingCollector::new(false);
        let len = fixture.procedure.instructions.len();

        run_straight(&mut visitor, &fixture.procedure, 0..len, MemoryState::new(), &mut sink);

        let mut positions: Vec<usize> = sink
            .into_findings()
            .into_iter()
            .filter_map(|finding| finding.argument)
            .collect();
        positions.sort_unstable();
        positions
    }

    #[test]
    fn extra_arguments_skip_the_variable_arity_parameter() {
        let positions = null_argument_positions(&[
            JvmType::string(),
            JvmType::object(),
            JvmType::object(),
            JvmType::object(),
        ]);

        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn single_unpacked_trailing_argument_is_variable_arity() {
        let positions =
            null_argument_positions(&[JvmType::string(), JvmType::object(), JvmType::string()]);

        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn array_passed_for_variable_arity_parameter_is_checked() {
        let positions = null_argument_positions(&[
            JvmType::string(),
            JvmType::object(),
            JvmType::array_of(JvmType::object()),
        ]);

        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn null_argument_self_heals_variable() {
        let method = method_decl("com/example/Util", "use", "(Ljava/lang/String;)V");
        let mut method = method;
        method.parameters[0].annotations = vec![NOT_NULL.to_string()];
        let call = InstructionKind::MethodCall(MethodCallInstruction {
            method: Some(method.key()),
            args: vec![Argument::default()],
            ..MethodCallInstruction::default()
        });
        let procedure = ProcedureBuilder::new("m")
            .local("s", JvmType::string())
            .push_var(0)
            .push_null()
            .op(InstructionKind::Assign)
            .op(InstructionKind::Pop)
            .push_unknown()
            .push_var(0)
            .op(call.clone())
            .op(InstructionKind::Pop)
            .push_unknown()
            .push_var(0)
            .op(call)
            .build();
        let fixture = Fixture::with_methods(procedure, vec![method]);
        let mut visitor = fixture.visitor();
        let mut sink = FindingCollector::new(false);

        let state = run_straight(&mut visitor, &fixture.procedure, 0..11, MemoryState::new(), &mut sink);

        let findings = sink.into_findings();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].instruction, 6);
        let s = visitor.factory_mut().variable(VariableId(0), false);
        assert!(state.is_not_null(visitor.factory(), s));
    }

    #[test]
    fn nullable_argument_to_unannotated_parameter_is_a_weak_warning() {
        let method = method_decl("com/example/Util", "log", "(Ljava/lang/Object;)V");
        let procedure = ProcedureBuilder::new("m")
            .push_unknown()
            .push_type(JvmType::object(), Nullness::Nullable)
            .op(InstructionKind::MethodCall(MethodCallInstruction {
                method: Some(method.key()),
                args: vec![Argument::default()],
                ..MethodCallInstruction::default()
            }))
            .build();
        let fixture = Fixture::with_methods(procedure, vec![method]);
        let mut visitor = fixture.visitor();
        let mut sink = FindingCollector::new(true);

        run_straight(&mut visitor, &fixture.procedure, 0..3, MemoryState::new(), &mut sink);

        assert_eq!(kinds(sink), vec![FindingKind::NullArgumentUnannotated]);
    }

    #[test]
    fn call_on_null_qualifier_reports_npe_or_unboxing() {
        let procedure = ProcedureBuilder::new("m")
            .push_null()
            .op(InstructionKind::MethodCall(MethodCallInstruction::default()))
            .push_null()
            .op(InstructionKind::MethodCall(MethodCallInstruction {
                method_type: MethodType::Unboxing,
                ..MethodCallInstruction::default()
            }))
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();
        let mut sink = FindingCollector::new(false);

        run_straight(&mut visitor, &fixture.procedure, 0..4, MemoryState::new(), &mut sink);

        assert_eq!(
            kinds(sink),
            vec![FindingKind::CallNpe, FindingKind::UnboxingNpe]
        );
    }

    #[test]
    fn result_value_follows_declared_return_nullness() {
        let mut nullable = method_decl("com/example/Repo", "find", "()Ljava/lang/String;");
        nullable.annotations = vec![NULLABLE.to_string()];
        let generic = {
            let mut method = method_decl("java/util/List", "get", "(I)Ljava/lang/Object;");
            method.return_type = Some(JvmType::TypeVar("E".to_string()));
            method
        };
        let calls = [
            MethodCallInstruction {
                method: Some(nullable.key()),
                result_type: Some(JvmType::string()),
                ..MethodCallInstruction::default()
            },
            MethodCallInstruction {
                is_constructor: true,
                result_type: Some(JvmType::class("com/example/A")),
                ..MethodCallInstruction::default()
            },
            MethodCallInstruction {
                method: Some(generic.key()),
                args: vec![Argument::default()],
                result_type: Some(JvmType::string()),
                type_bindings: BTreeMap::from([(
                    "E".to_string(),
                    crate::ir::AnnotatedType {
                        ty: JvmType::string(),
                        annotations: vec![NOT_NULL.to_string()],
                    },
                )]),
                ..MethodCallInstruction::default()
            },
        ];
        let procedure = ProcedureBuilder::new("m")
            .push_not_null(JvmType::object())
            .op(InstructionKind::MethodCall(calls[0].clone()))
            .push_unknown()
            .op(InstructionKind::MethodCall(calls[1].clone()))
            .push_not_null(JvmType::class("java/util/List"))
            .push_const(ConstValue::Integer(0))
            .op(InstructionKind::MethodCall(calls[2].clone()))
            .build();
        let fixture = Fixture::with_methods(procedure, vec![nullable, generic]);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..7,
            MemoryState::new(),
            &mut NoopSink,
        );

        let factory = visitor.factory();
        let stack: Vec<&SymbolicValue> = state.stack().iter().map(|id| factory.get(*id)).collect();
        assert_eq!(
            stack,
            vec![
                &SymbolicValue::Type {
                    ty: JvmType::string(),
                    nullness: Nullness::Nullable
                },
                &SymbolicValue::NotNull {
                    ty: JvmType::class("com/example/A")
                },
                &SymbolicValue::NotNull {
                    ty: JvmType::string()
                },
            ]
        );
    }

    #[test]
    fn precalculated_and_cast_results() {
        let procedure = ProcedureBuilder::new("m")
            .push_unknown()
            .op(InstructionKind::MethodCall(MethodCallInstruction {
                precalculated: Some(ConstValue::Integer(42)),
                ..MethodCallInstruction::default()
            }))
            .push_const(ConstValue::double(5.0))
            .op(InstructionKind::MethodCall(MethodCallInstruction {
                method_type: MethodType::Cast,
                ..MethodCallInstruction::default()
            }))
            .push_const(ConstValue::double(2.5))
            .op(InstructionKind::MethodCall(MethodCallInstruction {
                method_type: MethodType::Cast,
                ..MethodCallInstruction::default()
            }))
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..6,
            MemoryState::new(),
            &mut NoopSink,
        );

        let factory = visitor.factory_mut();
        let expected = vec![
            factory.constant(ConstValue::Integer(42)),
            factory.constant(ConstValue::Integer(5)),
            factory.constant(ConstValue::double(2.5)),
        ];
        assert_eq!(state.stack(), expected.as_slice());
    }

    #[test]
    fn flushing_call_forgets_field_facts() {
        let procedure = ProcedureBuilder::new("m")
            .field("f", JvmType::object(), false)
            .push_var(0)
            .push_null()
            .op(InstructionKind::Assign)
            .op(InstructionKind::Pop)
            .push_unknown()
            .op(InstructionKind::MethodCall(MethodCallInstruction {
                flush_fields: true,
                ..MethodCallInstruction::default()
            }))
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..6,
            MemoryState::new(),
            &mut NoopSink,
        );

        let f = visitor.factory_mut().variable(VariableId(0), false);
        assert!(!state.is_null(visitor.factory(), f));
    }

    #[test]
    fn comparing_with_not_null_operand_propagates() {
        let procedure = ProcedureBuilder::new("m")
            .local("x", JvmType::string())
            .local("y", JvmType::string())
            .push_var(1)
            .push_not_null(JvmType::string())
            .op(InstructionKind::Assign)
            .op(InstructionKind::Pop)
            .push_var(0)
            .push_var(1)
            .binop(BinaryOperator::Eq)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..6,
            MemoryState::new(),
            &mut NoopSink,
        );
        let successors = visitor.visit(&fixture.procedure.instructions[6], state, &mut NoopSink);

        let x = visitor.factory_mut().variable(VariableId(0), false);
        assert!(successors[0].state.is_not_null(visitor.factory(), x));
        assert!(!successors[1].state.is_not_null(visitor.factory(), x));
    }

    #[test]
    fn comparisons_through_method_calls_silence_enclosing_anchor() {
        let procedure = ProcedureBuilder::new("m")
            .local("x", JvmType::string())
            .anchor("if (get() == null)", Some(4), None)
            .anchor("get() == null", None, Some(0))
            .push_var_via_methods(0)
            .push_null()
            .anchored(1, InstructionKind::Binop(BinopInstruction {
                operator: Some(BinaryOperator::Eq),
            }))
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..2,
            MemoryState::new(),
            &mut NoopSink,
        );
        visitor.visit(&fixture.procedure.instructions[2], state, &mut NoopSink);

        assert!(visitor.silence_constant_condition(Some(AnchorId(0))));
        assert!(visitor.silence_constant_condition(Some(AnchorId(1))));
        assert!(!visitor.silence_constant_condition(None));
    }

    #[test]
    fn string_concatenation_is_not_null() {
        let procedure = ProcedureBuilder::new("m")
            .push_unknown()
            .push_unknown()
            .binop(BinaryOperator::Plus)
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..3,
            MemoryState::new(),
            &mut NoopSink,
        );

        let top = state.peek().expect("top");
        assert!(state.is_not_null(visitor.factory(), top));
        assert!(!visitor.is_condition_const(2));
    }

    #[test]
    fn conditional_goto_follows_constant_conditions() {
        let procedure = ProcedureBuilder::new("m")
            .push_const(ConstValue::Boolean(true))
            .op(InstructionKind::ConditionalGoto {
                target: 4,
                negated: false,
            })
            .push_const(ConstValue::Boolean(true))
            .op(InstructionKind::ConditionalGoto {
                target: 0,
                negated: true,
            })
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();

        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            0..1,
            MemoryState::new(),
            &mut NoopSink,
        );
        let taken = visitor.visit(&fixture.procedure.instructions[1], state, &mut NoopSink);
        let state = run_straight(
            &mut visitor,
            &fixture.procedure,
            2..3,
            MemoryState::new(),
            &mut NoopSink,
        );
        let stayed = visitor.visit(&fixture.procedure.instructions[3], state, &mut NoopSink);

        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].index, 4);
        assert_eq!(stayed.len(), 1);
        assert_eq!(stayed[0].index, 4);
    }

    #[test]
    fn unresolved_call_checks_no_arguments() {
        let procedure = ProcedureBuilder::new("m")
            .push_unknown()
            .push_null()
            .op(InstructionKind::MethodCall(MethodCallInstruction {
                method: Some(MethodKey {
                    owner: "com/example/Missing".to_string(),
                    name: "f".to_string(),
                    descriptor: "(Ljava/lang/Object;)V".to_string(),
                }),
                args: vec![Argument::default()],
                ..MethodCallInstruction::default()
            }))
            .build();
        let fixture = Fixture::new(procedure);
        let mut visitor = fixture.visitor();
        let mut sink = FindingCollector::new(true);

        run_straight(&mut visitor, &fixture.procedure, 0..3, MemoryState::new(), &mut sink);

        assert!(sink.findings().is_empty());
    }
}
