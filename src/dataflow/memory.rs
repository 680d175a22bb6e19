use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::dataflow::value::{Relation, RelationOp, SymbolicValue, ValueFactory, ValueId};
use crate::descriptor::JvmType;
use crate::ir::{ConstValue, Nullness, VariableId};

/// Type and nullness facts recorded for one variable value.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct VariableFacts {
    nullable: bool,
    instance_of: BTreeSet<JvmType>,
    not_instance_of: BTreeSet<JvmType>,
}

/// Symbolic frame: operand stack, variable bindings, and constraints.
///
/// Constraints are equivalence classes of atoms (variables, constants, boxing
/// coercions) plus pairs of classes known to differ. "Not null" is a class
/// that differs from the class holding the null constant. Cloning produces an
/// independent copy.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryState {
    stack: Vec<ValueId>,
    classes: Vec<BTreeSet<ValueId>>,
    class_index: BTreeMap<ValueId, usize>,
    distinct: BTreeSet<(usize, usize)>,
    facts: BTreeMap<ValueId, VariableFacts>,
    bindings: BTreeMap<VariableId, ValueId>,
    field_referenced: bool,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Independent copy used on the diverging side of a branch.
    pub fn create_copy(&self) -> Self {
        self.clone()
    }

    pub fn push(&mut self, value: ValueId) {
        self.stack.push(value);
    }

    /// Pop the operand stack; an empty stack yields `Unknown`.
    pub fn pop(&mut self) -> ValueId {
        match self.stack.pop() {
            Some(value) => value,
            None => {
                debug!("pop on empty operand stack");
                ValueId::UNKNOWN
            }
        }
    }

    pub fn peek(&self) -> Option<ValueId> {
        self.stack.last().copied()
    }

    pub fn stack(&self) -> &[ValueId] {
        &self.stack
    }

    /// Value most recently bound to a variable by an assignment.
    pub fn var_value(&self, variable: VariableId) -> Option<ValueId> {
        self.bindings.get(&variable).copied()
    }

    pub fn field_referenced(&mut self) {
        self.field_referenced = true;
    }

    pub fn is_field_referenced(&self) -> bool {
        self.field_referenced
    }

    /// Bind a variable value to a new value, dropping what was known about it.
    /// Assigning a variable to itself changes nothing.
    pub fn set_var_value(&mut self, factory: &ValueFactory, variable: ValueId, value: ValueId) {
        let Some(id) = factory.as_variable(variable) else {
            return;
        };
        if value == variable {
            return;
        }
        self.flush_variable(factory, id);
        self.bindings.insert(id, value);
        match factory.get(value) {
            SymbolicValue::NotNull { ty } => {
                let ty = ty.clone();
                self.apply_equality(factory, variable, factory.null(), true);
                self.record_type(factory, variable, ty);
            }
            SymbolicValue::Type { ty, nullness } => {
                let (ty, nullness) = (ty.clone(), *nullness);
                match nullness {
                    Nullness::NonNull => {
                        self.apply_equality(factory, variable, factory.null(), true);
                    }
                    Nullness::Nullable => self.facts_mut(factory, variable).nullable = true,
                    Nullness::Unknown => {}
                }
                self.record_type(factory, variable, ty);
            }
            SymbolicValue::Variable { .. }
            | SymbolicValue::Constant(_)
            | SymbolicValue::Boxed { .. }
            | SymbolicValue::Unboxed { .. } => {
                self.apply_equality(factory, variable, value, false);
            }
            SymbolicValue::Unknown | SymbolicValue::Relation(_) => {}
        }
    }

    /// Forget every binding and constraint mentioning the variable.
    pub fn flush_variable(&mut self, factory: &ValueFactory, variable: VariableId) {
        self.bindings.remove(&variable);
        self.facts
            .retain(|value, _| factory.base_variable(*value) != Some(variable));
        for class in &mut self.classes {
            class.retain(|value| factory.base_variable(*value) != Some(variable));
        }
        self.class_index
            .retain(|value, _| factory.base_variable(*value) != Some(variable));
        self.drop_empty_class_constraints();
    }

    /// Forget field bindings after a call that may have mutated them.
    pub fn flush_fields(&mut self, factory: &ValueFactory) {
        let fields: Vec<VariableId> = factory.field_variables().collect();
        for field in fields {
            self.flush_variable(factory, field);
        }
    }

    /// Apply a condition value; returns false when the state cannot satisfy it.
    pub fn apply_condition(&mut self, factory: &ValueFactory, condition: ValueId) -> bool {
        match factory.get(condition) {
            SymbolicValue::Constant(ConstValue::Boolean(value)) => *value,
            SymbolicValue::Relation(relation) => {
                let relation = *relation;
                self.apply_relation(factory, relation)
            }
            _ => true,
        }
    }

    fn apply_relation(&mut self, factory: &ValueFactory, relation: Relation) -> bool {
        match relation.op {
            RelationOp::Eq => {
                self.apply_equality(factory, relation.left, relation.right, relation.negated)
            }
            RelationOp::Lt | RelationOp::Gt => self.apply_ordering(factory, relation),
            RelationOp::InstanceOf => self.apply_instanceof(factory, relation),
        }
    }

    /// Cast check: succeeds when the value may be null or may have the type.
    pub fn apply_instanceof_or_null(&mut self, factory: &ValueFactory, condition: ValueId) -> bool {
        let Some(relation) = factory.relation(condition) else {
            return true;
        };
        if factory.as_variable(relation.left).is_none() {
            return true;
        }
        let Some(ty) = type_operand(factory, relation.right) else {
            return true;
        };
        if ty.is_primitive() {
            return true;
        }
        self.is_null(factory, relation.left) || self.add_instance_of(factory, relation.left, ty)
    }

    /// Constrain a value to be non-null; false when it is null or marked nullable.
    pub fn apply_not_null(&mut self, factory: &ValueFactory, value: ValueId) -> bool {
        self.check_not_nullable(factory, value)
            && self.apply_equality(factory, value, factory.null(), true)
    }

    /// Returns false when the value is known null or carries a nullable mark.
    pub fn check_not_nullable(&self, factory: &ValueFactory, value: ValueId) -> bool {
        if self.is_null(factory, value) {
            return false;
        }
        match factory.get(value) {
            SymbolicValue::Type {
                nullness: Nullness::Nullable,
                ..
            } => false,
            SymbolicValue::Variable { .. } => {
                if self.is_not_null(factory, value) {
                    return true;
                }
                !self.is_marked_nullable(value)
            }
            _ => true,
        }
    }

    /// Returns whether the value is proven to be null.
    pub fn is_null(&self, factory: &ValueFactory, value: ValueId) -> bool {
        if value == factory.null() {
            return true;
        }
        if !factory.is_atom(value) {
            return false;
        }
        match (self.class_of(value), self.class_of(factory.null())) {
            (Some(class), Some(null_class)) => class == null_class,
            _ => false,
        }
    }

    /// Returns whether the value is proven to be non-null.
    pub fn is_not_null(&self, factory: &ValueFactory, value: ValueId) -> bool {
        match factory.get(value) {
            SymbolicValue::NotNull { .. }
            | SymbolicValue::Boxed { .. }
            | SymbolicValue::Type {
                nullness: Nullness::NonNull,
                ..
            } => true,
            SymbolicValue::Constant(constant) => !constant.is_null(),
            SymbolicValue::Variable { .. } | SymbolicValue::Unboxed { .. } => self
                .class_of(value)
                .is_some_and(|class| self.is_class_not_null(factory, class)),
            _ => false,
        }
    }

    /// Returns whether the value may be a NaN constant.
    pub fn can_be_nan(&self, factory: &ValueFactory, value: ValueId) -> bool {
        match factory.get(value) {
            SymbolicValue::Constant(constant) => constant.is_nan(),
            SymbolicValue::Boxed { wrapped } => self.can_be_nan(factory, *wrapped),
            SymbolicValue::Variable { .. } | SymbolicValue::Unboxed { .. } => {
                self.class_of(value).is_some_and(|class| {
                    self.classes[class].iter().any(|member| {
                        factory
                            .as_constant(*member)
                            .is_some_and(ConstValue::is_nan)
                    })
                })
            }
            _ => false,
        }
    }

    /// Constant a value is known to equal, if any.
    pub fn constant_value(&self, factory: &ValueFactory, value: ValueId) -> Option<ValueId> {
        if factory.as_constant(value).is_some() {
            return Some(value);
        }
        let class = self.class_of(value)?;
        self.class_constant(factory, class)
    }

    fn apply_equality(
        &mut self,
        factory: &ValueFactory,
        left: ValueId,
        right: ValueId,
        negated: bool,
    ) -> bool {
        if !factory.is_atom(left) || !factory.is_atom(right) {
            // Only nullness can be decided for untracked values such as not-null wrappers.
            let contradicts = (self.is_not_null(factory, left) && self.is_null(factory, right))
                || (self.is_null(factory, left) && self.is_not_null(factory, right));
            return !contradicts || negated;
        }
        let left_class = self.class_or_create(left);
        let right_class = self.class_or_create(right);
        if negated {
            if left_class == right_class {
                return false;
            }
            if !self.have_conflicting_members(factory, left_class, right_class) {
                self.distinct
                    .insert(ordered_pair(left_class, right_class));
            }
            self.refresh_nullable_marks(factory, left_class);
            self.refresh_nullable_marks(factory, right_class);
            return true;
        }
        if left_class == right_class {
            return true;
        }
        if self.distinct.contains(&ordered_pair(left_class, right_class))
            || self.have_conflicting_members(factory, left_class, right_class)
        {
            return false;
        }
        let merged = self.merge_classes(left_class, right_class);
        self.refresh_nullable_marks(factory, merged);
        true
    }

    fn apply_ordering(&mut self, factory: &ValueFactory, relation: Relation) -> bool {
        let (Some(left_class), Some(right_class)) =
            (self.class_of(relation.left), self.class_of(relation.right))
        else {
            let left_constant = self.constant_value(factory, relation.left);
            let right_constant = self.constant_value(factory, relation.right);
            return compare_constants(factory, left_constant, right_constant, relation);
        };
        if left_class == right_class {
            // x < x and x > x never hold.
            return relation.negated;
        }
        let left_constant = self.class_constant(factory, left_class);
        let right_constant = self.class_constant(factory, right_class);
        compare_constants(factory, left_constant, right_constant, relation)
    }

    fn apply_instanceof(&mut self, factory: &ValueFactory, relation: Relation) -> bool {
        if factory.as_variable(relation.left).is_none() {
            return true;
        }
        let Some(ty) = type_operand(factory, relation.right) else {
            return true;
        };
        let null = factory.null();
        if relation.negated {
            self.add_not_instance_of(factory, relation.left, ty)
                || self.apply_equality(factory, relation.left, null, false)
        } else {
            self.apply_equality(factory, relation.left, null, true)
                && self.add_instance_of(factory, relation.left, ty)
        }
    }

    fn add_instance_of(&mut self, factory: &ValueFactory, variable: ValueId, ty: JvmType) -> bool {
        let hierarchy = factory.hierarchy();
        let facts = self.facts_mut(factory, variable);
        if facts.instance_of.contains(&ty) {
            return true;
        }
        if facts
            .not_instance_of
            .iter()
            .any(|excluded| hierarchy.is_assignable(excluded, &ty))
        {
            return false;
        }
        if facts
            .instance_of
            .iter()
            .any(|known| !hierarchy.is_convertible(&ty, known))
        {
            return false;
        }
        facts.instance_of.insert(ty);
        true
    }

    fn add_not_instance_of(
        &mut self,
        factory: &ValueFactory,
        variable: ValueId,
        ty: JvmType,
    ) -> bool {
        let hierarchy = factory.hierarchy();
        let facts = self.facts_mut(factory, variable);
        if facts.not_instance_of.contains(&ty) {
            return true;
        }
        if facts
            .instance_of
            .iter()
            .any(|known| hierarchy.is_assignable(&ty, known))
        {
            return false;
        }
        facts.not_instance_of.insert(ty);
        true
    }

    fn record_type(&mut self, factory: &ValueFactory, variable: ValueId, ty: JvmType) {
        if ty.is_reference() {
            self.facts_mut(factory, variable).instance_of.insert(ty);
        }
    }

    /// Facts of a variable value, seeded with its declared type.
    fn facts_mut(&mut self, factory: &ValueFactory, variable: ValueId) -> &mut VariableFacts {
        self.facts.entry(variable).or_insert_with(|| {
            let mut facts = VariableFacts::default();
            if let Some(declared) = factory.static_type(variable) {
                if declared.is_reference() {
                    facts.instance_of.insert(declared);
                }
            }
            facts
        })
    }

    fn is_marked_nullable(&self, value: ValueId) -> bool {
        let marked = |member: &ValueId| self.facts.get(member).is_some_and(|facts| facts.nullable);
        match self.class_of(value) {
            Some(class) => self.classes[class].iter().any(marked),
            None => marked(&value),
        }
    }

    fn refresh_nullable_marks(&mut self, factory: &ValueFactory, class: usize) {
        if !self.is_class_not_null(factory, class) {
            return;
        }
        let members: Vec<ValueId> = self.classes[class].iter().copied().collect();
        for member in members {
            if let Some(facts) = self.facts.get_mut(&member) {
                facts.nullable = false;
            }
        }
    }

    fn is_class_not_null(&self, factory: &ValueFactory, class: usize) -> bool {
        let has_non_null_member = self.classes[class].iter().any(|member| {
            matches!(factory.get(*member), SymbolicValue::Boxed { .. })
                || factory
                    .as_constant(*member)
                    .is_some_and(|constant| !constant.is_null())
        });
        if has_non_null_member {
            return true;
        }
        match self.class_of(factory.null()) {
            Some(null_class) => {
                null_class != class && self.distinct.contains(&ordered_pair(class, null_class))
            }
            None => false,
        }
    }

    fn have_conflicting_members(&self, factory: &ValueFactory, left: usize, right: usize) -> bool {
        if let (Some(_), Some(_)) = (
            self.class_constant(factory, left),
            self.class_constant(factory, right),
        ) {
            // Canonical constants in different classes are different constants.
            return true;
        }
        let null = factory.null();
        let has_boxed = |class: usize| {
            self.classes[class]
                .iter()
                .any(|member| matches!(factory.get(*member), SymbolicValue::Boxed { .. }))
        };
        (self.classes[left].contains(&null) && has_boxed(right))
            || (self.classes[right].contains(&null) && has_boxed(left))
    }

    fn class_of(&self, value: ValueId) -> Option<usize> {
        self.class_index.get(&value).copied()
    }

    fn class_constant(&self, factory: &ValueFactory, class: usize) -> Option<ValueId> {
        self.classes[class]
            .iter()
            .copied()
            .find(|member| factory.as_constant(*member).is_some())
    }

    fn class_or_create(&mut self, value: ValueId) -> usize {
        if let Some(class) = self.class_of(value) {
            return class;
        }
        let singleton = BTreeSet::from([value]);
        let slot = match self.classes.iter().position(BTreeSet::is_empty) {
            Some(slot) => {
                self.classes[slot] = singleton;
                slot
            }
            None => {
                self.classes.push(singleton);
                self.classes.len() - 1
            }
        };
        self.class_index.insert(value, slot);
        slot
    }

    fn merge_classes(&mut self, left: usize, right: usize) -> usize {
        let (keep, drop) = ordered_pair(left, right);
        let moved = std::mem::take(&mut self.classes[drop]);
        for member in &moved {
            self.class_index.insert(*member, keep);
        }
        self.classes[keep].extend(moved);
        self.distinct = self
            .distinct
            .iter()
            .map(|(a, b)| {
                let a = if *a == drop { keep } else { *a };
                let b = if *b == drop { keep } else { *b };
                ordered_pair(a, b)
            })
            .collect();
        keep
    }

    fn drop_empty_class_constraints(&mut self) {
        let classes = &self.classes;
        self.distinct
            .retain(|(a, b)| !classes[*a].is_empty() && !classes[*b].is_empty());
    }
}

fn ordered_pair(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

fn type_operand(factory: &ValueFactory, value: ValueId) -> Option<JvmType> {
    match factory.get(value) {
        SymbolicValue::Type { ty, .. } | SymbolicValue::NotNull { ty } => Some(ty.clone()),
        _ => None,
    }
}

fn compare_constants(
    factory: &ValueFactory,
    left: Option<ValueId>,
    right: Option<ValueId>,
    relation: Relation,
) -> bool {
    let (Some(left), Some(right)) = (left, right) else {
        return true;
    };
    let (Some(ConstValue::Integer(left)), Some(ConstValue::Integer(right))) =
        (factory.as_constant(left), factory.as_constant(right))
    else {
        return true;
    };
    let holds = match relation.op {
        RelationOp::Lt => left < right,
        RelationOp::Gt => left > right,
        _ => return true,
    };
    holds != relation.negated
}
