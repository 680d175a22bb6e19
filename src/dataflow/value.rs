use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::classpath::ClassHierarchy;
use crate::descriptor::JvmType;
use crate::ir::{
    BinaryOperator, ConstValue, Nullness, Operand, Procedure, VariableId, VariableKind,
};

/// Interned handle of a symbolic value; equal handles mean identical values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValueId(u32);

impl ValueId {
    /// The fully unconstrained value, always interned first.
    pub const UNKNOWN: ValueId = ValueId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Canonical comparison kinds stored in relation values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RelationOp {
    Eq,
    Lt,
    Gt,
    InstanceOf,
}

impl RelationOp {
    fn symmetric(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Gt => Self::Lt,
            other => other,
        }
    }
}

/// Relation between two values, as stored in [`SymbolicValue::Relation`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Relation {
    pub left: ValueId,
    pub right: ValueId,
    pub op: RelationOp,
    pub negated: bool,
}

/// Element of the analysis lattice.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum SymbolicValue {
    Unknown,
    Variable {
        variable: VariableId,
        via_methods: bool,
    },
    Constant(ConstValue),
    Relation(Relation),
    Type {
        ty: JvmType,
        nullness: Nullness,
    },
    NotNull {
        ty: JvmType,
    },
    Boxed {
        wrapped: ValueId,
    },
    Unboxed {
        variable: ValueId,
    },
}

/// Mints symbolic values for one analysis run.
///
/// Every value goes through a unique table, so two constructions of the same
/// value return the same [`ValueId`].
pub struct ValueFactory {
    values: Vec<SymbolicValue>,
    unique: HashMap<SymbolicValue, ValueId>,
    variable_types: Vec<JvmType>,
    variable_kinds: Vec<VariableKind>,
    hierarchy: Arc<ClassHierarchy>,
    null: ValueId,
    true_value: ValueId,
    false_value: ValueId,
}

impl ValueFactory {
    pub fn new(procedure: &Procedure, hierarchy: Arc<ClassHierarchy>) -> Self {
        let mut factory = Self {
            values: Vec::new(),
            unique: HashMap::new(),
            variable_types: procedure
                .variables
                .iter()
                .map(|variable| variable.ty.clone())
                .collect(),
            variable_kinds: procedure
                .variables
                .iter()
                .map(|variable| variable.kind)
                .collect(),
            hierarchy,
            null: ValueId::UNKNOWN,
            true_value: ValueId::UNKNOWN,
            false_value: ValueId::UNKNOWN,
        };
        let unknown = factory.intern(SymbolicValue::Unknown);
        debug_assert_eq!(unknown, ValueId::UNKNOWN);
        factory.null = factory.intern(SymbolicValue::Constant(ConstValue::Null));
        factory.true_value = factory.intern(SymbolicValue::Constant(ConstValue::Boolean(true)));
        factory.false_value = factory.intern(SymbolicValue::Constant(ConstValue::Boolean(false)));
        factory
    }

    fn intern(&mut self, value: SymbolicValue) -> ValueId {
        if let Some(id) = self.unique.get(&value) {
            return *id;
        }
        let id = ValueId(self.values.len() as u32);
        self.values.push(value.clone());
        self.unique.insert(value, id);
        id
    }

    /// Number of distinct values minted so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, id: ValueId) -> &SymbolicValue {
        &self.values[id.index()]
    }

    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    pub fn unknown(&self) -> ValueId {
        ValueId::UNKNOWN
    }

    pub fn null(&self) -> ValueId {
        self.null
    }

    pub fn boolean(&self, value: bool) -> ValueId {
        if value {
            self.true_value
        } else {
            self.false_value
        }
    }

    pub fn constant(&mut self, value: ConstValue) -> ValueId {
        self.intern(SymbolicValue::Constant(value))
    }

    pub fn variable(&mut self, variable: VariableId, via_methods: bool) -> ValueId {
        if variable.0 >= self.variable_types.len() {
            warn!("reference to undeclared variable {}", variable.0);
            return ValueId::UNKNOWN;
        }
        self.intern(SymbolicValue::Variable {
            variable,
            via_methods,
        })
    }

    pub fn type_value(&mut self, ty: JvmType, nullness: Nullness) -> ValueId {
        self.intern(SymbolicValue::Type { ty, nullness })
    }

    pub fn not_null(&mut self, ty: JvmType) -> ValueId {
        self.intern(SymbolicValue::NotNull { ty })
    }

    /// Value of an operand description produced by the front end.
    pub fn create_value(&mut self, operand: &Operand) -> ValueId {
        match operand {
            Operand::Variable {
                variable,
                via_methods,
            } => self.variable(*variable, *via_methods),
            Operand::Constant { value } => self.constant(value.clone()),
            Operand::Type { ty, nullness } => self.type_value(ty.clone(), *nullness),
            Operand::NotNull { ty } => self.not_null(ty.clone()),
            Operand::Unknown => ValueId::UNKNOWN,
        }
    }

    /// Build a canonical relation, or `None` when the operands cannot be tracked.
    ///
    /// `!=`, `>=`, and `<=` become negated `==`, `<`, and `>`. A tracked operand
    /// (variable or boxing coercion) always ends up on the left.
    pub fn create_relation(
        &mut self,
        left: ValueId,
        right: ValueId,
        operator: BinaryOperator,
        negated: bool,
    ) -> Option<ValueId> {
        let (op, flipped) = match operator {
            BinaryOperator::Eq => (RelationOp::Eq, false),
            BinaryOperator::Ne => (RelationOp::Eq, true),
            BinaryOperator::Lt => (RelationOp::Lt, false),
            BinaryOperator::Ge => (RelationOp::Lt, true),
            BinaryOperator::Gt => (RelationOp::Gt, false),
            BinaryOperator::Le => (RelationOp::Gt, true),
            BinaryOperator::InstanceOf => (RelationOp::InstanceOf, false),
            _ => return None,
        };
        let negated = negated ^ flipped;

        let (left, right, op) = if self.is_tracked(left) {
            (left, right, op)
        } else if self.is_tracked(right) {
            if op == RelationOp::InstanceOf {
                return None;
            }
            (right, left, op.symmetric())
        } else {
            match (self.get(left), self.get(right)) {
                (SymbolicValue::NotNull { .. }, SymbolicValue::Constant(_))
                    if op != RelationOp::InstanceOf =>
                {
                    (left, right, op)
                }
                (SymbolicValue::Constant(_), SymbolicValue::NotNull { .. })
                    if op != RelationOp::InstanceOf =>
                {
                    (right, left, op.symmetric())
                }
                _ => return None,
            }
        };
        Some(self.intern(SymbolicValue::Relation(Relation {
            left,
            right,
            op,
            negated,
        })))
    }

    /// Negation of a condition value; booleans flip, other values stay as they are.
    pub fn negate(&mut self, condition: ValueId) -> ValueId {
        match self.get(condition) {
            SymbolicValue::Relation(relation) => {
                let negated = Relation {
                    negated: !relation.negated,
                    ..*relation
                };
                self.intern(SymbolicValue::Relation(negated))
            }
            SymbolicValue::Constant(ConstValue::Boolean(value)) => self.boolean(!*value),
            _ => condition,
        }
    }

    /// Boxed form of a value, when boxing is representable.
    pub fn create_boxed(&mut self, value: ValueId) -> Option<ValueId> {
        match self.get(value) {
            SymbolicValue::Unboxed { variable } => Some(*variable),
            SymbolicValue::Variable { .. } => {
                Some(self.intern(SymbolicValue::Boxed { wrapped: value }))
            }
            SymbolicValue::Constant(constant) if !constant.is_null() => {
                Some(self.intern(SymbolicValue::Boxed { wrapped: value }))
            }
            _ => None,
        }
    }

    /// Unboxed form of a value; unrepresentable cases become `Unknown`.
    pub fn create_unboxed(&mut self, value: ValueId) -> ValueId {
        match self.get(value) {
            SymbolicValue::Boxed { wrapped } => *wrapped,
            SymbolicValue::Constant(_) => value,
            SymbolicValue::Variable { .. } => {
                self.intern(SymbolicValue::Unboxed { variable: value })
            }
            _ => ValueId::UNKNOWN,
        }
    }

    pub fn relation(&self, id: ValueId) -> Option<Relation> {
        match self.get(id) {
            SymbolicValue::Relation(relation) => Some(*relation),
            _ => None,
        }
    }

    pub fn as_variable(&self, id: ValueId) -> Option<VariableId> {
        match self.get(id) {
            SymbolicValue::Variable { variable, .. } => Some(*variable),
            _ => None,
        }
    }

    pub fn as_constant(&self, id: ValueId) -> Option<&ConstValue> {
        match self.get(id) {
            SymbolicValue::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_via_methods(&self, id: ValueId) -> bool {
        matches!(
            self.get(id),
            SymbolicValue::Variable {
                via_methods: true,
                ..
            }
        )
    }

    /// Variable a value is derived from through boxing coercions.
    pub fn base_variable(&self, id: ValueId) -> Option<VariableId> {
        match self.get(id) {
            SymbolicValue::Variable { variable, .. } => Some(*variable),
            SymbolicValue::Boxed { wrapped } => self.base_variable(*wrapped),
            SymbolicValue::Unboxed { variable } => self.base_variable(*variable),
            _ => None,
        }
    }

    /// Values that can join equivalence classes in a memory state.
    pub fn is_atom(&self, id: ValueId) -> bool {
        matches!(
            self.get(id),
            SymbolicValue::Variable { .. }
                | SymbolicValue::Constant(_)
                | SymbolicValue::Boxed { .. }
                | SymbolicValue::Unboxed { .. }
        )
    }

    fn is_tracked(&self, id: ValueId) -> bool {
        matches!(
            self.get(id),
            SymbolicValue::Variable { .. }
                | SymbolicValue::Boxed { .. }
                | SymbolicValue::Unboxed { .. }
        )
    }

    /// Declared type of a variable; undeclared variables fall back to `Object`.
    pub fn variable_type(&self, variable: VariableId) -> JvmType {
        self.variable_types
            .get(variable.0)
            .cloned()
            .unwrap_or_else(JvmType::object)
    }

    /// Variables declared as fields, which calls may overwrite.
    pub fn field_variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.variable_kinds
            .iter()
            .enumerate()
            .filter(|(_, kind)| **kind == VariableKind::Field)
            .map(|(index, _)| VariableId(index))
    }

    /// Static type carried by a value, when it has one.
    pub fn static_type(&self, id: ValueId) -> Option<JvmType> {
        match self.get(id) {
            SymbolicValue::Variable { variable, .. } => Some(self.variable_type(*variable)),
            SymbolicValue::Type { ty, .. } | SymbolicValue::NotNull { ty } => Some(ty.clone()),
            _ => None,
        }
    }
}
