use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::JvmType;

/// Nullness declared for a location or inferred for a value.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Nullness {
    NonNull,
    Nullable,
    #[default]
    Unknown,
}

/// Index into a procedure's variable table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(pub usize);

/// Index into a procedure's source anchor table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(pub usize);

/// Storage class of a tracked variable.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Local,
    Parameter,
    Field,
}

/// Source-level mutable location referenced by instructions.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub ty: JvmType,
    pub kind: VariableKind,
    #[serde(default)]
    pub volatile: bool,
    #[serde(default)]
    pub annotations: Vec<String>,
}

impl VariableDecl {
    /// Volatile fields may change without an assignment in this procedure, so
    /// their bindings are never updated.
    pub fn is_untracked_on_assignment(&self) -> bool {
        self.kind == VariableKind::Field && self.volatile
    }
}

/// Source construct an instruction was compiled from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceAnchor {
    pub text: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub parent: Option<AnchorId>,
}

/// Type together with its type-use annotations.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedType {
    pub ty: JvmType,
    #[serde(default)]
    pub annotations: Vec<String>,
}

impl AnnotatedType {
    pub fn plain(ty: JvmType) -> Self {
        Self {
            ty,
            annotations: Vec::new(),
        }
    }

    /// Replace type variables with their call-site bindings.
    ///
    /// A directly bound type variable also picks up the annotations of its
    /// binding, after the declared ones.
    pub fn substitute(&self, bindings: &BTreeMap<String, AnnotatedType>) -> AnnotatedType {
        if let JvmType::TypeVar(name) = &self.ty {
            if let Some(bound) = bindings.get(name) {
                let mut annotations = self.annotations.clone();
                annotations.extend(bound.annotations.iter().cloned());
                return AnnotatedType {
                    ty: bound.ty.clone(),
                    annotations,
                };
            }
        }
        AnnotatedType {
            ty: substitute_type(&self.ty, bindings),
            annotations: self.annotations.clone(),
        }
    }
}

fn substitute_type(ty: &JvmType, bindings: &BTreeMap<String, AnnotatedType>) -> JvmType {
    match ty {
        JvmType::TypeVar(name) => bindings
            .get(name)
            .map(|bound| bound.ty.clone())
            .unwrap_or_else(|| ty.clone()),
        JvmType::Array(component) => JvmType::array_of(substitute_type(component, bindings)),
        other => other.clone(),
    }
}

/// Literal constant as it appears in the instruction stream.
///
/// Floating point values are kept as bit patterns so constants can be hashed
/// and interned.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(from = "Literal", into = "Literal")]
pub enum ConstValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(u32),
    Double(u64),
    String(String),
    EnumConstant { class: String, name: String },
}

impl ConstValue {
    pub fn double(value: f64) -> Self {
        Self::Double(value.to_bits())
    }

    pub fn float(value: f32) -> Self {
        Self::Float(value.to_bits())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_nan(&self) -> bool {
        match self {
            Self::Float(bits) => f32::from_bits(*bits).is_nan(),
            Self::Double(bits) => f64::from_bits(*bits).is_nan(),
            _ => false,
        }
    }

    /// Value after an explicit numeric cast; fractional values keep their form.
    pub fn cast_to_integral(&self) -> Self {
        let value = match self {
            Self::Float(bits) => f64::from(f32::from_bits(*bits)),
            Self::Double(bits) => f64::from_bits(*bits),
            _ => return self.clone(),
        };
        if value.floor() != value {
            return self.clone();
        }
        Self::Integer(value as i64)
    }
}

/// Wire form of [`ConstValue`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Literal {
    Null,
    Nan,
    Boolean(bool),
    Integer(i64),
    Float(f32),
    Double(f64),
    String(String),
    Enum { class: String, name: String },
}

impl From<Literal> for ConstValue {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Null => Self::Null,
            Literal::Nan => Self::double(f64::NAN),
            Literal::Boolean(value) => Self::Boolean(value),
            Literal::Integer(value) => Self::Integer(value),
            Literal::Float(value) => Self::float(value),
            Literal::Double(value) => Self::double(value),
            Literal::String(value) => Self::String(value),
            Literal::Enum { class, name } => Self::EnumConstant { class, name },
        }
    }
}

impl From<ConstValue> for Literal {
    fn from(value: ConstValue) -> Self {
        match value {
            ConstValue::Null => Self::Null,
            ConstValue::Boolean(value) => Self::Boolean(value),
            ConstValue::Integer(value) => Self::Integer(value),
            ConstValue::Float(bits) => Self::Float(f32::from_bits(bits)),
            ConstValue::Double(bits) if f64::from_bits(bits).is_nan() => Self::Nan,
            ConstValue::Double(bits) => Self::Double(f64::from_bits(bits)),
            ConstValue::String(value) => Self::String(value),
            ConstValue::EnumConstant { class, name } => Self::Enum { class, name },
        }
    }
}

/// Expression description the value factory can turn into a symbolic value.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operand {
    Variable {
        variable: VariableId,
        #[serde(default)]
        via_methods: bool,
    },
    Constant {
        value: ConstValue,
    },
    Type {
        ty: JvmType,
        #[serde(default)]
        nullness: Nullness,
    },
    NotNull {
        ty: JvmType,
    },
    Unknown,
}

/// Binary operator of a binop instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    InstanceOf,
    Plus,
    Minus,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::InstanceOf => "instanceof",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
        }
    }
}

/// Binary operation or comparison; branches on its boolean outcome.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BinopInstruction {
    #[serde(default)]
    pub operator: Option<BinaryOperator>,
}

impl BinopInstruction {
    pub fn is_instanceof(&self) -> bool {
        self.operator == Some(BinaryOperator::InstanceOf)
    }
}

/// Reference-typed cast; the casted operand stays on the stack.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TypeCastInstruction {
    #[serde(default)]
    pub casted: Option<Operand>,
    pub cast_to: JvmType,
}

/// Coercion a method call instruction stands for.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodType {
    #[default]
    Regular,
    Boxing,
    Unboxing,
    Cast,
}

/// Reference to a declared method.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct MethodKey {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// Argument expression of a call.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    #[serde(default)]
    pub ty: Option<JvmType>,
    #[serde(default)]
    pub anchor: Option<AnchorId>,
}

/// Call instruction; the stream pushes the qualifier and then each argument.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MethodCallInstruction {
    #[serde(default)]
    pub method: Option<MethodKey>,
    #[serde(default)]
    pub args: Vec<Argument>,
    #[serde(default)]
    pub result_type: Option<JvmType>,
    #[serde(default)]
    pub method_type: MethodType,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub precalculated: Option<ConstValue>,
    #[serde(default)]
    pub flush_fields: bool,
    /// Type variable bindings inferred for this call site.
    #[serde(default)]
    pub type_bindings: BTreeMap<String, AnnotatedType>,
}

/// Instruction kinds of the linear procedure form.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InstructionKind {
    Push {
        value: Operand,
    },
    Pop,
    Dup,
    Assign,
    CheckReturnValue,
    FieldReference {
        #[serde(default = "physical_default")]
        physical: bool,
    },
    TypeCast(TypeCastInstruction),
    MethodCall(MethodCallInstruction),
    Binop(BinopInstruction),
    Goto {
        target: usize,
    },
    ConditionalGoto {
        target: usize,
        #[serde(default)]
        negated: bool,
    },
    FlushVariable {
        variable: VariableId,
    },
    Return,
}

fn physical_default() -> bool {
    true
}

impl InstructionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Push { .. } => "push",
            Self::Pop => "pop",
            Self::Dup => "dup",
            Self::Assign => "assign",
            Self::CheckReturnValue => "check_return_value",
            Self::FieldReference { .. } => "field_reference",
            Self::TypeCast(_) => "type_cast",
            Self::MethodCall(_) => "method_call",
            Self::Binop(_) => "binop",
            Self::Goto { .. } => "goto",
            Self::ConditionalGoto { .. } => "conditional_goto",
            Self::FlushVariable { .. } => "flush_variable",
            Self::Return => "return",
        }
    }

    /// Explicit jump target, if any.
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Self::Goto { target } | Self::ConditionalGoto { target, .. } => Some(*target),
            _ => None,
        }
    }
}

/// One step of a procedure.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub anchor: Option<AnchorId>,
    #[serde(flatten)]
    pub kind: InstructionKind,
}

/// Linearized procedure body with its variable and anchor tables.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
    #[serde(default)]
    pub anchors: Vec<SourceAnchor>,
    pub instructions: Vec<Instruction>,
}

impl Procedure {
    /// Instruction at `index`, or `None` past the end of the stream.
    pub fn instruction_at(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn variable(&self, id: VariableId) -> Option<&VariableDecl> {
        self.variables.get(id.0)
    }

    pub fn anchor(&self, id: AnchorId) -> Option<&SourceAnchor> {
        self.anchors.get(id.0)
    }

    /// Source line of an anchor, inherited from the nearest ancestor that has one.
    pub fn anchor_line(&self, id: AnchorId) -> Option<u32> {
        self.anchor_chain(id)
            .find_map(|anchor| self.anchor(anchor).and_then(|anchor| anchor.line))
    }

    /// Returns whether `ancestor` is `descendant` or one of its parents.
    pub fn is_ancestor(&self, ancestor: AnchorId, descendant: AnchorId) -> bool {
        self.anchor_chain(descendant).any(|anchor| anchor == ancestor)
    }

    fn anchor_chain(&self, start: AnchorId) -> impl Iterator<Item = AnchorId> + '_ {
        // Bounded by the table size so a malformed parent cycle cannot loop.
        std::iter::successors(Some(start), move |current| {
            self.anchor(*current).and_then(|anchor| anchor.parent)
        })
        .take(self.anchors.len().max(1))
    }
}
