use crate::classpath::ClassHierarchy;
use crate::descriptor::{JvmType, method_signature};
use crate::ir::{
    AnchorId, BinaryOperator, BinopInstruction, ConstValue, Instruction, InstructionKind,
    Nullness, Operand, Procedure, SourceAnchor, VariableDecl, VariableId, VariableKind,
};
use crate::program::{ClassDecl, MethodDecl, ParameterDecl};

pub(crate) const NOT_NULL: &str = "org.jetbrains.annotations.NotNull";
pub(crate) const NULLABLE: &str = "org.jetbrains.annotations.Nullable";

/// Fluent builder for procedures used in unit tests.
pub(crate) struct ProcedureBuilder {
    procedure: Procedure,
}

impl ProcedureBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            procedure: Procedure {
                name: name.to_string(),
                source_file: Some("Test.java".to_string()),
                variables: Vec::new(),
                anchors: Vec::new(),
                instructions: Vec::new(),
            },
        }
    }

    fn variable(mut self, name: &str, ty: JvmType, kind: VariableKind, annotations: &[&str]) -> Self {
        self.procedure.variables.push(VariableDecl {
            name: name.to_string(),
            ty,
            kind,
            volatile: false,
            annotations: annotations.iter().map(|name| name.to_string()).collect(),
        });
        self
    }

    pub(crate) fn local(self, name: &str, ty: JvmType) -> Self {
        self.variable(name, ty, VariableKind::Local, &[])
    }

    pub(crate) fn annotated_local(self, name: &str, ty: JvmType, annotations: &[&str]) -> Self {
        self.variable(name, ty, VariableKind::Local, annotations)
    }

    pub(crate) fn parameter(self, name: &str, ty: JvmType, annotations: &[&str]) -> Self {
        self.variable(name, ty, VariableKind::Parameter, annotations)
    }

    pub(crate) fn field(mut self, name: &str, ty: JvmType, volatile: bool) -> Self {
        self = self.variable(name, ty, VariableKind::Field, &[]);
        if let Some(field) = self.procedure.variables.last_mut() {
            field.volatile = volatile;
        }
        self
    }

    pub(crate) fn anchor(mut self, text: &str, line: Option<u32>, parent: Option<usize>) -> Self {
        self.procedure.anchors.push(SourceAnchor {
            text: text.to_string(),
            line,
            parent: parent.map(AnchorId),
        });
        self
    }

    pub(crate) fn op(self, kind: InstructionKind) -> Self {
        self.instruction(None, kind)
    }

    pub(crate) fn anchored(self, anchor: usize, kind: InstructionKind) -> Self {
        self.instruction(Some(AnchorId(anchor)), kind)
    }

    fn instruction(mut self, anchor: Option<AnchorId>, kind: InstructionKind) -> Self {
        let index = self.procedure.instructions.len();
        self.procedure.instructions.push(Instruction {
            index,
            anchor,
            kind,
        });
        self
    }

    fn push(self, value: Operand) -> Self {
        self.op(InstructionKind::Push { value })
    }

    pub(crate) fn push_var(self, variable: usize) -> Self {
        self.push(Operand::Variable {
            variable: VariableId(variable),
            via_methods: false,
        })
    }

    pub(crate) fn push_var_via_methods(self, variable: usize) -> Self {
        self.push(Operand::Variable {
            variable: VariableId(variable),
            via_methods: true,
        })
    }

    pub(crate) fn push_const(self, value: ConstValue) -> Self {
        self.push(Operand::Constant { value })
    }

    pub(crate) fn push_null(self) -> Self {
        self.push_const(ConstValue::Null)
    }

    pub(crate) fn push_type(self, ty: JvmType, nullness: Nullness) -> Self {
        self.push(Operand::Type { ty, nullness })
    }

    pub(crate) fn push_not_null(self, ty: JvmType) -> Self {
        self.push(Operand::NotNull { ty })
    }

    pub(crate) fn push_unknown(self) -> Self {
        self.push(Operand::Unknown)
    }

    pub(crate) fn binop(self, operator: BinaryOperator) -> Self {
        self.op(InstructionKind::Binop(BinopInstruction {
            operator: Some(operator),
        }))
    }

    /// Index the next instruction will get.
    pub(crate) fn next_index(&self) -> usize {
        self.procedure.instructions.len()
    }

    pub(crate) fn build(self) -> Procedure {
        self.procedure
    }
}

/// Hierarchy where every named class directly extends `java/lang/Object`.
pub(crate) fn hierarchy_of(classes: &[&str]) -> ClassHierarchy {
    let decls: Vec<ClassDecl> = classes
        .iter()
        .map(|name| ClassDecl {
            name: name.to_string(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            is_interface: false,
        })
        .collect();
    ClassHierarchy::new(&decls).expect("test hierarchy")
}

/// Unannotated method declaration with types taken from the descriptor.
pub(crate) fn method_decl(owner: &str, name: &str, descriptor: &str) -> MethodDecl {
    let (parameters, return_type) = method_signature(descriptor).expect("test descriptor");
    MethodDecl {
        owner: owner.to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        parameters: parameters
            .into_iter()
            .enumerate()
            .map(|(index, ty)| ParameterDecl {
                name: format!("p{index}"),
                ty: Some(ty),
                annotations: Vec::new(),
                type_annotations: Vec::new(),
            })
            .collect(),
        return_type: Some(return_type),
        return_type_annotations: Vec::new(),
        annotations: Vec::new(),
        var_args: false,
    }
}
