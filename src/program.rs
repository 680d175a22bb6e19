use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::descriptor::{
    JvmType, ReturnKind, method_param_count, method_return_kind, method_signature,
};
use crate::ir::{AnnotatedType, MethodKey, Procedure};

/// Class declaration used to build the type hierarchy.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub super_name: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub is_interface: bool,
}

/// Declared parameter of a callable method.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParameterDecl {
    #[serde(default)]
    pub name: String,
    /// Generic parameter type; filled from the descriptor when omitted.
    #[serde(default)]
    pub ty: Option<JvmType>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub type_annotations: Vec<String>,
}

impl ParameterDecl {
    pub fn annotated_type(&self) -> AnnotatedType {
        AnnotatedType {
            ty: self.ty.clone().unwrap_or_else(JvmType::object),
            annotations: self.type_annotations.clone(),
        }
    }
}

/// Declared method that call instructions may resolve to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDecl>,
    #[serde(default)]
    pub return_type: Option<JvmType>,
    #[serde(default)]
    pub return_type_annotations: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub var_args: bool,
}

impl MethodDecl {
    pub fn key(&self) -> MethodKey {
        MethodKey {
            owner: self.owner.clone(),
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
        }
    }

    pub fn annotated_return_type(&self) -> AnnotatedType {
        AnnotatedType {
            ty: self.return_type.clone().unwrap_or_else(JvmType::object),
            annotations: self.return_type_annotations.clone(),
        }
    }

    /// Fill omitted types from the descriptor and check declared ones against it.
    fn normalize(&mut self) -> Result<()> {
        let param_count = method_param_count(&self.descriptor)?;
        let (parameter_types, descriptor_return) = method_signature(&self.descriptor)?;
        if self.parameters.is_empty() {
            self.parameters = vec![ParameterDecl::default(); param_count];
        }
        if self.parameters.len() != param_count {
            bail!(
                "declares {} parameters but descriptor has {}",
                self.parameters.len(),
                param_count
            );
        }
        for (parameter, descriptor_type) in self.parameters.iter_mut().zip(parameter_types) {
            if parameter.ty.is_none() {
                parameter.ty = Some(descriptor_type);
            }
        }
        let expected = method_return_kind(&self.descriptor)?;
        match &self.return_type {
            None => self.return_type = Some(descriptor_return),
            Some(declared) => {
                let actual = match declared {
                    JvmType::Void => ReturnKind::Void,
                    JvmType::Primitive(_) => ReturnKind::Primitive,
                    _ => ReturnKind::Reference,
                };
                if actual != expected {
                    bail!("return type {declared} does not match descriptor");
                }
            }
        }
        Ok(())
    }
}

/// Program document produced by a front end.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
}

impl Program {
    /// Parse a program document from JSON text and validate it.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(text);
        let program: Program =
            serde_path_to_error::deserialize(&mut deserializer).context("parse program JSON")?;
        program.validated()
    }

    fn validated(mut self) -> Result<Self> {
        for method in &mut self.methods {
            let context = format!(
                "method {}.{}{}",
                method.owner, method.name, method.descriptor
            );
            method.normalize().context(context)?;
        }
        for procedure in &mut self.procedures {
            let name = procedure.name.clone();
            validate_procedure(procedure).with_context(|| format!("procedure {name}"))?;
        }
        Ok(self)
    }
}

/// Load and validate a program document from disk.
pub fn load_program(path: &Path) -> Result<Program> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));
    let program: Program = serde_path_to_error::deserialize(&mut deserializer)
        .with_context(|| format!("parse {}", path.display()))?;
    program.validated()
}

fn validate_procedure(procedure: &mut Procedure) -> Result<()> {
    let len = procedure.instructions.len();
    let anchors = procedure.anchors.len();
    for (position, anchor) in procedure.anchors.iter().enumerate() {
        if let Some(parent) = anchor.parent {
            if parent.0 >= anchors {
                bail!("anchor {position} has unknown parent {}", parent.0);
            }
        }
    }
    for (index, instruction) in procedure.instructions.iter_mut().enumerate() {
        instruction.index = index;
        if let Some(target) = instruction.kind.jump_target() {
            // Jumping to the end of the stream is an exit.
            if target > len {
                bail!("instruction {index} jumps to {target}, past the end ({len})");
            }
        }
        if let Some(anchor) = instruction.anchor {
            if anchor.0 >= anchors {
                bail!("instruction {index} references unknown anchor {}", anchor.0);
            }
        }
    }
    Ok(())
}

/// Lookup of declared methods by owner, name, and descriptor.
#[derive(Clone, Debug, Default)]
pub struct MethodIndex {
    methods: BTreeMap<MethodKey, MethodDecl>,
}

impl MethodIndex {
    pub fn new(methods: &[MethodDecl]) -> Result<Self> {
        let mut index = BTreeMap::new();
        for method in methods {
            let key = method.key();
            if index.insert(key.clone(), method.clone()).is_some() {
                bail!(
                    "duplicate method declaration {}.{}{}",
                    key.owner,
                    key.name,
                    key.descriptor
                );
            }
        }
        Ok(Self { methods: index })
    }

    pub fn resolve(&self, key: &MethodKey) -> Option<&MethodDecl> {
        self.methods.get(key)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
