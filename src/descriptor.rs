use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use jdescriptor::{MethodDescriptor, TypeDescriptor};
use serde::{Deserialize, Serialize};

/// JVM primitive types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    fn from_descriptor(c: char) -> Option<Self> {
        let primitive = match c {
            'Z' => Self::Boolean,
            'B' => Self::Byte,
            'C' => Self::Char,
            'S' => Self::Short,
            'I' => Self::Int,
            'J' => Self::Long,
            'F' => Self::Float,
            'D' => Self::Double,
            _ => return None,
        };
        Some(primitive)
    }

    pub fn descriptor(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }

    /// Internal name of the wrapper class used when boxing this primitive.
    pub fn boxed_class(self) -> &'static str {
        match self {
            Self::Boolean => "java/lang/Boolean",
            Self::Byte => "java/lang/Byte",
            Self::Char => "java/lang/Character",
            Self::Short => "java/lang/Short",
            Self::Int => "java/lang/Integer",
            Self::Long => "java/lang/Long",
            Self::Float => "java/lang/Float",
            Self::Double => "java/lang/Double",
        }
    }

    fn from_boxed_class(name: &str) -> Option<Self> {
        const ALL: [PrimitiveType; 8] = [
            PrimitiveType::Boolean,
            PrimitiveType::Byte,
            PrimitiveType::Char,
            PrimitiveType::Short,
            PrimitiveType::Int,
            PrimitiveType::Long,
            PrimitiveType::Float,
            PrimitiveType::Double,
        ];
        ALL.into_iter()
            .find(|primitive| primitive.boxed_class() == name)
    }
}

/// Type of a value, variable, or method result, written as a JVM descriptor.
///
/// Besides plain field descriptors, `TName;` denotes a generic type variable so
/// declarations can be substituted per call site.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JvmType {
    Void,
    Primitive(PrimitiveType),
    Class(String),
    Array(Box<JvmType>),
    TypeVar(String),
}

pub(crate) const OBJECT_CLASS: &str = "java/lang/Object";
pub(crate) const STRING_CLASS: &str = "java/lang/String";

impl JvmType {
    pub fn object() -> Self {
        Self::Class(OBJECT_CLASS.to_string())
    }

    pub fn string() -> Self {
        Self::Class(STRING_CLASS.to_string())
    }

    pub fn class(name: &str) -> Self {
        Self::Class(name.to_string())
    }

    pub fn array_of(component: JvmType) -> Self {
        Self::Array(Box::new(component))
    }

    /// Returns true for class, array, and type-variable types.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Class(_) | Self::Array(_) | Self::TypeVar(_))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Class(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Primitive counterpart of a wrapper class such as `java/lang/Integer`.
    pub fn unboxed_primitive(&self) -> Option<PrimitiveType> {
        match self {
            Self::Primitive(primitive) => Some(*primitive),
            Self::Class(name) => PrimitiveType::from_boxed_class(name),
            _ => None,
        }
    }

    fn contains_type_variable(&self) -> bool {
        match self {
            Self::TypeVar(_) => true,
            Self::Array(component) => component.contains_type_variable(),
            _ => false,
        }
    }
}

impl fmt::Display for JvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "V"),
            Self::Primitive(primitive) => write!(f, "{}", primitive.descriptor()),
            Self::Class(name) => write!(f, "L{name};"),
            Self::Array(component) => write!(f, "[{component}"),
            Self::TypeVar(name) => write!(f, "T{name};"),
        }
    }
}

impl FromStr for JvmType {
    type Err = anyhow::Error;

    fn from_str(descriptor: &str) -> Result<Self> {
        parse_type(descriptor)
    }
}

impl TryFrom<String> for JvmType {
    type Error = anyhow::Error;

    fn try_from(descriptor: String) -> Result<Self> {
        parse_type(&descriptor)
    }
}

impl From<JvmType> for String {
    fn from(ty: JvmType) -> Self {
        ty.to_string()
    }
}

/// Parse a single type descriptor such as `Ljava/lang/String;`, `[I`, or `TT;`.
pub fn parse_type(descriptor: &str) -> Result<JvmType> {
    let (ty, rest) = parse_prefix(descriptor)?;
    if !rest.is_empty() {
        bail!("trailing characters in type descriptor {descriptor}");
    }
    if ty != JvmType::Void && !ty.contains_type_variable() {
        // Cross-check plain descriptors with the JVM grammar.
        let wrapped = format!("({descriptor})V");
        let parsed = MethodDescriptor::from_str(&wrapped)
            .with_context(|| format!("parse type descriptor {descriptor}"))?;
        if parsed.parameter_types().len() != 1 {
            bail!("type descriptor {descriptor} does not denote exactly one type");
        }
    }
    Ok(ty)
}

fn parse_prefix(input: &str) -> Result<(JvmType, &str)> {
    let mut chars = input.chars();
    let Some(first) = chars.next() else {
        bail!("empty type descriptor");
    };
    let rest = chars.as_str();
    match first {
        'V' => Ok((JvmType::Void, rest)),
        '[' => {
            let (component, rest) = parse_prefix(rest)?;
            if component == JvmType::Void {
                bail!("array of void in type descriptor {input}");
            }
            Ok((JvmType::array_of(component), rest))
        }
        'L' | 'T' => {
            let end = rest
                .find(';')
                .with_context(|| format!("unterminated type descriptor {input}"))?;
            let name = &rest[..end];
            if name.is_empty() {
                bail!("empty class name in type descriptor {input}");
            }
            let ty = if first == 'L' {
                JvmType::Class(name.to_string())
            } else {
                JvmType::TypeVar(name.to_string())
            };
            Ok((ty, &rest[end + 1..]))
        }
        other => PrimitiveType::from_descriptor(other)
            .map(|primitive| (JvmType::Primitive(primitive), rest))
            .with_context(|| format!("unknown type descriptor {input}")),
    }
}

/// Count parameters in a JVM method descriptor.
pub fn method_param_count(descriptor: &str) -> Result<usize> {
    let descriptor =
        MethodDescriptor::from_str(descriptor).context("parse method descriptor")?;
    Ok(descriptor.parameter_types().len())
}

/// Parameter types and return type of a method descriptor, in declaration order.
pub fn method_signature(descriptor: &str) -> Result<(Vec<JvmType>, JvmType)> {
    let Some(body) = descriptor.strip_prefix('(') else {
        bail!("method descriptor {descriptor} must start with '('");
    };
    let mut rest = body;
    let mut parameters = Vec::new();
    while !rest.starts_with(')') {
        if rest.is_empty() {
            bail!("unterminated parameter list in {descriptor}");
        }
        let (ty, remaining) = parse_prefix(rest)?;
        if ty == JvmType::Void {
            bail!("void parameter in method descriptor {descriptor}");
        }
        parameters.push(ty);
        rest = remaining;
    }
    let return_type = parse_type(&rest[1..])
        .with_context(|| format!("parse return type of {descriptor}"))?;
    Ok((parameters, return_type))
}

/// Return kind of a JVM method descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReturnKind {
    Void,
    Primitive,
    Reference,
}

/// Determine the return kind from a JVM method descriptor.
pub fn method_return_kind(descriptor: &str) -> Result<ReturnKind> {
    let descriptor =
        MethodDescriptor::from_str(descriptor).context("parse method descriptor")?;
    let kind = match descriptor.return_type() {
        TypeDescriptor::Void => ReturnKind::Void,
        TypeDescriptor::Object(_) | TypeDescriptor::Array(_, _) => ReturnKind::Reference,
        _ => ReturnKind::Primitive,
    };
    Ok(kind)
}
