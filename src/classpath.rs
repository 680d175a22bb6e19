use std::collections::{BTreeMap, BTreeSet, VecDeque};

use anyhow::Result;

use crate::descriptor::{JvmType, OBJECT_CLASS};
use crate::program::ClassDecl;

/// Supertype index over the declared classes of a program.
#[derive(Clone, Debug, Default)]
pub struct ClassHierarchy {
    supertypes: BTreeMap<String, Vec<String>>,
    interfaces: BTreeSet<String>,
}

impl ClassHierarchy {
    /// Build the hierarchy, rejecting classes declared more than once.
    pub fn new(classes: &[ClassDecl]) -> Result<Self> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for class in classes {
            *counts.entry(class.name.as_str()).or_insert(0) += 1;
        }
        let duplicates: Vec<&str> = counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(name, _)| *name)
            .collect();
        if !duplicates.is_empty() {
            anyhow::bail!("duplicate classes found: {}", duplicates.join(", "));
        }

        let mut supertypes = BTreeMap::new();
        let mut interfaces = BTreeSet::new();
        for class in classes {
            let mut parents = Vec::new();
            if let Some(super_name) = &class.super_name {
                parents.push(super_name.clone());
            }
            parents.extend(class.interfaces.iter().cloned());
            supertypes.insert(class.name.clone(), parents);
            if class.is_interface {
                interfaces.insert(class.name.clone());
            }
        }
        Ok(Self {
            supertypes,
            interfaces,
        })
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.supertypes.contains_key(class_name)
    }

    /// Returns whether a value of type `from` can be stored in a location of type `to`.
    ///
    /// Classes missing from the hierarchy are never proven assignable, except to
    /// `java/lang/Object`.
    pub fn is_assignable(&self, to: &JvmType, from: &JvmType) -> bool {
        if to == from {
            return true;
        }
        match (to, from) {
            (JvmType::Class(to_name), _) if to_name == OBJECT_CLASS => from.is_reference(),
            (JvmType::Class(to_name), JvmType::Class(from_name)) => {
                self.is_subclass(from_name, to_name)
            }
            (JvmType::Class(to_name), JvmType::Array(_)) => {
                to_name == "java/lang/Cloneable" || to_name == "java/io/Serializable"
            }
            (JvmType::Array(to_component), JvmType::Array(from_component)) => {
                if to_component.is_primitive() || from_component.is_primitive() {
                    return false;
                }
                self.is_assignable(to_component, from_component)
            }
            _ => false,
        }
    }

    /// Returns whether a cast between the two types could succeed for some value.
    ///
    /// Unknown classes and interfaces are treated as convertible.
    pub fn is_convertible(&self, to: &JvmType, from: &JvmType) -> bool {
        if self.is_assignable(to, from) || self.is_assignable(from, to) {
            return true;
        }
        match (to, from) {
            (JvmType::TypeVar(_), _) | (_, JvmType::TypeVar(_)) => true,
            (JvmType::Class(to_name), JvmType::Class(from_name)) => {
                !self.contains(to_name)
                    || !self.contains(from_name)
                    || self.interfaces.contains(to_name)
                    || self.interfaces.contains(from_name)
            }
            (JvmType::Array(to_component), JvmType::Array(from_component)) => {
                to_component.is_reference()
                    && from_component.is_reference()
                    && self.is_convertible(to_component, from_component)
            }
            _ => false,
        }
    }

    fn is_subclass(&self, class_name: &str, ancestor: &str) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(class_name);
        while let Some(name) = queue.pop_front() {
            if name == ancestor {
                return true;
            }
            if !seen.insert(name) {
                continue;
            }
            if let Some(parents) = self.supertypes.get(name) {
                queue.extend(parents.iter().map(String::as_str));
            }
        }
        false
    }
}
