// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Compilation units: the procedures and type hierarchy handed to analysis
//! in one batch.

use serde::{Deserialize, Serialize};

use crate::{ProcId, Procedure};

/// Declared type with its direct supertypes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub super_type: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), super_type: None, interfaces: Vec::new() }
    }

    pub fn extends(mut self, super_type: impl Into<String>) -> Self {
        self.super_type = Some(super_type.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Supertype first, then interfaces in declaration order.
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.super_type.iter().chain(self.interfaces.iter()).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    pub procedures: Vec<Procedure>,
}

impl CompilationUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        self.types.push(decl);
        self
    }

    pub fn with_procedure(mut self, proc: Procedure) -> Self {
        self.procedures.push(proc);
        self
    }

    pub fn type_decl(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn procedure(&self, id: &ProcId) -> Option<&Procedure> {
        self.procedures.iter().find(|p| &p.id == id)
    }
}
