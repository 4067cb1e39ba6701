// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Suspendability of procedures outside the unit being analyzed.
//!
//! Already-compiled libraries are described by an [`ExternalResolver`]. The
//! bundled [`ExternalMetadata`] is a JSON-loadable table of types, their
//! supertypes and the verdict of each declared method.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use skein_ir::ProcId;

use crate::{AnalysisError, Verdict};

/// Result of an external lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(Verdict),
    NotFound,
}

/// Source of verdicts for procedures compiled elsewhere.
pub trait ExternalResolver {
    /// Verdict of `owner.name signature`, matched on the declaring type
    /// first and then through its supertypes and interfaces.
    fn resolve(&self, owner: &str, name: &str, signature: &str) -> Lookup;

    /// Direct supertypes of an external type (supertype first).
    fn supertypes(&self, _owner: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Nothing is known outside the unit.
impl ExternalResolver for () {
    fn resolve(&self, _owner: &str, _name: &str, _signature: &str) -> Lookup {
        Lookup::NotFound
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMetadata {
    pub types: BTreeMap<String, ExternalType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalType {
    #[serde(default)]
    pub super_type: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub methods: Vec<ExternalMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMethod {
    pub name: String,
    pub signature: String,
    pub suspending: bool,
    /// Set for bridge methods: the single call they forward to.
    #[serde(default)]
    pub forwards_to: Option<ProcId>,
}

impl ExternalMetadata {
    pub fn from_json(text: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(text).map_err(|e| AnalysisError::Metadata(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::Metadata(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn add_type(&mut self, name: impl Into<String>, ty: ExternalType) -> &mut Self {
        self.types.insert(name.into(), ty);
        self
    }

    fn find(&self, id: ProcId, visited: &mut HashSet<ProcId>) -> Lookup {
        if !visited.insert(id.clone()) {
            return Lookup::NotFound;
        }
        let Some(ty) = self.types.get(&id.owner) else {
            return Lookup::NotFound;
        };

        if let Some(method) = ty
            .methods
            .iter()
            .find(|m| m.name == id.name && m.signature == id.signature)
        {
            let declared = Lookup::Found(Verdict::from_flag(method.suspending));
            return match &method.forwards_to {
                Some(target) => match self.find(target.clone(), visited) {
                    Lookup::NotFound => declared,
                    found => found,
                },
                None => declared,
            };
        }

        for parent in ty.super_type.iter().chain(ty.interfaces.iter()) {
            let inherited = ProcId::new(parent.clone(), id.name.clone(), id.signature.clone());
            if let found @ Lookup::Found(_) = self.find(inherited, visited) {
                return found;
            }
        }
        Lookup::NotFound
    }
}

impl ExternalType {
    pub fn extends(mut self, super_type: impl Into<String>) -> Self {
        self.super_type = Some(super_type.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn method(mut self, name: &str, signature: &str, suspending: bool) -> Self {
        self.methods.push(ExternalMethod {
            name: name.to_string(),
            signature: signature.to_string(),
            suspending,
            forwards_to: None,
        });
        self
    }

    pub fn bridge(mut self, name: &str, signature: &str, target: ProcId) -> Self {
        self.methods.push(ExternalMethod {
            name: name.to_string(),
            signature: signature.to_string(),
            suspending: false,
            forwards_to: Some(target),
        });
        self
    }
}

impl ExternalResolver for ExternalMetadata {
    fn resolve(&self, owner: &str, name: &str, signature: &str) -> Lookup {
        self.find(ProcId::new(owner, name, signature), &mut HashSet::new())
    }

    fn supertypes(&self, owner: &str) -> Vec<String> {
        self.types
            .get(owner)
            .map(|ty| ty.super_type.iter().chain(ty.interfaces.iter()).cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> ExternalMetadata {
        let mut meta = ExternalMetadata::default();
        meta.add_type(
            "lib.Stream",
            ExternalType::default().method("read", "()->any", true),
        );
        meta.add_type(
            "lib.Source",
            ExternalType::default().method("close", "()", false),
        );
        meta.add_type(
            "lib.Buffered",
            ExternalType::default()
                .extends("lib.Stream")
                .implements("lib.Source")
                .bridge("read", "()->str", ProcId::new("lib.Buffered", "read", "()->any")),
        );
        meta
    }

    #[test]
    fn declared_method_wins() {
        let meta = library();
        assert_eq!(meta.resolve("lib.Stream", "read", "()->any"), Lookup::Found(Verdict::Suspending));
        assert_eq!(meta.resolve("lib.Source", "close", "()"), Lookup::Found(Verdict::NotSuspending));
    }

    #[test]
    fn walks_supertype_then_interfaces() {
        let meta = library();
        assert_eq!(
            meta.resolve("lib.Buffered", "read", "()->any"),
            Lookup::Found(Verdict::Suspending)
        );
        assert_eq!(
            meta.resolve("lib.Buffered", "close", "()"),
            Lookup::Found(Verdict::NotSuspending)
        );
        assert_eq!(meta.resolve("lib.Buffered", "flush", "()"), Lookup::NotFound);
        assert_eq!(meta.resolve("lib.Missing", "read", "()->any"), Lookup::NotFound);
    }

    #[test]
    fn bridge_follows_forwarded_call() {
        let meta = library();
        assert_eq!(
            meta.resolve("lib.Buffered", "read", "()->str"),
            Lookup::Found(Verdict::Suspending)
        );
    }

    #[test]
    fn cyclic_hierarchy_terminates() {
        let mut meta = ExternalMetadata::default();
        meta.add_type("lib.A", ExternalType::default().extends("lib.B"));
        meta.add_type("lib.B", ExternalType::default().extends("lib.A"));
        assert_eq!(meta.resolve("lib.A", "run", "()"), Lookup::NotFound);
    }

    #[test]
    fn loads_from_json() {
        let meta = ExternalMetadata::from_json(
            r#"{ "types": { "lib.Q": { "methods": [
                { "name": "take", "signature": "()->any", "suspending": true }
            ] } } }"#,
        )
        .unwrap();
        assert_eq!(meta.resolve("lib.Q", "take", "()->any"), Lookup::Found(Verdict::Suspending));
        assert!(meta.supertypes("lib.Q").is_empty());
    }
}
