// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Whole-unit weaving: classify, transform every suspending procedure, and
//! collect per-procedure failures without giving up on the unit.

use std::path::Path;

use serde::{Deserialize, Serialize};
use skein_analysis::{AnalysisConfig, Classification, Classifier, ExternalResolver};
use skein_ir::{CompilationUnit, ProcId, Procedure};
use tracing::{error, info};

use crate::{transform, StateHolder, WeaveError};

/// A procedure that was left untransformed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaveFailure {
    pub proc: ProcId,
    pub reason: String,
}

/// Output of weaving one compilation unit, ready to be handed to a loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WovenUnit {
    pub name: String,
    pub procedures: Vec<Procedure>,
    pub holders: Vec<StateHolder>,
    #[serde(default)]
    pub failures: Vec<WeaveFailure>,
}

impl WovenUnit {
    pub fn procedure(&self, id: &ProcId) -> Option<&Procedure> {
        self.procedures.iter().find(|p| &p.id == id)
    }

    pub fn to_json(&self) -> Result<String, WeaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, WeaveError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), WeaveError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, WeaveError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

pub struct Weaver<'a, R: ExternalResolver + ?Sized> {
    classifier: Classifier<'a, R>,
}

impl<'a, R: ExternalResolver + ?Sized> Weaver<'a, R> {
    pub fn new(external: &'a R) -> Self {
        Self { classifier: Classifier::new(external) }
    }

    pub fn with_config(external: &'a R, config: AnalysisConfig) -> Self {
        Self { classifier: Classifier::with_config(external, config) }
    }

    /// Weave `unit`. Procedures that cannot be woven are passed through
    /// unchanged and listed in [`WovenUnit::failures`].
    pub fn weave(&mut self, mut unit: CompilationUnit) -> WovenUnit {
        let classification = self.classifier.classify(&mut unit);
        self.weave_classified(unit, &classification)
    }

    pub fn weave_classified(
        &self,
        unit: CompilationUnit,
        classification: &Classification,
    ) -> WovenUnit {
        let mut out = WovenUnit {
            name: unit.name,
            procedures: Vec::with_capacity(unit.procedures.len()),
            holders: Vec::new(),
            failures: Vec::new(),
        };

        for proc in unit.procedures {
            let attempt = if let Some(err) = classification.error_for(&proc.id) {
                Err(WeaveError::from(err.clone()))
            } else if classification.is_suspending(&proc.id) {
                transform(&proc, classification)
            } else {
                Ok(None)
            };

            match attempt {
                Ok(Some(woven)) => {
                    out.holders.push(woven.holder);
                    out.procedures.push(woven.procedure);
                }
                Ok(None) => out.procedures.push(proc),
                Err(err) => {
                    error!(proc = %proc.id, error = %err, "procedure left unwoven");
                    out.failures.push(WeaveFailure { proc: proc.id.clone(), reason: err.to_string() });
                    out.procedures.push(proc);
                }
            }
        }

        info!(
            unit = %out.name,
            procedures = out.procedures.len(),
            woven = out.holders.len(),
            failed = out.failures.len(),
            "unit woven"
        );
        out
    }
}
