// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Suspendability classification.
//!
//! A procedure is suspending when it is declared so, or when any call it
//! makes can reach a suspending procedure. Calls are resolved against the
//! unit first (including overrides for virtual calls), then through the
//! local type hierarchy, then through external metadata.
//!
//! Three phases:
//! 1. Resolve every call site to local graph nodes or a fixed verdict
//! 2. Propagate `Suspending` through the call graph to a fixed point
//! 3. Annotate suspending call sites on each block

use std::collections::{HashMap, HashSet};

use skein_ir::{CallKind, CompilationUnit, FunctionRef, Intrinsic, ProcId, Procedure, Stmt, TypeDecl};
use tracing::{debug, warn};

use crate::metadata::{ExternalResolver, Lookup};
use crate::validate::validate_procedure;
use crate::{AnalysisConfig, AnalysisError};

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Suspending,
    NotSuspending,
    /// Only seen while a call-graph cycle is being resolved.
    Unknown,
}

impl Verdict {
    pub fn from_flag(suspending: bool) -> Self {
        if suspending {
            Verdict::Suspending
        } else {
            Verdict::NotSuspending
        }
    }

    pub fn is_suspending(self) -> bool {
        self == Verdict::Suspending
    }
}

/// A call whose target was found neither in the unit nor externally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedCall {
    pub caller: ProcId,
    pub callee: ProcId,
}

/// Verdicts for one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    verdicts: HashMap<ProcId, Verdict>,
    /// Calls assumed not to suspend because their target is unknown.
    pub unresolved: Vec<UnresolvedCall>,
    /// Procedures whose analysis was aborted.
    pub errors: Vec<AnalysisError>,
}

impl Classification {
    pub fn verdict(&self, id: &ProcId) -> Option<Verdict> {
        self.verdicts.get(id).copied()
    }

    pub fn is_suspending(&self, id: &ProcId) -> bool {
        self.verdict(id).is_some_and(Verdict::is_suspending)
    }

    /// Suspending procedures, in no particular order.
    pub fn suspending(&self) -> impl Iterator<Item = &ProcId> {
        self.verdicts
            .iter()
            .filter(|(_, v)| v.is_suspending())
            .map(|(id, _)| id)
    }

    /// The error that aborted `id`, if any.
    pub fn error_for(&self, id: &ProcId) -> Option<&AnalysisError> {
        self.errors.iter().find(|e| e.procedure() == Some(id))
    }
}

/// Where a call site leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Local(usize),
    Known(Verdict),
    NotFound,
}

/// One call statement and everything it may dispatch to.
#[derive(Debug)]
struct Site {
    block: usize,
    stmt: usize,
    nodes: Vec<usize>,
    fixed: Option<Verdict>,
}

impl Site {
    fn suspends(&self, verdicts: &[Verdict]) -> bool {
        self.fixed == Some(Verdict::Suspending)
            || self.nodes.iter().any(|&n| verdicts[n] == Verdict::Suspending)
    }
}

// ── Public API ──────────────────────────────────────────────────────────

pub struct Classifier<'a, R: ExternalResolver + ?Sized> {
    external: &'a R,
    config: AnalysisConfig,
    /// External lookups, memoized for the unit being classified.
    memo: HashMap<ProcId, Lookup>,
}

impl<'a, R: ExternalResolver + ?Sized> Classifier<'a, R> {
    pub fn new(external: &'a R) -> Self {
        Self::with_config(external, AnalysisConfig::default())
    }

    pub fn with_config(external: &'a R, config: AnalysisConfig) -> Self {
        Self { external, config, memo: HashMap::new() }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Classify every procedure of `unit` and annotate suspending call
    /// sites on its blocks.
    pub fn classify(&mut self, unit: &mut CompilationUnit) -> Classification {
        self.memo.clear();
        let mut out = Classification::default();

        let (sites, broken, verdicts) = {
            let mut graph = Graph::new(self, unit);
            let mut broken = graph.check_structure(&mut out);
            let sites = graph.resolve_sites(&mut broken, &mut out);
            let verdicts = graph.propagate(&sites, &broken);
            (sites, broken, verdicts)
        };

        for (i, proc) in unit.procedures.iter_mut().enumerate() {
            if out.verdicts.contains_key(&proc.id) {
                continue;
            }
            debug!(proc = %proc.id, verdict = ?verdicts[i], "classified");
            out.verdicts.insert(proc.id.clone(), verdicts[i]);
            if !broken[i] {
                annotate(proc, &sites[i], &verdicts);
            }
        }
        out
    }
}

// ── Call graph ──────────────────────────────────────────────────────────

struct Graph<'c, 'u, R: ExternalResolver + ?Sized> {
    external: &'c R,
    config: &'c AnalysisConfig,
    memo: &'c mut HashMap<ProcId, Lookup>,
    procs: &'u [Procedure],
    index: HashMap<&'u ProcId, usize>,
    types: HashMap<&'u str, &'u TypeDecl>,
}

impl<'c, 'u, R: ExternalResolver + ?Sized> Graph<'c, 'u, R> {
    fn new(classifier: &'c mut Classifier<'_, R>, unit: &'u CompilationUnit) -> Self
    where
        'u: 'c,
    {
        let mut index = HashMap::new();
        for (i, proc) in unit.procedures.iter().enumerate() {
            index.entry(&proc.id).or_insert(i);
        }
        Self {
            external: classifier.external,
            config: &classifier.config,
            memo: &mut classifier.memo,
            procs: &unit.procedures,
            index,
            types: unit.types.iter().map(|t| (t.name.as_str(), t)).collect(),
        }
    }

    // ── Phase 0: Structure ──────────────────────────────────────────────

    fn check_structure(&self, out: &mut Classification) -> Vec<bool> {
        let mut broken = vec![false; self.procs.len()];
        for (i, proc) in self.procs.iter().enumerate() {
            if self.index.get(&proc.id) != Some(&i) {
                warn!(proc = %proc.id, "duplicate procedure ignored");
                out.errors.push(AnalysisError::DuplicateProcedure(proc.id.clone()));
                broken[i] = true;
                continue;
            }
            if let Err(source) = validate_procedure(proc) {
                warn!(proc = %proc.id, error = %source, "malformed control-flow graph");
                out.errors.push(AnalysisError::MalformedGraph { proc: proc.id.clone(), source });
                broken[i] = true;
                continue;
            }
            if proc.attrs.bridge {
                let calls = proc.calls().count();
                if calls != 1 {
                    out.errors.push(AnalysisError::BridgeForwarding { proc: proc.id.clone(), calls });
                    broken[i] = true;
                }
            }
        }
        broken
    }

    // ── Phase 1: Resolve ────────────────────────────────────────────────

    fn resolve_sites(
        &mut self,
        broken: &mut [bool],
        out: &mut Classification,
    ) -> Vec<Vec<Site>> {
        let procs = self.procs;
        let mut all = Vec::with_capacity(procs.len());
        for (i, proc) in procs.iter().enumerate() {
            let mut sites = Vec::new();
            if broken[i] || proc.attrs.woven || !proc.has_body() || proc.id.is_initializer() {
                all.push(sites);
                continue;
            }
            for (b, block) in proc.blocks.iter().enumerate() {
                for (s, stmt) in block.statements.iter().enumerate() {
                    let Stmt::Call { func, .. } = stmt else { continue };
                    let site = self.resolve_call(b, s, func);
                    if site.nodes.is_empty() && site.fixed.is_none() {
                        let unresolved = UnresolvedCall {
                            caller: proc.id.clone(),
                            callee: func.target.clone(),
                        };
                        if self.config.strict_resolution {
                            out.errors.push(AnalysisError::UnresolvedCall {
                                caller: unresolved.caller,
                                callee: unresolved.callee,
                            });
                            broken[i] = true;
                        } else {
                            warn!(
                                caller = %proc.id,
                                callee = %func.target,
                                "unresolved call assumed not to suspend"
                            );
                            out.unresolved.push(unresolved);
                        }
                    }
                    sites.push(site);
                }
            }
            all.push(sites);
        }
        all
    }

    fn resolve_call(&mut self, block: usize, stmt: usize, func: &FunctionRef) -> Site {
        let mut site = Site { block, stmt, nodes: Vec::new(), fixed: None };
        let target = &func.target;
        match self.resolve_member(&target.owner, &target.name, &target.signature, &mut HashSet::new()) {
            Target::Local(n) => site.nodes.push(n),
            Target::Known(v) => site.fixed = Some(v),
            Target::NotFound => {}
        }
        if func.kind == CallKind::Virtual {
            let procs = self.procs;
            for (n, proc) in procs.iter().enumerate() {
                if proc.id.same_member(target)
                    && proc.id.owner != target.owner
                    && self.is_subtype(&proc.id.owner, &target.owner, &mut HashSet::new())
                    && !site.nodes.contains(&n)
                {
                    site.nodes.push(n);
                }
            }
        }
        site
    }

    fn resolve_member<'s>(
        &mut self,
        owner: &'s str,
        name: &str,
        signature: &str,
        visited: &mut HashSet<&'s str>,
    ) -> Target
    where
        'u: 's,
    {
        let id = ProcId::new(owner, name, signature);
        if id.is_initializer() || self.config.is_opaque(owner) {
            return Target::Known(Verdict::NotSuspending);
        }
        if let Some(which) = Intrinsic::from_proc(&id) {
            return Target::Known(Verdict::from_flag(which.suspends()));
        }
        if let Some(&n) = self.index.get(&id) {
            return Target::Local(n);
        }
        if !visited.insert(owner) {
            return Target::NotFound;
        }
        if let Some(decl) = self.types.get(owner).copied() {
            for parent in decl.parents() {
                match self.resolve_member(parent, name, signature, visited) {
                    Target::NotFound => continue,
                    found => return found,
                }
            }
            return Target::NotFound;
        }

        let external = self.external;
        let lookup = *self
            .memo
            .entry(id)
            .or_insert_with_key(|id| external.resolve(&id.owner, &id.name, &id.signature));
        match lookup {
            Lookup::Found(Verdict::Unknown) => Target::Known(Verdict::NotSuspending),
            Lookup::Found(v) => Target::Known(v),
            Lookup::NotFound => Target::NotFound,
        }
    }

    /// Whether `ty` is `ancestor` or (transitively) derives from it.
    fn is_subtype(&self, ty: &str, ancestor: &str, visited: &mut HashSet<String>) -> bool {
        if ty == ancestor {
            return true;
        }
        if !visited.insert(ty.to_string()) {
            return false;
        }
        let parents: Vec<String> = match self.types.get(ty) {
            Some(decl) => decl.parents().map(str::to_string).collect(),
            None => self.external.supertypes(ty),
        };
        parents.iter().any(|p| self.is_subtype(p, ancestor, visited))
    }

    // ── Phase 2: Propagate ──────────────────────────────────────────────

    fn propagate(&self, sites: &[Vec<Site>], broken: &[bool]) -> Vec<Verdict> {
        let mut verdicts: Vec<Verdict> = self
            .procs
            .iter()
            .enumerate()
            .map(|(i, proc)| {
                if proc.id.is_initializer() {
                    Verdict::NotSuspending
                } else if proc.attrs.suspend_marker || proc.attrs.woven {
                    Verdict::Suspending
                } else if broken[i] {
                    Verdict::NotSuspending
                } else if sites[i].iter().any(|s| s.fixed == Some(Verdict::Suspending)) {
                    Verdict::Suspending
                } else {
                    Verdict::Unknown
                }
            })
            .collect();

        // Fixed-point iteration: a procedure calling a suspending procedure
        // is itself suspending. Cycles settle once nothing changes.
        loop {
            let mut changed = false;
            for i in 0..verdicts.len() {
                if verdicts[i] != Verdict::Unknown {
                    continue;
                }
                if sites[i].iter().any(|s| s.suspends(&verdicts)) {
                    verdicts[i] = Verdict::Suspending;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        for v in &mut verdicts {
            if *v == Verdict::Unknown {
                *v = Verdict::NotSuspending;
            }
        }
        verdicts
    }
}

// ── Phase 3: Annotate ───────────────────────────────────────────────────

fn annotate(proc: &mut Procedure, sites: &[Site], verdicts: &[Verdict]) {
    if proc.attrs.woven {
        return;
    }
    for block in &mut proc.blocks {
        block.suspend_sites.clear();
    }
    for site in sites {
        if site.suspends(verdicts) {
            proc.blocks[site.block].suspend_sites.push(site.stmt);
        }
    }
}
