//! Round scheduling and deferral.
//!
//! The host calls the engine once per round with everything visible so far.
//! A round either produces merge output for every resolved target or defers
//! the whole round's merge work: partial merges are never emitted. Each target
//! moves through [`TargetState`] and is generated at most once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::config::RoundsConfig;
use crate::error::MergeError;
use crate::merge::validate;
use crate::merge::{Assembler, MergeDescriptor, MergeTarget, NestedContributions};
use crate::model::{ClassName, Declaration, SymbolUniverse, known};
use crate::scan::index::contributions_of;
use crate::scan::{Contribution, ContributionAnnotation, ContributionIndex, ContributionKind};

use super::context::RoundContext;
use super::subcomponent::{SubcomponentExpander, SubcomponentRequest, Trigger};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Lifecycle of one merge target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    /// Never offered.
    #[default]
    Unseen,
    /// Offered, but waiting for more information.
    Deferred,
    /// Read and being assembled.
    Resolved,
    /// Output emitted. Never regenerated.
    Generated,
}

/// One declaration the writer must emit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum GenerationRequest {
    /// A merged component, subcomponent or aggregate.
    Merge(MergeDescriptor),
    /// A generated contributed subcomponent.
    Subcomponent(SubcomponentRequest),
}

impl GenerationRequest {
    /// The declaration that will be generated.
    #[must_use]
    pub const fn generated(&self) -> &ClassName {
        match self {
            Self::Merge(descriptor) => &descriptor.merged,
            Self::Subcomponent(request) => &request.generated,
        }
    }
}

/// Result of one round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RoundOutput {
    /// Round number, starting at 1.
    pub round: u32,
    /// Everything to emit this round.
    pub requests: Vec<GenerationRequest>,
    /// Source symbols the host must offer again next round, sorted.
    pub deferred: Vec<ClassName>,
}

impl RoundOutput {
    /// Returns `true` if some work waits for a later round.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }
}

/// Why a round's merge work was deferred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeferralReason {
    /// A round symbol carries an annotation whose generated output is only
    /// visible next round.
    ContributingSymbol {
        /// The round symbol.
        declaration: ClassName,
        /// The annotation.
        annotation: String,
    },
    /// A merge target or contributed declaration has unresolved references.
    Unresolved {
        /// The declaration.
        declaration: ClassName,
        /// The unresolved reference.
        reference: String,
    },
    /// A contributed subcomponent could not be generated yet.
    PendingSubcomponent {
        /// The contributed subcomponent.
        contribution: ClassName,
    },
}

impl fmt::Display for DeferralReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContributingSymbol {
                declaration,
                annotation,
            } => write!(f, "{declaration} is annotated with {annotation}"),
            Self::Unresolved {
                declaration,
                reference,
            } => write!(f, "{declaration} references unresolved {reference}"),
            Self::PendingSubcomponent { contribution } => {
                write!(f, "contributed subcomponent {contribution} is pending")
            }
        }
    }
}

fn unresolved(declaration: &ClassName, err: &MergeError) -> DeferralReason {
    let reference = match err {
        MergeError::UnresolvedSymbol { reference, .. } => reference.clone(),
        other => other.to_string(),
    };
    DeferralReason::Unresolved {
        declaration: declaration.clone(),
        reference,
    }
}

// ---------------------------------------------------------------------------
// RoundScheduler
// ---------------------------------------------------------------------------

/// Cross-round merge state of one compilation.
#[derive(Clone, Debug)]
pub struct RoundScheduler {
    index: ContributionIndex,
    signal_annotations: Vec<String>,
    verbose: bool,
    states: BTreeMap<ClassName, TargetState>,
    pending: BTreeMap<ClassName, MergeTarget>,
    nested: BTreeMap<ClassName, NestedContributions>,
    expander: SubcomponentExpander,
}

impl RoundScheduler {
    /// A scheduler reading contributions through `index`.
    #[must_use]
    pub fn new(index: ContributionIndex, rounds: &RoundsConfig) -> Self {
        Self {
            index,
            signal_annotations: rounds.signal_annotations.clone(),
            verbose: rounds.verbose,
            states: BTreeMap::new(),
            pending: BTreeMap::new(),
            nested: BTreeMap::new(),
            expander: SubcomponentExpander::new(),
        }
    }

    /// State of the merge target `name`.
    #[must_use]
    pub fn state(&self, name: &ClassName) -> TargetState {
        self.states.get(name).copied().unwrap_or_default()
    }

    /// Synthesized targets waiting for a round that does not defer.
    pub fn pending_targets(&self) -> impl Iterator<Item = &ClassName> {
        self.pending.keys()
    }

    /// The contribution index.
    #[must_use]
    pub const fn index(&self) -> &ContributionIndex {
        &self.index
    }

    /// Forget all targets and generated subcomponents.
    pub fn reset(&mut self) {
        self.states.clear();
        self.pending.clear();
        self.nested.clear();
        self.expander.reset();
    }

    /// Run one round against `universe`.
    ///
    /// # Errors
    /// Returns the first fatal error. Unresolved symbols never fail a round;
    /// they defer it.
    pub fn run_round(
        &mut self,
        ctx: &mut RoundContext,
        universe: &dyn SymbolUniverse,
    ) -> Result<RoundOutput, MergeError> {
        let round = ctx.begin_round(universe, self.index.namespace())?;
        let mut requests = Vec::new();
        let mut reasons: Vec<DeferralReason> = Vec::new();
        let mut deferred: BTreeSet<ClassName> = BTreeSet::new();

        // Contributed declarations of this round.
        let mut subcomponents: Vec<Contribution> = Vec::new();
        for decl in universe.round_symbols() {
            match self.round_contributions(decl, universe) {
                Ok(found) => subcomponents.extend(
                    found
                        .into_iter()
                        .filter(|c| matches!(c.kind, ContributionKind::Subcomponent(_))),
                ),
                Err(err) if err.is_deferral() => {
                    reasons.push(unresolved(&decl.name, &err));
                    deferred.insert(decl.name.clone());
                }
                Err(err) => return Err(err),
            }
            if let Some(annotation) = self.deferring_annotation(decl) {
                reasons.push(DeferralReason::ContributingSymbol {
                    declaration: decl.name.clone(),
                    annotation,
                });
            }
        }

        // Merge targets offered this round.
        let mut targets: Vec<MergeTarget> = Vec::new();
        for decl in universe.round_symbols() {
            if self.state(&decl.name) == TargetState::Generated {
                tracing::trace!(target = %decl.name, "already generated; ignoring re-offer");
                continue;
            }
            match MergeTarget::from_declaration(decl, universe) {
                Ok(Some(target)) => targets.push(target),
                Ok(None) => {}
                Err(err) if err.is_deferral() => {
                    self.states.insert(decl.name.clone(), TargetState::Deferred);
                    reasons.push(unresolved(&decl.name, &err));
                    deferred.insert(decl.name.clone());
                }
                Err(err) => return Err(err),
            }
        }

        // Contributed subcomponents.
        self.expander.seed(&self.index, ctx, universe)?;
        for target in &targets {
            for trigger in Trigger::from_target(target) {
                self.expander.add_trigger(trigger);
            }
        }
        self.expander.offer(subcomponents);
        for expansion in self.expander.expand(ctx, universe, self.index.identity())? {
            let nested = self.nested.entry(expansion.request.trigger.clone()).or_default();
            if let Some(factory) = &expansion.request.factory
                && !nested.modules.contains(&factory.module)
            {
                nested.modules.push(factory.module.clone());
            }
            let parent = &expansion.request.parent_component.class;
            if !nested.interfaces.contains(parent) {
                nested.interfaces.push(parent.clone());
            }
            self.pending.insert(expansion.target.origin.clone(), expansion.target);
            requests.push(GenerationRequest::Subcomponent(expansion.request));
        }
        for contribution in self.expander.pending() {
            reasons.push(DeferralReason::PendingSubcomponent {
                contribution: contribution.clone(),
            });
        }

        if !reasons.is_empty() {
            for target in &targets {
                self.states.insert(target.origin.clone(), TargetState::Deferred);
                deferred.insert(target.origin.clone());
            }
            self.log_deferral(round, &reasons);
            return Ok(self.finish(ctx, round, requests, deferred));
        }

        // Assemble into a buffer; one deferral discards the whole round.
        let assembler = Assembler::new(&self.index);
        let synthesized: Vec<MergeTarget> = std::mem::take(&mut self.pending).into_values().collect();
        let mut assembled: Vec<MergeDescriptor> = Vec::new();
        let mut fatal = None;
        for target in targets.iter().chain(&synthesized) {
            self.states.insert(target.origin.clone(), TargetState::Resolved);
            let nested = self.nested.get(&target.origin).cloned().unwrap_or_default();
            match assembler.assemble(ctx.scan(), universe, target, &nested) {
                Ok(descriptor) => assembled.push(descriptor),
                Err(err) if err.is_deferral() => reasons.push(unresolved(&target.origin, &err)),
                Err(err) => {
                    fatal = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = fatal {
            self.restore(synthesized, &[]);
            return Err(err);
        }

        if !reasons.is_empty() {
            self.log_deferral(round, &reasons);
            deferred.extend(targets.iter().map(|t| t.origin.clone()));
            self.restore(synthesized, &targets);
            return Ok(self.finish(ctx, round, requests, deferred));
        }

        for descriptor in assembled {
            self.states.insert(descriptor.target.clone(), TargetState::Generated);
            requests.push(GenerationRequest::Merge(descriptor));
        }
        Ok(self.finish(ctx, round, requests, deferred))
    }

    /// Put synthesized targets back in the queue and mark every target of a
    /// discarded round as deferred.
    fn restore(&mut self, synthesized: Vec<MergeTarget>, offered: &[MergeTarget]) {
        for target in offered {
            self.states.insert(target.origin.clone(), TargetState::Deferred);
        }
        for target in synthesized {
            self.states.insert(target.origin.clone(), TargetState::Deferred);
            self.pending.insert(target.origin.clone(), target);
        }
    }

    fn log_deferral(&self, round: u32, reasons: &[DeferralReason]) {
        for reason in reasons {
            if self.verbose {
                tracing::info!(round, %reason, "deferring merge work");
            } else {
                tracing::debug!(round, %reason, "deferring merge work");
            }
        }
    }

    fn finish(
        &self,
        ctx: &RoundContext,
        round: u32,
        requests: Vec<GenerationRequest>,
        deferred: BTreeSet<ClassName>,
    ) -> RoundOutput {
        let cache = ctx.end_round(self.verbose);
        tracing::debug!(
            round,
            requests = requests.len(),
            deferred = deferred.len(),
            pending = self.pending.len(),
            cache_hits = cache.iter().map(|s| s.hits).sum::<u64>(),
            cache_misses = cache.iter().map(|s| s.misses).sum::<u64>(),
            "round finished"
        );
        RoundOutput {
            round,
            requests,
            deferred: deferred.into_iter().collect(),
        }
    }

    /// Every contribution record of a round symbol, checked for repeats.
    fn round_contributions(
        &self,
        decl: &Declaration,
        universe: &dyn SymbolUniverse,
    ) -> Result<Vec<Contribution>, MergeError> {
        let mut all = Vec::new();
        for kind in ContributionAnnotation::ALL {
            if decl.has_annotation(kind.fq_name()) {
                all.extend(contributions_of(decl, kind, universe, self.index.identity())?);
            }
        }
        validate::check_contributions(&decl.name, &all)?;
        Ok(all)
    }

    fn deferring_annotation(&self, decl: &Declaration) -> Option<String> {
        known::DEFERRING_CONTRIBUTIONS
            .iter()
            .copied()
            .chain(self.signal_annotations.iter().map(String::as_str))
            .find(|fq| decl.has_annotation(fq))
            .map(str::to_owned)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityGenerator;
    use crate::model::{Annotation, AnnotationValue, DeclarationKind, SymbolTable, TypeRef};
    use crate::scan::hint;

    const NS: &str = "graft.hint";
    const APP: &str = "com.example.AppScope";
    const OTHER: &str = "com.example.OtherScope";

    fn cn(s: &str) -> ClassName {
        ClassName::parse(s).unwrap()
    }

    fn class(s: &str) -> AnnotationValue {
        AnnotationValue::Class(cn(s))
    }

    fn component() -> Declaration {
        let mut d = Declaration::new(cn("com.example.AppComponent"), DeclarationKind::Interface);
        d.annotations = vec![Annotation::new(cn(known::MERGE_COMPONENT)).with("scope", class(APP))];
        d
    }

    fn module(name: &str) -> Declaration {
        let mut d = Declaration::new(cn(name), DeclarationKind::Class);
        d.annotations = vec![
            Annotation::new(cn(known::MODULE)),
            Annotation::new(cn(known::CONTRIBUTES_TO)).with("scope", class(APP)),
        ];
        d
    }

    fn binding(name: &str) -> Declaration {
        let mut d = Declaration::new(cn(name), DeclarationKind::Class);
        d.annotations = vec![Annotation::new(cn(known::CONTRIBUTES_BINDING)).with("scope", class(APP))];
        d.supertypes = vec![TypeRef::Resolved(cn("com.example.Repo"))];
        d
    }

    fn scheduler(signals: &[&str]) -> (RoundScheduler, RoundContext) {
        let rounds = RoundsConfig {
            signal_annotations: signals.iter().map(|s| (*s).to_owned()).collect(),
            verbose: false,
        };
        let index = ContributionIndex::new(NS, IdentityGenerator::default());
        (RoundScheduler::new(index, &rounds), RoundContext::new())
    }

    fn offer(table: &mut SymbolTable, decls: &[Declaration]) {
        for d in decls {
            table.insert(d.clone());
        }
        table.set_round(decls.iter().map(|d| d.name.clone()));
    }

    fn publish_hints(table: &mut SymbolTable, decls: &[Declaration]) {
        for d in decls {
            table.add_hints(hint::encode(d, NS));
        }
    }

    fn merges(output: &RoundOutput) -> Vec<&MergeDescriptor> {
        output
            .requests
            .iter()
            .filter_map(|r| match r {
                GenerationRequest::Merge(d) => Some(d),
                GenerationRequest::Subcomponent(_) => None,
            })
            .collect()
    }

    #[test]
    fn resolved_round_generates_target() {
        let (mut scheduler, mut ctx) = scheduler(&[]);
        let mut table = SymbolTable::new();
        let lib = module("com.lib.LibModule");
        publish_hints(&mut table, std::slice::from_ref(&lib));
        table.insert_library(lib);
        offer(&mut table, &[component(), module("com.example.Local")]);

        let out = scheduler.run_round(&mut ctx, &table).unwrap();
        assert!(!out.is_deferred());
        let merged = merges(&out);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].modules,
            vec![cn("com.lib.LibModule"), cn("com.example.Local")]
        );
        assert_eq!(scheduler.state(&cn("com.example.AppComponent")), TargetState::Generated);
    }

    #[test]
    fn binding_in_round_defers_every_target() {
        let (mut scheduler, mut ctx) = scheduler(&[]);
        let mut table = SymbolTable::new();
        let repo = binding("com.example.RealRepo");
        offer(&mut table, &[component(), repo.clone()]);

        let first = scheduler.run_round(&mut ctx, &table).unwrap();
        assert!(first.requests.is_empty());
        assert_eq!(first.deferred, vec![cn("com.example.AppComponent")]);
        assert_eq!(scheduler.state(&cn("com.example.AppComponent")), TargetState::Deferred);

        publish_hints(&mut table, &[repo]);
        table.set_round(first.deferred.clone());
        let second = scheduler.run_round(&mut ctx, &table).unwrap();
        assert!(!second.is_deferred());
        let merged = merges(&second);
        assert_eq!(merged[0].bindings.len(), 1);
        assert_eq!(merged[0].bindings[0].origin, cn("com.example.RealRepo"));
    }

    #[test]
    fn re_offered_generated_target_is_ignored() {
        let (mut scheduler, mut ctx) = scheduler(&[]);
        let mut table = SymbolTable::new();
        offer(&mut table, &[component()]);
        assert_eq!(scheduler.run_round(&mut ctx, &table).unwrap().requests.len(), 1);
        let again = scheduler.run_round(&mut ctx, &table).unwrap();
        assert!(again.requests.is_empty());
        assert!(!again.is_deferred());
    }

    #[test]
    fn signal_annotation_defers() {
        let (mut scheduler, mut ctx) = scheduler(&["com.example.GeneratesContributions"]);
        let mut table = SymbolTable::new();
        let mut marker = Declaration::new(cn("com.example.Generator"), DeclarationKind::Class);
        marker.annotations = vec![Annotation::new(cn("com.example.GeneratesContributions"))];
        offer(&mut table, &[component(), marker]);
        let out = scheduler.run_round(&mut ctx, &table).unwrap();
        assert_eq!(out.deferred, vec![cn("com.example.AppComponent")]);
    }

    #[test]
    fn unresolved_target_defers_whole_round() {
        let (mut scheduler, mut ctx) = scheduler(&[]);
        let mut table = SymbolTable::new();
        let mut broken = component();
        broken.name = cn("com.example.BrokenComponent");
        broken.supertypes = vec![TypeRef::Error {
            error: "GeneratedApi".to_owned(),
        }];
        offer(&mut table, &[component(), broken]);
        let out = scheduler.run_round(&mut ctx, &table).unwrap();
        assert!(out.requests.is_empty());
        assert_eq!(
            out.deferred,
            vec![cn("com.example.AppComponent"), cn("com.example.BrokenComponent")]
        );
    }

    #[test]
    fn assembly_deferral_discards_whole_round() {
        let (mut scheduler, mut ctx) = scheduler(&[]);
        let mut table = SymbolTable::new();
        let mut remote = Declaration::new(cn("com.lib.RemoteRepo"), DeclarationKind::Class);
        remote.annotations =
            vec![Annotation::new(cn(known::CONTRIBUTES_BINDING)).with("scope", class(OTHER))];
        remote.supertypes = vec![TypeRef::Error {
            error: "GeneratedRepo".to_owned(),
        }];
        publish_hints(&mut table, std::slice::from_ref(&remote));
        table.insert_library(remote.clone());

        let mut other = Declaration::new(cn("com.example.OtherComponent"), DeclarationKind::Interface);
        other.annotations = vec![Annotation::new(cn(known::MERGE_COMPONENT)).with("scope", class(OTHER))];
        offer(&mut table, &[component(), other]);

        let first = scheduler.run_round(&mut ctx, &table).unwrap();
        assert!(first.requests.is_empty());
        assert_eq!(
            first.deferred,
            vec![cn("com.example.AppComponent"), cn("com.example.OtherComponent")]
        );
        assert_eq!(scheduler.state(&cn("com.example.AppComponent")), TargetState::Deferred);
        assert_eq!(scheduler.state(&cn("com.example.OtherComponent")), TargetState::Deferred);

        remote.supertypes = vec![TypeRef::Resolved(cn("com.example.Repo"))];
        table.insert_library(remote);
        table.set_round(first.deferred.clone());
        let second = scheduler.run_round(&mut ctx, &table).unwrap();
        assert!(!second.is_deferred());
        let merged = merges(&second);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].target, cn("com.example.AppComponent"));
        assert!(merged[0].bindings.is_empty());
        assert_eq!(merged[1].bindings[0].origin, cn("com.lib.RemoteRepo"));
        assert_eq!(scheduler.state(&cn("com.example.OtherComponent")), TargetState::Generated);
    }

    #[test]
    fn assembly_deferral_keeps_synthesized_targets_pending() {
        let (mut scheduler, mut ctx) = scheduler(&[]);
        let mut table = SymbolTable::new();
        let mut logged_in = Declaration::new(cn("com.lib.LoggedIn"), DeclarationKind::Interface);
        logged_in.annotations = vec![
            Annotation::new(cn(known::CONTRIBUTES_SUBCOMPONENT))
                .with("scope", class("com.lib.LoggedInScope"))
                .with("parentScope", class(APP)),
        ];
        let mut remote = Declaration::new(cn("com.lib.RemoteRepo"), DeclarationKind::Class);
        remote.annotations =
            vec![Annotation::new(cn(known::CONTRIBUTES_BINDING)).with("scope", class(APP))];
        remote.supertypes = vec![TypeRef::Error {
            error: "GeneratedRepo".to_owned(),
        }];
        publish_hints(&mut table, &[logged_in.clone(), remote.clone()]);
        table.insert_library(logged_in);
        table.insert_library(remote.clone());
        offer(&mut table, &[component()]);

        let first = scheduler.run_round(&mut ctx, &table).unwrap();
        assert!(first.requests.iter().all(|r| matches!(r, GenerationRequest::Subcomponent(_))));
        assert_eq!(first.deferred, vec![cn("com.example.AppComponent")]);
        assert_eq!(scheduler.pending_targets().count(), 1);

        remote.supertypes = vec![TypeRef::Resolved(cn("com.example.Repo"))];
        table.insert_library(remote);
        table.set_round(first.deferred.clone());
        let second = scheduler.run_round(&mut ctx, &table).unwrap();
        let generated: Vec<String> = second.requests.iter().map(|r| r.generated().canonical()).collect();
        assert_eq!(
            generated,
            vec![
                "com.example.MergedAppComponent",
                "graft.component.com.example.appcomponent.MergedLoggedIn",
            ]
        );
        assert_eq!(scheduler.pending_targets().count(), 0);
    }

    #[test]
    fn duplicate_contribution_fails_round() {
        let (mut scheduler, mut ctx) = scheduler(&[]);
        let mut table = SymbolTable::new();
        let mut twice = module("com.example.Twice");
        twice
            .annotations
            .push(Annotation::new(cn(known::CONTRIBUTES_TO)).with("scope", class(APP)));
        offer(&mut table, &[twice]);
        let err = scheduler.run_round(&mut ctx, &table).unwrap_err();
        assert!(matches!(err, MergeError::DuplicateContribution { .. }));
    }

    #[test]
    fn precompiled_subcomponent_chain_generates_in_one_round() {
        let (mut scheduler, mut ctx) = scheduler(&[]);
        let mut table = SymbolTable::new();
        let mut logged_in = Declaration::new(cn("com.lib.LoggedIn"), DeclarationKind::Interface);
        logged_in.annotations = vec![
            Annotation::new(cn(known::CONTRIBUTES_SUBCOMPONENT))
                .with("scope", class("com.lib.LoggedInScope"))
                .with("parentScope", class(APP)),
        ];
        publish_hints(&mut table, std::slice::from_ref(&logged_in));
        table.insert_library(logged_in);
        offer(&mut table, &[component()]);

        let out = scheduler.run_round(&mut ctx, &table).unwrap();
        let generated: Vec<String> = out.requests.iter().map(|r| r.generated().canonical()).collect();
        assert_eq!(
            generated,
            vec![
                "graft.component.com.example.appcomponent.LoggedIn",
                "com.example.MergedAppComponent",
                "graft.component.com.example.appcomponent.MergedLoggedIn",
            ]
        );
        let merged = merges(&out);
        assert_eq!(
            merged[0].interfaces,
            vec![cn("graft.component.com.example.appcomponent.LoggedIn.ParentComponent")]
        );
        assert!(merged[1].originating.is_empty());
        assert_eq!(scheduler.pending_targets().count(), 0);
    }
}
