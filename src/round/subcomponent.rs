//! Contributed subcomponent expansion.
//!
//! A contributed subcomponent names a parent scope. Every merge target that
//! triggers generation for that scope (a component, a subcomponent or an
//! interface aggregate) gets its own generated subcomponent, which in turn is
//! a trigger for its own scope. [`SubcomponentExpander`] runs this as a
//! worklist to a fixed point and remembers every `(trigger, contribution)`
//! pair it generated so a pair is never generated twice.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::MergeError;
use crate::identity::IdentityGenerator;
use crate::merge::MergeTarget;
use crate::model::{Annotation, ClassName, Declaration, SymbolUniverse, TypeRef, Visibility, known};
use crate::scan::{Contribution, ContributionAnnotation, ContributionIndex, ContributionKind, SubcomponentSpec};

use super::context::RoundContext;

// ---------------------------------------------------------------------------
// Discovery results
// ---------------------------------------------------------------------------

/// The factory nested in a contributed subcomponent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FactoryClass {
    /// The nested factory.
    pub name: ClassName,
    /// `true` if the factory is an interface.
    pub is_interface: bool,
}

/// The interface nested in a contributed subcomponent that is contributed to
/// the parent scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentInterface {
    /// The nested interface.
    pub name: ClassName,
    /// Its function returning the subcomponent or its factory.
    pub function: String,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// The generated factory of a generated subcomponent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FactoryDescriptor {
    /// The factory declared by the contribution.
    pub original: ClassName,
    /// The generated factory extending it.
    pub generated: ClassName,
    /// `true` if the generated factory is an interface.
    pub is_interface: bool,
    /// Module binding the generated factory as the original one.
    pub module: ClassName,
}

/// The interface the parent merges to reach a generated subcomponent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParentComponentDescriptor {
    /// The generated interface.
    pub class: ClassName,
    /// The contribution's own parent interface, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<ClassName>,
    /// Accessor function name.
    pub function: String,
    /// What the accessor returns: the generated factory or subcomponent.
    pub returns: ClassName,
}

/// Everything a writer needs to emit one generated subcomponent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubcomponentRequest {
    /// The merge target the subcomponent is generated for.
    pub trigger: ClassName,
    /// The contributed subcomponent.
    pub contribution: ClassName,
    /// The generated subcomponent.
    pub generated: ClassName,
    /// Scope of the generated subcomponent.
    pub scope: ClassName,
    /// Scope of the trigger.
    pub parent_scope: ClassName,
    /// Modules copied from the contribution.
    pub modules: Vec<ClassName>,
    /// Exclusions copied from the contribution.
    pub exclude: Vec<ClassName>,
    /// DI scope annotations copied from the contribution, as fingerprints.
    pub scope_annotations: Vec<String>,
    /// The generated factory, if the contribution declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factory: Option<FactoryDescriptor>,
    /// The generated parent-component interface.
    pub parent_component: ParentComponentDescriptor,
    /// Current-compilation declarations the output derives from.
    pub originating: Vec<ClassName>,
}

/// One generated subcomponent and the merge target standing in for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expansion {
    /// The emission request.
    pub request: SubcomponentRequest,
    /// The synthesized merge target of the generated subcomponent.
    pub target: MergeTarget,
}

// ---------------------------------------------------------------------------
// Expander
// ---------------------------------------------------------------------------

/// A merge target generating subcomponents for one of its scopes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trigger {
    /// The merge target.
    pub origin: ClassName,
    /// The triggering scope.
    pub scope: ClassName,
    /// Contributions the target excludes.
    pub exclude: Vec<ClassName>,
    /// `true` for generated subcomponents.
    pub synthesized: bool,
}

impl Trigger {
    /// One trigger per scope of `target`, none if its kind does not trigger.
    #[must_use]
    pub fn from_target(target: &MergeTarget) -> Vec<Self> {
        if !target.kind.triggers_subcomponents() {
            return Vec::new();
        }
        target
            .scopes
            .iter()
            .map(|scope| Self {
                origin: target.origin.clone(),
                scope: scope.clone(),
                exclude: target.exclude.clone(),
                synthesized: target.synthesized,
            })
            .collect()
    }

    fn same(&self, other: &Self) -> bool {
        self.origin == other.origin && self.scope == other.scope
    }
}

type EventKey = (ClassName, ClassName, ClassName, ClassName);

fn event_key(trigger: &Trigger, contribution: &Contribution) -> EventKey {
    (
        trigger.origin.clone(),
        trigger.scope.clone(),
        contribution.origin.clone(),
        contribution.scope.clone(),
    )
}

/// Worklist state of subcomponent generation across rounds.
#[derive(Clone, Debug, Default)]
pub struct SubcomponentExpander {
    seeded: bool,
    triggers: Vec<Trigger>,
    contributions: Vec<Contribution>,
    replaced: BTreeSet<ClassName>,
    processed: BTreeSet<EventKey>,
    generated: BTreeSet<ClassName>,
    pending: BTreeSet<ClassName>,
}

impl SubcomponentExpander {
    /// An expander with no triggers and no contributions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick up contributed subcomponents of precompiled dependencies. Runs
    /// once per compilation.
    ///
    /// # Errors
    /// Propagates hint decoding failures.
    pub fn seed(
        &mut self,
        index: &ContributionIndex,
        ctx: &mut RoundContext,
        universe: &dyn SymbolUniverse,
    ) -> Result<(), MergeError> {
        if self.seeded {
            return Ok(());
        }
        let found = index.find(
            ctx.scan(),
            universe,
            ContributionAnnotation::ContributesSubcomponent,
            None,
        )?;
        self.offer(found.filter(|c| c.precompiled));
        self.seeded = true;
        Ok(())
    }

    /// Register a trigger. Known triggers are ignored.
    pub fn add_trigger(&mut self, trigger: Trigger) {
        if !self.triggers.iter().any(|t| t.same(&trigger)) {
            self.triggers.push(trigger);
        }
    }

    /// Add contributed subcomponents. Other contribution kinds are ignored.
    pub fn offer(&mut self, contributions: impl IntoIterator<Item = Contribution>) {
        for contribution in contributions {
            if matches!(contribution.kind, ContributionKind::Subcomponent(_))
                && !self.contributions.contains(&contribution)
            {
                self.replaced.extend(contribution.replaces.iter().cloned());
                self.contributions.push(contribution);
            }
        }
    }

    /// Contributions whose generation waited on unresolved symbols in the
    /// last [`expand`](Self::expand).
    #[must_use]
    pub const fn pending(&self) -> &BTreeSet<ClassName> {
        &self.pending
    }

    /// Number of generated `(trigger, contribution)` pairs.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.processed.len()
    }

    /// Returns `true` if `contribution` was generated for some trigger.
    #[must_use]
    pub fn is_generated(&self, contribution: &ClassName) -> bool {
        self.generated.contains(contribution)
    }

    /// Generate every new `(trigger, contribution)` pair, following
    /// generated subcomponents until nothing new appears.
    ///
    /// # Errors
    /// Returns [`MergeError::RetroactiveReplacement`] if a contribution
    /// replaces one that was already generated, and
    /// [`MergeError::InvalidSubcomponent`] for invalid factories or parent
    /// interfaces.
    pub fn expand(
        &mut self,
        ctx: &mut RoundContext,
        universe: &dyn SymbolUniverse,
        identity: &IdentityGenerator,
    ) -> Result<Vec<Expansion>, MergeError> {
        self.pending.clear();
        for contribution in &self.contributions {
            for replaced in &contribution.replaces {
                if self.generated.contains(replaced) {
                    return Err(MergeError::RetroactiveReplacement {
                        replacing: contribution.origin.clone(),
                        replaced: replaced.clone(),
                    });
                }
            }
        }
        self.contributions.retain(|c| !self.replaced.contains(&c.origin));

        let mut waiting: BTreeSet<EventKey> = BTreeSet::new();
        let mut out = Vec::new();
        loop {
            let mut fresh: Vec<(Trigger, Contribution)> = Vec::new();
            for contribution in &self.contributions {
                for trigger in &self.triggers {
                    if trigger.scope != contribution.scope || trigger.exclude.contains(&contribution.origin) {
                        continue;
                    }
                    let key = event_key(trigger, contribution);
                    if !self.processed.contains(&key) && !waiting.contains(&key) {
                        fresh.push((trigger.clone(), contribution.clone()));
                    }
                }
            }
            if fresh.is_empty() {
                break;
            }

            for (trigger, contribution) in fresh {
                let key = event_key(&trigger, &contribution);
                match expansion(ctx, universe, identity, &trigger, &contribution) {
                    Ok(expansion) => {
                        tracing::debug!(
                            trigger = %trigger.origin,
                            contribution = %contribution.origin,
                            generated = %expansion.request.generated,
                            "generating contributed subcomponent"
                        );
                        self.processed.insert(key);
                        self.generated.insert(contribution.origin.clone());
                        for next in Trigger::from_target(&expansion.target) {
                            self.add_trigger(next);
                        }
                        out.push(expansion);
                    }
                    Err(err) if err.is_deferral() => {
                        tracing::debug!(contribution = %contribution.origin, %err, "subcomponent waits");
                        self.pending.insert(contribution.origin.clone());
                        waiting.insert(key);
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(out)
    }

    /// Forget all triggers, contributions and generated pairs.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

fn expansion(
    ctx: &mut RoundContext,
    universe: &dyn SymbolUniverse,
    identity: &IdentityGenerator,
    trigger: &Trigger,
    contribution: &Contribution,
) -> Result<Expansion, MergeError> {
    let ContributionKind::Subcomponent(spec) = &contribution.kind else {
        return Err(MergeError::InvalidSubcomponent {
            declaration: contribution.origin.clone(),
            reason: "is not a contributed subcomponent.".to_owned(),
        });
    };
    let decl = universe
        .declaration(&contribution.origin)
        .ok_or_else(|| MergeError::MissingDeclaration {
            name: contribution.origin.clone(),
            referenced_by: trigger.origin.clone(),
        })?;

    let generated = identity.generated_subcomponent_name(&contribution.origin, &trigger.origin);
    let factory_class = find_factory(ctx, universe, decl)?;
    let parent = find_parent_interface(ctx, universe, decl, &contribution.scope, factory_class.as_ref())?;

    let factory = factory_class.map(|f| FactoryDescriptor {
        original: f.name,
        generated: generated.nested(known::SUBCOMPONENT_FACTORY),
        is_interface: f.is_interface,
        module: generated.nested(known::SUBCOMPONENT_MODULE),
    });

    let function = parent
        .as_ref()
        .map(|p| p.function.clone())
        .or_else(|| {
            factory
                .as_ref()
                .map(|f| format!("create{}", f.original.simple_name()))
        })
        .unwrap_or_else(|| format!("create{}", generated.relative_name()));
    let parent_component = ParentComponentDescriptor {
        class: generated.nested(known::PARENT_COMPONENT),
        extends: parent.map(|p| p.name),
        function,
        returns: factory
            .as_ref()
            .map_or_else(|| generated.clone(), |f| f.generated.clone()),
    };

    let mut originating = Vec::new();
    if !trigger.synthesized {
        originating.push(trigger.origin.clone());
    }
    if !contribution.precompiled {
        originating.push(contribution.origin.clone());
    }

    let SubcomponentSpec { scope, modules, exclude } = spec.clone();
    let request = SubcomponentRequest {
        trigger: trigger.origin.clone(),
        contribution: contribution.origin.clone(),
        generated: generated.clone(),
        scope: scope.clone(),
        parent_scope: contribution.scope.clone(),
        modules: modules.clone(),
        exclude: exclude.clone(),
        scope_annotations: scope_annotations(universe, decl),
        factory,
        parent_component,
        originating,
    };
    let target = MergeTarget::generated_subcomponent(
        generated,
        scope,
        modules,
        exclude,
        contribution.origin.clone(),
    );
    Ok(Expansion { request, target })
}

fn scope_annotations(universe: &dyn SymbolUniverse, decl: &Declaration) -> Vec<String> {
    decl.annotations
        .iter()
        .filter(|a| {
            universe
                .declaration(&a.name)
                .is_some_and(|d| d.has_annotation(known::SCOPE))
        })
        .map(Annotation::fingerprint)
        .collect()
}

fn returns(ty: &TypeRef, owner: &ClassName, expected: &ClassName) -> Result<bool, MergeError> {
    match ty {
        TypeRef::Resolved(name) => Ok(name == expected),
        TypeRef::Error { error } => Err(MergeError::UnresolvedSymbol {
            declaration: owner.clone(),
            reference: error.clone(),
        }),
    }
}

fn find_factory(
    ctx: &mut RoundContext,
    universe: &dyn SymbolUniverse,
    decl: &Declaration,
) -> Result<Option<FactoryClass>, MergeError> {
    if let Some(hit) = ctx.factories().get(&decl.name) {
        return Ok(hit.clone());
    }

    let mut found = Vec::new();
    for nested in universe.nested_declarations(&decl.name) {
        if !nested.has_annotation(known::CONTRIBUTES_SUBCOMPONENT_FACTORY) {
            continue;
        }
        if !nested.is_abstract() {
            return Err(MergeError::InvalidSubcomponent {
                declaration: nested.name.clone(),
                reason: "A factory must be an interface or an abstract class.".to_owned(),
            });
        }
        let mut creating = 0;
        for function in nested.abstract_functions() {
            if returns(&function.return_type, &nested.name, &decl.name)? {
                creating += 1;
            }
        }
        if creating != 1 {
            return Err(MergeError::InvalidSubcomponent {
                declaration: nested.name.clone(),
                reason: format!(
                    "A factory must have exactly one abstract function returning the subcomponent {}.",
                    decl.name
                ),
            });
        }
        found.push(FactoryClass {
            name: nested.name.clone(),
            is_interface: nested.is_interface(),
        });
    }
    if found.len() > 1 {
        return Err(MergeError::InvalidSubcomponent {
            declaration: decl.name.clone(),
            reason: format!("Expected zero or one factory within {}.", decl.name),
        });
    }
    let factory = found.pop();
    ctx.factories().insert(decl.name.clone(), factory.clone());
    Ok(factory)
}

fn find_parent_interface(
    ctx: &mut RoundContext,
    universe: &dyn SymbolUniverse,
    decl: &Declaration,
    parent_scope: &ClassName,
    factory: Option<&FactoryClass>,
) -> Result<Option<ParentInterface>, MergeError> {
    let key = (decl.name.clone(), parent_scope.clone());
    if let Some(hit) = ctx.parent_components().get(&key) {
        return Ok(hit.clone());
    }

    let mut candidates: Vec<&Declaration> = Vec::new();
    for nested in universe.nested_declarations(&decl.name) {
        if !nested.is_interface() {
            continue;
        }
        for annotation in nested.annotations_named(known::CONTRIBUTES_TO) {
            let scope = annotation
                .scope()
                .map_err(|e| MergeError::argument(&nested.name, e))?;
            if scope == parent_scope {
                candidates.push(nested);
                break;
            }
        }
    }
    let interface = match candidates.as_slice() {
        [] => None,
        [one] => Some(*one),
        _ => {
            return Err(MergeError::InvalidSubcomponent {
                declaration: decl.name.clone(),
                reason: format!(
                    "Expected zero or one parent component interface within {} being contributed \
                     to the parent scope.",
                    decl.name
                ),
            });
        }
    };

    let parent = match interface {
        None => None,
        Some(interface) => {
            let mut functions = Vec::new();
            for function in interface.abstract_functions() {
                if !matches!(function.visibility, Visibility::Public) {
                    continue;
                }
                let subcomponent = returns(&function.return_type, &interface.name, &decl.name)?;
                let creator = match factory {
                    Some(f) => returns(&function.return_type, &interface.name, &f.name)?,
                    None => false,
                };
                if subcomponent || creator {
                    functions.push(function.name.clone());
                }
            }
            if functions.len() > 1 {
                return Err(MergeError::InvalidSubcomponent {
                    declaration: decl.name.clone(),
                    reason: format!(
                        "Expected zero or one function returning the subcomponent {}.",
                        decl.name
                    ),
                });
            }
            // Without a matching function the interface is not a parent component.
            functions.pop().map(|function| ParentInterface {
                name: interface.name.clone(),
                function,
            })
        }
    };
    ctx.parent_components().insert(key, parent.clone());
    Ok(parent)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
