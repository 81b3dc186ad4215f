//! Merge assembly.
//!
//! For one [`MergeTarget`] the assembler collects every contribution to the
//! target's scopes, applies `exclude` and `replaces`, resolves competing
//! bindings and produces the final, order-stable module and interface lists
//! as a sealed [`MergeDescriptor`].
//!
//! Exclusions and replacements are matched against contributed declaration
//! names. Contributed declarations that are themselves merge targets are
//! emitted under their merged identity.

use crate::error::{ContributedAs, Directive, MergeError};
use crate::identity::IdentityGenerator;
use crate::model::{ClassName, Declaration, SymbolUniverse, TypeRef, known};
use crate::scan::{Contribution, ContributionAnnotation, ContributionIndex, ContributionKind, ScanCache};

use super::binding::ContributedBindings;
use super::descriptor::{BindingSummary, CreatorDescriptor, CreatorShim, MergeDescriptor};
use super::target::{Creator, MergeTarget, TargetKind};

/// Output of subcomponents generated under a merge target that the target
/// must include.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NestedContributions {
    /// Modules binding generated subcomponent factories.
    pub modules: Vec<ClassName>,
    /// Generated parent-component interfaces.
    pub interfaces: Vec<ClassName>,
}

/// Builds merge descriptors from the contribution index.
#[derive(Clone, Copy, Debug)]
pub struct Assembler<'a> {
    index: &'a ContributionIndex,
}

impl<'a> Assembler<'a> {
    /// An assembler reading from `index`.
    #[must_use]
    pub const fn new(index: &'a ContributionIndex) -> Self {
        Self { index }
    }

    fn identity(&self) -> &IdentityGenerator {
        self.index.identity()
    }

    /// Assemble the merged declaration of `target`.
    ///
    /// # Errors
    /// Returns the first directive, binding, visibility or genericity error.
    /// Unresolved references yield [`MergeError::UnresolvedSymbol`].
    pub fn assemble(
        &self,
        cache: &mut ScanCache,
        universe: &dyn SymbolUniverse,
        target: &MergeTarget,
        nested: &NestedContributions,
    ) -> Result<MergeDescriptor, MergeError> {
        let contributions = self.collect(cache, universe, target)?;
        for contribution in &contributions {
            check_contribution(contribution)?;
        }

        let excluded = check_excludes(universe, target)?;
        check_self_exclusion(universe, target, &excluded)?;

        let conflicting: Vec<ClassName> = target
            .includes
            .iter()
            .filter(|m| excluded.contains(m))
            .cloned()
            .collect();
        if !conflicting.is_empty() {
            return Err(MergeError::ConflictingDirective {
                target: target.origin.clone(),
                entities: conflicting,
            });
        }

        let replaced = check_replacements(universe, target, &contributions, &excluded)?;
        let removed = |name: &ClassName| excluded.contains(name) || replaced.contains(name);

        let bindings = ContributedBindings::from_contributions(
            contributions
                .iter()
                .filter(|c| {
                    c.kind
                        .binding()
                        .is_some_and(|spec| !removed(&c.origin) && !removed(&spec.module))
                })
                .cloned(),
        );
        let winners = bindings.resolve_all()?;

        let mut modules: Vec<ClassName> = Vec::new();
        if target.kind.merges_modules() {
            for contribution in &contributions {
                if matches!(contribution.kind, ContributionKind::Module) && !removed(&contribution.origin) {
                    push_unique(&mut modules, self.output_name(universe, &contribution.origin)?);
                }
            }
            for winner in &winners {
                if let Some(spec) = winner.kind.binding()
                    && !removed(&spec.module)
                {
                    push_unique(&mut modules, spec.module.clone());
                }
            }
            for include in &target.includes {
                push_unique(&mut modules, self.output_name(universe, include)?);
            }
            for module in &nested.modules {
                push_unique(&mut modules, module.clone());
            }
        }

        let mut interfaces: Vec<ClassName> = Vec::new();
        if target.kind.merges_interfaces() {
            for contribution in &contributions {
                if matches!(contribution.kind, ContributionKind::Interface) && !removed(&contribution.origin) {
                    push_unique(&mut interfaces, self.output_name(universe, &contribution.origin)?);
                }
            }
            for interface in &nested.interfaces {
                push_unique(&mut interfaces, interface.clone());
            }
        }

        let merged = self.identity().merged_name(
            &target.origin,
            target.creator.as_ref().map(|c| c.declaration.simple_name()),
        );
        let creator = target
            .creator
            .as_ref()
            .map(|creator| creator_descriptor(target, creator, &merged));

        let mut originating: Vec<ClassName> = Vec::new();
        if !target.synthesized {
            originating.push(target.origin.clone());
        }
        for contribution in &contributions {
            if contribution.precompiled || removed(&contribution.origin) {
                continue;
            }
            let used = match &contribution.kind {
                ContributionKind::Module => target.kind.merges_modules(),
                ContributionKind::Interface => target.kind.merges_interfaces(),
                ContributionKind::Binding(_) | ContributionKind::Multibinding(_) => {
                    winners.contains(contribution)
                }
                ContributionKind::Subcomponent(_) => false,
            };
            if used {
                push_unique(&mut originating, contribution.origin.clone());
            }
        }

        let mut descriptor = MergeDescriptor {
            target: target.origin.clone(),
            merged,
            kind: target.kind,
            annotation: target.kind.di_annotation().map(str::to_owned),
            scopes: target.scopes.clone(),
            modules,
            interfaces,
            bindings: winners
                .iter()
                .filter_map(|c| {
                    c.kind.binding().map(|spec| BindingSummary {
                        origin: c.origin.clone(),
                        bound_type: spec.bound_type.clone(),
                        qualifier: spec.qualifier.clone(),
                        rank: spec.rank,
                        module: spec.module.clone(),
                        multibinding: c.kind.is_multibinding(),
                    })
                })
                .collect(),
            dependencies: target.dependencies.clone(),
            subcomponents: target.subcomponents.clone(),
            creator,
            contributes_to: target.contributes_to.clone(),
            originating,
            digest: String::new(),
        };
        descriptor.seal().map_err(|err| MergeError::InvalidMergeTarget {
            declaration: target.origin.clone(),
            reason: format!("its merge descriptor could not be serialized: {err}."),
        })?;
        tracing::debug!(
            target = %descriptor.target,
            merged = %descriptor.merged,
            modules = descriptor.modules.len(),
            interfaces = descriptor.interfaces.len(),
            bindings = descriptor.bindings.len(),
            digest = %descriptor.digest,
            "assembled merge"
        );
        Ok(descriptor)
    }

    /// Hinted and in-round contributions to the target's scopes.
    fn collect(
        &self,
        cache: &mut ScanCache,
        universe: &dyn SymbolUniverse,
        target: &MergeTarget,
    ) -> Result<Vec<Contribution>, MergeError> {
        let mut kinds = vec![ContributionAnnotation::ContributesTo];
        if target.kind.merges_modules() {
            kinds.push(ContributionAnnotation::ContributesBinding);
            kinds.push(ContributionAnnotation::ContributesMultibinding);
        }

        let mut out: Vec<Contribution> = Vec::new();
        for scope in &target.scopes {
            for kind in &kinds {
                for contribution in self.index.find(cache, universe, *kind, Some(scope))? {
                    if wanted(target.kind, &contribution) && !out.contains(&contribution) {
                        out.push(contribution);
                    }
                }
            }
            for contribution in self.index.find_in_round(universe, scope)? {
                if wanted(target.kind, &contribution) && !out.contains(&contribution) {
                    out.push(contribution);
                }
            }
        }
        Ok(out)
    }

    fn output_name(&self, universe: &dyn SymbolUniverse, name: &ClassName) -> Result<ClassName, MergeError> {
        let Some(decl) = universe.declaration(name) else {
            return Ok(name.clone());
        };
        if !known::MERGE_ANNOTATIONS.iter().any(|m| decl.has_annotation(m)) {
            return Ok(name.clone());
        }
        let creator = if decl.has_annotation(known::MERGE_COMPONENT)
            || decl.has_annotation(known::MERGE_SUBCOMPONENT)
        {
            Creator::find(name, universe)?
        } else {
            None
        };
        Ok(self
            .identity()
            .merged_name(name, creator.as_ref().map(|c| c.declaration.simple_name())))
    }
}

fn wanted(kind: TargetKind, contribution: &Contribution) -> bool {
    match contribution.kind {
        ContributionKind::Module
        | ContributionKind::Binding(_)
        | ContributionKind::Multibinding(_) => kind.merges_modules(),
        ContributionKind::Interface => kind.merges_interfaces(),
        ContributionKind::Subcomponent(_) => false,
    }
}

fn push_unique(into: &mut Vec<ClassName>, name: ClassName) {
    if !into.contains(&name) {
        into.push(name);
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_contribution(contribution: &Contribution) -> Result<(), MergeError> {
    if !contribution.type_parameters.is_empty() {
        return Err(MergeError::GenericContribution {
            origin: contribution.origin.clone(),
            bound_type: contribution.origin.clone(),
            type_parameters: contribution.type_parameters.clone(),
        });
    }
    if let Some(spec) = contribution.kind.binding()
        && !spec.bound_type_parameters.is_empty()
    {
        return Err(MergeError::GenericContribution {
            origin: contribution.origin.clone(),
            bound_type: spec.bound_type.clone(),
            type_parameters: spec.bound_type_parameters.clone(),
        });
    }
    if !contribution.is_public() {
        let contributed_as = match contribution.kind {
            ContributionKind::Interface => ContributedAs::Interface,
            ContributionKind::Binding(_) | ContributionKind::Multibinding(_) => {
                ContributedAs::Binding
            }
            ContributionKind::Module | ContributionKind::Subcomponent(_) => ContributedAs::Module,
        };
        return Err(MergeError::Visibility {
            declaration: contribution.origin.clone(),
            contributed_as,
        });
    }
    Ok(())
}

fn lookup<'u>(
    universe: &'u dyn SymbolUniverse,
    name: &ClassName,
    referenced_by: &ClassName,
) -> Result<&'u Declaration, MergeError> {
    universe
        .declaration(name)
        .ok_or_else(|| MergeError::MissingDeclaration {
            name: name.clone(),
            referenced_by: referenced_by.clone(),
        })
}

/// Scopes `decl` contributes to with modules, interfaces or bindings, plus
/// parent scopes of contributed subcomponents when `with_parents` is set.
fn contributed_scopes(decl: &Declaration, with_parents: bool) -> Result<Vec<ClassName>, MergeError> {
    let arg = |e| MergeError::argument(&decl.name, e);
    let mut scopes = Vec::new();
    for fq in [
        known::CONTRIBUTES_TO,
        known::CONTRIBUTES_BINDING,
        known::CONTRIBUTES_MULTIBINDING,
    ] {
        for annotation in decl.annotations_named(fq) {
            scopes.push(annotation.scope().map_err(arg)?.clone());
        }
    }
    if with_parents {
        for annotation in decl.annotations_named(known::CONTRIBUTES_SUBCOMPONENT) {
            scopes.push(annotation.required_class_arg("parentScope").map_err(arg)?.clone());
        }
    }
    Ok(scopes)
}

/// Validate the target's excludes and return the effective list.
///
/// Interface aggregates only consider interfaces; everything else is the
/// business of module merging.
fn check_excludes(
    universe: &dyn SymbolUniverse,
    target: &MergeTarget,
) -> Result<Vec<ClassName>, MergeError> {
    let mut excluded = Vec::new();
    for name in &target.exclude {
        let decl = lookup(universe, name, &target.origin)?;
        if !target.kind.merges_modules() && !decl.is_interface() {
            continue;
        }
        let scopes = contributed_scopes(decl, true)?;
        if !scopes.iter().any(|s| target.merges_scope(s)) {
            return Err(MergeError::ScopeMismatch {
                declaration: target.origin.clone(),
                scopes: target.scopes.clone(),
                directive: Directive::Exclude,
                entity: name.clone(),
            });
        }
        push_unique(&mut excluded, name.clone());
    }
    Ok(excluded)
}

fn check_self_exclusion(
    universe: &dyn SymbolUniverse,
    target: &MergeTarget,
    excluded: &[ClassName],
) -> Result<(), MergeError> {
    if excluded.is_empty() {
        return Ok(());
    }
    let unresolved = |reference: String| MergeError::UnresolvedSymbol {
        declaration: target.origin.clone(),
        reference,
    };
    let mut supertypes: Vec<ClassName> = Vec::new();
    for direct in &target.supertypes {
        push_unique(&mut supertypes, direct.clone());
        if let Some(decl) = universe.declaration(direct) {
            for indirect in universe.supertype_closure(decl).map_err(unresolved)? {
                push_unique(&mut supertypes, indirect);
            }
        }
    }
    let hit: Vec<ClassName> = supertypes
        .into_iter()
        .filter(|s| excluded.contains(s))
        .collect();
    if hit.is_empty() {
        Ok(())
    } else {
        Err(MergeError::SelfExclusion {
            target: target.origin.clone(),
            supertypes: hit,
        })
    }
}

/// Validate every `replaces` entry of non-excluded contributions and return
/// the replaced names.
fn check_replacements(
    universe: &dyn SymbolUniverse,
    target: &MergeTarget,
    contributions: &[Contribution],
    excluded: &[ClassName],
) -> Result<Vec<ClassName>, MergeError> {
    let mut replaced = Vec::new();
    for contribution in contributions {
        if excluded.contains(&contribution.origin) {
            continue;
        }
        for name in &contribution.replaces {
            let decl = lookup(universe, name, &contribution.origin)?;
            let expected = match contribution.kind {
                ContributionKind::Interface => {
                    (!decl.is_interface()).then_some(ContributedAs::Interface)
                }
                _ => {
                    let replaceable = decl.is_module()
                        || decl.has_annotation(known::MERGE_MODULES)
                        || decl.has_annotation(known::CONTRIBUTES_BINDING)
                        || decl.has_annotation(known::CONTRIBUTES_MULTIBINDING);
                    (!replaceable).then_some(ContributedAs::Module)
                }
            };
            if let Some(expected) = expected {
                return Err(MergeError::InvalidReplacement {
                    declaration: contribution.origin.clone(),
                    replaced: name.clone(),
                    expected,
                });
            }
            let scopes = contributed_scopes(decl, false)?;
            if !scopes.iter().any(|s| target.merges_scope(s)) {
                return Err(MergeError::ScopeMismatch {
                    declaration: contribution.origin.clone(),
                    scopes: target.scopes.clone(),
                    directive: Directive::Replace,
                    entity: name.clone(),
                });
            }
            push_unique(&mut replaced, name.clone());
        }
    }
    Ok(replaced)
}

// ---------------------------------------------------------------------------
// Creator
// ---------------------------------------------------------------------------

fn creator_descriptor(target: &MergeTarget, creator: &Creator, merged: &ClassName) -> CreatorDescriptor {
    let generated = merged.nested(creator.declaration.simple_name());
    let overrides = creator
        .functions
        .iter()
        .filter(|f| match &f.return_type {
            TypeRef::Resolved(ret) => *ret == creator.declaration || *ret == target.origin,
            TypeRef::Error { .. } => false,
        })
        .map(|f| f.name.clone())
        .collect();
    let shim = matches!(target.kind, TargetKind::Component).then(|| CreatorShim {
        class: ClassName::top_level(
            target.origin.package().to_owned(),
            format!(
                "{}{}",
                known::GENERATED_COMPONENT_PREFIX,
                target.origin.simple_names().join("_")
            ),
        ),
        function: creator.kind.entry_function().to_owned(),
        returns: generated.clone(),
    });
    CreatorDescriptor {
        kind: creator.kind,
        original: creator.declaration.clone(),
        generated,
        overrides,
        shim,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
