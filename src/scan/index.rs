//! Contribution discovery.
//!
//! [`ContributionIndex::find`] answers "what is contributed to this scope?"
//! from the hint registry: every hint group whose scopes match is resolved to
//! its declaration and decoded into typed [`Contribution`] records, one per
//! matching contribution annotation. The referenced declaration must still
//! carry the annotation with the queried scope; hints that disagree with the
//! declaration are skipped.
//!
//! Declarations compiled in the current round have no hints yet.
//! [`ContributionIndex::find_in_round`] reads them from the round symbols.

use std::fmt;

use crate::error::MergeError;
use crate::identity::IdentityGenerator;
use crate::model::{
    Annotation, ClassName, Declaration, SymbolUniverse, TypeRef, Visibility, known,
};

use super::cache::ScanCache;

// ---------------------------------------------------------------------------
// ContributionAnnotation
// ---------------------------------------------------------------------------

/// The contribution annotations the index can be queried for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContributionAnnotation {
    /// Modules and interfaces.
    ContributesTo,
    /// Single bindings.
    ContributesBinding,
    /// Multibinding elements.
    ContributesMultibinding,
    /// Subcomponents contributed to a parent scope.
    ContributesSubcomponent,
}

impl ContributionAnnotation {
    /// Every contribution annotation.
    pub const ALL: [Self; 4] = [
        Self::ContributesTo,
        Self::ContributesBinding,
        Self::ContributesMultibinding,
        Self::ContributesSubcomponent,
    ];

    /// Canonical name of the annotation class.
    #[must_use]
    pub const fn fq_name(self) -> &'static str {
        match self {
            Self::ContributesTo => known::CONTRIBUTES_TO,
            Self::ContributesBinding => known::CONTRIBUTES_BINDING,
            Self::ContributesMultibinding => known::CONTRIBUTES_MULTIBINDING,
            Self::ContributesSubcomponent => known::CONTRIBUTES_SUBCOMPONENT,
        }
    }

    /// The argument naming the scope that is contributed to.
    const fn scope_argument(self) -> &'static str {
        match self {
            Self::ContributesSubcomponent => "parentScope",
            _ => "scope",
        }
    }
}

impl fmt::Display for ContributionAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fq = self.fq_name();
        write!(f, "@{}", fq.rsplit('.').next().unwrap_or(fq))
    }
}

// ---------------------------------------------------------------------------
// Contribution
// ---------------------------------------------------------------------------

/// Payload of a binding or multibinding contribution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingSpec {
    /// The type the origin is bound as.
    pub bound_type: ClassName,
    /// Fingerprint of the origin's qualifier, if it has one.
    pub qualifier: Option<String>,
    /// Rank among competing single bindings.
    pub rank: i32,
    /// The generated module backing this binding.
    pub module: ClassName,
    /// Type parameters of the bound type, when its declaration is visible.
    pub bound_type_parameters: Vec<String>,
}

/// Payload of a contributed subcomponent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubcomponentSpec {
    /// The subcomponent's own scope.
    pub scope: ClassName,
    /// Modules the generated subcomponent includes.
    pub modules: Vec<ClassName>,
    /// Contributions the generated subcomponent excludes.
    pub exclude: Vec<ClassName>,
}

/// What a declaration was contributed as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContributionKind {
    /// A DI module (or module aggregate).
    Module,
    /// An interface merged into components.
    Interface,
    /// A single binding.
    Binding(BindingSpec),
    /// A multibinding element.
    Multibinding(BindingSpec),
    /// A subcomponent contributed to a parent scope.
    Subcomponent(SubcomponentSpec),
}

impl ContributionKind {
    /// The binding payload of bindings and multibindings.
    #[must_use]
    pub const fn binding(&self) -> Option<&BindingSpec> {
        match self {
            Self::Binding(spec) | Self::Multibinding(spec) => Some(spec),
            _ => None,
        }
    }

    /// Returns `true` for multibinding elements.
    #[must_use]
    pub const fn is_multibinding(&self) -> bool {
        matches!(self, Self::Multibinding(_))
    }
}

/// One contribution of one declaration to one scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contribution {
    /// The contributed declaration.
    pub origin: ClassName,
    /// The scope contributed to. For subcomponents this is the parent scope.
    pub scope: ClassName,
    /// What was contributed.
    pub kind: ContributionKind,
    /// Entities this contribution replaces.
    pub replaces: Vec<ClassName>,
    /// Visibility of the origin.
    pub visibility: Visibility,
    /// Type parameters of the origin.
    pub type_parameters: Vec<String>,
    /// `true` if the origin comes from a precompiled dependency.
    pub precompiled: bool,
}

impl Contribution {
    /// The annotation this contribution was declared with.
    #[must_use]
    pub const fn annotation(&self) -> ContributionAnnotation {
        match self.kind {
            ContributionKind::Module | ContributionKind::Interface => {
                ContributionAnnotation::ContributesTo
            }
            ContributionKind::Binding(_) => ContributionAnnotation::ContributesBinding,
            ContributionKind::Multibinding(_) => ContributionAnnotation::ContributesMultibinding,
            ContributionKind::Subcomponent(_) => ContributionAnnotation::ContributesSubcomponent,
        }
    }

    /// Returns `true` if the origin is public.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self.visibility, Visibility::Public)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode every `kind` contribution declared on `decl`, in annotation order.
///
/// # Errors
/// Fails on malformed annotation arguments, on bindings without a usable
/// bound type, and on `@ContributesTo` classes that are neither interfaces
/// nor modules. Unresolved references yield [`MergeError::UnresolvedSymbol`].
pub fn contributions_of(
    decl: &Declaration,
    kind: ContributionAnnotation,
    universe: &dyn SymbolUniverse,
    identity: &IdentityGenerator,
) -> Result<Vec<Contribution>, MergeError> {
    let arg = |e| MergeError::argument(&decl.name, e);
    let mut out = Vec::new();
    for annotation in decl.annotations_named(kind.fq_name()) {
        let scope = annotation.required_class_arg(kind.scope_argument()).map_err(arg)?;
        let replaces = annotation.class_array_arg("replaces").map_err(arg)?;
        let payload = match kind {
            ContributionAnnotation::ContributesTo => contributed_to_kind(decl)?,
            ContributionAnnotation::ContributesBinding => ContributionKind::Binding(
                binding_spec(decl, annotation, scope, false, universe, identity)?,
            ),
            ContributionAnnotation::ContributesMultibinding => ContributionKind::Multibinding(
                binding_spec(decl, annotation, scope, true, universe, identity)?,
            ),
            ContributionAnnotation::ContributesSubcomponent => {
                ContributionKind::Subcomponent(SubcomponentSpec {
                    scope: annotation.scope().map_err(arg)?.clone(),
                    modules: annotation.class_array_arg("modules").map_err(arg)?,
                    exclude: annotation.class_array_arg("exclude").map_err(arg)?,
                })
            }
        };
        out.push(Contribution {
            origin: decl.name.clone(),
            scope: scope.clone(),
            kind: payload,
            replaces,
            visibility: decl.visibility,
            type_parameters: decl.type_parameters.clone(),
            precompiled: decl.is_library(),
        });
    }
    Ok(out)
}

fn contributed_to_kind(decl: &Declaration) -> Result<ContributionKind, MergeError> {
    if decl.is_module() || decl.has_annotation(known::MERGE_MODULES) {
        Ok(ContributionKind::Module)
    } else if decl.is_interface() {
        Ok(ContributionKind::Interface)
    } else {
        Err(MergeError::InvalidContribution {
            declaration: decl.name.clone(),
            reason: "is annotated with @ContributesTo, but this class is neither an interface \
                     nor a module. Did you forget to add @Module?"
                .to_owned(),
        })
    }
}

fn binding_spec(
    decl: &Declaration,
    annotation: &Annotation,
    scope: &ClassName,
    multibinding: bool,
    universe: &dyn SymbolUniverse,
    identity: &IdentityGenerator,
) -> Result<BindingSpec, MergeError> {
    let arg = |e| MergeError::argument(&decl.name, e);
    let unresolved = |reference: String| MergeError::UnresolvedSymbol {
        declaration: decl.name.clone(),
        reference,
    };

    let bound_type = if let Some(explicit) = annotation.class_arg("boundType").map_err(arg)? {
        let supertypes = universe.supertype_closure(decl).map_err(unresolved)?;
        if !supertypes.contains(explicit) {
            return Err(MergeError::InvalidContribution {
                declaration: decl.name.clone(),
                reason: format!(
                    "contributes a binding for {explicit}, but doesn't extend this type."
                ),
            });
        }
        explicit.clone()
    } else {
        if let Some(TypeRef::Error { error }) = decl.unresolved_supertype() {
            return Err(unresolved(error.clone()));
        }
        let direct: Vec<&ClassName> = decl.resolved_supertypes().collect();
        match direct.as_slice() {
            [single] => (*single).clone(),
            _ => {
                return Err(MergeError::InvalidContribution {
                    declaration: decl.name.clone(),
                    reason: "contributes a binding, but does not specify the bound type. This is \
                             only allowed with exactly one direct super type. If there are \
                             multiple or none, then the bound type must be explicitly defined in \
                             the binding annotation."
                        .to_owned(),
                });
            }
        }
    };

    let ignore_qualifier = annotation.bool_arg("ignoreQualifier").map_err(arg)?.unwrap_or(false);
    let qualifier = if ignore_qualifier {
        None
    } else {
        decl.annotations
            .iter()
            .find(|a| {
                universe
                    .declaration(&a.name)
                    .is_some_and(|d| d.has_annotation(known::QUALIFIER))
            })
            .map(Annotation::fingerprint)
    };

    let rank = match annotation.int_arg("rank").map_err(arg)? {
        Some(rank) => rank,
        None => match annotation.enum_arg("priority").map_err(arg)? {
            Some((_, entry)) => known::legacy_priority_rank(entry).ok_or_else(|| {
                MergeError::InvalidContribution {
                    declaration: decl.name.clone(),
                    reason: format!("uses unknown binding priority {entry}."),
                }
            })?,
            None => known::RANK_NORMAL,
        },
    };

    let bound_type_parameters = universe
        .declaration(&bound_type)
        .map(|d| d.type_parameters.clone())
        .unwrap_or_default();

    Ok(BindingSpec {
        module: identity.binding_module_name(&decl.name, &bound_type, scope, multibinding),
        bound_type,
        qualifier,
        rank,
        bound_type_parameters,
    })
}

// ---------------------------------------------------------------------------
// ContributionIndex
// ---------------------------------------------------------------------------

/// Query interface over the hint registry and the round symbols.
#[derive(Clone, Debug)]
pub struct ContributionIndex {
    namespace: String,
    identity: IdentityGenerator,
}

impl ContributionIndex {
    /// An index over the hint namespace `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>, identity: IdentityGenerator) -> Self {
        Self {
            namespace: namespace.into(),
            identity,
        }
    }

    /// The hint namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The identity generator used for binding modules.
    #[must_use]
    pub const fn identity(&self) -> &IdentityGenerator {
        &self.identity
    }

    /// Hinted contributions of `kind`, restricted to `scope` when given.
    ///
    /// Results are cached per round generation; a cache hit returns the same
    /// records in the same order as the miss that filled it. Precompiled
    /// origins are recorded in the cache's external set.
    ///
    /// # Errors
    /// Propagates decoding failures. An unresolved hint reference yields
    /// [`MergeError::UnresolvedSymbol`].
    pub fn find(
        &self,
        cache: &mut ScanCache,
        universe: &dyn SymbolUniverse,
        kind: ContributionAnnotation,
        scope: Option<&ClassName>,
    ) -> Result<std::vec::IntoIter<Contribution>, MergeError> {
        if let Some(hit) = cache.cached(kind, scope) {
            return Ok(hit.into_iter());
        }

        let mut found: Vec<Contribution> = Vec::new();
        let mut external: Vec<ClassName> = Vec::new();
        for record in cache.hint_records() {
            if let Some(scope) = scope
                && !record.has_scope(scope)
            {
                continue;
            }
            let reference = match &record.reference {
                TypeRef::Resolved(name) => name,
                TypeRef::Error { error } => {
                    return Err(MergeError::UnresolvedSymbol {
                        declaration: ClassName::top_level(
                            self.namespace.clone(),
                            record.base.clone(),
                        ),
                        reference: error.clone(),
                    });
                }
            };
            let Some(decl) = universe.declaration(reference) else {
                tracing::warn!(
                    reference = %reference,
                    hint = %record.base,
                    "hinted declaration is not visible; skipping"
                );
                continue;
            };
            if !decl.has_annotation(kind.fq_name()) {
                continue;
            }
            for contribution in contributions_of(decl, kind, universe, &self.identity)? {
                if scope.is_none_or(|s| contribution.scope == *s) && !found.contains(&contribution)
                {
                    found.push(contribution);
                }
            }
            if decl.is_library() {
                external.push(decl.name.clone());
            }
        }

        for name in external {
            cache.mark_external(name);
        }
        tracing::trace!(%kind, scope = ?scope.map(ClassName::canonical), found = found.len(), "scanned hints");
        cache.store(kind, scope, found.clone());
        Ok(found.into_iter())
    }

    /// `@ContributesTo` contributions to `scope` declared by round symbols.
    ///
    /// # Errors
    /// Propagates decoding failures of the round symbols.
    pub fn find_in_round(
        &self,
        universe: &dyn SymbolUniverse,
        scope: &ClassName,
    ) -> Result<Vec<Contribution>, MergeError> {
        let mut found = Vec::new();
        for decl in universe.annotated_in_round(known::CONTRIBUTES_TO) {
            for contribution in contributions_of(
                decl,
                ContributionAnnotation::ContributesTo,
                universe,
                &self.identity,
            )? {
                if contribution.scope == *scope {
                    found.push(contribution);
                }
            }
        }
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
