//! Merge targets.
//!
//! A merge target is a declaration carrying one kind of merge annotation
//! (possibly repeated, once per scope). [`MergeTarget::from_declaration`]
//! reads its arguments, its creator and its supertypes. Generated
//! subcomponents are synthesized as merge targets by the round scheduler.

use serde::Serialize;

use crate::error::MergeError;
use crate::model::{ClassName, Declaration, Function, SymbolUniverse, TypeRef, known};

use super::validate;

// ---------------------------------------------------------------------------
// TargetKind
// ---------------------------------------------------------------------------

/// What a merge target merges into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A merged component.
    Component,
    /// A merged subcomponent.
    Subcomponent,
    /// A module aggregating contributed modules.
    ModuleAggregate,
    /// An interface aggregating contributed interfaces.
    InterfaceAggregate,
}

impl TargetKind {
    /// Every target kind, in merge-annotation order.
    pub const ALL: [Self; 4] = [
        Self::Component,
        Self::Subcomponent,
        Self::ModuleAggregate,
        Self::InterfaceAggregate,
    ];

    /// The merge annotation requesting this kind.
    #[must_use]
    pub const fn merge_annotation(self) -> &'static str {
        match self {
            Self::Component => known::MERGE_COMPONENT,
            Self::Subcomponent => known::MERGE_SUBCOMPONENT,
            Self::ModuleAggregate => known::MERGE_MODULES,
            Self::InterfaceAggregate => known::MERGE_INTERFACES,
        }
    }

    /// The DI annotation the merged declaration receives.
    #[must_use]
    pub const fn di_annotation(self) -> Option<&'static str> {
        match self {
            Self::Component => Some(known::COMPONENT),
            Self::Subcomponent => Some(known::SUBCOMPONENT),
            Self::ModuleAggregate => Some(known::MODULE),
            Self::InterfaceAggregate => None,
        }
    }

    /// Returns `true` if contributed modules are merged.
    #[must_use]
    pub const fn merges_modules(self) -> bool {
        !matches!(self, Self::InterfaceAggregate)
    }

    /// Returns `true` if contributed interfaces are merged.
    #[must_use]
    pub const fn merges_interfaces(self) -> bool {
        !matches!(self, Self::ModuleAggregate)
    }

    /// Returns `true` if this kind generates contributed subcomponents.
    #[must_use]
    pub fn triggers_subcomponents(self) -> bool {
        known::SUBCOMPONENT_TRIGGERS.contains(&self.merge_annotation())
    }

    /// Simple name of the merge annotation, for messages.
    #[must_use]
    pub fn annotation_simple_name(self) -> &'static str {
        let fq = self.merge_annotation();
        fq.rsplit('.').next().unwrap_or(fq)
    }
}

// ---------------------------------------------------------------------------
// Creator
// ---------------------------------------------------------------------------

/// Whether a creator is a factory or a builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatorKind {
    /// A component factory.
    Factory,
    /// A component builder.
    Builder,
}

impl CreatorKind {
    /// Name of the static entry function on the creator shim.
    #[must_use]
    pub const fn entry_function(self) -> &'static str {
        match self {
            Self::Factory => "factory",
            Self::Builder => "builder",
        }
    }
}

/// A factory or builder nested in a merge target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Creator {
    /// Factory or builder.
    pub kind: CreatorKind,
    /// The nested declaration.
    pub declaration: ClassName,
    /// `true` if the creator is an interface.
    pub is_interface: bool,
    /// Abstract functions of the creator.
    pub functions: Vec<Function>,
}

impl Creator {
    /// Find the creator nested in `target`.
    ///
    /// # Errors
    /// Returns [`MergeError::InvalidMergeTarget`] if more than one nested
    /// declaration is marked as a factory or builder.
    pub fn find(
        target: &ClassName,
        universe: &dyn SymbolUniverse,
    ) -> Result<Option<Self>, MergeError> {
        let mut found: Vec<Self> = Vec::new();
        for nested in universe.nested_declarations(target) {
            let kind = if known::FACTORY_MARKERS.iter().any(|m| nested.has_annotation(m)) {
                CreatorKind::Factory
            } else if known::BUILDER_MARKERS.iter().any(|m| nested.has_annotation(m)) {
                CreatorKind::Builder
            } else {
                continue;
            };
            found.push(Self {
                kind,
                declaration: nested.name.clone(),
                is_interface: nested.is_interface(),
                functions: nested.abstract_functions().cloned().collect(),
            });
        }
        if found.len() > 1 {
            return Err(MergeError::InvalidMergeTarget {
                declaration: target.clone(),
                reason: format!(
                    "expected zero or one factory or builder, found {}.",
                    found.len()
                ),
            });
        }
        Ok(found.pop())
    }
}

// ---------------------------------------------------------------------------
// MergeTarget
// ---------------------------------------------------------------------------

/// A declaration requesting a merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeTarget {
    /// The annotated declaration.
    pub origin: ClassName,
    /// What it merges into.
    pub kind: TargetKind,
    /// Every scope merged, one per merge annotation.
    pub scopes: Vec<ClassName>,
    /// Explicitly listed modules.
    pub includes: Vec<ClassName>,
    /// Excluded contributions.
    pub exclude: Vec<ClassName>,
    /// Component dependencies, copied through.
    pub dependencies: Vec<ClassName>,
    /// Subcomponents declared by a module aggregate, copied through.
    pub subcomponents: Vec<ClassName>,
    /// The nested factory or builder.
    pub creator: Option<Creator>,
    /// Resolved direct supertypes.
    pub supertypes: Vec<ClassName>,
    /// Scopes the target itself is contributed to.
    pub contributes_to: Vec<ClassName>,
    /// `true` if the target is an interface.
    pub is_interface: bool,
    /// `true` for subcomponents generated by this engine.
    pub synthesized: bool,
}

impl MergeTarget {
    /// Read a merge target from its declaration.
    ///
    /// Returns `Ok(None)` if the declaration carries no merge annotation.
    ///
    /// # Errors
    /// Fails if the merge annotations are invalid (see [`validate`]) or
    /// carry malformed arguments. Unresolved supertypes or arguments yield
    /// [`MergeError::UnresolvedSymbol`].
    pub fn from_declaration(
        decl: &Declaration,
        universe: &dyn SymbolUniverse,
    ) -> Result<Option<Self>, MergeError> {
        let Some(kind) = validate::merge_kind(decl)? else {
            return Ok(None);
        };
        validate::check_merge_target(decl, kind)?;

        if let Some(TypeRef::Error { error }) = decl.unresolved_supertype() {
            return Err(MergeError::UnresolvedSymbol {
                declaration: decl.name.clone(),
                reference: error.clone(),
            });
        }

        let arg = |e| MergeError::argument(&decl.name, e);
        let mut target = Self {
            origin: decl.name.clone(),
            kind,
            scopes: Vec::new(),
            includes: Vec::new(),
            exclude: Vec::new(),
            dependencies: Vec::new(),
            subcomponents: Vec::new(),
            creator: None,
            supertypes: decl.resolved_supertypes().cloned().collect(),
            contributes_to: Vec::new(),
            is_interface: decl.is_interface(),
            synthesized: false,
        };
        for annotation in decl.annotations_named(kind.merge_annotation()) {
            target.scopes.push(annotation.scope().map_err(arg)?.clone());
            if kind.merges_modules() {
                extend_unique(&mut target.includes, annotation.class_array_arg("modules").map_err(arg)?);
            }
            extend_unique(&mut target.exclude, annotation.class_array_arg("exclude").map_err(arg)?);
            match kind {
                TargetKind::Component => extend_unique(
                    &mut target.dependencies,
                    annotation.class_array_arg("dependencies").map_err(arg)?,
                ),
                TargetKind::ModuleAggregate => extend_unique(
                    &mut target.subcomponents,
                    annotation.class_array_arg("subcomponents").map_err(arg)?,
                ),
                TargetKind::Subcomponent | TargetKind::InterfaceAggregate => {}
            }
        }
        for annotation in decl.annotations_named(known::CONTRIBUTES_TO) {
            let scope = annotation.scope().map_err(arg)?;
            if !target.contributes_to.contains(scope) {
                target.contributes_to.push(scope.clone());
            }
        }
        if matches!(kind, TargetKind::Component | TargetKind::Subcomponent) {
            target.creator = Creator::find(&decl.name, universe)?;
        }
        Ok(Some(target))
    }

    /// A merge target for a subcomponent generated under a parent trigger.
    #[must_use]
    pub fn generated_subcomponent(
        name: ClassName,
        scope: ClassName,
        modules: Vec<ClassName>,
        exclude: Vec<ClassName>,
        contribution: ClassName,
    ) -> Self {
        Self {
            origin: name,
            kind: TargetKind::Subcomponent,
            scopes: vec![scope],
            includes: modules,
            exclude,
            dependencies: Vec::new(),
            subcomponents: Vec::new(),
            creator: None,
            supertypes: vec![contribution],
            contributes_to: Vec::new(),
            is_interface: true,
            synthesized: true,
        }
    }

    /// Returns `true` if `scope` is one of the merged scopes.
    #[must_use]
    pub fn merges_scope(&self, scope: &ClassName) -> bool {
        self.scopes.contains(scope)
    }
}

fn extend_unique(into: &mut Vec<ClassName>, items: Vec<ClassName>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
