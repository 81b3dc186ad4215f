//! Well-known annotation and generated-type names.

/// Contributes an interface or module to a scope.
pub const CONTRIBUTES_TO: &str = "graft.annotations.ContributesTo";
/// Contributes a single binding to a scope.
pub const CONTRIBUTES_BINDING: &str = "graft.annotations.ContributesBinding";
/// Contributes an element of a multibinding to a scope.
pub const CONTRIBUTES_MULTIBINDING: &str = "graft.annotations.ContributesMultibinding";
/// Contributes a subcomponent to a parent scope.
pub const CONTRIBUTES_SUBCOMPONENT: &str = "graft.annotations.ContributesSubcomponent";
/// Marks the factory nested in a contributed subcomponent.
pub const CONTRIBUTES_SUBCOMPONENT_FACTORY: &str =
    "graft.annotations.ContributesSubcomponent.Factory";
/// Legacy named priority enum of [`CONTRIBUTES_BINDING`].
pub const PRIORITY: &str = "graft.annotations.ContributesBinding.Priority";

/// Requests a merged component.
pub const MERGE_COMPONENT: &str = "graft.annotations.MergeComponent";
/// Requests a merged subcomponent.
pub const MERGE_SUBCOMPONENT: &str = "graft.annotations.MergeSubcomponent";
/// Requests a merged module aggregate.
pub const MERGE_MODULES: &str = "graft.annotations.MergeModules";
/// Requests a merged interface aggregate.
pub const MERGE_INTERFACES: &str = "graft.annotations.MergeInterfaces";

/// DI module.
pub const MODULE: &str = "graft.inject.Module";
/// DI component.
pub const COMPONENT: &str = "graft.inject.Component";
/// DI subcomponent.
pub const SUBCOMPONENT: &str = "graft.inject.Subcomponent";
/// DI qualifier meta-annotation.
pub const QUALIFIER: &str = "graft.inject.Qualifier";
/// DI scope meta-annotation.
pub const SCOPE: &str = "graft.inject.Scope";

/// Annotations marking a component factory nested in a merge target.
pub const FACTORY_MARKERS: &[&str] = &[
    "graft.inject.Component.Factory",
    "graft.inject.Subcomponent.Factory",
    "graft.annotations.MergeComponent.Factory",
    "graft.annotations.MergeSubcomponent.Factory",
];

/// Annotations marking a component builder nested in a merge target.
pub const BUILDER_MARKERS: &[&str] = &[
    "graft.inject.Component.Builder",
    "graft.inject.Subcomponent.Builder",
    "graft.annotations.MergeComponent.Builder",
    "graft.annotations.MergeSubcomponent.Builder",
];

/// Every merge annotation.
pub const MERGE_ANNOTATIONS: &[&str] = &[
    MERGE_COMPONENT,
    MERGE_SUBCOMPONENT,
    MERGE_MODULES,
    MERGE_INTERFACES,
];

/// Merge annotations that trigger contributed-subcomponent generation.
///
/// Module aggregates are left out: a component merging the same scope would
/// generate the subcomponent a second time.
pub const SUBCOMPONENT_TRIGGERS: &[&str] = &[MERGE_COMPONENT, MERGE_SUBCOMPONENT, MERGE_INTERFACES];

/// Contribution annotations whose generated hints only become visible in the
/// next round.
pub const DEFERRING_CONTRIBUTIONS: &[&str] = &[
    CONTRIBUTES_BINDING,
    CONTRIBUTES_MULTIBINDING,
    CONTRIBUTES_SUBCOMPONENT,
];

/// Inner type holding the parent-component accessor of a generated subcomponent.
pub const PARENT_COMPONENT: &str = "ParentComponent";
/// Inner factory type of a generated subcomponent.
pub const SUBCOMPONENT_FACTORY: &str = "SubcomponentFactory";
/// Inner module binding the generated subcomponent factory.
pub const SUBCOMPONENT_MODULE: &str = "SubcomponentModule";

/// Rank of bindings that do not declare one.
pub const RANK_NORMAL: i32 = i32::MIN;
/// Rank of the legacy `HIGH` priority.
pub const RANK_HIGH: i32 = 0;
/// Rank of the legacy `HIGHEST` priority.
pub const RANK_HIGHEST: i32 = i32::MAX;

/// Translate a legacy priority entry into its rank.
#[must_use]
pub fn legacy_priority_rank(entry: &str) -> Option<i32> {
    match entry {
        "NORMAL" => Some(RANK_NORMAL),
        "HIGH" => Some(RANK_HIGH),
        "HIGHEST" => Some(RANK_HIGHEST),
        _ => None,
    }
}

/// Prefix of the component class the DI runtime generates for a component.
pub const GENERATED_COMPONENT_PREFIX: &str = "Graft";
