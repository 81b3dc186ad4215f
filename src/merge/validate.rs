//! Static checks on merge targets and contributed declarations.
//!
//! These run before any merge work and do not depend on what else is
//! contributed: one merge annotation kind per class, distinct scopes, no
//! hand-written DI annotation where one will be generated, and no repeated
//! contribution of the same declaration to the same slot.

use crate::error::MergeError;
use crate::model::{ClassName, Declaration};
use crate::scan::{Contribution, ContributionKind};

use super::target::TargetKind;

// ---------------------------------------------------------------------------
// Merge targets
// ---------------------------------------------------------------------------

/// The kind of merge `decl` requests, if any.
///
/// # Errors
/// Returns [`MergeError::InvalidMergeTarget`] if more than one kind of merge
/// annotation is present. Repeating the same annotation is allowed.
pub fn merge_kind(decl: &Declaration) -> Result<Option<TargetKind>, MergeError> {
    let kinds: Vec<TargetKind> = TargetKind::ALL
        .into_iter()
        .filter(|kind| decl.has_annotation(kind.merge_annotation()))
        .collect();
    match kinds.as_slice() {
        [] => Ok(None),
        [kind] => Ok(Some(*kind)),
        _ => {
            let names: Vec<&str> = kinds.iter().map(|k| k.annotation_simple_name()).collect();
            Err(MergeError::InvalidMergeTarget {
                declaration: decl.name.clone(),
                reason: format!(
                    "It's only allowed to have one single type of @Merge* annotation, however \
                     multiple instances of the same annotation are allowed. You mix [{}] and \
                     this is forbidden.",
                    names.join(", ")
                ),
            })
        }
    }
}

/// Check the shape of a merge target of `kind`.
///
/// # Errors
/// Returns [`MergeError::InvalidMergeTarget`] for repeated scopes, for a DI
/// annotation the merge will generate, for interface aggregates that are not
/// interfaces and for components that are not abstract.
pub fn check_merge_target(decl: &Declaration, kind: TargetKind) -> Result<(), MergeError> {
    let invalid = |reason: String| MergeError::InvalidMergeTarget {
        declaration: decl.name.clone(),
        reason,
    };

    let mut seen: Vec<&ClassName> = Vec::new();
    let mut repeated: Vec<ClassName> = Vec::new();
    for annotation in decl.annotations_named(kind.merge_annotation()) {
        // Unreadable scopes are reported when the target is built.
        let Ok(scope) = annotation.scope() else {
            continue;
        };
        if seen.contains(&scope) {
            if !repeated.contains(scope) {
                repeated.push(scope.clone());
            }
        } else {
            seen.push(scope);
        }
    }
    if !repeated.is_empty() {
        let names: Vec<&str> = repeated.iter().map(ClassName::simple_name).collect();
        return Err(invalid(format!(
            "merges multiple times to the same scope: [{}]. Merging multiple times to the same \
             scope is forbidden and all scopes must be distinct.",
            names.join(", ")
        )));
    }

    if let Some(di) = kind.di_annotation()
        && decl.has_annotation(di)
    {
        return Err(invalid(format!(
            "When using @{} it's not allowed to annotate the same class with @{}. The DI \
             annotation will be generated.",
            kind.annotation_simple_name(),
            di.rsplit('.').next().unwrap_or(di)
        )));
    }

    match kind {
        TargetKind::InterfaceAggregate if !decl.is_interface() => Err(invalid(
            "is annotated with @MergeInterfaces, but classes that merge interfaces must be \
             interfaces."
                .to_owned(),
        )),
        TargetKind::Component | TargetKind::Subcomponent if !decl.is_abstract() => {
            Err(invalid(format!(
                "is annotated with @{}, but only interfaces and abstract classes can be merged \
                 into.",
                kind.annotation_simple_name()
            )))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Contributions
// ---------------------------------------------------------------------------

/// Reject repeated contributions of one declaration.
///
/// `contributions` are all records decoded from one declaration. Modules and
/// interfaces may be contributed to a scope once; bindings and multibindings
/// once per `(scope, bound type)` each.
///
/// # Errors
/// Returns [`MergeError::DuplicateContribution`].
pub fn check_contributions(
    declaration: &ClassName,
    contributions: &[Contribution],
) -> Result<(), MergeError> {
    let mut scopes: Vec<&ClassName> = Vec::new();
    let mut repeated_scopes: Vec<ClassName> = Vec::new();
    let mut slots: Vec<(bool, &ClassName, &ClassName)> = Vec::new();
    let mut repeated_bound: Vec<ClassName> = Vec::new();

    for contribution in contributions {
        match &contribution.kind {
            ContributionKind::Module | ContributionKind::Interface => {
                if scopes.contains(&&contribution.scope) {
                    if !repeated_scopes.contains(&contribution.scope) {
                        repeated_scopes.push(contribution.scope.clone());
                    }
                } else {
                    scopes.push(&contribution.scope);
                }
            }
            ContributionKind::Binding(spec) | ContributionKind::Multibinding(spec) => {
                let slot = (
                    contribution.kind.is_multibinding(),
                    &contribution.scope,
                    &spec.bound_type,
                );
                if slots.contains(&slot) {
                    if !repeated_bound.contains(&spec.bound_type) {
                        repeated_bound.push(spec.bound_type.clone());
                    }
                } else {
                    slots.push(slot);
                }
            }
            ContributionKind::Subcomponent(_) => {}
        }
    }

    if !repeated_scopes.is_empty() {
        return Err(MergeError::DuplicateContribution {
            declaration: declaration.clone(),
            scopes: repeated_scopes,
            bound_types: Vec::new(),
        });
    }
    if !repeated_bound.is_empty() {
        let scopes = slots
            .iter()
            .filter(|(_, _, bound)| repeated_bound.contains(bound))
            .map(|(_, scope, _)| (*scope).clone())
            .fold(Vec::new(), |mut acc: Vec<ClassName>, scope| {
                if !acc.contains(&scope) {
                    acc.push(scope);
                }
                acc
            });
        return Err(MergeError::DuplicateContribution {
            declaration: declaration.clone(),
            scopes,
            bound_types: repeated_bound,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Annotation, AnnotationValue, DeclarationKind, Visibility, known};
    use crate::scan::BindingSpec;

    fn cn(s: &str) -> ClassName {
        ClassName::parse(s).unwrap()
    }

    fn merge(fq: &str, scope: &str) -> Annotation {
        Annotation::new(cn(fq)).with("scope", AnnotationValue::Class(cn(scope)))
    }

    fn target(kind: DeclarationKind, annotations: Vec<Annotation>) -> Declaration {
        let mut d = Declaration::new(cn("com.example.AppComponent"), kind);
        d.annotations = annotations;
        d
    }

    fn contribution(scope: &str, kind: ContributionKind) -> Contribution {
        Contribution {
            origin: cn("com.example.Impl"),
            scope: cn(scope),
            kind,
            replaces: Vec::new(),
            visibility: Visibility::Public,
            type_parameters: Vec::new(),
            precompiled: false,
        }
    }

    fn binding(bound: &str) -> ContributionKind {
        ContributionKind::Binding(BindingSpec {
            bound_type: cn(bound),
            qualifier: None,
            rank: known::RANK_NORMAL,
            module: cn("com.example.ImplModule"),
            bound_type_parameters: Vec::new(),
        })
    }

    #[test]
    fn mixing_merge_annotations_is_rejected() {
        let decl = target(
            DeclarationKind::Interface,
            vec![
                merge(known::MERGE_COMPONENT, "com.example.AppScope"),
                merge(known::MERGE_MODULES, "com.example.AppScope"),
            ],
        );
        let err = merge_kind(&decl).unwrap_err();
        assert!(
            err.to_string().contains("You mix [MergeComponent, MergeModules]"),
            "{err}"
        );
    }

    #[test]
    fn repeated_annotation_with_distinct_scopes_is_fine() {
        let decl = target(
            DeclarationKind::Interface,
            vec![
                merge(known::MERGE_COMPONENT, "com.example.AppScope"),
                merge(known::MERGE_COMPONENT, "com.example.UserScope"),
            ],
        );
        assert_eq!(merge_kind(&decl).unwrap(), Some(TargetKind::Component));
        check_merge_target(&decl, TargetKind::Component).unwrap();
    }

    #[test]
    fn repeated_scope_is_rejected() {
        let decl = target(
            DeclarationKind::Interface,
            vec![
                merge(known::MERGE_COMPONENT, "com.example.AppScope"),
                merge(known::MERGE_COMPONENT, "com.example.AppScope"),
            ],
        );
        let err = check_merge_target(&decl, TargetKind::Component).unwrap_err();
        assert!(err.to_string().contains("same scope: [AppScope]"), "{err}");
    }

    #[test]
    fn generated_di_annotation_must_not_be_present() {
        let decl = target(
            DeclarationKind::Interface,
            vec![
                merge(known::MERGE_COMPONENT, "com.example.AppScope"),
                Annotation::new(cn(known::COMPONENT)),
            ],
        );
        let err = check_merge_target(&decl, TargetKind::Component).unwrap_err();
        assert!(
            err.to_string()
                .contains("When using @MergeComponent it's not allowed to annotate the same class with @Component"),
            "{err}"
        );
    }

    #[test]
    fn interface_aggregate_must_be_interface() {
        let decl = target(
            DeclarationKind::AbstractClass,
            vec![merge(known::MERGE_INTERFACES, "com.example.AppScope")],
        );
        assert!(check_merge_target(&decl, TargetKind::InterfaceAggregate).is_err());
    }

    #[test]
    fn module_contributed_twice_to_scope_is_rejected() {
        let list = vec![
            contribution("com.example.AppScope", ContributionKind::Module),
            contribution("com.example.AppScope", ContributionKind::Module),
        ];
        let err = check_contributions(&cn("com.example.Impl"), &list).unwrap_err();
        assert!(err.to_string().contains("contributes multiple times to the same scope: [AppScope]"));
    }

    #[test]
    fn binding_twice_with_same_bound_type_is_rejected() {
        let list = vec![
            contribution("com.example.AppScope", binding("com.example.Api")),
            contribution("com.example.AppScope", binding("com.example.Api")),
        ];
        let err = check_contributions(&cn("com.example.Impl"), &list).unwrap_err();
        assert!(err.to_string().contains("using the same bound type: [Api]"), "{err}");
    }

    #[test]
    fn binding_to_two_scopes_is_fine() {
        let list = vec![
            contribution("com.example.AppScope", binding("com.example.Api")),
            contribution("com.example.UserScope", binding("com.example.Api")),
            contribution("com.example.AppScope", binding("com.example.OtherApi")),
        ];
        check_contributions(&cn("com.example.Impl"), &list).unwrap();
    }
}
