//! Hint registry encoding.
//!
//! Each contributed declaration is advertised to later compilations by a group
//! of top-level properties in the hint namespace:
//!
//! ```text
//! com_example_Foo_reference: KClass<com.example.Foo>
//! com_example_Foo_scope0:    KClass<com.example.AppScope>
//! com_example_Foo_scope1:    KClass<com.example.LoggedInScope>
//! ```
//!
//! Older producers wrote a single unsuffixed `<base>_scope` property; both
//! forms decode the same way.

use std::collections::BTreeMap;

use crate::error::{HintDefect, MergeError};
use crate::model::{ClassName, Declaration, HintProperty, TypeRef, known};

const REFERENCE_SUFFIX: &str = "_reference";
const SCOPE_SUFFIX: &str = "_scope";

/// Contribution annotations that produce hints.
const HINTED: &[&str] = &[
    known::CONTRIBUTES_TO,
    known::CONTRIBUTES_BINDING,
    known::CONTRIBUTES_MULTIBINDING,
    known::CONTRIBUTES_SUBCOMPONENT,
];

/// One decoded hint group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HintRecord {
    /// Common property name prefix.
    pub base: String,
    /// The contributed declaration.
    pub reference: TypeRef,
    /// Every scope the declaration contributes to, in property-name order.
    pub scopes: Vec<TypeRef>,
}

impl HintRecord {
    /// Returns `true` if `scope` is one of the record's resolved scopes.
    #[must_use]
    pub fn has_scope(&self, scope: &ClassName) -> bool {
        self.scopes.iter().any(|s| s.resolved() == Some(scope))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Reference,
    /// Scope property with its index; the legacy unsuffixed form is index 0.
    Scope(u32),
}

fn classify(name: &str) -> Option<(&str, Role)> {
    if let Some(base) = name.strip_suffix(REFERENCE_SUFFIX) {
        return Some((base, Role::Reference));
    }
    let at = name.rfind(SCOPE_SUFFIX)?;
    let index = &name[at + SCOPE_SUFFIX.len()..];
    if index.is_empty() {
        return Some((&name[..at], Role::Scope(0)));
    }
    index.parse::<u32>().ok().map(|i| (&name[..at], Role::Scope(i)))
}

/// Group hint properties by base name and decode each group.
///
/// Properties that match neither role are ignored. Repeated reference
/// properties for the same base collapse into the first one.
///
/// # Errors
/// Returns [`MergeError::MalformedHint`] for a group without a reference or
/// without any scope.
pub fn decode<'a>(
    properties: impl IntoIterator<Item = &'a HintProperty>,
) -> Result<Vec<HintRecord>, MergeError> {
    #[derive(Default)]
    struct Group {
        reference: Option<TypeRef>,
        scopes: Vec<(u32, TypeRef)>,
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for property in properties {
        let Some((base, role)) = classify(&property.name) else {
            continue;
        };
        let group = groups.entry(base.to_owned()).or_default();
        match role {
            Role::Reference => {
                if group.reference.is_none() {
                    group.reference = Some(property.value.clone());
                }
            }
            Role::Scope(index) => group.scopes.push((index, property.value.clone())),
        }
    }

    groups
        .into_iter()
        .map(|(base, mut group)| {
            let Some(reference) = group.reference else {
                return Err(MergeError::MalformedHint {
                    base,
                    defect: HintDefect::MissingReference,
                });
            };
            if group.scopes.is_empty() {
                return Err(MergeError::MalformedHint {
                    base,
                    defect: HintDefect::MissingScope,
                });
            }
            group.scopes.sort_by_key(|(index, _)| *index);
            let mut scopes: Vec<TypeRef> = Vec::with_capacity(group.scopes.len());
            for (_, scope) in group.scopes {
                if !scopes.contains(&scope) {
                    scopes.push(scope);
                }
            }
            Ok(HintRecord {
                base,
                reference,
                scopes,
            })
        })
        .collect()
}

/// Base name for a declaration's hint group.
#[must_use]
pub fn base_name(name: &ClassName) -> String {
    name.canonical().replace('.', "_")
}

/// Hint properties advertising `decl`'s contributions, in indexed form.
///
/// Returns nothing for declarations without contribution annotations. Scopes
/// are read from `scope` (or `parentScope` for subcomponents); annotations
/// whose scope cannot be read are skipped.
#[must_use]
pub fn encode(decl: &Declaration, namespace: &str) -> Vec<HintProperty> {
    let mut scopes: Vec<ClassName> = Vec::new();
    for annotation in &decl.annotations {
        if !HINTED.iter().any(|fq| annotation.is(fq)) {
            continue;
        }
        let scope = if annotation.is(known::CONTRIBUTES_SUBCOMPONENT) {
            annotation.required_class_arg("parentScope")
        } else {
            annotation.scope()
        };
        if let Ok(scope) = scope
            && !scopes.contains(scope)
        {
            scopes.push(scope.clone());
        }
    }
    if scopes.is_empty() {
        return Vec::new();
    }

    let base = base_name(&decl.name);
    let mut properties = Vec::with_capacity(scopes.len() + 1);
    properties.push(HintProperty {
        package: namespace.to_owned(),
        name: format!("{base}{REFERENCE_SUFFIX}"),
        value: TypeRef::Resolved(decl.name.clone()),
    });
    for (i, scope) in scopes.into_iter().enumerate() {
        properties.push(HintProperty {
            package: namespace.to_owned(),
            name: format!("{base}{SCOPE_SUFFIX}{i}"),
            value: TypeRef::Resolved(scope),
        });
    }
    properties
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
