//! Binding conflict resolution.
//!
//! Contributed bindings are grouped by [`BindingKey`]. Within a group every
//! multibinding element survives; of the single bindings only the one with
//! the highest rank does. Two distinct origins tied at the highest rank are an
//! error; there is no tie-break beyond rank.

use std::collections::BTreeMap;

use crate::error::MergeError;
use crate::model::ClassName;
use crate::scan::Contribution;

/// A binding slot: scope, bound type and qualifier fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingKey {
    /// The scope bound into.
    pub scope: ClassName,
    /// The bound type.
    pub bound_type: ClassName,
    /// Qualifier fingerprint, `None` when unqualified.
    pub qualifier: Option<String>,
}

impl BindingKey {
    /// The key a binding contribution occupies, `None` for other kinds.
    #[must_use]
    pub fn of(contribution: &Contribution) -> Option<Self> {
        let spec = contribution.kind.binding()?;
        Some(Self {
            scope: contribution.scope.clone(),
            bound_type: spec.bound_type.clone(),
            qualifier: spec.qualifier.clone(),
        })
    }
}

/// Binding contributions grouped `scope → key → contributions`.
///
/// Groups keep discovery order; keys and scopes iterate in sorted order.
#[derive(Clone, Debug, Default)]
pub struct ContributedBindings {
    groups: BTreeMap<ClassName, BTreeMap<BindingKey, Vec<Contribution>>>,
}

impl ContributedBindings {
    /// Group the binding contributions of `contributions`; other kinds are
    /// ignored.
    #[must_use]
    pub fn from_contributions(contributions: impl IntoIterator<Item = Contribution>) -> Self {
        let mut groups: BTreeMap<ClassName, BTreeMap<BindingKey, Vec<Contribution>>> =
            BTreeMap::new();
        for contribution in contributions {
            let Some(key) = BindingKey::of(&contribution) else {
                continue;
            };
            groups
                .entry(key.scope.clone())
                .or_default()
                .entry(key)
                .or_default()
                .push(contribution);
        }
        Self { groups }
    }

    /// The groups of one scope.
    pub fn groups(&self, scope: &ClassName) -> impl Iterator<Item = (&BindingKey, &[Contribution])> {
        self.groups
            .get(scope)
            .into_iter()
            .flat_map(|keys| keys.iter().map(|(k, v)| (k, v.as_slice())))
    }

    /// Number of binding keys across all scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if there are no binding contributions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Resolve every group, scope by scope and key by key.
    ///
    /// # Errors
    /// Returns [`MergeError::AmbiguousBinding`] for the first group with a tie.
    pub fn resolve_all(&self) -> Result<Vec<Contribution>, MergeError> {
        let mut out = Vec::new();
        for keys in self.groups.values() {
            for group in keys.values() {
                out.extend(resolve(group)?);
            }
        }
        Ok(out)
    }
}

/// Resolve one binding group.
///
/// Multibinding elements pass through. With fewer than two single bindings
/// the group is returned unchanged; otherwise only the first contribution of
/// the highest-ranked origin is kept. Output preserves input order.
///
/// # Errors
/// Returns [`MergeError::AmbiguousBinding`] if more than one distinct origin
/// shares the highest rank.
pub fn resolve(group: &[Contribution]) -> Result<Vec<Contribution>, MergeError> {
    let singles: Vec<&Contribution> = group
        .iter()
        .filter(|c| c.kind.binding().is_some() && !c.kind.is_multibinding())
        .collect();
    if singles.len() < 2 {
        return Ok(group.to_vec());
    }

    let Some(winner) = find_highest_rank(&singles)? else {
        return Ok(group.to_vec());
    };
    let mut kept_winner = false;
    Ok(group
        .iter()
        .filter(|c| {
            if c.kind.is_multibinding() {
                return true;
            }
            if !kept_winner && std::ptr::eq(*c, winner) {
                kept_winner = true;
                return true;
            }
            false
        })
        .cloned()
        .collect())
}

fn rank_of(contribution: &Contribution) -> i32 {
    contribution
        .kind
        .binding()
        .map_or(crate::model::known::RANK_NORMAL, |spec| spec.rank)
}

fn find_highest_rank<'a>(
    singles: &[&'a Contribution],
) -> Result<Option<&'a Contribution>, MergeError> {
    let Some(top) = singles.iter().map(|c| rank_of(c)).max() else {
        return Ok(None);
    };
    let mut origins: Vec<ClassName> = Vec::new();
    let mut first: Option<&'a Contribution> = None;
    for candidate in singles.iter().copied().filter(|c| rank_of(c) == top) {
        if first.is_none() {
            first = Some(candidate);
        }
        if !origins.contains(&candidate.origin) {
            origins.push(candidate.origin.clone());
        }
    }
    if origins.len() > 1 {
        let bound_type = first
            .and_then(|c| c.kind.binding())
            .map(|spec| spec.bound_type.clone())
            .unwrap_or_else(|| origins[0].clone());
        return Err(MergeError::AmbiguousBinding {
            bound_type,
            rank: top,
            origins,
        });
    }
    Ok(first)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Visibility;
    use crate::model::known::RANK_NORMAL;
    use crate::scan::{BindingSpec, ContributionKind};

    fn cn(s: &str) -> ClassName {
        ClassName::parse(s).unwrap()
    }

    fn binding(origin: &str, rank: i32, multi: bool, qualifier: Option<&str>) -> Contribution {
        let spec = BindingSpec {
            bound_type: cn("com.example.Repo"),
            qualifier: qualifier.map(str::to_owned),
            rank,
            module: cn(&format!("{origin}BindingModule")),
            bound_type_parameters: Vec::new(),
        };
        Contribution {
            origin: cn(origin),
            scope: cn("com.example.AppScope"),
            kind: if multi {
                ContributionKind::Multibinding(spec)
            } else {
                ContributionKind::Binding(spec)
            },
            replaces: Vec::new(),
            visibility: Visibility::Public,
            type_parameters: Vec::new(),
            precompiled: false,
        }
    }

    fn origins(list: &[Contribution]) -> Vec<String> {
        list.iter().map(|c| c.origin.canonical()).collect()
    }

    #[test]
    fn higher_rank_wins() {
        let group = vec![
            binding("com.example.Low", 5, false, None),
            binding("com.example.High", 10, false, None),
        ];
        assert_eq!(origins(&resolve(&group).unwrap()), vec!["com.example.High"]);
    }

    #[test]
    fn equal_rank_distinct_origins_is_ambiguous() {
        let group = vec![
            binding("com.example.RepoA", 10, false, None),
            binding("com.example.RepoB", 10, false, None),
        ];
        let err = resolve(&group).unwrap_err();
        assert_eq!(
            err,
            MergeError::AmbiguousBinding {
                bound_type: cn("com.example.Repo"),
                rank: 10,
                origins: vec![cn("com.example.RepoA"), cn("com.example.RepoB")],
            }
        );
    }

    #[test]
    fn same_origin_twice_is_not_ambiguous() {
        let group = vec![
            binding("com.example.RepoA", RANK_NORMAL, false, None),
            binding("com.example.RepoA", RANK_NORMAL, false, None),
        ];
        assert_eq!(origins(&resolve(&group).unwrap()), vec!["com.example.RepoA"]);
    }

    #[test]
    fn multibindings_are_never_deduplicated() {
        let group = vec![
            binding("com.example.A", RANK_NORMAL, true, None),
            binding("com.example.B", RANK_NORMAL, true, None),
            binding("com.example.Single", RANK_NORMAL, false, None),
            binding("com.example.Other", 3, false, None),
        ];
        assert_eq!(
            origins(&resolve(&group).unwrap()),
            vec!["com.example.A", "com.example.B", "com.example.Other"]
        );
    }

    #[test]
    fn lone_single_binding_passes_through() {
        let group = vec![binding("com.example.Only", RANK_NORMAL, false, None)];
        assert_eq!(resolve(&group).unwrap(), group);
    }

    #[test]
    fn qualifiers_split_groups() {
        let bindings = ContributedBindings::from_contributions([
            binding("com.example.A", RANK_NORMAL, false, Some("com.example.Named(value=\"a\")")),
            binding("com.example.B", RANK_NORMAL, false, Some("com.example.Named(value=\"b\")")),
        ]);
        assert_eq!(bindings.len(), 2);
        let resolved = bindings.resolve_all().unwrap();
        assert_eq!(origins(&resolved), vec!["com.example.A", "com.example.B"]);
    }

    #[test]
    fn non_binding_contributions_are_ignored() {
        let mut module = binding("com.example.M", RANK_NORMAL, false, None);
        module.kind = ContributionKind::Module;
        let bindings = ContributedBindings::from_contributions([module]);
        assert!(bindings.is_empty());
        assert_eq!(bindings.groups(&cn("com.example.AppScope")).count(), 0);
    }
}
