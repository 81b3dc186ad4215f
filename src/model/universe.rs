//! The symbol universe the engine reads each round.
//!
//! The host owns resolution. [`SymbolUniverse`] is the narrow view the engine
//! needs: declaration lookup, the hint namespace, and the symbols that became
//! visible this round. [`SymbolTable`] is the in-memory implementation used by
//! the fixture driver and tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::declaration::{Declaration, Origin};
use super::name::{ClassName, TypeRef};

// ---------------------------------------------------------------------------
// HintProperty
// ---------------------------------------------------------------------------

/// A top-level marker property in a hint namespace.
///
/// The property name carries the role (`<base>_reference`, `<base>_scope<N>`),
/// the value is the class it points at.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HintProperty {
    /// The namespace (package) the property lives in.
    pub package: String,
    /// The property's simple name.
    pub name: String,
    /// The class referenced by the property.
    pub value: TypeRef,
}

// ---------------------------------------------------------------------------
// SymbolUniverse
// ---------------------------------------------------------------------------

/// Read-only view of the host's symbols for one round.
pub trait SymbolUniverse {
    /// Look up a declaration by name.
    fn declaration(&self, name: &ClassName) -> Option<&Declaration>;

    /// Declarations nested directly inside `name`, in name order.
    fn nested_declarations(&self, name: &ClassName) -> Vec<&Declaration>;

    /// Every hint property in `namespace`.
    fn hint_properties(&self, namespace: &str) -> Vec<&HintProperty>;

    /// Source declarations the host offers this round: new symbols plus
    /// symbols deferred from the previous round.
    fn round_symbols(&self) -> Vec<&Declaration>;

    /// Round symbols carrying an annotation of class `fq_name`.
    fn annotated_in_round(&self, fq_name: &str) -> Vec<&Declaration> {
        self.round_symbols()
            .into_iter()
            .filter(|decl| decl.has_annotation(fq_name))
            .collect()
    }

    /// Transitive supertypes of `decl`, nearest first. A supertype without a
    /// visible declaration ends its branch.
    ///
    /// # Errors
    /// Returns the text of the first unresolved supertype reference.
    fn supertype_closure(&self, decl: &Declaration) -> Result<Vec<ClassName>, String> {
        let mut seen: Vec<ClassName> = Vec::new();
        let mut queue: VecDeque<&Declaration> = VecDeque::from([decl]);
        while let Some(current) = queue.pop_front() {
            for supertype in &current.supertypes {
                let name = match supertype {
                    TypeRef::Resolved(name) => name,
                    TypeRef::Error { error } => return Err(error.clone()),
                };
                if *name == decl.name || seen.contains(name) {
                    continue;
                }
                seen.push(name.clone());
                if let Some(next) = self.declaration(name) {
                    queue.push_back(next);
                }
            }
        }
        Ok(seen)
    }
}

// ---------------------------------------------------------------------------
// SymbolTable
// ---------------------------------------------------------------------------

/// In-memory symbol universe.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    declarations: BTreeMap<ClassName, Declaration>,
    hints: BTreeSet<HintProperty>,
    round: BTreeSet<ClassName>,
}

impl SymbolTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a declaration. Returns the previous one, if any.
    pub fn insert(&mut self, decl: Declaration) -> Option<Declaration> {
        self.declarations.insert(decl.name.clone(), decl)
    }

    /// Add a declaration as precompiled library code.
    pub fn insert_library(&mut self, mut decl: Declaration) -> Option<Declaration> {
        decl.origin = Origin::Library;
        self.insert(decl)
    }

    /// Add hint properties. Returns how many were new.
    pub fn add_hints(&mut self, hints: impl IntoIterator<Item = HintProperty>) -> usize {
        hints
            .into_iter()
            .filter(|hint| self.hints.insert(hint.clone()))
            .count()
    }

    /// Replace the set of symbols offered this round.
    ///
    /// Names without a declaration are ignored by [`SymbolUniverse::round_symbols`].
    pub fn set_round(&mut self, names: impl IntoIterator<Item = ClassName>) {
        self.round = names.into_iter().collect();
    }

    /// Number of declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Returns `true` if the table has no declarations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

impl SymbolUniverse for SymbolTable {
    fn declaration(&self, name: &ClassName) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    fn nested_declarations(&self, name: &ClassName) -> Vec<&Declaration> {
        self.declarations
            .values()
            .filter(|decl| decl.name.enclosing().as_ref() == Some(name))
            .collect()
    }

    fn hint_properties(&self, namespace: &str) -> Vec<&HintProperty> {
        self.hints
            .iter()
            .filter(|hint| hint.package == namespace)
            .collect()
    }

    fn round_symbols(&self) -> Vec<&Declaration> {
        self.round
            .iter()
            .filter_map(|name| self.declarations.get(name))
            .collect()
    }
}
