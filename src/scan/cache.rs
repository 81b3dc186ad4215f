//! Round-scoped scan caches.
//!
//! Hint groups are decoded once per round when the round begins. Filtered
//! contribution lists are cached per `(kind, scope, generation)`; entries from
//! older generations are dropped at the start of each round because the
//! symbol universe has changed under them. Nothing here survives
//! [`ScanCache::reset`], which the engine calls at compilation boundaries.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::MergeError;
use crate::model::{ClassName, SymbolUniverse};

use super::hint::{self, HintRecord};
use super::index::{Contribution, ContributionAnnotation};

// ---------------------------------------------------------------------------
// RecordingCache
// ---------------------------------------------------------------------------

/// Hit and miss counters of one cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Cache label.
    pub name: &'static str,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to compute.
    pub misses: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} hit(s), {} miss(es)", self.name, self.hits, self.misses)
    }
}

/// A `BTreeMap` that counts how often lookups hit.
#[derive(Clone, Debug)]
pub struct RecordingCache<K, V> {
    name: &'static str,
    entries: BTreeMap<K, V>,
    hits: u64,
    misses: u64,
}

impl<K: Ord, V> RecordingCache<K, V> {
    /// An empty cache with a label for its statistics.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: BTreeMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up `key`, counting the result as a hit or a miss.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let found = self.entries.get(key);
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Store a value.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Returns `true` if `key` is cached. Not counted.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Keep only the entries matching `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.entries.retain(|k, _| keep(k));
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters since the last [`RecordingCache::clear`].
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name,
            hits: self.hits,
            misses: self.misses,
        }
    }
}

// ---------------------------------------------------------------------------
// ScanCache
// ---------------------------------------------------------------------------

/// Key of a cached contribution list.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContributionKey {
    /// Contribution annotation queried.
    pub kind: ContributionAnnotation,
    /// Scope filter, `None` for all scopes.
    pub scope: Option<ClassName>,
    /// Round generation the list was computed in.
    pub generation: u64,
}

/// Caches shared by every contribution query of a compilation.
#[derive(Clone, Debug)]
pub struct ScanCache {
    generation: u64,
    hints: Vec<HintRecord>,
    contributions: RecordingCache<ContributionKey, Vec<Contribution>>,
    external: BTreeSet<ClassName>,
}

impl Default for ScanCache {
    fn default() -> Self {
        Self {
            generation: 0,
            hints: Vec::new(),
            contributions: RecordingCache::new("contributions"),
            external: BTreeSet::new(),
        }
    }
}

impl ScanCache {
    /// Warm the hint groups for a new round.
    ///
    /// # Errors
    /// Returns [`MergeError::MalformedHint`] if a hint group is incomplete.
    pub fn begin_round(
        &mut self,
        generation: u64,
        universe: &dyn SymbolUniverse,
        namespace: &str,
    ) -> Result<(), MergeError> {
        self.generation = generation;
        self.contributions.retain(|key| key.generation == generation);
        self.hints = hint::decode(universe.hint_properties(namespace))?;
        tracing::debug!(
            generation,
            hint_groups = self.hints.len(),
            "warmed hint registry"
        );
        Ok(())
    }

    /// Finish a round and report the cache counters.
    pub fn end_round(&self) -> CacheStats {
        self.contributions.stats()
    }

    /// Drop all cached state, including the external contribution set.
    pub fn reset(&mut self) {
        self.generation = 0;
        self.hints.clear();
        self.contributions.clear();
        self.external.clear();
    }

    /// The current round generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Hint groups decoded at the start of the round.
    #[must_use]
    pub fn hint_records(&self) -> &[HintRecord] {
        &self.hints
    }

    /// Cached list for `kind` and `scope` in the current generation.
    pub fn cached(
        &mut self,
        kind: ContributionAnnotation,
        scope: Option<&ClassName>,
    ) -> Option<Vec<Contribution>> {
        let key = self.key(kind, scope);
        self.contributions.get(&key).cloned()
    }

    /// Store a computed list for `kind` and `scope`.
    pub fn store(
        &mut self,
        kind: ContributionAnnotation,
        scope: Option<&ClassName>,
        contributions: Vec<Contribution>,
    ) {
        let key = self.key(kind, scope);
        self.contributions.insert(key, contributions);
    }

    /// Record a precompiled contributed declaration.
    pub fn mark_external(&mut self, name: ClassName) {
        self.external.insert(name);
    }

    /// Returns `true` if `name` was contributed from precompiled code.
    #[must_use]
    pub fn is_external(&self, name: &ClassName) -> bool {
        self.external.contains(name)
    }

    /// Every precompiled contributed declaration seen so far.
    #[must_use]
    pub const fn external(&self) -> &BTreeSet<ClassName> {
        &self.external
    }

    fn key(&self, kind: ContributionAnnotation, scope: Option<&ClassName>) -> ContributionKey {
        ContributionKey {
            kind,
            scope: scope.cloned(),
            generation: self.generation,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
