//! Cross-round caches.
//!
//! [`RoundContext`] owns every cache the engine keeps between rounds of one
//! compilation. It is passed by `&mut` to whoever needs it and cleared with
//! [`RoundContext::reset`] when a new compilation starts.

use crate::error::MergeError;
use crate::model::{ClassName, SymbolUniverse};
use crate::scan::{CacheStats, RecordingCache, ScanCache};

use super::subcomponent::{FactoryClass, ParentInterface};

/// Caches and counters of the current compilation.
#[derive(Clone, Debug)]
pub struct RoundContext {
    generation: u64,
    round: u32,
    scan: ScanCache,
    factories: RecordingCache<ClassName, Option<FactoryClass>>,
    parent_components: RecordingCache<(ClassName, ClassName), Option<ParentInterface>>,
}

impl Default for RoundContext {
    fn default() -> Self {
        Self {
            generation: 0,
            round: 0,
            scan: ScanCache::default(),
            factories: RecordingCache::new("factories"),
            parent_components: RecordingCache::new("parent_components"),
        }
    }
}

impl RoundContext {
    /// A context for a fresh compilation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the next round: bump the generation and warm the hint registry
    /// from `universe`. Returns the new round number, starting at 1.
    ///
    /// # Errors
    /// Returns [`MergeError::MalformedHint`] for incomplete hint groups.
    pub fn begin_round(
        &mut self,
        universe: &dyn SymbolUniverse,
        namespace: &str,
    ) -> Result<u32, MergeError> {
        self.generation += 1;
        self.round += 1;
        self.scan.begin_round(self.generation, universe, namespace)?;
        Ok(self.round)
    }

    /// Finish the round and report the counters of every cache. They are
    /// logged at `info` when `verbose` is set, at `debug` otherwise.
    #[must_use]
    pub fn end_round(&self, verbose: bool) -> [CacheStats; 3] {
        let stats = [
            self.scan.end_round(),
            self.factories.stats(),
            self.parent_components.stats(),
        ];
        for stat in &stats {
            if verbose {
                tracing::info!(round = self.round, "{stat}");
            } else {
                tracing::debug!(round = self.round, "{stat}");
            }
        }
        stats
    }

    /// Forget everything. The next round is round 1 again.
    pub fn reset(&mut self) {
        self.generation = 0;
        self.round = 0;
        self.scan.reset();
        self.factories.clear();
        self.parent_components.clear();
    }

    /// Current round number; 0 before the first round.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Current cache generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The contribution scan cache.
    pub const fn scan(&mut self) -> &mut ScanCache {
        &mut self.scan
    }

    /// Factory lookups keyed by contributed subcomponent.
    pub const fn factories(&mut self) -> &mut RecordingCache<ClassName, Option<FactoryClass>> {
        &mut self.factories
    }

    /// Parent-component lookups keyed by contributed subcomponent and parent scope.
    pub const fn parent_components(
        &mut self,
    ) -> &mut RecordingCache<(ClassName, ClassName), Option<ParentInterface>> {
        &mut self.parent_components
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
