//! Engine facade.
//!
//! [`Engine`] bundles the configuration, the cross-round caches and the round
//! scheduler of one compilation. The host calls [`Engine::process`] once per
//! round and emits the returned requests.

use crate::config::GraftConfig;
use crate::error::MergeError;
use crate::identity::IdentityGenerator;
use crate::model::{ClassName, SymbolUniverse};
use crate::round::{RoundContext, RoundScheduler, TargetState};
use crate::scan::ContributionIndex;

pub use crate::round::{GenerationRequest, RoundOutput};

/// The contribution merge engine of one compilation.
#[derive(Clone, Debug)]
pub struct Engine {
    config: GraftConfig,
    context: RoundContext,
    scheduler: RoundScheduler,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(GraftConfig::default())
    }
}

impl Engine {
    /// An engine with the given configuration.
    #[must_use]
    pub fn new(config: GraftConfig) -> Self {
        let identity = IdentityGenerator::new(config.identity.clone());
        let index = ContributionIndex::new(config.scan.hint_namespace.clone(), identity);
        let scheduler = RoundScheduler::new(index, &config.rounds);
        Self {
            config,
            context: RoundContext::new(),
            scheduler,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &GraftConfig {
        &self.config
    }

    /// Process one round.
    ///
    /// # Errors
    /// Returns the first fatal [`MergeError`] of the round. Unresolved symbols
    /// defer instead; see [`RoundOutput::deferred`].
    pub fn process(&mut self, universe: &dyn SymbolUniverse) -> Result<RoundOutput, MergeError> {
        let span = tracing::info_span!("round", round = self.context.round() + 1);
        let _guard = span.enter();
        let output = self.scheduler.run_round(&mut self.context, universe)?;
        tracing::info!(
            requests = output.requests.len(),
            deferred = output.deferred.len(),
            "round processed"
        );
        Ok(output)
    }

    /// Rounds processed since the last reset.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.context.round()
    }

    /// Lifecycle state of a merge target.
    #[must_use]
    pub fn state(&self, target: &ClassName) -> TargetState {
        self.scheduler.state(target)
    }

    /// Returns `true` if generated subcomponents still wait for a round that
    /// does not defer.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        self.scheduler.pending_targets().next().is_some()
    }

    /// Generated subcomponents waiting to be merged.
    pub fn pending_targets(&self) -> impl Iterator<Item = ClassName> + '_ {
        self.scheduler.pending_targets().cloned()
    }

    /// Start a new compilation: drop all caches and target state.
    pub fn reset(&mut self) {
        tracing::debug!(rounds = self.context.round(), "resetting engine");
        self.context.reset();
        self.scheduler.reset();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Annotation, AnnotationValue, Declaration, DeclarationKind, SymbolTable, known};

    fn cn(s: &str) -> ClassName {
        ClassName::parse(s).unwrap()
    }

    fn table() -> SymbolTable {
        let mut d = Declaration::new(cn("com.example.AppComponent"), DeclarationKind::Interface);
        d.annotations = vec![
            Annotation::new(cn(known::MERGE_COMPONENT))
                .with("scope", AnnotationValue::Class(cn("com.example.AppScope"))),
        ];
        let mut table = SymbolTable::new();
        table.insert(d);
        table.set_round([cn("com.example.AppComponent")]);
        table
    }

    #[test]
    fn reset_allows_regeneration() {
        let table = table();
        let mut engine = Engine::default();
        assert_eq!(engine.process(&table).unwrap().requests.len(), 1);
        assert!(engine.process(&table).unwrap().requests.is_empty());
        assert_eq!(engine.round(), 2);

        engine.reset();
        assert_eq!(engine.round(), 0);
        assert_eq!(engine.state(&cn("com.example.AppComponent")), TargetState::Unseen);
        let again = engine.process(&table).unwrap();
        assert_eq!(again.round, 1);
        assert_eq!(again.requests.len(), 1);
    }

    #[test]
    fn configured_namespace_is_scanned() {
        let config = GraftConfig::parse("[scan]\nhint_namespace = \"custom.hints\"\n").unwrap();
        let engine = Engine::new(config);
        assert_eq!(engine.config().scan.hint_namespace, "custom.hints");
    }
}
