//! Host loop for fixtures.
//!
//! A [`Fixture`] describes one compilation: precompiled library declarations
//! (with their hints), extra raw hints, and the source declarations that
//! become visible round by round. [`run_to_fixed_point`] plays the host: it
//! offers each round's new symbols plus everything the engine deferred,
//! publishes the hints of offered source contributions after the round, and
//! stops once nothing is deferred and no input is left.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::engine::{Engine, GenerationRequest, RoundOutput};
use crate::error::MergeError;
use crate::merge::MergeDescriptor;
use crate::model::{ClassName, Declaration, HintProperty, SymbolTable};
use crate::scan::hint;

/// One compilation's inputs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    /// Precompiled declarations. Their hints are visible from round 1.
    #[serde(default)]
    pub library: Vec<Declaration>,
    /// Raw hint properties, visible from round 1.
    #[serde(default)]
    pub hints: Vec<HintProperty>,
    /// Source declarations, grouped by the round they first appear in.
    #[serde(default)]
    pub rounds: Vec<Vec<Declaration>>,
}

impl Fixture {
    /// Parse a fixture from JSON.
    ///
    /// # Errors
    /// Returns the `serde_json` error for malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Everything a fixture run produced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Output of every round, in order.
    pub rounds: Vec<RoundOutput>,
}

impl RunReport {
    /// Every request of every round.
    pub fn requests(&self) -> impl Iterator<Item = &GenerationRequest> {
        self.rounds.iter().flat_map(|r| r.requests.iter())
    }

    /// Every merge descriptor of every round.
    pub fn merges(&self) -> impl Iterator<Item = &MergeDescriptor> {
        self.requests().filter_map(|r| match r {
            GenerationRequest::Merge(descriptor) => Some(descriptor),
            GenerationRequest::Subcomponent(_) => None,
        })
    }

    /// The merge descriptor of `target`, if it was generated.
    #[must_use]
    pub fn merge_of(&self, target: &ClassName) -> Option<&MergeDescriptor> {
        self.merges().find(|d| d.target == *target)
    }
}

/// Run `fixture` through `engine` until no work is left.
///
/// The engine is reset first; a fixture is one compilation.
///
/// # Errors
/// Returns the first fatal round error, or [`MergeError::Stalled`] when a
/// round after the last input makes no progress while work is outstanding.
pub fn run_to_fixed_point(engine: &mut Engine, fixture: &Fixture) -> Result<RunReport, MergeError> {
    engine.reset();
    let namespace = engine.config().scan.hint_namespace.clone();

    let mut table = SymbolTable::new();
    for decl in &fixture.library {
        table.add_hints(hint::encode(decl, &namespace));
        table.insert_library(decl.clone());
    }
    table.add_hints(fixture.hints.iter().cloned());

    let mut report = RunReport::default();
    let mut deferred: Vec<ClassName> = Vec::new();
    let mut inputs = fixture.rounds.iter();
    loop {
        let fresh: &[Declaration] = inputs.next().map_or(&[], Vec::as_slice);
        let exhausted = inputs.len() == 0;
        if fresh.is_empty() && exhausted && deferred.is_empty() && !engine.has_pending_work() {
            break;
        }

        for decl in fresh {
            table.insert(decl.clone());
        }
        let offered: BTreeSet<ClassName> = deferred
            .iter()
            .cloned()
            .chain(fresh.iter().map(|d| d.name.clone()))
            .collect();
        table.set_round(offered);

        let output = engine.process(&table)?;
        let published: usize = fresh
            .iter()
            .map(|decl| table.add_hints(hint::encode(decl, &namespace)))
            .sum();
        let progressed = !output.requests.is_empty() || !fresh.is_empty() || published > 0;

        deferred.clone_from(&output.deferred);
        let round = output.round;
        report.rounds.push(output);

        let outstanding = !deferred.is_empty() || engine.has_pending_work();
        if exhausted && outstanding && !progressed {
            let mut stuck: BTreeSet<ClassName> = deferred.iter().cloned().collect();
            stuck.extend(engine.pending_targets());
            return Err(MergeError::Stalled {
                round,
                deferred: stuck.into_iter().collect(),
            });
        }
    }
    tracing::debug!(rounds = report.rounds.len(), "fixture reached a fixed point");
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Annotation, AnnotationValue, DeclarationKind, TypeRef, known};

    fn cn(s: &str) -> ClassName {
        ClassName::parse(s).unwrap()
    }

    fn component() -> Declaration {
        let mut d = Declaration::new(cn("com.example.AppComponent"), DeclarationKind::Interface);
        d.annotations = vec![
            Annotation::new(cn(known::MERGE_COMPONENT))
                .with("scope", AnnotationValue::Class(cn("com.example.AppScope"))),
        ];
        d
    }

    #[test]
    fn empty_fixture_runs_no_rounds() {
        let report = run_to_fixed_point(&mut Engine::default(), &Fixture::default()).unwrap();
        assert!(report.rounds.is_empty());
    }

    #[test]
    fn binding_becomes_visible_next_round() {
        let mut repo = Declaration::new(cn("com.example.RealRepo"), DeclarationKind::Class);
        repo.annotations = vec![
            Annotation::new(cn(known::CONTRIBUTES_BINDING))
                .with("scope", AnnotationValue::Class(cn("com.example.AppScope"))),
        ];
        repo.supertypes = vec![TypeRef::Resolved(cn("com.example.Repo"))];
        let fixture = Fixture {
            rounds: vec![vec![component(), repo]],
            ..Fixture::default()
        };
        let report = run_to_fixed_point(&mut Engine::default(), &fixture).unwrap();
        assert_eq!(report.rounds.len(), 2);
        assert!(report.rounds[0].requests.is_empty());
        let merged = report.merge_of(&cn("com.example.AppComponent")).unwrap();
        assert_eq!(merged.bindings[0].origin, cn("com.example.RealRepo"));
    }

    #[test]
    fn unresolvable_target_stalls() {
        let mut broken = component();
        broken.supertypes = vec![TypeRef::Error {
            error: "NeverGenerated".to_owned(),
        }];
        let fixture = Fixture {
            rounds: vec![vec![broken]],
            ..Fixture::default()
        };
        let err = run_to_fixed_point(&mut Engine::default(), &fixture).unwrap_err();
        assert_eq!(
            err,
            MergeError::Stalled {
                round: 2,
                deferred: vec![cn("com.example.AppComponent")],
            }
        );
    }

    #[test]
    fn fixture_json_uses_dotted_names() {
        let json = r#"{
            "rounds": [[{
                "name": "com.example.AppComponent",
                "kind": "interface",
                "annotations": [{
                    "name": "graft.annotations.MergeComponent",
                    "arguments": { "scope": { "class": "com.example.AppScope" } }
                }]
            }]]
        }"#;
        let fixture = Fixture::from_json(json).unwrap();
        assert_eq!(fixture.rounds[0][0], component());
    }
}
