//! Shared builders for graft integration tests.
//!
//! Declarations are built in memory; nothing touches the filesystem except
//! the config tests, which use temp directories.

#![allow(dead_code)]

use graft::driver::{Fixture, RunReport, run_to_fixed_point};
use graft::model::{
    Annotation, AnnotationValue, ClassName, Declaration, DeclarationKind, TypeRef, known,
};
use graft::{Engine, MergeError};

pub const APP: &str = "com.example.AppScope";
pub const OTHER: &str = "com.example.OtherScope";

pub fn cn(s: &str) -> ClassName {
    ClassName::parse(s).unwrap()
}

pub fn class(s: &str) -> AnnotationValue {
    AnnotationValue::Class(cn(s))
}

pub fn classes(names: &[&str]) -> AnnotationValue {
    AnnotationValue::Array(names.iter().map(|n| class(n)).collect())
}

pub fn names(list: &[ClassName]) -> Vec<String> {
    list.iter().map(ClassName::canonical).collect()
}

/// A `@Module @ContributesTo(scope, replaces = ..)` class.
pub fn module(name: &str, scope: &str, replaces: &[&str]) -> Declaration {
    let mut contributes = Annotation::new(cn(known::CONTRIBUTES_TO)).with("scope", class(scope));
    if !replaces.is_empty() {
        contributes = contributes.with("replaces", classes(replaces));
    }
    let mut d = Declaration::new(cn(name), DeclarationKind::Class);
    d.annotations = vec![Annotation::new(cn(known::MODULE)), contributes];
    d
}

/// A `@ContributesTo(scope)` interface.
pub fn interface(name: &str, scope: &str) -> Declaration {
    let mut d = Declaration::new(cn(name), DeclarationKind::Interface);
    d.annotations = vec![Annotation::new(cn(known::CONTRIBUTES_TO)).with("scope", class(scope))];
    d
}

/// A `@ContributesBinding(scope, rank)` class implementing `bound`.
pub fn binding(name: &str, bound: &str, scope: &str, rank: Option<i64>) -> Declaration {
    let mut contributes =
        Annotation::new(cn(known::CONTRIBUTES_BINDING)).with("scope", class(scope));
    if let Some(rank) = rank {
        contributes = contributes.with("rank", AnnotationValue::Int(rank));
    }
    let mut d = Declaration::new(cn(name), DeclarationKind::Class);
    d.annotations = vec![contributes];
    d.supertypes = vec![TypeRef::Resolved(cn(bound))];
    d
}

/// A `@ContributesSubcomponent(scope, parentScope)` interface.
pub fn subcomponent(name: &str, scope: &str, parent_scope: &str) -> Declaration {
    let mut d = Declaration::new(cn(name), DeclarationKind::Interface);
    d.annotations = vec![
        Annotation::new(cn(known::CONTRIBUTES_SUBCOMPONENT))
            .with("scope", class(scope))
            .with("parentScope", class(parent_scope)),
    ];
    d
}

/// `@MergeComponent(scope = APP, exclude = ..)` on `com.example.AppComponent`.
pub fn component(exclude: &[&str]) -> Declaration {
    let mut merge = Annotation::new(cn(known::MERGE_COMPONENT)).with("scope", class(APP));
    if !exclude.is_empty() {
        merge = merge.with("exclude", classes(exclude));
    }
    let mut d = Declaration::new(cn("com.example.AppComponent"), DeclarationKind::Interface);
    d.annotations = vec![merge];
    d
}

/// Run a fixture with library declarations and source rounds.
pub fn run(library: Vec<Declaration>, rounds: Vec<Vec<Declaration>>) -> Result<RunReport, MergeError> {
    let fixture = Fixture {
        library,
        hints: Vec::new(),
        rounds,
    };
    run_to_fixed_point(&mut Engine::default(), &fixture)
}
