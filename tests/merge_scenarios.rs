//! Integration tests for merge scenarios: replacement, exclusion and binding
//! conflicts, run through the fixture driver.
//!
//! Coverage:
//! - Replacing a precompiled module drops it from the merged module list
//! - Excluding a module of another scope is a scope mismatch
//! - Excluded modules disappear and their `replaces` are ignored
//! - Rank 10 beats rank 5 for the same bound type
//! - Equal highest ranks are ambiguous and name every tied origin
//! - Qualifiers split binding groups; multibindings never compete
//! - Precompiled contributions are not originating declarations

mod common;

use common::{APP, OTHER, binding, class, cn, component, interface, module, names, run};
use graft::MergeError;
use graft::error::Directive;
use graft::model::{Annotation, AnnotationValue, Declaration, DeclarationKind, TypeRef, known};

#[test]
fn replaced_library_module_is_dropped() {
    let library = vec![
        module("com.lib.DefaultNetworkModule", APP, &[]),
        module("com.lib.FakeNetworkModule", APP, &["com.lib.DefaultNetworkModule"]),
    ];
    let report = run(library, vec![vec![component(&[])]]).unwrap();
    assert_eq!(report.rounds.len(), 1);

    let merged = report.merge_of(&cn("com.example.AppComponent")).unwrap();
    assert_eq!(names(&merged.modules), vec!["com.lib.FakeNetworkModule"]);
    assert_eq!(merged.merged, cn("com.example.MergedAppComponent"));
}

#[test]
fn source_module_replaces_library_module_in_same_round() {
    let library = vec![module("com.lib.DefaultNetworkModule", APP, &[])];
    let replacement = module("com.example.TestNetworkModule", APP, &["com.lib.DefaultNetworkModule"]);
    let report = run(library, vec![vec![component(&[]), replacement]]).unwrap();

    let merged = report.merge_of(&cn("com.example.AppComponent")).unwrap();
    assert_eq!(names(&merged.modules), vec!["com.example.TestNetworkModule"]);
    assert!(merged.originating.contains(&cn("com.example.TestNetworkModule")));
}

#[test]
fn excluding_module_from_other_scope_fails() {
    let library = vec![
        module("com.lib.AppModule", APP, &[]),
        module("com.lib.OtherModule", OTHER, &[]),
    ];
    let err = run(library, vec![vec![component(&["com.lib.OtherModule"])]]).unwrap_err();
    assert_eq!(
        err,
        MergeError::ScopeMismatch {
            declaration: cn("com.example.AppComponent"),
            scopes: vec![cn(APP)],
            directive: Directive::Exclude,
            entity: cn("com.lib.OtherModule"),
        }
    );
    assert!(err.to_string().contains("com.lib.OtherModule"), "{err}");
}

#[test]
fn excluded_module_and_its_replacements_are_ignored() {
    let library = vec![
        module("com.lib.A", APP, &[]),
        module("com.lib.B", APP, &["com.lib.A"]),
        interface("com.lib.Api", APP),
    ];
    let report = run(library, vec![vec![component(&["com.lib.B"])]]).unwrap();
    let merged = report.merge_of(&cn("com.example.AppComponent")).unwrap();
    assert_eq!(names(&merged.modules), vec!["com.lib.A"]);
    assert_eq!(names(&merged.interfaces), vec!["com.lib.Api"]);
}

#[test]
fn rank_ten_beats_rank_five() {
    let library = vec![
        binding("com.lib.SlowRepository", "com.lib.Repository", APP, Some(5)),
        binding("com.lib.FastRepository", "com.lib.Repository", APP, Some(10)),
    ];
    let report = run(library, vec![vec![component(&[])]]).unwrap();
    let merged = report.merge_of(&cn("com.example.AppComponent")).unwrap();

    assert_eq!(merged.bindings.len(), 1);
    let winner = &merged.bindings[0];
    assert_eq!(winner.origin, cn("com.lib.FastRepository"));
    assert_eq!(winner.rank, 10);
    assert!(!winner.multibinding);
    assert!(merged.modules.contains(&winner.module));
    assert!(
        !names(&merged.modules)
            .iter()
            .any(|m| m.contains("SlowRepository")),
        "{:?}",
        merged.modules
    );
}

#[test]
fn equal_highest_rank_is_ambiguous() {
    let library = vec![
        binding("com.lib.RepositoryA", "com.lib.Repository", APP, Some(7)),
        binding("com.lib.RepositoryB", "com.lib.Repository", APP, Some(7)),
        binding("com.lib.RepositoryC", "com.lib.Repository", APP, Some(1)),
    ];
    let err = run(library, vec![vec![component(&[])]]).unwrap_err();
    let MergeError::AmbiguousBinding {
        bound_type,
        rank,
        origins,
    } = &err
    else {
        panic!("expected an ambiguous binding, got {err}");
    };
    assert_eq!(*bound_type, cn("com.lib.Repository"));
    assert_eq!(*rank, 7);
    let mut origins = names(origins);
    origins.sort();
    assert_eq!(origins, vec!["com.lib.RepositoryA", "com.lib.RepositoryB"]);

    let message = err.to_string();
    assert!(message.contains("com.lib.RepositoryA"), "{message}");
    assert!(message.contains("com.lib.RepositoryB"), "{message}");
}

#[test]
fn qualified_bindings_do_not_compete() {
    let mut named = Declaration::new(cn("com.lib.Named"), DeclarationKind::AnnotationClass);
    named.annotations = vec![Annotation::new(cn(known::QUALIFIER))];

    let plain = binding("com.lib.PlainRepository", "com.lib.Repository", APP, None);
    let mut primary = binding("com.lib.PrimaryRepository", "com.lib.Repository", APP, None);
    primary.annotations.push(
        Annotation::new(cn("com.lib.Named"))
            .with("value", AnnotationValue::String("primary".to_owned())),
    );

    let report = run(vec![named, plain, primary], vec![vec![component(&[])]]).unwrap();
    let merged = report.merge_of(&cn("com.example.AppComponent")).unwrap();
    assert_eq!(merged.bindings.len(), 2);
    let qualified: Vec<_> = merged
        .bindings
        .iter()
        .filter(|b| b.qualifier.is_some())
        .map(|b| b.origin.canonical())
        .collect();
    assert_eq!(qualified, vec!["com.lib.PrimaryRepository"]);
}

#[test]
fn multibindings_are_all_kept() {
    let plugin = |name: &str| {
        let mut d = Declaration::new(cn(name), DeclarationKind::Class);
        d.annotations = vec![
            Annotation::new(cn(known::CONTRIBUTES_MULTIBINDING)).with("scope", class(APP)),
        ];
        d.supertypes = vec![TypeRef::Resolved(cn("com.lib.Plugin"))];
        d
    };
    let report = run(
        vec![plugin("com.lib.LoggingPlugin"), plugin("com.lib.MetricsPlugin")],
        vec![vec![component(&[])]],
    )
    .unwrap();
    let merged = report.merge_of(&cn("com.example.AppComponent")).unwrap();
    assert_eq!(merged.bindings.len(), 2);
    assert!(merged.bindings.iter().all(|b| b.multibinding));
}

#[test]
fn precompiled_contributions_are_not_originating() {
    let report = run(
        vec![module("com.lib.LibModule", APP, &[])],
        vec![vec![component(&[]), module("com.example.LocalModule", APP, &[])]],
    )
    .unwrap();
    let merged = report.merge_of(&cn("com.example.AppComponent")).unwrap();
    assert_eq!(
        names(&merged.originating),
        vec!["com.example.AppComponent", "com.example.LocalModule"]
    );
    assert_eq!(merged.modules.len(), 2);
}
