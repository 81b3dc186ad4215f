//! Engine error types.
//!
//! Defines [`MergeError`], the single error type every engine operation
//! returns. Messages name the offending declaration and say how to fix the
//! source. [`MergeError::UnresolvedSymbol`] is the one non-fatal variant: the
//! round scheduler turns it into a deferral instead of failing.

use std::fmt;

use crate::model::{ArgumentError, ClassName};

// ---------------------------------------------------------------------------
// Supporting enums
// ---------------------------------------------------------------------------

/// Which half of a hint group is missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HintDefect {
    /// No `<base>_reference` property.
    MissingReference,
    /// No `<base>_scope*` property.
    MissingScope,
}

/// Which directive referenced an entity outside the merge scopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    /// `exclude` on a merge target.
    Exclude,
    /// `replaces` on a contribution.
    Replace,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclude => write!(f, "exclude"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

/// What a contributed declaration was contributed as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContributedAs {
    /// A module.
    Module,
    /// An interface.
    Interface,
    /// A binding or multibinding.
    Binding,
}

impl fmt::Display for ContributedAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module => write!(f, "module"),
            Self::Interface => write!(f, "interface"),
            Self::Binding => write!(f, "binding"),
        }
    }
}

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// Errors raised while scanning, resolving and assembling merges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeError {
    /// A hint group is missing its reference or all of its scopes.
    MalformedHint {
        /// The group's base name.
        base: String,
        /// What is missing.
        defect: HintDefect,
    },

    /// Two or more distinct origins tie at the highest rank for one binding key.
    AmbiguousBinding {
        /// The contested bound type.
        bound_type: ClassName,
        /// The tied rank.
        rank: i32,
        /// Every tied origin, in discovery order.
        origins: Vec<ClassName>,
    },

    /// An `exclude` or `replaces` names an entity that is not contributed to
    /// any of the merge scopes.
    ScopeMismatch {
        /// The declaration carrying the directive.
        declaration: ClassName,
        /// The merge scopes.
        scopes: Vec<ClassName>,
        /// Which directive.
        directive: Directive,
        /// The excluded or replaced entity.
        entity: ClassName,
    },

    /// A merge target excludes types it implements or extends.
    SelfExclusion {
        /// The merge target.
        target: ClassName,
        /// The excluded supertypes.
        supertypes: Vec<ClassName>,
    },

    /// A merge target includes and excludes the same modules.
    ConflictingDirective {
        /// The merge target.
        target: ClassName,
        /// Entities named by both directives.
        entities: Vec<ClassName>,
    },

    /// A contribution has type parameters.
    GenericContribution {
        /// The contributed class.
        origin: ClassName,
        /// The class carrying the parameters (the origin or its bound type).
        bound_type: ClassName,
        /// Parameter names.
        type_parameters: Vec<String>,
    },

    /// A contributed declaration is not public.
    Visibility {
        /// The contributed declaration.
        declaration: ClassName,
        /// What it was contributed as.
        contributed_as: ContributedAs,
    },

    /// A contribution replaces a subcomponent whose code was already generated.
    RetroactiveReplacement {
        /// The replacing contribution.
        replacing: ClassName,
        /// The already generated contribution.
        replaced: ClassName,
    },

    /// A reference is not resolvable yet. Non-fatal: the round defers.
    UnresolvedSymbol {
        /// The declaration holding the reference.
        declaration: ClassName,
        /// The unresolved reference text.
        reference: String,
    },

    /// A declaration is contributed in a way the engine cannot merge.
    InvalidContribution {
        /// The contributed declaration.
        declaration: ClassName,
        /// Explanation.
        reason: String,
    },

    /// A contribution replaces something of the wrong kind.
    InvalidReplacement {
        /// The replacing declaration.
        declaration: ClassName,
        /// The replaced declaration.
        replaced: ClassName,
        /// The kind the replaced declaration must have.
        expected: ContributedAs,
    },

    /// A declaration contributes to the same scope more than once.
    DuplicateContribution {
        /// The contributed declaration.
        declaration: ClassName,
        /// The repeated scopes.
        scopes: Vec<ClassName>,
        /// The repeated bound types, for bindings.
        bound_types: Vec<ClassName>,
    },

    /// A merge target's annotations or shape are invalid.
    InvalidMergeTarget {
        /// The merge target.
        declaration: ClassName,
        /// Explanation.
        reason: String,
    },

    /// A contributed subcomponent's factory or parent component is invalid.
    InvalidSubcomponent {
        /// The contributed subcomponent.
        declaration: ClassName,
        /// Explanation.
        reason: String,
    },

    /// A referenced declaration does not exist in the universe.
    MissingDeclaration {
        /// The missing name.
        name: ClassName,
        /// Who referenced it.
        referenced_by: ClassName,
    },

    /// An annotation argument had the wrong shape.
    Argument {
        /// The annotated declaration.
        declaration: ClassName,
        /// The extraction failure.
        error: ArgumentError,
    },

    /// The host loop stopped making progress with targets still deferred.
    Stalled {
        /// The last round number.
        round: u32,
        /// Targets still deferred.
        deferred: Vec<ClassName>,
    },
}

impl MergeError {
    /// Wrap an argument extraction failure on `declaration`.
    ///
    /// Unresolved class arguments become [`MergeError::UnresolvedSymbol`].
    #[must_use]
    pub fn argument(declaration: &ClassName, error: ArgumentError) -> Self {
        match error {
            ArgumentError::Unresolved { reference, .. } => Self::UnresolvedSymbol {
                declaration: declaration.clone(),
                reference,
            },
            error => Self::Argument {
                declaration: declaration.clone(),
                error,
            },
        }
    }

    /// Returns `true` if this error means "retry next round" rather than fail.
    #[must_use]
    pub const fn is_deferral(&self) -> bool {
        matches!(self, Self::UnresolvedSymbol { .. })
    }

    /// The declaration the error is reported against, if any.
    #[must_use]
    pub const fn declaration(&self) -> Option<&ClassName> {
        match self {
            Self::MalformedHint { .. } | Self::AmbiguousBinding { .. } | Self::Stalled { .. } => {
                None
            }
            Self::ScopeMismatch { declaration, .. }
            | Self::Visibility { declaration, .. }
            | Self::UnresolvedSymbol { declaration, .. }
            | Self::InvalidContribution { declaration, .. }
            | Self::InvalidReplacement { declaration, .. }
            | Self::DuplicateContribution { declaration, .. }
            | Self::InvalidMergeTarget { declaration, .. }
            | Self::InvalidSubcomponent { declaration, .. }
            | Self::Argument { declaration, .. } => Some(declaration),
            Self::SelfExclusion { target, .. } | Self::ConflictingDirective { target, .. } => {
                Some(target)
            }
            Self::GenericContribution { origin, .. } => Some(origin),
            Self::RetroactiveReplacement { replacing, .. } => Some(replacing),
            Self::MissingDeclaration { referenced_by, .. } => Some(referenced_by),
        }
    }
}

fn bracketed(names: &[ClassName]) -> String {
    let joined: Vec<String> = names.iter().map(ClassName::canonical).collect();
    format!("[{}]", joined.join(", "))
}

fn simple_bracketed(names: &[ClassName]) -> String {
    let joined: Vec<&str> = names.iter().map(ClassName::simple_name).collect();
    format!("[{}]", joined.join(", "))
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedHint { base, defect } => {
                match defect {
                    HintDefect::MissingReference => {
                        write!(f, "Couldn't find the reference for a generated hint: {base}.")?;
                    }
                    HintDefect::MissingScope => {
                        write!(f, "Couldn't find any scope for a generated hint: {base}.")?;
                    }
                }
                write!(
                    f,
                    "\n  To fix: rebuild the dependency that produced this hint; its generated markers are out of sync."
                )
            }
            Self::AmbiguousBinding {
                bound_type,
                rank,
                origins,
            } => write!(
                f,
                "There are multiple contributed bindings with the same bound type and rank. \
                 The bound type is {bound_type}. The rank is {rank}. \
                 The contributed binding classes are: {}",
                bracketed(origins)
            ),
            Self::ScopeMismatch {
                declaration,
                scopes,
                directive,
                entity,
            } => {
                let noun = match directive {
                    Directive::Exclude => "excluded",
                    Directive::Replace => "replaced",
                };
                write!(
                    f,
                    "{declaration} with scopes {} wants to {directive} {entity}, but the {noun} class isn't contributed to the same scope.",
                    bracketed(scopes)
                )
            }
            Self::SelfExclusion { target, supertypes } => {
                let joined: Vec<String> = supertypes.iter().map(ClassName::canonical).collect();
                write!(
                    f,
                    "{} excludes types that it implements or extends. These types cannot be excluded. \
                     Look at all the super types to find these classes: {}.",
                    target.simple_name(),
                    joined.join(", ")
                )
            }
            Self::ConflictingDirective { target, entities } => {
                let joined: Vec<String> = entities.iter().map(ClassName::canonical).collect();
                write!(
                    f,
                    "{target} includes and excludes modules at the same time: {}",
                    joined.join(", ")
                )
            }
            Self::GenericContribution {
                origin,
                bound_type,
                type_parameters,
            } => write!(
                f,
                "Class {origin} binds {bound_type}, but the bound type contains type parameter(s) <{}>. \
                 Type parameters in bindings are not supported. This binding needs to be contributed \
                 in a module manually.",
                type_parameters.join(", ")
            ),
            Self::Visibility {
                declaration,
                contributed_as,
            } => write!(
                f,
                "{declaration} is contributed to the graph, but the {contributed_as} is not public. \
                 Only public {contributed_as}s are supported."
            ),
            Self::RetroactiveReplacement {
                replacing,
                replaced,
            } => write!(
                f,
                "{replacing} tries to replace {replaced}, but the code for {replaced} was already generated. \
                 This is not supported."
            ),
            Self::UnresolvedSymbol {
                declaration,
                reference,
            } => write!(
                f,
                "{declaration} references {reference}, which is not resolvable yet; retrying next round"
            ),
            Self::InvalidContribution {
                declaration,
                reason,
            }
            | Self::InvalidMergeTarget {
                declaration,
                reason,
            }
            | Self::InvalidSubcomponent {
                declaration,
                reason,
            } => write!(f, "{declaration}: {reason}"),
            Self::InvalidReplacement {
                declaration,
                replaced,
                expected,
            } => write!(
                f,
                "{declaration} wants to replace {replaced}, but the class being replaced is not a{} {expected}.",
                if matches!(expected, ContributedAs::Interface) { "n" } else { "" }
            ),
            Self::DuplicateContribution {
                declaration,
                scopes,
                bound_types,
            } => {
                if bound_types.is_empty() {
                    write!(
                        f,
                        "{declaration} contributes multiple times to the same scope: {}. \
                         Contributing multiple times to the same scope is forbidden and all scopes must be distinct.",
                        simple_bracketed(scopes)
                    )
                } else {
                    write!(
                        f,
                        "{declaration} contributes multiple times to the same scope using the same bound type: {}. \
                         Contributing multiple times to the same scope with the same bound type is forbidden \
                         and all scope - bound type combinations must be distinct.",
                        simple_bracketed(bound_types)
                    )
                }
            }
            Self::MissingDeclaration {
                name,
                referenced_by,
            } => write!(
                f,
                "{referenced_by} references {name}, but no declaration with that name is visible.\n  \
                 To fix: check the name, or add the dependency that declares it."
            ),
            Self::Argument { declaration, error } => write!(f, "{declaration}: {error}"),
            Self::Stalled { round, deferred } => write!(
                f,
                "round {round} made no progress with {} target(s) still deferred: {}\n  \
                 To fix: make the unresolved references of these targets resolvable.",
                deferred.len(),
                bracketed(deferred)
            ),
        }
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Argument { error, .. } => Some(error),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cn(s: &str) -> ClassName {
        ClassName::parse(s).unwrap()
    }

    #[test]
    fn unresolved_argument_becomes_deferral() {
        let err = MergeError::argument(
            &cn("com.example.Component"),
            ArgumentError::Unresolved {
                annotation: cn("graft.annotations.MergeComponent"),
                argument: "modules".to_owned(),
                reference: "GeneratedModule".to_owned(),
            },
        );
        assert!(err.is_deferral());
        assert_eq!(err.declaration(), Some(&cn("com.example.Component")));
    }

    #[test]
    fn wrong_type_argument_is_fatal() {
        let err = MergeError::argument(
            &cn("com.example.Component"),
            ArgumentError::Missing {
                annotation: cn("graft.annotations.MergeComponent"),
                argument: "scope".to_owned(),
            },
        );
        assert!(!err.is_deferral());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn ambiguous_binding_names_every_origin() {
        let err = MergeError::AmbiguousBinding {
            bound_type: cn("com.example.Repo"),
            rank: 10,
            origins: vec![cn("com.example.RepoA"), cn("com.example.RepoB")],
        };
        let msg = err.to_string();
        assert!(msg.contains("The bound type is com.example.Repo"));
        assert!(msg.contains("The rank is 10"));
        assert!(msg.contains("[com.example.RepoA, com.example.RepoB]"));
    }

    #[test]
    fn scope_mismatch_message_uses_directive_noun() {
        let err = MergeError::ScopeMismatch {
            declaration: cn("com.example.AppComponent"),
            scopes: vec![cn("com.example.AppScope")],
            directive: Directive::Exclude,
            entity: cn("com.example.OtherModule"),
        };
        assert_eq!(
            err.to_string(),
            "com.example.AppComponent with scopes [com.example.AppScope] wants to exclude \
             com.example.OtherModule, but the excluded class isn't contributed to the same scope."
        );
    }

    #[test]
    fn invalid_replacement_article() {
        let err = MergeError::InvalidReplacement {
            declaration: cn("com.example.A"),
            replaced: cn("com.example.B"),
            expected: ContributedAs::Interface,
        };
        assert!(err.to_string().ends_with("is not an interface."));
        let err = MergeError::InvalidReplacement {
            declaration: cn("com.example.A"),
            replaced: cn("com.example.B"),
            expected: ContributedAs::Module,
        };
        assert!(err.to_string().ends_with("is not a module."));
    }
}
