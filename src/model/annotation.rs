//! Typed annotation values and argument extraction.
//!
//! The host front end hands the engine annotations whose arguments are
//! already typed ([`AnnotationValue`]). Every read goes through the accessors
//! here so a mismatched or unresolved argument surfaces as a structured
//! [`ArgumentError`] naming the annotation and argument.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::name::ClassName;

// ---------------------------------------------------------------------------
// AnnotationValue
// ---------------------------------------------------------------------------

/// One annotation argument value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationValue {
    /// `true` / `false`.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// String literal.
    String(String),
    /// A class literal that resolved.
    Class(ClassName),
    /// A class literal the host could not resolve this round.
    Unresolved(String),
    /// An enum entry.
    Enum {
        /// The enum class.
        #[serde(rename = "type")]
        ty: ClassName,
        /// The entry name.
        entry: String,
    },
    /// An array of values.
    Array(Vec<AnnotationValue>),
    /// A nested annotation.
    Annotation(Box<Annotation>),
}

impl AnnotationValue {
    /// Short kind label used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::Class(_) | Self::Unresolved(_) => "class",
            Self::Enum { .. } => "enum",
            Self::Array(_) => "array",
            Self::Annotation(_) => "annotation",
        }
    }

    /// Append the canonical rendering of this value to `out`.
    fn render(&self, out: &mut String) {
        match self {
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Int(i) => out.push_str(&i.to_string()),
            Self::String(s) => {
                out.push('"');
                out.push_str(s);
                out.push('"');
            }
            Self::Class(name) => out.push_str(&name.canonical()),
            Self::Unresolved(text) => {
                out.push('?');
                out.push_str(text);
            }
            Self::Enum { ty, entry } => {
                out.push_str(&ty.canonical());
                out.push('.');
                out.push_str(entry);
            }
            Self::Array(values) => {
                out.push('[');
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    value.render(out);
                }
                out.push(']');
            }
            Self::Annotation(nested) => {
                out.push('@');
                nested.render(out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ArgumentError
// ---------------------------------------------------------------------------

/// An annotation argument could not be read as the expected type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgumentError {
    /// A required argument is absent.
    Missing {
        /// The annotation being read.
        annotation: ClassName,
        /// The argument name.
        argument: String,
    },
    /// The argument has a different kind than expected.
    WrongType {
        /// The annotation being read.
        annotation: ClassName,
        /// The argument name.
        argument: String,
        /// What the engine expected.
        expected: &'static str,
        /// What the front end supplied.
        found: &'static str,
    },
    /// A class argument is not resolvable yet.
    Unresolved {
        /// The annotation being read.
        annotation: ClassName,
        /// The argument name.
        argument: String,
        /// The unresolved reference text.
        reference: String,
    },
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing {
                annotation,
                argument,
            } => write!(f, "@{annotation} is missing required argument '{argument}'"),
            Self::WrongType {
                annotation,
                argument,
                expected,
                found,
            } => write!(
                f,
                "expected argument '{argument}' of @{annotation} to be of type {expected}, but was {found}"
            ),
            Self::Unresolved {
                annotation,
                argument,
                reference,
            } => write!(
                f,
                "argument '{argument}' of @{annotation} references unresolved type {reference}"
            ),
        }
    }
}

impl std::error::Error for ArgumentError {}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// An annotation instance on a declaration.
///
/// Only explicitly written arguments are present; defaults are applied by the
/// reader.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// The annotation class.
    pub name: ClassName,
    /// Explicit arguments, keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, AnnotationValue>,
}

impl Annotation {
    /// An annotation without arguments.
    #[must_use]
    pub const fn new(name: ClassName) -> Self {
        Self {
            name,
            arguments: BTreeMap::new(),
        }
    }

    /// Builder-style argument setter.
    #[must_use]
    pub fn with(mut self, argument: &str, value: AnnotationValue) -> Self {
        self.arguments.insert(argument.to_owned(), value);
        self
    }

    /// Returns `true` if this annotation's class has the canonical name `fq_name`.
    #[must_use]
    pub fn is(&self, fq_name: &str) -> bool {
        self.name.canonical() == fq_name
    }

    /// Raw argument access.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&AnnotationValue> {
        self.arguments.get(name)
    }

    /// Read an optional class argument.
    ///
    /// # Errors
    /// Fails if the argument is not a class or is unresolved.
    pub fn class_arg(&self, name: &str) -> Result<Option<&ClassName>, ArgumentError> {
        match self.argument(name) {
            None => Ok(None),
            Some(AnnotationValue::Class(class)) => Ok(Some(class)),
            Some(AnnotationValue::Unresolved(text)) => Err(self.unresolved(name, text)),
            Some(other) => Err(self.wrong_type(name, "class", other)),
        }
    }

    /// Read a required class argument.
    ///
    /// # Errors
    /// Fails if the argument is absent, not a class, or unresolved.
    pub fn required_class_arg(&self, name: &str) -> Result<&ClassName, ArgumentError> {
        self.class_arg(name)?.ok_or_else(|| ArgumentError::Missing {
            annotation: self.name.clone(),
            argument: name.to_owned(),
        })
    }

    /// Read a class array argument; absent means empty. A single class value
    /// is accepted as a one-element array.
    ///
    /// # Errors
    /// Fails if any element is not a class or is unresolved.
    pub fn class_array_arg(&self, name: &str) -> Result<Vec<ClassName>, ArgumentError> {
        let values = match self.argument(name) {
            None => return Ok(Vec::new()),
            Some(AnnotationValue::Array(values)) => values.as_slice(),
            Some(single @ (AnnotationValue::Class(_) | AnnotationValue::Unresolved(_))) => {
                std::slice::from_ref(single)
            }
            Some(other) => return Err(self.wrong_type(name, "class array", other)),
        };
        values
            .iter()
            .map(|value| match value {
                AnnotationValue::Class(class) => Ok(class.clone()),
                AnnotationValue::Unresolved(text) => Err(self.unresolved(name, text)),
                other => Err(self.wrong_type(name, "class", other)),
            })
            .collect()
    }

    /// Read an optional integer argument.
    ///
    /// # Errors
    /// Fails if the argument is not an integer or does not fit in `i32`.
    pub fn int_arg(&self, name: &str) -> Result<Option<i32>, ArgumentError> {
        match self.argument(name) {
            None => Ok(None),
            Some(value @ AnnotationValue::Int(i)) => i32::try_from(*i)
                .map(Some)
                .map_err(|_| self.wrong_type(name, "32-bit int", value)),
            Some(other) => Err(self.wrong_type(name, "int", other)),
        }
    }

    /// Read an optional boolean argument.
    ///
    /// # Errors
    /// Fails if the argument is not a boolean.
    pub fn bool_arg(&self, name: &str) -> Result<Option<bool>, ArgumentError> {
        match self.argument(name) {
            None => Ok(None),
            Some(AnnotationValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.wrong_type(name, "bool", other)),
        }
    }

    /// Read an optional enum argument as `(enum class, entry)`.
    ///
    /// # Errors
    /// Fails if the argument is not an enum entry.
    pub fn enum_arg(&self, name: &str) -> Result<Option<(&ClassName, &str)>, ArgumentError> {
        match self.argument(name) {
            None => Ok(None),
            Some(AnnotationValue::Enum { ty, entry }) => Ok(Some((ty, entry.as_str()))),
            Some(other) => Err(self.wrong_type(name, "enum", other)),
        }
    }

    /// The `scope` argument every contribution and merge annotation carries.
    ///
    /// # Errors
    /// Fails if `scope` is absent, not a class, or unresolved.
    pub fn scope(&self) -> Result<&ClassName, ArgumentError> {
        self.required_class_arg("scope")
    }

    /// Canonical fingerprint: the annotation name followed by its arguments
    /// sorted by name. Nested annotations are flattened recursively, so two
    /// annotations with equal fingerprints are interchangeable as qualifiers.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        self.render(&mut out);
        out
    }

    fn render(&self, out: &mut String) {
        out.push_str(&self.name.canonical());
        if self.arguments.is_empty() {
            return;
        }
        out.push('(');
        for (i, (name, value)) in self.arguments.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
            out.push('=');
            value.render(out);
        }
        out.push(')');
    }

    fn wrong_type(&self, argument: &str, expected: &'static str, found: &AnnotationValue) -> ArgumentError {
        ArgumentError::WrongType {
            annotation: self.name.clone(),
            argument: argument.to_owned(),
            expected,
            found: found.kind(),
        }
    }

    fn unresolved(&self, argument: &str, reference: &str) -> ArgumentError {
        ArgumentError::Unresolved {
            annotation: self.name.clone(),
            argument: argument.to_owned(),
            reference: reference.to_owned(),
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
    fn class_arg_reads_resolved_class() {
        let a = Annotation::new(cn("graft.annotations.ContributesTo"))
            .with("scope", AnnotationValue::Class(cn("com.example.AppScope")));
        assert_eq!(a.scope().unwrap(), &cn("com.example.AppScope"));
    }

    #[test]
    fn missing_scope_is_structured() {
        let a = Annotation::new(cn("graft.annotations.ContributesTo"));
        let err = a.scope().unwrap_err();
        assert!(matches!(err, ArgumentError::Missing { ref argument, .. } if argument == "scope"));
        assert!(err.to_string().contains("missing required argument 'scope'"));
    }

    #[test]
    fn wrong_type_names_expected_and_found() {
        let a = Annotation::new(cn("graft.annotations.ContributesBinding"))
            .with("rank", AnnotationValue::String("high".to_owned()));
        let err = a.int_arg("rank").unwrap_err();
        assert_eq!(
            err,
            ArgumentError::WrongType {
                annotation: cn("graft.annotations.ContributesBinding"),
                argument: "rank".to_owned(),
                expected: "int",
                found: "string",
            }
        );
    }

    #[test]
    fn unresolved_class_in_array_is_reported() {
        let a = Annotation::new(cn("graft.annotations.MergeComponent")).with(
            "exclude",
            AnnotationValue::Array(vec![
                AnnotationValue::Class(cn("com.example.A")),
                AnnotationValue::Unresolved("Missing".to_owned()),
            ]),
        );
        let err = a.class_array_arg("exclude").unwrap_err();
        assert!(matches!(err, ArgumentError::Unresolved { ref reference, .. } if reference == "Missing"));
    }

    #[test]
    fn single_class_is_accepted_as_array() {
        let a = Annotation::new(cn("graft.annotations.MergeComponent"))
            .with("modules", AnnotationValue::Class(cn("com.example.M")));
        assert_eq!(a.class_array_arg("modules").unwrap(), vec![cn("com.example.M")]);
        assert!(a.class_array_arg("exclude").unwrap().is_empty());
    }

    #[test]
    fn rank_outside_i32_is_rejected() {
        let a = Annotation::new(cn("graft.annotations.ContributesBinding"))
            .with("rank", AnnotationValue::Int(i64::MAX));
        assert!(a.int_arg("rank").is_err());
    }

    #[test]
    fn fingerprint_is_order_independent_and_flattens_nested() {
        let inner = Annotation::new(cn("com.example.Tag"))
            .with("value", AnnotationValue::String("x".to_owned()));
        let a = Annotation::new(cn("com.example.Named"))
            .with("b", AnnotationValue::Int(2))
            .with("a", AnnotationValue::Annotation(Box::new(inner.clone())));
        let b = Annotation::new(cn("com.example.Named"))
            .with("a", AnnotationValue::Annotation(Box::new(inner)))
            .with("b", AnnotationValue::Int(2));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(
            a.fingerprint(),
            "com.example.Named(a=@com.example.Tag(value=\"x\"),b=2)"
        );
    }

    #[test]
    fn fingerprint_renders_classes_and_enums_canonically() {
        let a = Annotation::new(cn("com.example.Keyed"))
            .with("key", AnnotationValue::Class(cn("com.example.Outer.Key")))
            .with(
                "mode",
                AnnotationValue::Enum {
                    ty: cn("com.example.Mode"),
                    entry: "FAST".to_owned(),
                },
            );
        assert_eq!(
            a.fingerprint(),
            "com.example.Keyed(key=com.example.Outer.Key,mode=com.example.Mode.FAST)"
        );
    }
}
