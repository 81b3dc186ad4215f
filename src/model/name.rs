//! Declaration names.
//!
//! [`ClassName`] is the identity of every declaration the engine talks about:
//! contributed classes, scopes, merge targets and generated types. It keeps the
//! package and the nesting chain apart so the identity generator can rebuild
//! names without re-parsing dotted strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A name failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// The rejected input.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid class name '{}': {}", self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// ClassName
// ---------------------------------------------------------------------------

/// A fully qualified declaration name: a package plus a non-empty nesting chain.
///
/// `com.example.Outer.Inner` has package `com.example` and simple names
/// `["Outer", "Inner"]`. The root package is the empty string.
///
/// Serialized as its canonical dotted form. Parsing a dotted string uses the
/// usual convention that package segments start lowercase and class segments
/// start uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassName {
    package: String,
    simple_names: Vec<String>,
}

impl ClassName {
    /// Create a class name from its parts.
    ///
    /// # Errors
    /// Returns an error if `simple_names` is empty or any segment is not a
    /// valid identifier.
    pub fn new<S: Into<String>>(
        package: &str,
        simple_names: impl IntoIterator<Item = S>,
    ) -> Result<Self, ValidationError> {
        let simple_names: Vec<String> = simple_names.into_iter().map(Into::into).collect();
        let name = Self {
            package: package.to_owned(),
            simple_names,
        };
        name.validate()?;
        Ok(name)
    }

    /// Parse a canonical dotted name, guessing where the package ends.
    ///
    /// # Errors
    /// Returns an error if no segment starts with an uppercase letter or a
    /// segment is not a valid identifier.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let segments: Vec<&str> = s.split('.').collect();
        let first_class = segments
            .iter()
            .position(|seg| seg.chars().next().is_some_and(char::is_uppercase))
            .ok_or_else(|| ValidationError {
                value: s.to_owned(),
                reason: "no segment starts with an uppercase letter".to_owned(),
            })?;
        let package = segments[..first_class].join(".");
        Self::new(&package, segments[first_class..].iter().copied()).map_err(|mut e| {
            e.value = s.to_owned();
            e
        })
    }

    /// The package, empty for the root package.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The nesting chain, outermost first.
    #[must_use]
    pub fn simple_names(&self) -> &[String] {
        &self.simple_names
    }

    /// The innermost simple name.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.simple_names.last().map_or("", String::as_str)
    }

    /// The nesting chain joined with `.` (`Outer.Inner`).
    #[must_use]
    pub fn relative_name(&self) -> String {
        self.simple_names.join(".")
    }

    /// The canonical dotted name (`com.example.Outer.Inner`).
    #[must_use]
    pub fn canonical(&self) -> String {
        if self.package.is_empty() {
            self.relative_name()
        } else {
            format!("{}.{}", self.package, self.relative_name())
        }
    }

    /// A class nested inside this one.
    #[must_use]
    pub fn nested(&self, simple_name: &str) -> Self {
        let mut simple_names = self.simple_names.clone();
        simple_names.push(simple_name.to_owned());
        Self {
            package: self.package.clone(),
            simple_names,
        }
    }

    /// The enclosing class, if this name is nested.
    #[must_use]
    pub fn enclosing(&self) -> Option<Self> {
        if self.simple_names.len() < 2 {
            return None;
        }
        Some(Self {
            package: self.package.clone(),
            simple_names: self.simple_names[..self.simple_names.len() - 1].to_vec(),
        })
    }

    /// A top-level class in `package` with a single simple name.
    ///
    /// Used for generated names whose simple name was already validated by
    /// construction.
    pub(crate) fn top_level(package: String, simple_name: String) -> Self {
        Self {
            package,
            simple_names: vec![simple_name],
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let err = |reason: String| ValidationError {
            value: self.canonical(),
            reason,
        };
        if self.simple_names.is_empty() {
            return Err(err("at least one simple name is required".to_owned()));
        }
        if !self.package.is_empty() {
            for seg in self.package.split('.') {
                if !is_identifier(seg) {
                    return Err(err(format!("package segment '{seg}' is not an identifier")));
                }
            }
        }
        for seg in &self.simple_names {
            if !is_identifier(seg) {
                return Err(err(format!("simple name '{seg}' is not an identifier")));
            }
        }
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for ClassName {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClassName {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ClassName> for String {
    fn from(name: ClassName) -> Self {
        name.canonical()
    }
}

// ---------------------------------------------------------------------------
// TypeRef
// ---------------------------------------------------------------------------

/// A reference to a type as the host sees it this round.
///
/// `Error` references are symbols the host could not resolve yet, typically
/// because the declaring code is generated in a later round. In fixtures a
/// resolved reference is a plain string and an error one is `{"error": ".."}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    /// A resolved class.
    Resolved(ClassName),
    /// An unresolved reference, carrying the text the host saw.
    Error {
        /// The reference text.
        error: String,
    },
}

impl TypeRef {
    /// The resolved class, if any.
    #[must_use]
    pub const fn resolved(&self) -> Option<&ClassName> {
        match self {
            Self::Resolved(name) => Some(name),
            Self::Error { .. } => None,
        }
    }

    /// Returns `true` if the host could not resolve this reference.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl From<ClassName> for TypeRef {
    fn from(name: ClassName) -> Self {
        Self::Resolved(name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(name) => write!(f, "{name}"),
            Self::Error { error } => write!(f, "<error: {error}>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
