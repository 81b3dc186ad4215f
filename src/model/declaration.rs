//! Declarations as the host exposes them.

use serde::{Deserialize, Serialize};

use super::annotation::Annotation;
use super::known;
use super::name::{ClassName, TypeRef};

/// What kind of type a declaration is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    /// An interface.
    Interface,
    /// A concrete class.
    Class,
    /// An abstract class.
    AbstractClass,
    /// A singleton object.
    Object,
    /// An annotation class.
    AnnotationClass,
}

/// Declared visibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Visible everywhere.
    #[default]
    Public,
    /// Visible within the compilation unit.
    Internal,
    /// Visible to subclasses.
    Protected,
    /// Visible within the declaring scope.
    Private,
}

/// Where a declaration comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Part of the current compilation.
    #[default]
    Source,
    /// Precompiled library code.
    Library,
}

/// A function declared directly in a type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Function name.
    pub name: String,
    /// Abstract functions have no body.
    #[serde(default)]
    pub is_abstract: bool,
    /// Declared visibility.
    #[serde(default)]
    pub visibility: Visibility,
    /// Declared return type.
    pub return_type: TypeRef,
}

/// A class-like declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Fully qualified name.
    pub name: ClassName,
    /// Declaration kind.
    pub kind: DeclarationKind,
    /// Declared visibility.
    #[serde(default)]
    pub visibility: Visibility,
    /// Source or library.
    #[serde(default)]
    pub origin: Origin,
    /// Annotations in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    /// Names of declared type parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<String>,
    /// Direct supertypes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<TypeRef>,
    /// Functions declared in the body.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<Function>,
}

impl Declaration {
    /// A public source declaration with nothing on it.
    #[must_use]
    pub const fn new(name: ClassName, kind: DeclarationKind) -> Self {
        Self {
            name,
            kind,
            visibility: Visibility::Public,
            origin: Origin::Source,
            annotations: Vec::new(),
            type_parameters: Vec::new(),
            supertypes: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// All annotations of the given class, in declaration order.
    pub fn annotations_named<'a, 'n>(
        &'a self,
        fq_name: &'n str,
    ) -> impl Iterator<Item = &'a Annotation> + use<'a, 'n> {
        self.annotations.iter().filter(move |a| a.is(fq_name))
    }

    /// The first annotation of the given class.
    #[must_use]
    pub fn annotation(&self, fq_name: &str) -> Option<&Annotation> {
        self.annotations_named(fq_name).next()
    }

    /// Returns `true` if at least one annotation of the given class is present.
    #[must_use]
    pub fn has_annotation(&self, fq_name: &str) -> bool {
        self.annotation(fq_name).is_some()
    }

    /// Returns `true` for interfaces.
    #[must_use]
    pub const fn is_interface(&self) -> bool {
        matches!(self.kind, DeclarationKind::Interface)
    }

    /// Returns `true` for interfaces and abstract classes.
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        matches!(
            self.kind,
            DeclarationKind::Interface | DeclarationKind::AbstractClass
        )
    }

    /// Returns `true` if the declaration is a DI module.
    #[must_use]
    pub fn is_module(&self) -> bool {
        self.has_annotation(known::MODULE)
    }

    /// Returns `true` if the declaration is public.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self.visibility, Visibility::Public)
    }

    /// Returns `true` if the declaration is precompiled.
    #[must_use]
    pub const fn is_library(&self) -> bool {
        matches!(self.origin, Origin::Library)
    }

    /// Resolved direct supertypes.
    pub fn resolved_supertypes(&self) -> impl Iterator<Item = &ClassName> {
        self.supertypes.iter().filter_map(TypeRef::resolved)
    }

    /// The first unresolved direct supertype, if any.
    #[must_use]
    pub fn unresolved_supertype(&self) -> Option<&TypeRef> {
        self.supertypes.iter().find(|t| t.is_error())
    }

    /// Abstract functions declared in the body.
    pub fn abstract_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| f.is_abstract)
    }
}
