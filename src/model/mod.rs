//! Symbol model: names, annotations, declarations and the universe they live in.

pub mod annotation;
pub mod declaration;
pub mod known;
pub mod name;
pub mod universe;

pub use annotation::{Annotation, AnnotationValue, ArgumentError};
pub use declaration::{Declaration, DeclarationKind, Function, Origin, Visibility};
pub use name::{ClassName, TypeRef, ValidationError};
pub use universe::{HintProperty, SymbolTable, SymbolUniverse};
