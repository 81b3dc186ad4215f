//! Merge resolution.
//!
//! Turns the contributions of a scope into the merged declaration of one
//! merge target:
//!
//! - **target**: read a [`MergeTarget`] from its declaration.
//! - **validate**: static checks on targets and contributed declarations.
//! - **binding**: resolve competing bindings by rank.
//! - **assemble**: apply `replaces` and `exclude` and build the final lists.
//! - **descriptor**: the sealed, serializable [`MergeDescriptor`].
//!
//! # Determinism guarantee
//!
//! The same contributions always produce the same descriptor, byte for byte:
//!
//! - Binding groups iterate in sorted key order.
//! - Output lists keep first-seen order over a deterministic scan.
//! - The digest covers the canonical JSON form only.

pub mod assemble;
pub mod binding;
pub mod descriptor;
pub mod target;
pub mod validate;

pub use assemble::{Assembler, NestedContributions};
pub use binding::{BindingKey, ContributedBindings};
pub use descriptor::{BindingSummary, CreatorDescriptor, CreatorShim, MergeDescriptor};
pub use target::{Creator, CreatorKind, MergeTarget, TargetKind};
