//! Merge descriptors.
//!
//! A [`MergeDescriptor`] is everything a writer needs to emit the merged
//! declaration for one merge target. It serializes to a canonical JSON form
//! whose SHA-256 digest is stored alongside it; equal inputs produce equal
//! digests across runs.

use std::fmt::Write as _;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::ClassName;

use super::target::{CreatorKind, TargetKind};

/// A resolved binding and the module backing it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BindingSummary {
    /// The bound class.
    pub origin: ClassName,
    /// The type it is bound as.
    pub bound_type: ClassName,
    /// Qualifier fingerprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    /// Winning rank.
    pub rank: i32,
    /// The generated binding module.
    pub module: ClassName,
    /// `true` for multibinding elements.
    pub multibinding: bool,
}

/// Static entry point forwarding the DI-generated creator of the original
/// component name to the merged one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreatorShim {
    /// The shim class.
    pub class: ClassName,
    /// Its entry function (`factory` or `builder`).
    pub function: String,
    /// The creator type the function returns.
    pub returns: ClassName,
}

/// The creator of a merged component or subcomponent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreatorDescriptor {
    /// Factory or builder.
    pub kind: CreatorKind,
    /// The creator nested in the merge target.
    pub original: ClassName,
    /// The creator generated inside the merged declaration.
    pub generated: ClassName,
    /// Abstract functions re-declared to return the generated types.
    pub overrides: Vec<String>,
    /// Entry-point shim, for components.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shim: Option<CreatorShim>,
}

/// The merged declaration of one merge target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeDescriptor {
    /// The merge target.
    pub target: ClassName,
    /// The generated merged declaration.
    pub merged: ClassName,
    /// What is merged into.
    pub kind: TargetKind,
    /// DI annotation placed on the merged declaration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    /// Merged scopes.
    pub scopes: Vec<ClassName>,
    /// Final module list, in union order.
    pub modules: Vec<ClassName>,
    /// Final interface list, in union order.
    pub interfaces: Vec<ClassName>,
    /// Resolved bindings.
    pub bindings: Vec<BindingSummary>,
    /// Component dependencies copied from the target.
    pub dependencies: Vec<ClassName>,
    /// Declared subcomponents copied from a module aggregate.
    pub subcomponents: Vec<ClassName>,
    /// The creator, if the target has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<CreatorDescriptor>,
    /// Scopes the merged declaration is contributed to.
    pub contributes_to: Vec<ClassName>,
    /// Declarations of the current compilation the output derives from.
    pub originating: Vec<ClassName>,
    /// Hex SHA-256 of the canonical form without this field.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub digest: String,
}

impl MergeDescriptor {
    /// Canonical JSON form, digest included once sealed.
    ///
    /// # Errors
    /// Returns the serializer's error if the descriptor cannot be encoded.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Compute and store the digest. The previous digest, if any, is not
    /// part of the hashed form.
    ///
    /// # Errors
    /// Returns the serializer's error; the digest is left empty.
    pub fn seal(&mut self) -> Result<(), serde_json::Error> {
        self.digest.clear();
        let canonical = self.canonical_json()?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for b in digest.iter() {
            let _ = write!(hex, "{b:02x}");
        }
        self.digest = hex;
        Ok(())
    }
}
