//! Generated type identities.
//!
//! Every generated declaration gets a name derived from the declarations it is
//! generated for. Generated subcomponents are namespaced under their *parent*
//! merge target so deep chains grow the package instead of the simple name.
//! Simple names that would push a file name past the configured ceiling are
//! truncated and suffixed with a fixed-width hash of the full identities they
//! were derived from.

use sha2::{Digest, Sha256};

use crate::config::IdentityConfig;
use crate::model::{ClassName, known};

/// Derives names for generated declarations.
#[derive(Clone, Debug, Default)]
pub struct IdentityGenerator {
    config: IdentityConfig,
}

impl IdentityGenerator {
    /// Create a generator with the given settings.
    #[must_use]
    pub const fn new(config: IdentityConfig) -> Self {
        Self { config }
    }

    /// The active settings.
    #[must_use]
    pub const fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Name of the subcomponent generated for `child` under merge target `parent`.
    ///
    /// Package: the parent's package plus its lower-cased relative name,
    /// prefixed with the component namespace unless the parent already lives
    /// there. Simple name: the child's nesting chain joined with `_`,
    /// truncated so `<name>$ParentComponent` fits the ceiling.
    #[must_use]
    pub fn generated_subcomponent_name(&self, child: &ClassName, parent: &ClassName) -> ClassName {
        let relative = parent.relative_name();
        let suffix = if relative.is_empty() {
            "root".to_owned()
        } else {
            relative.to_lowercase()
        };
        let parent_package = if parent.package().is_empty() {
            suffix
        } else {
            format!("{}.{suffix}", parent.package())
        };

        let namespace = &self.config.component_namespace;
        let package = if parent_package == *namespace
            || parent_package.starts_with(&format!("{namespace}."))
        {
            parent_package
        } else {
            format!("{namespace}.{parent_package}")
        };

        let simple = self.truncate(
            &child.simple_names().join("_"),
            &[child, parent],
            known::PARENT_COMPONENT.len(),
        );
        ClassName::top_level(package, simple)
    }

    /// Name of the merged declaration generated for a merge target.
    ///
    /// `creator` is the simple name of the target's factory or builder. The
    /// merged creator is nested in the merged declaration, so its length is
    /// reserved from the budget.
    #[must_use]
    pub fn merged_name(&self, class: &ClassName, creator: Option<&str>) -> ClassName {
        let simple = format!("Merged{}", class.simple_names().join("_"));
        let simple = self.truncate(&simple, &[class], creator.map_or(0, str::len));
        ClassName::top_level(class.package().to_owned(), simple)
    }

    /// Name of the module backing a contributed binding.
    #[must_use]
    pub fn binding_module_name(
        &self,
        origin: &ClassName,
        bound_type: &ClassName,
        scope: &ClassName,
        multibinding: bool,
    ) -> ClassName {
        let simple = format!(
            "{}As{}To{}{}BindingModule",
            origin.simple_names().join("_"),
            bound_type.simple_names().join("_"),
            scope.simple_names().join("_"),
            if multibinding { "Multi" } else { "" },
        );
        let simple = self.truncate(&simple, &[origin, bound_type, scope], 0);
        ClassName::top_level(origin.package().to_owned(), simple)
    }

    /// Longest simple name allowed when a nested type of `inner_len`
    /// characters is reserved.
    #[must_use]
    pub fn simple_name_budget(&self, inner_len: usize) -> usize {
        let base = self.config.base_budget().unwrap_or(0);
        let reserved = if inner_len == 0 { 0 } else { inner_len + 1 };
        base.saturating_sub(reserved)
    }

    fn truncate(&self, simple: &str, hash_inputs: &[&ClassName], inner_len: usize) -> String {
        let budget = self.simple_name_budget(inner_len);
        if simple.chars().count() <= budget {
            return simple.to_owned();
        }
        let keep = budget.saturating_sub(self.config.hash_length + 1);
        let prefix: String = simple.chars().take(keep).collect();
        format!("{prefix}_{}", self.hash(hash_inputs))
    }

    fn hash(&self, inputs: &[&ClassName]) -> String {
        let mut hasher = Sha256::new();
        for name in inputs {
            hasher.update(name.canonical().as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(hex, "{b:02x}");
        }
        hex.truncate(self.config.hash_length);
        hex
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

    fn is_hex_suffix(name: &str, width: usize) -> bool {
        let Some((_, tail)) = name.rsplit_once('_') else {
            return false;
        };
        tail.len() == width && tail.chars().all(|c| c.is_ascii_hexdigit())
    }

    #[test]
    fn subcomponent_is_namespaced_under_parent() {
        let ids = IdentityGenerator::default();
        let name = ids.generated_subcomponent_name(
            &cn("com.example.feature.LoggedInScope.Component"),
            &cn("com.example.AppComponent"),
        );
        assert_eq!(name.package(), "graft.component.com.example.appcomponent");
        assert_eq!(name.simple_name(), "LoggedInScope_Component");
    }

    #[test]
    fn nested_parent_relative_name_is_lowercased() {
        let ids = IdentityGenerator::default();
        let name = ids.generated_subcomponent_name(
            &cn("com.example.Child"),
            &cn("com.example.Outer.ParentComponent"),
        );
        assert_eq!(
            name.canonical(),
            "graft.component.com.example.outer.parentcomponent.Child"
        );
    }

    #[test]
    fn generated_parent_is_not_prefixed_twice() {
        let ids = IdentityGenerator::default();
        let first = ids.generated_subcomponent_name(&cn("com.example.Child"), &cn("com.example.App"));
        let second = ids.generated_subcomponent_name(&cn("com.example.GrandChild"), &first);
        assert_eq!(
            second.package(),
            "graft.component.com.example.app.child"
        );
    }

    #[test]
    fn root_package_parent() {
        let ids = IdentityGenerator::default();
        let name = ids.generated_subcomponent_name(&cn("Child"), &cn("App"));
        assert_eq!(name.canonical(), "graft.component.app.Child");
    }

    #[test]
    fn short_names_are_untouched() {
        let ids = IdentityGenerator::default();
        assert_eq!(
            ids.merged_name(&cn("com.example.AppComponent"), None).canonical(),
            "com.example.MergedAppComponent"
        );
        assert_eq!(
            ids.merged_name(&cn("com.example.Outer.Inner"), None).canonical(),
            "com.example.MergedOuter_Inner"
        );
    }

    #[test]
    fn binding_module_name_shape() {
        let ids = IdentityGenerator::default();
        let name = ids.binding_module_name(
            &cn("com.example.RealRepo"),
            &cn("com.example.Repo"),
            &cn("com.example.AppScope"),
            true,
        );
        assert_eq!(
            name.canonical(),
            "com.example.RealRepoAsRepoToAppScopeMultiBindingModule"
        );
    }

    #[test]
    fn default_budget_reserves_parent_component() {
        let ids = IdentityGenerator::default();
        assert_eq!(ids.simple_name_budget(known::PARENT_COMPONENT.len()), 217);
        assert_eq!(ids.simple_name_budget(0), 233);
    }

    #[test]
    fn long_names_are_truncated_with_fixed_width_hash() {
        let ids = IdentityGenerator::default();
        let long = "A".repeat(300);
        let child = ClassName::new("com.example", [long.as_str()]).unwrap();
        let name = ids.generated_subcomponent_name(&child, &cn("com.example.App"));
        assert_eq!(name.simple_name().chars().count(), 217);
        assert!(is_hex_suffix(name.simple_name(), 8));
    }

    #[test]
    fn four_level_chain_stays_within_ceiling() {
        let ids = IdentityGenerator::default();
        let cfg = ids.config().clone();
        let segment = "VeryLongFeatureSubcomponentNameThatKeepsGoing".repeat(3);
        let mut parent = cn("com.example.AppComponent");
        let mut names = Vec::new();
        for level in 0..4 {
            let child = ClassName::new(
                "com.example",
                [format!("{segment}{level}"), format!("{segment}Inner{level}")],
            )
            .unwrap();
            let generated = ids.generated_subcomponent_name(&child, &parent);
            let file_name_len = generated.simple_name().chars().count()
                + 1
                + known::PARENT_COMPONENT.len()
                + cfg.reserved_generated_suffix_length
                + cfg.reserved_extension_length;
            assert!(file_name_len <= cfg.max_file_name_length, "level {level}: {file_name_len}");
            assert!(is_hex_suffix(generated.simple_name(), cfg.hash_length), "{generated}");
            names.push(generated.clone());
            parent = generated;
        }
        // Sibling chains must not collide.
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
    }

    #[test]
    fn hash_depends_on_parent_identity() {
        let ids = IdentityGenerator::default();
        let long = "B".repeat(300);
        let child = ClassName::new("com.example", [long.as_str()]).unwrap();
        let a = ids.generated_subcomponent_name(&child, &cn("com.example.App"));
        let b = ids.generated_subcomponent_name(&child, &cn("com.example.App"));
        let c = ids.generated_subcomponent_name(&child, &cn("com.other.App"));
        assert_eq!(a, b);
        assert_ne!(a.simple_name(), c.simple_name());
    }

    #[test]
    fn custom_hash_width() {
        let ids = IdentityGenerator::new(IdentityConfig {
            hash_length: 12,
            ..IdentityConfig::default()
        });
        let long = "C".repeat(400);
        let class = ClassName::new("com.example", [long.as_str()]).unwrap();
        let merged = ids.merged_name(&class, None);
        assert!(is_hex_suffix(merged.simple_name(), 12));
        assert_eq!(merged.simple_name().chars().count(), 233);
    }

    #[test]
    fn merged_name_reserves_nested_creator() {
        let ids = IdentityGenerator::default();
        let long = "C".repeat(228);
        let class = ClassName::new("com.example", [long.as_str()]).unwrap();

        let bare = ids.merged_name(&class, None);
        assert_eq!(bare.simple_name().chars().count(), 233);
        assert!(is_hex_suffix(bare.simple_name(), 8));

        let merged = ids.merged_name(&class, Some("Factory"));
        let creator = merged.nested("Factory");
        let joined = creator.simple_names().join("$");
        assert!(joined.chars().count() <= ids.simple_name_budget(0));
        assert_eq!(merged.simple_name().chars().count(), 225);
    }
}
