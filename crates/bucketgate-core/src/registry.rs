//! Bucket registry: the whitelist of real bucket identifiers and their aliases
//!
//! Every route accepts a bucket either by its real identifier or by its
//! configured alias. The registry is built once at startup, validated, and
//! never mutated afterwards, so lookups need no locking. Both directions are
//! precomputed hash maps keyed by `String` and queried with `&str`, so
//! resolution on the proxy hot path does not allocate.

use crate::{CoreError, Result};
use std::collections::HashMap;

/// Immutable mapping between real bucket identifiers and display aliases
#[derive(Debug, Clone)]
pub struct BucketRegistry {
    /// Real identifiers in configured order
    real_names: Vec<String>,
    /// Aliases, parallel to `real_names`; empty when aliasing is disabled
    aliases: Vec<String>,
    /// alias -> index (identity over real names when aliasing is disabled)
    alias_to_real: HashMap<String, usize>,
    /// real identifier -> index
    real_to_alias: HashMap<String, usize>,
}

impl BucketRegistry {
    /// Build and validate a registry.
    ///
    /// `aliases` must be empty or exactly as long as `real_names`. Duplicate
    /// identifiers, duplicate aliases, blank entries, and aliases that collide
    /// with another entry's real identifier are rejected.
    pub fn new(real_names: Vec<String>, aliases: Vec<String>) -> Result<Self> {
        if real_names.is_empty() {
            return Err(CoreError::NoBuckets);
        }
        if !aliases.is_empty() && aliases.len() != real_names.len() {
            return Err(CoreError::AliasCountMismatch {
                aliases: aliases.len(),
                buckets: real_names.len(),
            });
        }
        if real_names.iter().chain(aliases.iter()).any(|n| n.trim().is_empty()) {
            return Err(CoreError::BlankName);
        }

        let mut real_to_alias = HashMap::with_capacity(real_names.len());
        for (idx, real) in real_names.iter().enumerate() {
            if real_to_alias.insert(real.clone(), idx).is_some() {
                return Err(CoreError::DuplicateBucket(real.clone()));
            }
        }

        let alias_to_real = if aliases.is_empty() {
            real_to_alias.clone()
        } else {
            let mut map = HashMap::with_capacity(aliases.len());
            for (idx, alias) in aliases.iter().enumerate() {
                if map.insert(alias.clone(), idx).is_some() {
                    return Err(CoreError::DuplicateAlias(alias.clone()));
                }
                if real_to_alias.get(alias).is_some_and(|&other| other != idx) {
                    return Err(CoreError::AmbiguousName(alias.clone()));
                }
            }
            map
        };

        Ok(Self {
            real_names,
            aliases,
            alias_to_real,
            real_to_alias,
        })
    }

    /// Resolve an alias or real identifier to the real identifier
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.alias_to_real
            .get(name)
            .or_else(|| self.real_to_alias.get(name))
            .map(|&idx| self.real_names[idx].as_str())
    }

    /// Check whether `name` refers to a configured bucket
    pub fn is_valid(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Display name for a real identifier; falls back to the identifier itself
    pub fn display_name<'a>(&'a self, real: &'a str) -> &'a str {
        self.real_to_alias
            .get(real)
            .and_then(|&idx| self.aliases.get(idx))
            .map_or(real, String::as_str)
    }

    /// Whether aliases were configured
    pub fn aliases_enabled(&self) -> bool {
        !self.aliases.is_empty()
    }

    /// Real identifiers in configured order
    pub fn real_names(&self) -> &[String] {
        &self.real_names
    }

    /// `(real, display)` pairs in configured order
    pub fn buckets(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.real_names
            .iter()
            .map(|real| (real.as_str(), self.display_name(real)))
    }

    /// Number of configured buckets
    pub fn len(&self) -> usize {
        self.real_names.len()
    }

    /// Always false for a constructed registry
    pub fn is_empty(&self) -> bool {
        self.real_names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn aliased() -> BucketRegistry {
        BucketRegistry::new(names(&["raw-id-1", "raw-id-2"]), names(&["docs", "media"])).unwrap()
    }

    #[test]
    fn test_alias_and_real_resolve_to_real() {
        let registry = aliased();
        for (real, alias) in [("raw-id-1", "docs"), ("raw-id-2", "media")] {
            assert_eq!(registry.resolve(alias), Some(real));
            assert_eq!(registry.resolve(real), Some(real));
            assert_eq!(registry.display_name(real), alias);
        }
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("Docs")]
    #[case("raw-id")]
    #[case("raw-id-3")]
    #[case("docs/")]
    fn test_unknown_names_are_invalid(#[case] name: &str) {
        let registry = aliased();
        assert_eq!(registry.resolve(name), None);
        assert!(!registry.is_valid(name));
    }

    #[test]
    fn test_without_aliases_only_real_names_resolve() {
        let registry = BucketRegistry::new(names(&["raw-id-1", "raw-id-2"]), vec![]).unwrap();
        assert!(!registry.aliases_enabled());
        assert_eq!(registry.resolve("raw-id-2"), Some("raw-id-2"));
        assert_eq!(registry.resolve("docs"), None);
        assert_eq!(registry.display_name("raw-id-1"), "raw-id-1");
    }

    #[test]
    fn test_display_name_falls_back_for_unknown() {
        let registry = aliased();
        assert_eq!(registry.display_name("not-configured"), "not-configured");
    }

    #[test]
    fn test_buckets_in_order() {
        let pairs: Vec<_> = aliased().buckets().map(|(r, d)| (r.to_string(), d.to_string())).collect();
        assert_eq!(
            pairs,
            vec![
                ("raw-id-1".to_string(), "docs".to_string()),
                ("raw-id-2".to_string(), "media".to_string()),
            ]
        );
    }

    #[test]
    fn test_alias_count_mismatch_is_fatal() {
        let err = BucketRegistry::new(names(&["raw-id-1", "raw-id-2"]), names(&["only-one"])).unwrap_err();
        assert!(matches!(err, CoreError::AliasCountMismatch { aliases: 1, buckets: 2 }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_configurations() {
        assert!(matches!(BucketRegistry::new(vec![], vec![]), Err(CoreError::NoBuckets)));
        assert!(matches!(
            BucketRegistry::new(names(&["a", "a"]), vec![]),
            Err(CoreError::DuplicateBucket(_))
        ));
        assert!(matches!(
            BucketRegistry::new(names(&["a", "b"]), names(&["x", "x"])),
            Err(CoreError::DuplicateAlias(_))
        ));
        assert!(matches!(
            BucketRegistry::new(names(&["a", " "]), vec![]),
            Err(CoreError::BlankName)
        ));
        // "b" would mean both raw bucket b and the alias of a
        assert!(matches!(
            BucketRegistry::new(names(&["a", "b"]), names(&["b", "c"])),
            Err(CoreError::AmbiguousName(_))
        ));
    }

    #[test]
    fn test_alias_equal_to_own_real_name() {
        let registry = BucketRegistry::new(names(&["a", "b"]), names(&["a", "bee"])).unwrap();
        assert_eq!(registry.resolve("a"), Some("a"));
        assert_eq!(registry.resolve("bee"), Some("b"));
        assert_eq!(registry.display_name("a"), "a");
    }
}
