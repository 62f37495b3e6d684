//! Property-based tests for version ordering and the version catalog.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated tag sets.

use std::cmp::Ordering;

use proptest::prelude::*;

use modreg::core::version::Version;
use modreg::git::memory::MemoryStore;
use modreg::registry::VersionCatalog;

/// Strategy for prerelease identifiers, numeric or alphanumeric.
fn prerelease_identifier() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u64..20).prop_map(|n| n.to_string()),
        "[a-z][a-z0-9-]{0,6}",
    ]
}

/// Strategy for well-formed version strings with 1 to 4 numeric segments.
fn version_string() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(0u64..12, 1..=4),
        prop::option::of(prop::collection::vec(prerelease_identifier(), 1..3)),
        prop::option::of("[a-z0-9]{1,5}"),
    )
        .prop_map(|(segments, pre, meta)| {
            let mut s = segments
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(".");
            if let Some(pre) = pre {
                s.push('-');
                s.push_str(&pre.join("."));
            }
            if let Some(meta) = meta {
                s.push('+');
                s.push_str(&meta);
            }
            s
        })
}

/// Strategy for reference names, mostly version tags with some noise.
fn reference_name() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => version_string().prop_map(|v| format!("refs/tags/v{v}")),
        1 => "[a-z]{1,8}".prop_map(|n| format!("refs/heads/{n}")),
        1 => "[a-z.]{1,8}".prop_map(|n| format!("refs/tags/v{n}")),
        1 => version_string().prop_map(|v| format!("refs/tags/{v}")),
    ]
}

fn store_with(refs: &[String]) -> MemoryStore {
    let mut store = MemoryStore::new();
    let tree = store.add_tree(vec![]);
    for name in refs {
        store.add_tag(name, &tree, 0);
    }
    store
}

proptest! {
    #[test]
    fn generated_versions_parse(s in version_string()) {
        prop_assert!(Version::parse(&s).is_ok(), "failed to parse {}", s);
    }

    #[test]
    fn canonical_form_reparses_equal(s in version_string()) {
        let version = Version::parse(&s).unwrap();
        let reparsed = Version::parse(&version.to_string()).unwrap();
        prop_assert_eq!(&version, &reparsed);
        prop_assert_eq!(version.to_string(), reparsed.to_string());
    }

    #[test]
    fn ordering_is_antisymmetric(a in version_string(), b in version_string()) {
        let a = Version::parse(&a).unwrap();
        let b = Version::parse(&b).unwrap();
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    #[test]
    fn trailing_zero_segments_are_equal(s in version_string()) {
        let version = Version::parse(&s).unwrap();
        let core: Vec<String> = version.segments().iter().map(ToString::to_string).collect();
        let padded = format!("{}.0", core.join("."));
        let mut padded = Version::parse(&padded).unwrap();
        if let Some(pre) = version.prerelease() {
            padded = Version::parse(&format!("{padded}-{pre}")).unwrap();
        }
        prop_assert_eq!(version.cmp(&padded), Ordering::Equal);
    }

    #[test]
    fn prerelease_ranks_below_release(s in version_string()) {
        let version = Version::parse(&s).unwrap();
        let core: Vec<String> = version.segments().iter().map(ToString::to_string).collect();
        let release = Version::parse(&core.join(".")).unwrap();
        if version.is_prerelease() {
            prop_assert!(version < release);
        } else {
            prop_assert!(version == release);
        }
    }

    #[test]
    fn listing_is_strictly_descending(refs in prop::collection::vec(reference_name(), 0..20)) {
        let store = store_with(&refs);
        let versions = VersionCatalog::new(&store).list_versions().unwrap();
        for pair in versions.windows(2) {
            prop_assert!(pair[0] > pair[1], "{} !> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn listing_is_exactly_the_parseable_tags(refs in prop::collection::vec(reference_name(), 0..20)) {
        let store = store_with(&refs);
        let versions = VersionCatalog::new(&store).list_versions().unwrap();

        let parseable: Vec<Version> = refs
            .iter()
            .filter_map(|r| r.strip_prefix("refs/tags/v"))
            .filter_map(|v| Version::parse(v).ok())
            .collect();

        for version in &parseable {
            prop_assert!(versions.iter().any(|listed| listed == version));
        }
        for listed in &versions {
            prop_assert!(parseable.iter().any(|version| version == listed));
        }
    }

    #[test]
    fn latest_is_first_listed(refs in prop::collection::vec(reference_name(), 0..20)) {
        let store = store_with(&refs);
        let catalog = VersionCatalog::new(&store);
        let versions = catalog.list_versions().unwrap();
        prop_assert_eq!(catalog.latest_version().unwrap(), versions.first().cloned());
    }

    #[test]
    fn every_listed_version_exists(refs in prop::collection::vec(reference_name(), 0..20)) {
        let store = store_with(&refs);
        let catalog = VersionCatalog::new(&store);
        for version in catalog.list_versions().unwrap() {
            prop_assert!(catalog.has_version(&version).unwrap());
        }
    }
}
