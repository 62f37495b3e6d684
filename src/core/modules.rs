//! core::modules
//!
//! The configured set of modules and where each one is stored.
//!
//! The registry never discovers modules on its own: every coordinate it
//! serves is declared in configuration and maps to exactly one git
//! repository. [`ModuleCoordinateMap`] is the read-only view the protocol
//! layer consumes; [`ModuleMap`] is the implementation built by
//! [`crate::core::config`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::types::ModuleCoordinate;

/// Where a module's repository lives, and where that was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLocation {
    /// Path to the git repository (bare or with a working tree).
    pub git_dir: PathBuf,
    /// Human-readable origin of the declaration, e.g. `registry.toml: module[2]`.
    ///
    /// Only ever written to server-side logs.
    pub origin: String,
}

impl fmt::Display for ModuleLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (declared at {})", self.git_dir.display(), self.origin)
    }
}

/// Read-only lookup from module coordinates to storage locations.
pub trait ModuleCoordinateMap: Send + Sync {
    /// Resolve a full coordinate, or `None` if any component is unconfigured.
    fn lookup(&self, namespace: &str, name: &str, provider: &str) -> Option<&ModuleLocation>;

    /// All providers configured for `namespace/name`, in provider order.
    ///
    /// Returns `None` if the namespace or name is unconfigured.
    fn providers(&self, namespace: &str, name: &str) -> Option<Vec<(&str, &ModuleLocation)>>;
}

/// Nested namespace → name → provider map of configured modules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMap {
    modules: BTreeMap<String, BTreeMap<String, BTreeMap<String, ModuleLocation>>>,
}

impl ModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module, returning the location previously declared for the
    /// same coordinate (which is left in place).
    pub fn insert(
        &mut self,
        coordinate: &ModuleCoordinate,
        location: ModuleLocation,
    ) -> Result<(), &ModuleLocation> {
        use std::collections::btree_map::Entry;

        let providers = self
            .modules
            .entry(coordinate.namespace().to_string())
            .or_default()
            .entry(coordinate.name().to_string())
            .or_default();

        match providers.entry(coordinate.provider().to_string()) {
            Entry::Occupied(existing) => Err(existing.into_mut()),
            Entry::Vacant(slot) => {
                slot.insert(location);
                Ok(())
            }
        }
    }

    /// Number of configured modules.
    pub fn len(&self) -> usize {
        self.modules
            .values()
            .flat_map(|names| names.values())
            .map(|providers| providers.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate all modules in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleCoordinate, &ModuleLocation)> + '_ {
        self.modules.iter().flat_map(|(namespace, names)| {
            names.iter().flat_map(move |(name, providers)| {
                providers.iter().filter_map(move |(provider, location)| {
                    ModuleCoordinate::new(namespace.as_str(), name.as_str(), provider.as_str())
                        .ok()
                        .map(|coordinate| (coordinate, location))
                })
            })
        })
    }
}

impl ModuleCoordinateMap for ModuleMap {
    fn lookup(&self, namespace: &str, name: &str, provider: &str) -> Option<&ModuleLocation> {
        self.modules.get(namespace)?.get(name)?.get(provider)
    }

    fn providers(&self, namespace: &str, name: &str) -> Option<Vec<(&str, &ModuleLocation)>> {
        let providers = self.modules.get(namespace)?.get(name)?;
        Some(
            providers
                .iter()
                .map(|(provider, location)| (provider.as_str(), location))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(dir: &str) -> ModuleLocation {
        ModuleLocation {
            git_dir: PathBuf::from(dir),
            origin: format!("test: {dir}"),
        }
    }

    fn coordinate(ns: &str, name: &str, provider: &str) -> ModuleCoordinate {
        ModuleCoordinate::new(ns, name, provider).unwrap()
    }

    #[test]
    fn lookup_requires_every_component() {
        let mut map = ModuleMap::new();
        map.insert(&coordinate("acme", "widget", "aws"), location("/a"))
            .unwrap();

        assert_eq!(
            map.lookup("acme", "widget", "aws").map(|l| &l.git_dir),
            Some(&PathBuf::from("/a"))
        );
        assert!(map.lookup("acme", "widget", "gcp").is_none());
        assert!(map.lookup("acme", "gadget", "aws").is_none());
        assert!(map.lookup("other", "widget", "aws").is_none());
    }

    #[test]
    fn duplicate_insert_reports_existing() {
        let mut map = ModuleMap::new();
        let c = coordinate("acme", "widget", "aws");
        map.insert(&c, location("/first")).unwrap();

        let existing = map.insert(&c, location("/second")).unwrap_err();
        assert_eq!(existing.git_dir, PathBuf::from("/first"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn providers_are_sorted() {
        let mut map = ModuleMap::new();
        map.insert(&coordinate("acme", "widget", "gcp"), location("/g"))
            .unwrap();
        map.insert(&coordinate("acme", "widget", "aws"), location("/a"))
            .unwrap();
        map.insert(&coordinate("acme", "widget", "azure"), location("/z"))
            .unwrap();

        let providers: Vec<&str> = map
            .providers("acme", "widget")
            .unwrap()
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(providers, vec!["aws", "azure", "gcp"]);
    }

    #[test]
    fn providers_of_unknown_module_is_none() {
        let map = ModuleMap::new();
        assert!(map.providers("acme", "widget").is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn iter_yields_coordinates_in_order() {
        let mut map = ModuleMap::new();
        map.insert(&coordinate("b", "x", "p"), location("/2"))
            .unwrap();
        map.insert(&coordinate("a", "y", "p"), location("/1"))
            .unwrap();

        let all: Vec<String> = map.iter().map(|(c, _)| c.to_string()).collect();
        assert_eq!(all, vec!["a/y/p", "b/x/p"]);
    }
}
