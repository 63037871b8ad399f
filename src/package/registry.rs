//! Registry of the external packages this tool knows how to handle.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use super::{Arpack, Package};
use crate::error::PackageError;

/// Packages keyed by lower-case name.
#[derive(Default)]
pub struct PackageRegistry {
    packages: BTreeMap<String, Arc<dyn Package>>,
}

impl PackageRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every package shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Arpack::new()));
        registry
    }

    /// Register a package. A package with the same name is replaced.
    pub fn register(&mut self, package: Arc<dyn Package>) {
        let name = package.descriptor().name.to_lowercase();
        self.packages.insert(name, package);
    }

    /// Look a package up by name, ignoring case.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn Package>> {
        self.packages
            .get(&name.to_lowercase())
            .ok_or_else(|| PackageError::UnknownPackage(name.to_string()).into())
    }

    /// Registered package names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        self.packages.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Package>> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
