//! Builder registries for commit coordinator clients.
//!
//! Table configuration names the coordinator that owns a table either
//! directly (a coordinator name) or through the catalog that manages it (a
//! catalog name). Each flavor has its own registry mapping the key to a
//! builder; the builder is consulted on every lookup and may hand out a
//! fresh client or a cached one.
//!
//! Registries are plain values meant to be constructed once per engine or
//! session and passed where needed. Tests build isolated instances instead
//! of mutating shared process-wide state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::coordinator::{CommitCoordinator, InMemoryCommitCoordinator, MAX_UNBACKFILLED_COMMITS};
use crate::utils::require;
use crate::{CoordinatorResult, Error};

/// String-keyed configuration handed to builders, typically sourced from
/// table or session properties.
pub type CoordinatorConf = HashMap<String, String>;

/// Factory for commit coordinator clients, registered by coordinator name.
///
/// Builders are pure factories: `build` is called on every lookup, and the
/// builder decides whether that means a new client or a cached one.
pub trait CommitCoordinatorBuilder: Send + Sync {
    /// The name table configuration uses to select this coordinator.
    fn name(&self) -> &str;

    /// Build (or fetch) a client for the given configuration.
    fn build(&self, conf: &CoordinatorConf) -> CoordinatorResult<Arc<dyn CommitCoordinator>>;
}

/// Factory for coordinator clients owned by a catalog, registered by catalog
/// name. The catalog name is passed back to the builder so one builder can
/// serve several catalogs of the same kind.
pub trait CatalogCoordinatorBuilder: Send + Sync {
    /// The catalog name table configuration uses to select this coordinator.
    fn catalog_name(&self) -> &str;

    /// Build (or fetch) a client for the given catalog and configuration.
    fn build(
        &self,
        conf: &CoordinatorConf,
        catalog_name: &str,
    ) -> CoordinatorResult<Arc<dyn CommitCoordinator>>;
}

/// Name-keyed registry of [`CommitCoordinatorBuilder`]s.
#[derive(Default)]
pub struct CoordinatorRegistry {
    builders: Mutex<HashMap<String, Arc<dyn CommitCoordinatorBuilder>>>,
}

impl CoordinatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the given builders. Duplicate names in the
    /// seed are rejected like any other duplicate registration.
    pub fn with_builders(
        builders: impl IntoIterator<Item = Arc<dyn CommitCoordinatorBuilder>>,
    ) -> CoordinatorResult<Self> {
        let registry = Self::new();
        for builder in builders {
            registry.register(builder)?;
        }
        Ok(registry)
    }

    /// Register a builder under its name. Fails if the name is taken.
    pub fn register(&self, builder: Arc<dyn CommitCoordinatorBuilder>) -> CoordinatorResult<()> {
        let mut builders = self.lock_builders();
        let name = builder.name().to_string();
        require!(
            !builders.contains_key(&name),
            Error::AlreadyRegistered(name)
        );
        debug!(%name, "registered commit coordinator builder");
        builders.insert(name, builder);
        Ok(())
    }

    /// A client for the named coordinator. Fails if no builder is registered
    /// under `name`.
    pub fn get(
        &self,
        name: &str,
        conf: &CoordinatorConf,
    ) -> CoordinatorResult<Arc<dyn CommitCoordinator>> {
        self.get_opt(name, conf)?
            .ok_or_else(|| Error::UnknownCoordinator(name.to_string()))
    }

    /// Like [`get`], but absence of a builder is `None` rather than an
    /// error. A registered builder that fails to build still fails.
    ///
    /// [`get`]: CoordinatorRegistry::get
    pub fn get_opt(
        &self,
        name: &str,
        conf: &CoordinatorConf,
    ) -> CoordinatorResult<Option<Arc<dyn CommitCoordinator>>> {
        // clone the builder out so clients build outside the registry lock
        let builder = self.lock_builders().get(name).cloned();
        builder.map(|b| b.build(conf)).transpose()
    }

    /// The names registered so far, sorted.
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.lock_builders().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock_builders(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn CommitCoordinatorBuilder>>> {
        self.builders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Catalog-keyed registry of [`CatalogCoordinatorBuilder`]s.
#[derive(Default)]
pub struct CatalogCoordinatorRegistry {
    builders: Mutex<HashMap<String, Arc<dyn CatalogCoordinatorBuilder>>>,
}

impl CatalogCoordinatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the given builders.
    pub fn with_builders(
        builders: impl IntoIterator<Item = Arc<dyn CatalogCoordinatorBuilder>>,
    ) -> CoordinatorResult<Self> {
        let registry = Self::new();
        for builder in builders {
            registry.register(builder)?;
        }
        Ok(registry)
    }

    /// Register a builder under its catalog name. Fails if the name is
    /// taken.
    pub fn register(&self, builder: Arc<dyn CatalogCoordinatorBuilder>) -> CoordinatorResult<()> {
        let mut builders = self.lock_builders();
        let catalog_name = builder.catalog_name().to_string();
        require!(
            !builders.contains_key(&catalog_name),
            Error::AlreadyRegistered(catalog_name)
        );
        debug!(%catalog_name, "registered catalog commit coordinator builder");
        builders.insert(catalog_name, builder);
        Ok(())
    }

    /// A client for the coordinator owned by the named catalog.
    pub fn get(
        &self,
        catalog_name: &str,
        conf: &CoordinatorConf,
    ) -> CoordinatorResult<Arc<dyn CommitCoordinator>> {
        self.get_opt(catalog_name, conf)?
            .ok_or_else(|| Error::UnknownCoordinator(catalog_name.to_string()))
    }

    /// Like [`get`], but absence of a builder is `None` rather than an
    /// error.
    ///
    /// [`get`]: CatalogCoordinatorRegistry::get
    pub fn get_opt(
        &self,
        catalog_name: &str,
        conf: &CoordinatorConf,
    ) -> CoordinatorResult<Option<Arc<dyn CommitCoordinator>>> {
        let builder = self.lock_builders().get(catalog_name).cloned();
        builder.map(|b| b.build(conf, catalog_name)).transpose()
    }

    /// The catalog names registered so far, sorted.
    pub fn registered_catalog_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.lock_builders().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock_builders(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn CatalogCoordinatorBuilder>>> {
        self.builders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Coordinator name served by [`InMemoryCoordinatorBuilder`].
pub const IN_MEMORY_COORDINATOR_NAME: &str = "in-memory";

/// Conf key read by [`InMemoryCoordinatorBuilder`]: bound on the per-table
/// unbackfilled window.
pub const MAX_UNBACKFILLED_COMMITS_KEY: &str = "inMemory.maxUnbackfilledCommits";

/// Builder for the bundled [`InMemoryCommitCoordinator`].
///
/// One coordinator is kept per configured window bound and shared across
/// lookups, so every client resolved through the same registry instance
/// observes the same ledgers.
#[derive(Default)]
pub struct InMemoryCoordinatorBuilder {
    coordinators: Mutex<HashMap<usize, Arc<InMemoryCommitCoordinator>>>,
}

impl InMemoryCoordinatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommitCoordinatorBuilder for InMemoryCoordinatorBuilder {
    fn name(&self) -> &str {
        IN_MEMORY_COORDINATOR_NAME
    }

    fn build(&self, conf: &CoordinatorConf) -> CoordinatorResult<Arc<dyn CommitCoordinator>> {
        let limit = match conf.get(MAX_UNBACKFILLED_COMMITS_KEY) {
            Some(raw) => raw.parse::<usize>().ok().filter(|limit| *limit > 0).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "'{raw}' is not a positive integer for {MAX_UNBACKFILLED_COMMITS_KEY}"
                ))
            })?,
            None => MAX_UNBACKFILLED_COMMITS,
        };
        let mut coordinators = self
            .coordinators
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let coordinator = coordinators
            .entry(limit)
            .or_insert_with(|| {
                Arc::new(InMemoryCommitCoordinator::with_max_unbackfilled_commits(
                    limit,
                ))
            })
            .clone();
        Ok(coordinator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = CoordinatorRegistry::new();
        registry
            .register(Arc::new(InMemoryCoordinatorBuilder::new()))
            .unwrap();
        let err = registry
            .register(Arc::new(InMemoryCoordinatorBuilder::new()))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered(name) if name == "in-memory"));
    }

    #[test]
    fn test_unknown_lookup() {
        let registry = CoordinatorRegistry::new();
        let conf = CoordinatorConf::new();
        let err = registry.get("nope", &conf).unwrap_err();
        assert!(matches!(err, Error::UnknownCoordinator(name) if name == "nope"));
        assert!(registry.get_opt("nope", &conf).unwrap().is_none());
    }

    #[test]
    fn test_seeded_registry_serves_cached_clients() {
        let registry = CoordinatorRegistry::with_builders([Arc::new(
            InMemoryCoordinatorBuilder::new(),
        )
            as Arc<dyn CommitCoordinatorBuilder>])
        .unwrap();
        assert_eq!(registry.registered_names(), vec!["in-memory"]);

        let conf = CoordinatorConf::new();
        let first = registry.get(IN_MEMORY_COORDINATOR_NAME, &conf).unwrap();
        let second = registry.get(IN_MEMORY_COORDINATOR_NAME, &conf).unwrap();
        // repeated lookups resolve the same underlying coordinator
        assert!(first.is_same_coordinator(second.as_ref()));
    }

    #[test]
    fn test_window_bound_conf() {
        let builder = InMemoryCoordinatorBuilder::new();

        let conf =
            CoordinatorConf::from([(MAX_UNBACKFILLED_COMMITS_KEY.to_string(), "3".to_string())]);
        let small = builder.build(&conf).unwrap();
        let default = builder.build(&CoordinatorConf::new()).unwrap();
        // different bounds are different coordinators
        assert!(!small.is_same_coordinator(default.as_ref()));

        for bad in ["zero", "-1", "0", ""] {
            let conf = CoordinatorConf::from([(
                MAX_UNBACKFILLED_COMMITS_KEY.to_string(),
                bad.to_string(),
            )]);
            let err = builder.build(&conf).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "accepted {bad:?}");
        }
    }

    struct FixedCatalogBuilder;

    impl CatalogCoordinatorBuilder for FixedCatalogBuilder {
        fn catalog_name(&self) -> &str {
            "main"
        }

        fn build(
            &self,
            _conf: &CoordinatorConf,
            catalog_name: &str,
        ) -> CoordinatorResult<Arc<dyn CommitCoordinator>> {
            assert_eq!(catalog_name, "main");
            Ok(Arc::new(InMemoryCommitCoordinator::new()))
        }
    }

    #[test]
    fn test_catalog_registry() {
        let registry = CatalogCoordinatorRegistry::new();
        registry.register(Arc::new(FixedCatalogBuilder)).unwrap();
        assert_eq!(registry.registered_catalog_names(), vec!["main"]);

        let conf = CoordinatorConf::new();
        registry.get("main", &conf).unwrap();
        assert!(registry.get_opt("other", &conf).unwrap().is_none());
        let err = registry.get("other", &conf).unwrap_err();
        assert!(matches!(err, Error::UnknownCoordinator(_)));
    }
}
