//! Module Cache (§3, §4.D): a `package → Module` map. There are exactly two
//! instances of this same container, one per API generation (§3); the
//! staleness policy that differentiates them lives in [`crate::modern`] and
//! [`crate::reload`], not here — per the design note in §9, "the
//! legacy/modern split encodes a policy difference, not a data-structure
//! difference".

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::module::Module;

/// Which of the two coexisting API generations a cache (or a cached
/// Module) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    /// Stale-tolerant; bindings resolve by name and are explicitly migrated
    /// on reload.
    Legacy,
    /// Freshness-checked on every lookup; bindings hold a direct Module
    /// reference and are never migrated.
    Modern,
}

/// Cumulative lookup counters for one cache (§10.H), mirroring the
/// `total_loaded` / `symbol_lookups` style counters the host's existing FFI
/// library manager keeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of `find` calls made against this cache.
    pub lookups: u64,
    /// Of those, the number that found a cached entry.
    pub hits: u64,
    /// Of those, the number that found nothing.
    pub misses: u64,
    /// Number of Modules this cache has orphaned (superseded by a
    /// replacement, via [`ModuleCache::update`]'s staleness/reload callers,
    /// or evicted via [`ModuleCache::remove`]).
    pub orphan_count: u64,
}

#[derive(Default)]
struct Inner {
    map: HashMap<String, Rc<Module>>,
    stats: CacheStats,
}

/// A `package → Module` map for one API generation.
#[derive(Debug)]
pub struct ModuleCache {
    generation: Generation,
    inner: RefCell<Inner>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("cached", &self.map.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl ModuleCache {
    /// Creates an empty cache for the given generation.
    pub fn new(generation: Generation) -> Self {
        ModuleCache {
            generation,
            inner: RefCell::new(Inner::default()),
        }
    }

    /// Which generation this cache implements.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Looks up `package`. A hit returns an owned `Rc<Module>` clone — in
    /// this crate's Rc-based rendition of §4.D, that clone *is* the
    /// `ref(M)` a caller would otherwise have to request separately (see
    /// DESIGN.md).
    pub fn find(&self, package: &str) -> Option<Rc<Module>> {
        let mut inner = self.inner.borrow_mut();
        inner.stats.lookups += 1;
        let found = inner.map.get(package).cloned();
        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        found
    }

    /// Inserts a freshly loaded Module under its own package name. The
    /// Module must not already be cached anywhere.
    pub fn insert(&self, module: Rc<Module>) {
        module.set_cache_generation(Some(self.generation));
        self.inner
            .borrow_mut()
            .map
            .insert(module.package().to_string(), module);
    }

    /// Replaces the entry for `package` with `new`, returning the module
    /// that was previously registered there. Panics if `package` was not
    /// already present — per §4.D, that indicates a caller bug (the key was
    /// just read by the caller moments before calling `update`).
    pub fn update(&self, package: &str, new: Rc<Module>) -> Rc<Module> {
        new.set_cache_generation(Some(self.generation));
        let mut inner = self.inner.borrow_mut();
        match inner.map.insert(package.to_string(), new) {
            Some(old) => old,
            None => panic!("module cache: update() called for absent key {package:?}"),
        }
    }

    /// Drops the cache's reference to `package`'s Module, if present.
    pub fn remove(&self, package: &str) -> Option<Rc<Module>> {
        let mut inner = self.inner.borrow_mut();
        let removed = inner.map.remove(package);
        if let Some(module) = &removed {
            module.set_cache_generation(None);
            inner.stats.orphan_count += 1;
        }
        removed
    }

    /// Number of packages currently mapped by this cache.
    pub fn len(&self) -> usize {
        self.inner.borrow().map.len()
    }

    /// `true` if this cache currently has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of this cache's cumulative lookup counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.borrow().stats
    }

    /// Removes and returns every entry, leaving the cache empty. Used by
    /// [`crate::subsystem::Subsystem::free`] (§4.I): the caller is expected
    /// to check each returned Module's refcount before dropping it.
    pub fn drain(&self) -> Vec<(String, Rc<Module>)> {
        let mut inner = self.inner.borrow_mut();
        let map = std::mem::take(&mut inner.map);
        map.into_iter()
            .map(|(package, module)| {
                module.set_cache_generation(None);
                (package, module)
            })
            .collect()
    }

    /// Detaches `module` from this cache's generation marker, without
    /// touching the map itself — §4.D: "used when a Module has already been
    /// replaced in-map by a successor; it must remain alive until its
    /// bindings finish migrating or the last caller releases it." Counted
    /// in this cache's [`CacheStats::orphan_count`] (§10.H).
    pub fn orphan(&self, module: &Rc<Module>) {
        module.set_cache_generation(None);
        self.inner.borrow_mut().stats.orphan_count += 1;
    }
}
