//! Lifecycle (§4.I) and public facade (§6): owns the two generation caches
//! and the injected collaborators (path resolver, dynamic linker, task
//! executor), and exposes the subsystem's whole public surface as methods
//! on one type.

use std::rc::Rc;

use crate::binding::Binding;
use crate::cache::{CacheStats, Generation, ModuleCache};
use crate::call::{self, NativeOutcome};
use crate::error::{Error, Result};
use crate::legacy::LazyResolver;
use crate::linker::{Address, DynamicLinker};
use crate::loader::{Loader, LoaderConfig};
use crate::module::{refcount, Module};
use crate::modern::ModernLoader;
use crate::name;
use crate::reload::Reloader;
use crate::resolver::PathResolver;
use crate::scheduler::TaskExecutor;

/// A read-only snapshot of one generation's cache counters (§10.H):
/// `(cached_count, orphan_count, lookups, hits, misses)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationStats {
    /// Packages currently cached under this generation.
    pub cached_count: usize,
    /// Modules this generation's cache has orphaned over its lifetime.
    pub orphan_count: u64,
    /// This generation's cumulative [`CacheStats`].
    pub lookups: u64,
    /// Of those lookups, the number that hit.
    pub hits: u64,
    /// Of those lookups, the number that missed.
    pub misses: u64,
}

impl GenerationStats {
    fn from_cache(cache: &ModuleCache) -> Self {
        let CacheStats {
            lookups,
            hits,
            misses,
            orphan_count,
        } = cache.stats();
        GenerationStats {
            cached_count: cache.len(),
            orphan_count,
            lookups,
            hits,
            misses,
        }
    }
}

/// Combined observability snapshot across both generations (§10.H).
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsystemStats {
    /// Legacy-generation counters.
    pub legacy: GenerationStats,
    /// Modern-generation counters.
    pub modern: GenerationStats,
}

/// The dynamic native-module cache and symbol-resolution subsystem.
///
/// Generic over the three collaborators §6 treats as injected: a
/// [`PathResolver`], a [`DynamicLinker`], and a [`TaskExecutor`].
#[derive(Debug)]
pub struct Subsystem<R, L, E>
where
    R: PathResolver + Clone,
    L: DynamicLinker + Clone,
    E: TaskExecutor,
{
    legacy_cache: ModuleCache,
    modern_cache: ModuleCache,
    legacy_resolver: LazyResolver<R, L>,
    modern_loader: ModernLoader<R, L>,
    reloader: Reloader<R, L>,
    executor: E,
}

impl<R, L, E> Subsystem<R, L, E>
where
    R: PathResolver + Clone,
    L: DynamicLinker + Clone,
    E: TaskExecutor,
{
    /// `init()` (§4.I): creates both caches and wires up the injected
    /// collaborators. Infallible in practice — Rust's global allocator
    /// aborts rather than returning an out-of-memory error — but returns
    /// [`Result`] to keep the shape §4.I specifies.
    pub fn init(resolver: R, linker: L, loader_config: LoaderConfig, executor: E) -> Result<Self> {
        Ok(Subsystem {
            legacy_cache: ModuleCache::new(Generation::Legacy),
            modern_cache: ModuleCache::new(Generation::Modern),
            legacy_resolver: LazyResolver::new(resolver.clone(), Loader::new(linker.clone(), loader_config.clone())),
            modern_loader: ModernLoader::new(resolver.clone(), Loader::new(linker.clone(), loader_config.clone())),
            reloader: Reloader::new(resolver, Loader::new(linker, loader_config)),
            executor,
        })
    }

    /// `free()` (§4.I): tears down both caches. Panics naming the
    /// offending package if any cached Module still has outstanding
    /// references beyond the cache's own — per the Open Question decision
    /// in DESIGN.md, nonzero refs at teardown is treated as a caller bug,
    /// not a condition to silently paper over by force-closing a library a
    /// binding still points into.
    pub fn free(self) -> Result<()> {
        for (package, module) in self.legacy_cache.drain() {
            assert_eq!(
                refcount(&module),
                1,
                "legacy module '{package}' still referenced at teardown"
            );
        }
        for (package, module) in self.modern_cache.drain() {
            assert_eq!(
                refcount(&module),
                1,
                "modern module '{package}' still referenced at teardown"
            );
        }
        Ok(())
    }

    /// `bind_modern(package)` (§4.modern.load): loads or validates the
    /// current Module for `package`, returning a reference the caller owns.
    pub fn bind_modern(&self, package: &str) -> Result<Rc<Module>> {
        self.modern_loader.load(&self.modern_cache, package)
    }

    /// `unbind(Module)` (§6): releases the caller's reference. Dropping the
    /// `Rc` directly has the identical effect; this exists so the public
    /// surface matches §6 literally.
    pub fn unbind(&self, module: Rc<Module>) {
        drop(module);
    }

    /// `bind_symbol(binding, is_legacy = true)` (§4.G): resolves `binding`
    /// against the legacy cache, loading its package on first use.
    pub fn bind_legacy_symbol(&self, binding: &Rc<Binding>) -> Result<()> {
        self.legacy_resolver.resolve(&self.legacy_cache, binding)
    }

    /// `bind_symbol(binding, is_legacy = false)` (§4.G): resolves `binding`
    /// against an already-obtained modern Module (from [`Self::bind_modern`]) —
    /// step 4 and the linking only, since a modern binding arrives with its
    /// Module already set and already referenced by the caller.
    pub fn bind_modern_symbol(&self, binding: &Rc<Binding>, module: Rc<Module>) -> Result<()> {
        let parsed = name::parse(binding.name())?;
        let address = unsafe { module.resolve(parsed.symbol) }
            .ok_or_else(|| Error::symbol_not_found(parsed.package, parsed.symbol))?;
        crate::binding::attach(binding, module, address);
        Ok(())
    }

    /// `unbind_symbol(binding)` (§4.E/F): detaches `binding` from whatever
    /// Module it is currently resolved against, if any.
    pub fn unbind_symbol(&self, binding: &Rc<Binding>) {
        crate::binding::detach(binding);
    }

    /// `call(binding, args, out)` (§4.G.call): resolves an unbound legacy
    /// binding on first use, then invokes its entry point with `binding`'s
    /// Module pinned for the duration of `invoke_native`.
    pub fn call<F>(&self, binding: &Rc<Binding>, invoke_native: F) -> Result<()>
    where
        F: FnOnce(Address, &mut E::Task) -> NativeOutcome,
    {
        if !binding.is_resolved() {
            self.legacy_resolver.resolve(&self.legacy_cache, binding)?;
        }
        call::invoke(binding, &self.executor, invoke_native)
    }

    /// `reload_legacy(package)` (§4.H): atomically replaces the cached
    /// legacy Module for `package`, migrating every bound symbol.
    pub fn reload_legacy(&self, package: &str) -> Result<()> {
        self.reloader.reload(&self.legacy_cache, package)
    }

    /// Supplemental observability snapshot (§10.H).
    pub fn stats(&self) -> SubsystemStats {
        SubsystemStats {
            legacy: GenerationStats::from_cache(&self.legacy_cache),
            modern: GenerationStats::from_cache(&self.modern_cache),
        }
    }
}
