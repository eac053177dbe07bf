//! Modern-generation `load`/`unbind` (§4.modern.load): every lookup is
//! validated against on-disk identity; a stale cached Module is
//! transparently replaced and orphaned rather than reloaded in place.
//! Unlike the legacy generation, modern bindings are never migrated — they
//! simply hold whichever `Rc<Module>` `load` last handed them.

use std::path::Path;
use std::rc::Rc;

use crate::cache::ModuleCache;
use crate::error::Result;
use crate::identity::Identity;
use crate::linker::DynamicLinker;
use crate::loader::Loader;
use crate::module::Module;
use crate::resolver::PathResolver;

/// Loads modern-generation packages, replacing stale cache entries
/// transparently on lookup.
#[derive(Debug)]
pub struct ModernLoader<R, L>
where
    R: PathResolver,
    L: DynamicLinker,
{
    resolver: R,
    loader: Loader<L>,
}

impl<R, L> ModernLoader<R, L>
where
    R: PathResolver,
    L: DynamicLinker,
{
    /// Creates a loader using `resolver` to locate packages and `loader`
    /// to load them.
    pub fn new(resolver: R, loader: Loader<L>) -> Self {
        ModernLoader { resolver, loader }
    }

    /// Returns the current Module for `package`, loading or replacing it as
    /// needed (§4.modern.load). The caller owns the returned reference.
    pub fn load(&self, cache: &ModuleCache, package: &str) -> Result<Rc<Module>> {
        let path = self.resolver.resolve(package)?;

        let cached = match cache.find(package) {
            Some(cached) => cached,
            None => return self.load_fresh(cache, package, &path),
        };

        let current_identity = Identity::stat(&path)?;
        if current_identity == cached.identity() {
            // `cached` is already an owned clone from `find` — that clone
            // *is* the `ref(cached)` of step 4.
            return Ok(cached);
        }

        self.replace_stale(cache, package, &path)
    }

    fn load_fresh(&self, cache: &ModuleCache, package: &str, path: &Path) -> Result<Rc<Module>> {
        let module = Rc::new(self.loader.load(path, package)?);
        cache.insert(Rc::clone(&module));
        Ok(module)
    }

    fn replace_stale(&self, cache: &ModuleCache, package: &str, path: &Path) -> Result<Rc<Module>> {
        let fresh = Rc::new(self.loader.load(path, package)?);
        let old = cache.update(package, Rc::clone(&fresh));
        cache.orphan(&old);
        // `old`'s bindings (if any) remain valid until their holders
        // release them; they are not migrated (§9 open question 1).
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Generation;
    use crate::linker::testing::{AcceptAnyLinker, FakeImageSpec};
    use crate::loader::LoaderConfig;
    use crate::module::refcount;
    use crate::resolver::testing::MapResolver;
    use std::io::Write;

    fn write_source(dir: &std::path::Path, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join("m.so");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    struct Fixture {
        _source_dir: tempfile::TempDir,
        source: std::path::PathBuf,
        cache: ModuleCache,
        modern: ModernLoader<MapResolver, AcceptAnyLinker>,
    }

    fn setup() -> Fixture {
        let source_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let source = write_source(source_dir.path(), b"v1");

        let paths = MapResolver::new();
        paths.set("m", source.clone());

        let linker = AcceptAnyLinker::new(FakeImageSpec::with_symbols(0, &["f1"]));
        let loader = Loader::new(
            linker,
            LoaderConfig {
                staging_root: Some(staging_dir.path().to_path_buf()),
            },
        );
        Fixture {
            _source_dir: source_dir,
            source,
            cache: ModuleCache::new(Generation::Modern),
            modern: ModernLoader::new(paths, loader),
        }
    }

    #[test]
    fn first_load_caches_with_refcount_two() {
        let fx = setup();
        let module = fx.modern.load(&fx.cache, "m").unwrap();
        assert_eq!(refcount(&module), 2);
        assert_eq!(fx.cache.len(), 1);
    }

    #[test]
    fn unchanged_identity_returns_same_module_without_reload() {
        let fx = setup();
        let first = fx.modern.load(&fx.cache, "m").unwrap();
        let second = fx.modern.load(&fx.cache, "m").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(refcount(&first), 3);
    }

    #[test]
    fn stale_identity_replaces_and_orphans_old() {
        let fx = setup();
        let first = fx.modern.load(&fx.cache, "m").unwrap();
        assert!(!first.is_orphan());

        let newer = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        let f = std::fs::File::options().write(true).open(&fx.source).unwrap();
        f.set_modified(newer).unwrap();

        let second = fx.modern.load(&fx.cache, "m").unwrap();
        assert!(!Rc::ptr_eq(&first, &second));
        assert!(first.is_orphan(), "stale Module must be orphaned");
        assert!(!second.is_orphan());
        assert_eq!(refcount(&second), 2);
        assert_eq!(fx.cache.len(), 1);
    }
}
