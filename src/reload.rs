//! Reloader (§4.H, legacy generation): atomically replaces a cached
//! Module with a freshly loaded one, migrating every existing binding onto
//! it, with rollback if the replacement image is missing a symbol any
//! existing binding needs.

use std::path::Path;
use std::rc::Rc;

use crate::binding::Binding;
use crate::cache::ModuleCache;
use crate::error::{Error, Result};
use crate::linker::{Address, DynamicLinker};
use crate::loader::Loader;
use crate::module::Module;
use crate::name;
use crate::resolver::PathResolver;

/// Reloads legacy-generation packages, migrating bound symbols onto the
/// freshly loaded image or rolling every migrated binding back to the
/// original on failure.
#[derive(Debug)]
pub struct Reloader<R, L>
where
    R: PathResolver,
    L: DynamicLinker,
{
    resolver: R,
    loader: Loader<L>,
}

impl<R, L> Reloader<R, L>
where
    R: PathResolver,
    L: DynamicLinker,
{
    /// Creates a reloader using `resolver` to locate packages and `loader`
    /// to load their replacement images.
    pub fn new(resolver: R, loader: Loader<L>) -> Self {
        Reloader { resolver, loader }
    }

    /// Reloads `package` in `cache` (§4.H).
    pub fn reload(&self, cache: &ModuleCache, package: &str) -> Result<()> {
        let old = cache.find(package).ok_or_else(|| Error::no_such_module(package))?;

        let path: std::path::PathBuf = self.resolver.resolve(package)?;
        let new = Rc::new(self.loader.load(Path::new(&path), package)?);

        // Step 3's "extra pin" is simply this function's continued
        // ownership of `old` for the rest of the migration — no separate
        // ref() call is needed.
        let bindings = old.binding_snapshot();
        let mut migrated: Vec<Rc<Binding>> = Vec::with_capacity(bindings.len());

        for binding in bindings {
            match name::parse(binding.name()) {
                Ok(parsed) => match unsafe { new.resolve(parsed.symbol) } {
                    Some(addr) => {
                        Self::retarget(&binding, &new, addr);
                        migrated.push(binding);
                    }
                    None => {
                        self.rollback(&old, &migrated);
                        return Err(Error::symbol_not_found(package, parsed.symbol));
                    }
                },
                Err(e) => {
                    self.rollback(&old, &migrated);
                    return Err(e);
                }
            }
        }

        // Step 5: the cache was just looked up at the top of this
        // function, so the key must still be present; if it is not,
        // something outside this subsystem mutated the cache concurrently,
        // which the single-threaded model guarantees cannot happen.
        let replaced = cache.update(package, Rc::clone(&new));
        assert!(
            Rc::ptr_eq(&replaced, &old),
            "legacy cache mutated during reload of '{package}' — invariant violated"
        );

        // Step 6: `old` is no longer cached and survives only as long as
        // some caller (or this function, briefly) still holds it.
        cache.orphan(&old);
        drop(old);
        // Step 7: `new` is now held by the cache entry plus each migrated
        // binding; this function's own `new` binding drops at the end of
        // the function, completing the loader's initial ref hand-off.
        Ok(())
    }

    fn retarget(binding: &Rc<Binding>, new: &Rc<Module>, address: Address) {
        crate::binding::detach(binding);
        crate::binding::attach(binding, Rc::clone(new), address);
    }

    /// Unwinds a partially migrated set of bindings back onto `old`,
    /// starting from the most recently migrated (§4.H Rollback).
    fn rollback(&self, old: &Rc<Module>, migrated: &[Rc<Binding>]) {
        for binding in migrated.iter().rev() {
            let parsed = name::parse(binding.name())
                .expect("binding name was already successfully parsed during migration");
            let address = unsafe { old.resolve(parsed.symbol) }.unwrap_or_else(|| {
                panic!(
                    "rollback: symbol '{}' vanished from the original image for '{}' — invariant violated",
                    parsed.symbol,
                    old.package()
                )
            });
            Self::retarget(binding, old, address);
        }
        // `new` (held by the caller of `rollback` via the migration loop's
        // local variable) is dropped by that caller after this returns,
        // completing "orphan(new); unref(new)" — it was never cached, so
        // there is nothing to orphan in the map sense; it simply had no
        // remaining bindings once every migrated one rolled back.
    }
}
