//! The Module object (§3, §4.E): a refcounted handle to one loaded shared
//! library plus the bindings currently resolved against it.
//!
//! Reference counting is not reimplemented by hand here: `Rc<Module>` *is*
//! the refcount. The cache's map entry is one strong reference; each
//! resolved [`crate::binding::Binding`] holds another (in its `module`
//! field); a transient pin taken for the duration of a call (§4.G.call) is a
//! third kind, represented by simply holding a local `Rc<Module>` clone on
//! the stack. `Rc::strong_count` therefore always equals exactly the `refs`
//! quantity of §3 invariant 4, and Module teardown — closing the dynamic
//! linker handle — falls out of `Drop` instead of a hand-written `unref`.
//! See DESIGN.md for the full reasoning.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::binding::Binding;
use crate::cache::Generation;
use crate::identity::Identity;
use crate::linker::LoadedImage;

/// One loaded shared library, identified by the logical `package` name it
/// was loaded under.
pub struct Module {
    package: String,
    image: Box<dyn LoadedImage>,
    identity: Identity,
    bindings: RefCell<Vec<Weak<Binding>>>,
    cached_in: Cell<Option<Generation>>,
}

impl Module {
    /// Constructs a freshly loaded Module. Callers are expected to wrap this
    /// in an `Rc` immediately; see [`crate::loader::Loader::load`].
    pub(crate) fn new(package: String, image: Box<dyn LoadedImage>, identity: Identity) -> Self {
        Module {
            package,
            image,
            identity,
            bindings: RefCell::new(Vec::new()),
            cached_in: Cell::new(None),
        }
    }

    /// The logical package name this Module was loaded under.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The on-disk identity captured at load time.
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Which cache (if any) currently considers this Module registered
    /// under its package name. `None` means orphan (§3).
    pub fn cache_generation(&self) -> Option<Generation> {
        self.cached_in.get()
    }

    /// True once [`Module::orphan`] has been called, or before this Module
    /// was ever inserted into a cache.
    pub fn is_orphan(&self) -> bool {
        self.cached_in.get().is_none()
    }

    pub(crate) fn set_cache_generation(&self, generation: Option<Generation>) {
        self.cached_in.set(generation);
    }

    /// Resolves `symbol` against this Module's image.
    ///
    /// # Safety
    /// See [`crate::linker::LoadedImage::resolve`].
    pub(crate) unsafe fn resolve(&self, symbol: &str) -> Option<crate::linker::Address> {
        unsafe { self.image.resolve(symbol) }
    }

    /// Links `binding` into this Module's binding list. Does not itself
    /// touch `binding`'s own `module`/`address` fields — the caller
    /// ([`crate::binding::attach`]) is responsible for those, in the order
    /// the invariants of §3 require.
    pub(crate) fn link(&self, binding: &Rc<Binding>) {
        self.bindings.borrow_mut().push(Rc::downgrade(binding));
    }

    /// Removes `binding` from this Module's binding list, if present.
    pub(crate) fn unlink(&self, binding: &Rc<Binding>) {
        self.bindings
            .borrow_mut()
            .retain(|weak| !std::ptr::eq(weak.as_ptr(), Rc::as_ptr(binding)));
    }

    /// A snapshot of the bindings currently linked into this Module, with
    /// dead weak references (bindings whose owner already dropped them
    /// without detaching) filtered out. Used by the Reloader (§4.H), which
    /// needs a stable list to iterate while it mutates binding state.
    pub(crate) fn binding_snapshot(&self) -> Vec<Rc<Binding>> {
        self.bindings
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("package", &self.package)
            .field("identity", &self.identity)
            .field("cached_in", &self.cached_in.get())
            .field("bindings", &self.bindings.borrow().len())
            .finish()
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        log::debug!("module '{}' destroyed, dynamic-linker handle closed", self.package);
    }
}

/// The `M.refs` quantity of §3 invariant 4: the number of live owners of
/// this Module — the cache entry (if cached), each linked Binding, and any
/// transient pins currently on the stack.
pub fn refcount(module: &Rc<Module>) -> usize {
    Rc::strong_count(module)
}
