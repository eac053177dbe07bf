//! The dynamic-linker seam.
//!
//! The Library Loader (§4.C) and the Lazy Resolver / Reloader (§4.G, §4.H)
//! never call `libloading` directly; they go through [`DynamicLinker`] /
//! [`LoadedImage`] so that tests can swap in an in-memory fake and exercise
//! reload/rollback/call-pinning without a compiled fixture `.so`.

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// An entry-point address resolved from a [`LoadedImage`]. Opaque beyond
/// equality/copy: the marshalling and invocation convention that turns this
/// into a callable function is external to this crate (§1, out of scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub usize);

/// Opens staged library images and keeps them mapped until dropped.
pub trait DynamicLinker: fmt::Debug {
    /// The type of image this linker produces; kept alive for as long as
    /// symbols resolved from it may still be called.
    type Image: LoadedImage;

    /// Opens `path` in immediate-resolution, local-scope mode.
    ///
    /// # Safety
    /// The caller must ensure `path` names a file whose image will not be
    /// mutated or removed out from under the mapping while the returned
    /// image is alive (the Library Loader's unique-staging-path discipline
    /// guarantees this).
    unsafe fn open(&self, path: &Path) -> Result<Self::Image>;
}

/// A single opened library image.
pub trait LoadedImage: fmt::Debug {
    /// Resolves `symbol` to an [`Address`], or `None` if absent.
    ///
    /// # Safety
    /// The returned address is only valid to call with the ABI the on-disk
    /// image actually implements; this crate does not verify that (§1
    /// Non-goals).
    unsafe fn resolve(&self, symbol: &str) -> Option<Address>;
}

/// Production [`DynamicLinker`] backed by `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibloadingLinker;

/// A [`LoadedImage`] backed by an open `libloading::Library`.
#[derive(Debug)]
pub struct LibloadingImage(libloading::Library);

impl DynamicLinker for LibloadingLinker {
    type Image = LibloadingImage;

    unsafe fn open(&self, path: &Path) -> Result<Self::Image> {
        // SAFETY: propagated to our own caller via this function's contract.
        unsafe {
            libloading::Library::new(path)
                .map(LibloadingImage)
                .map_err(|e| Error::load(path.to_path_buf(), e.to_string()))
        }
    }
}

impl LoadedImage for LibloadingImage {
    unsafe fn resolve(&self, symbol: &str) -> Option<Address> {
        // SAFETY: propagated to our own caller via this function's contract.
        unsafe {
            self.0
                .get::<*const ()>(symbol.as_bytes())
                .ok()
                .map(|sym| Address(*sym as usize))
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod testing {
    //! An in-memory stand-in for the dynamic linker, for tests.

    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// A fake library image: just a name→address table, installed by the
    /// test ahead of time and keyed by the staged path the loader chose.
    #[derive(Debug, Clone, Default)]
    pub struct FakeImageSpec {
        /// Exported symbols and the address they resolve to.
        pub symbols: HashMap<String, Address>,
    }

    impl FakeImageSpec {
        /// Builds a fake image exporting `symbols`, assigning each a
        /// distinct synthetic address starting at `base`.
        pub fn with_symbols(base: usize, symbols: &[&str]) -> Self {
            let symbols = symbols
                .iter()
                .enumerate()
                .map(|(i, s)| (s.to_string(), Address(base + i)))
                .collect();
            FakeImageSpec { symbols }
        }
    }

    /// Fake [`DynamicLinker`]: `open` looks up the staged path in a table
    /// the test populates via [`FakeLinker::stage`], so the loader's own
    /// staging-path logic still runs unmodified; only the actual `dlopen`
    /// call is replaced.
    #[derive(Debug, Clone, Default)]
    pub struct FakeLinker {
        staged: Arc<Mutex<HashMap<std::path::PathBuf, FakeImageSpec>>>,
        opened: Arc<Mutex<Vec<std::path::PathBuf>>>,
    }

    impl FakeLinker {
        /// Creates an empty fake linker.
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers the image that a subsequent `open(path)` should return.
        pub fn stage(&self, path: impl Into<std::path::PathBuf>, spec: FakeImageSpec) {
            self.staged.lock().unwrap().insert(path.into(), spec);
        }

        /// Every path `open` was called with, in order, most recent last.
        pub fn opened_paths(&self) -> Vec<std::path::PathBuf> {
            self.opened.lock().unwrap().clone()
        }
    }

    impl DynamicLinker for FakeLinker {
        type Image = FakeImage;

        unsafe fn open(&self, path: &Path) -> Result<Self::Image> {
            self.opened.lock().unwrap().push(path.to_path_buf());
            let spec = self
                .staged
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| Error::load(path.to_path_buf(), "no fake image staged for path"))?;
            Ok(FakeImage(RefCell::new(spec)))
        }
    }

    /// Fake [`LoadedImage`] resolving from the [`FakeImageSpec`] it was built from.
    #[derive(Debug)]
    pub struct FakeImage(RefCell<FakeImageSpec>);

    impl LoadedImage for FakeImage {
        unsafe fn resolve(&self, symbol: &str) -> Option<Address> {
            self.0.borrow().symbols.get(symbol).copied()
        }
    }

    /// A [`DynamicLinker`] that opens any path, always handing back the
    /// same fixed image. Useful for exercising a real [`crate::loader::Loader`]
    /// (and its non-deterministic, uuid-suffixed staging path) end to end
    /// without needing to predict that path ahead of time.
    #[derive(Debug, Clone, Default)]
    pub struct AcceptAnyLinker {
        image: FakeImageSpec,
        opened: Arc<Mutex<Vec<std::path::PathBuf>>>,
    }

    impl AcceptAnyLinker {
        /// Creates a linker that hands out `image` for every `open` call.
        pub fn new(image: FakeImageSpec) -> Self {
            AcceptAnyLinker {
                image,
                opened: Arc::default(),
            }
        }

        /// Every path `open` was called with, in order.
        pub fn opened_paths(&self) -> Vec<std::path::PathBuf> {
            self.opened.lock().unwrap().clone()
        }
    }

    impl DynamicLinker for AcceptAnyLinker {
        type Image = FakeImage;

        unsafe fn open(&self, path: &Path) -> Result<Self::Image> {
            self.opened.lock().unwrap().push(path.to_path_buf());
            Ok(FakeImage(RefCell::new(self.image.clone())))
        }
    }

    /// A [`DynamicLinker`] that hands out a different fixed image on each
    /// successive `open` call, in order — for tests where "the on-disk file
    /// changed" needs to produce a genuinely different image the second
    /// time a package is loaded (e.g. a reload mid-call).
    #[derive(Debug, Clone)]
    pub struct SequencedLinker {
        images: Arc<Mutex<std::collections::VecDeque<FakeImageSpec>>>,
    }

    impl SequencedLinker {
        /// Creates a linker that opens to `images[0]` on the first call,
        /// `images[1]` on the second, and so on. Panics if `open` is called
        /// more times than there are images staged.
        pub fn new(images: impl IntoIterator<Item = FakeImageSpec>) -> Self {
            SequencedLinker {
                images: Arc::new(Mutex::new(images.into_iter().collect())),
            }
        }
    }

    impl DynamicLinker for SequencedLinker {
        type Image = FakeImage;

        unsafe fn open(&self, _path: &Path) -> Result<Self::Image> {
            let spec = self
                .images
                .lock()
                .unwrap()
                .pop_front()
                .expect("SequencedLinker: open() called more times than images were staged");
            Ok(FakeImage(RefCell::new(spec)))
        }
    }
}
