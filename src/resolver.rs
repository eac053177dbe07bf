//! Path Resolver (§4.B): maps a logical package name to an absolute
//! filesystem path. Treated as an injected collaborator by the rest of the
//! subsystem; this module only supplies a default filesystem-backed
//! implementation for standalone use and for this crate's own tests.

use std::path::PathBuf;

use crate::error::{Error, Result};

#[cfg(target_os = "windows")]
pub(crate) const LIBRARY_EXTENSION: &str = "dll";
#[cfg(target_os = "macos")]
pub(crate) const LIBRARY_EXTENSION: &str = "dylib";
#[cfg(all(unix, not(target_os = "macos")))]
pub(crate) const LIBRARY_EXTENSION: &str = "so";

/// Maps a logical package name to the filesystem path of its shared library.
pub trait PathResolver: std::fmt::Debug {
    /// Resolves `package` to an absolute path, or [`Error::NotFound`].
    fn resolve(&self, package: &str) -> Result<PathBuf>;
}

/// Searches a fixed, ordered list of directories for `<dir>/<package>.<ext>`.
///
/// Grounded on the host's own `LibraryManager::find_library` candidate-path
/// search (try each directory in priority order for the expected filename).
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    search_paths: Vec<PathBuf>,
}

impl DirectoryResolver {
    /// Creates a resolver searching `search_paths` in order.
    pub fn new(search_paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_paths: search_paths.into_iter().collect(),
        }
    }
}

impl PathResolver for DirectoryResolver {
    fn resolve(&self, package: &str) -> Result<PathBuf> {
        let filename = format!("{package}.{LIBRARY_EXTENSION}");
        for dir in &self.search_paths {
            let candidate = dir.join(&filename);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(Error::not_found(package))
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod testing {
    //! A resolver that answers from a fixed in-memory table, for tests that
    //! don't want to touch the filesystem at all.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Fake [`PathResolver`] backed by an explicit `package -> path` map.
    #[derive(Debug, Default)]
    pub struct MapResolver(Mutex<HashMap<String, PathBuf>>);

    impl Clone for MapResolver {
        /// Snapshots the current table. Entries set on one clone after the
        /// fact are not visible to the other — sufficient for this crate's
        /// own use, which only clones a [`MapResolver`] once its entries
        /// are fully populated (see [`crate::subsystem::Subsystem::new`]).
        fn clone(&self) -> Self {
            MapResolver(Mutex::new(self.0.lock().unwrap().clone()))
        }
    }

    impl MapResolver {
        /// Creates an empty resolver.
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers (or replaces) the path a package resolves to.
        pub fn set(&self, package: impl Into<String>, path: impl Into<PathBuf>) {
            self.0.lock().unwrap().insert(package.into(), path.into());
        }
    }

    impl PathResolver for MapResolver {
        fn resolve(&self, package: &str) -> Result<PathBuf> {
            self.0
                .lock()
                .unwrap()
                .get(package)
                .cloned()
                .ok_or_else(|| Error::not_found(package))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_matching_directory() {
        let dir = tempfile::tempdir().unwrap();
        let lib_path = dir.path().join(format!("m.{LIBRARY_EXTENSION}"));
        std::fs::write(&lib_path, b"stub").unwrap();

        let resolver = DirectoryResolver::new([PathBuf::from("/nonexistent"), dir.path().to_path_buf()]);
        let resolved = resolver.resolve("m").unwrap();
        assert_eq!(resolved, lib_path);
    }

    #[test]
    fn missing_package_is_not_found() {
        let resolver = DirectoryResolver::new([PathBuf::from("/nonexistent")]);
        assert!(matches!(resolver.resolve("m"), Err(Error::NotFound { .. })));
    }
}
