//! Library Loader (§4.C): stages a source shared library under a fresh,
//! unique path before opening it, so that two generations of the same
//! on-disk file get distinct dynamic-linker identities and can coexist
//! during a reload.

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::linker::DynamicLinker;
use crate::module::Module;
use crate::resolver::LIBRARY_EXTENSION;

/// The only externally configurable knob named in §6: where staging
/// directories are created. `None` falls back to `$TMPDIR`, defaulting to
/// `/tmp` if that variable is unset, matching `std::env::temp_dir`.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Root directory under which per-load staging directories are
    /// created. Read once at [`Loader::new`], not polled.
    pub staging_root: Option<PathBuf>,
}

/// Copies a source library to a unique staging path, opens it through a
/// [`DynamicLinker`], and produces a freshly constructed [`Module`].
#[derive(Debug)]
pub struct Loader<L: DynamicLinker> {
    linker: L,
    staging_root: PathBuf,
}

impl<L: DynamicLinker> Loader<L> {
    /// Creates a loader using `linker` to open staged images, rooted at
    /// `config.staging_root` (or the platform temp directory).
    pub fn new(linker: L, config: LoaderConfig) -> Self {
        let staging_root = config.staging_root.unwrap_or_else(std::env::temp_dir);
        Loader { linker, staging_root }
    }

    /// Loads `source` under logical package name `package` (§4.C).
    pub fn load(&self, source: &std::path::Path, package: &str) -> Result<Module> {
        let identity = Identity::stat(source)?;

        let stage_dir = tempfile::Builder::new()
            .prefix("modcache-")
            .tempdir_in(&self.staging_root)
            .map_err(|e| Error::io("mkdtemp", self.staging_root.clone(), e))?;

        // A per-load random suffix, on top of the already-unique temp
        // directory, so the staged filename alone never collides even if a
        // caller inspects only the file name (e.g. in logs).
        let staged_name = format!("{package}-{}.{LIBRARY_EXTENSION}", uuid::Uuid::new_v4());
        let staged_path = stage_dir.path().join(staged_name);

        fs::copy(source, &staged_path).map_err(|e| Error::io("copy", staged_path.clone(), e))?;
        Self::preserve_mode(source, &staged_path)?;

        // SAFETY: `staged_path` was just created under a directory unique to
        // this load and is not touched by anything else for the lifetime of
        // the returned image.
        let image = unsafe { self.linker.open(&staged_path) }?;

        // §4.C step 5: unlink the staged file now that it's mapped; failure
        // here is logged, not fatal. `stage_dir`'s own Drop removes the now
        // (mostly) empty directory.
        if let Err(e) = fs::remove_file(&staged_path) {
            log::warn!("failed to unlink staged library {}: {e}", staged_path.display());
        }
        drop(stage_dir);

        Ok(Module::new(package.to_string(), Box::new(image), identity))
    }

    /// Carries over only the read+execute bits of `source`'s mode (§4.C:
    /// "preserving mode bits (read+execute masks)") — never the full
    /// permission set, so setuid/setgid/sticky bits or a broader write mask
    /// on the source can't widen onto a copy sitting under a shared temp
    /// root.
    fn preserve_mode(source: &std::path::Path, staged: &std::path::Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        const READ_EXEC_MASK: u32 = 0o555;

        let source_mode = fs::metadata(source)
            .map_err(|e| Error::io("stat", source.to_path_buf(), e))?
            .permissions()
            .mode();
        let mode = source_mode & READ_EXEC_MASK;
        fs::set_permissions(staged, fs::Permissions::from_mode(mode))
            .map_err(|e| Error::io("chmod", staged.to_path_buf(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::{Address, LoadedImage};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    fn write_source(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(b"not-really-elf").unwrap();
        path
    }

    /// Accepts any path, recording it, and hands out an image exporting a
    /// single fixed symbol — used to exercise the loader's own staging
    /// logic independent of a particular staged path, which is
    /// non-deterministic (it embeds a fresh uuid per call).
    #[derive(Debug, Clone, Default)]
    struct RecordingLinker {
        opened: Arc<Mutex<Vec<PathBuf>>>,
    }

    #[derive(Debug)]
    struct RecordingImage;

    impl DynamicLinker for RecordingLinker {
        type Image = RecordingImage;

        unsafe fn open(&self, path: &std::path::Path) -> Result<Self::Image> {
            self.opened.lock().unwrap().push(path.to_path_buf());
            Ok(RecordingImage)
        }
    }

    impl LoadedImage for RecordingImage {
        unsafe fn resolve(&self, symbol: &str) -> Option<Address> {
            (symbol == "f1").then_some(Address(42))
        }
    }

    #[test]
    fn load_stages_under_unique_path_per_call_and_cleans_up() {
        let source_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let source = write_source(source_dir.path(), "m.so");

        let linker = RecordingLinker::default();
        let loader = Loader::new(
            linker.clone(),
            LoaderConfig {
                staging_root: Some(staging_dir.path().to_path_buf()),
            },
        );

        loader.load(&source, "m").unwrap();
        loader.load(&source, "m").unwrap();

        let opened = linker.opened.lock().unwrap();
        assert_eq!(opened.len(), 2);
        assert_ne!(opened[0], opened[1], "each load must use a distinct staging path");
        for path in opened.iter() {
            assert!(path.starts_with(staging_dir.path()));
            assert!(!path.exists(), "staged file should be cleaned up after open");
        }
    }

    #[test]
    fn successful_load_produces_module_with_captured_identity_and_resolvable_symbol() {
        let source_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let source = write_source(source_dir.path(), "m.so");
        let expected_identity = Identity::stat(&source).unwrap();

        let loader = Loader::new(
            RecordingLinker::default(),
            LoaderConfig {
                staging_root: Some(staging_dir.path().to_path_buf()),
            },
        );

        let module = loader.load(&source, "m").unwrap();
        assert_eq!(module.package(), "m");
        assert_eq!(module.identity(), expected_identity);
        assert_eq!(unsafe { module.resolve("f1") }, Some(Address(42)));
    }

    #[test]
    fn preserve_mode_masks_to_read_and_execute_only() {
        use std::os::unix::fs::PermissionsExt;

        let source_dir = tempfile::tempdir().unwrap();
        let staged_dir = tempfile::tempdir().unwrap();
        let source = write_source(source_dir.path(), "m.so");
        let staged = staged_dir.path().join("staged.so");
        fs::write(&staged, b"stub").unwrap();

        // setuid plus full read/write/execute for everyone — well beyond
        // the read+execute bits that should actually carry over.
        fs::set_permissions(&source, fs::Permissions::from_mode(0o4777)).unwrap();

        Loader::<RecordingLinker>::preserve_mode(&source, &staged).unwrap();

        let staged_mode = fs::metadata(&staged).unwrap().permissions().mode() & 0o7777;
        assert_eq!(staged_mode, 0o555, "only read+execute bits may carry over, never setuid or write bits");
    }

    #[test]
    fn missing_source_file_is_an_io_error() {
        let staging_dir = tempfile::tempdir().unwrap();
        let loader = Loader::new(
            RecordingLinker::default(),
            LoaderConfig {
                staging_root: Some(staging_dir.path().to_path_buf()),
            },
        );
        let result = loader.load(std::path::Path::new("/nonexistent/m.so"), "m");
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
