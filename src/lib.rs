//! # modcache
//!
//! Dynamic native-module cache and symbol-resolution subsystem for a
//! database server whose stored procedures are exported symbols in shared
//! libraries on disk.
//!
//! This crate owns: locating a package's shared library by logical name,
//! loading it with a unique staging path so two generations of the same
//! file can coexist, resolving named entry points inside it, reference
//! counting loaded libraries across dependent symbol bindings, detecting
//! on-disk changes, and atomically rebinding every live symbol during a
//! hot reload.
//!
//! ## Two API generations
//!
//! - **Legacy**: bindings resolve by dotted name on first call and are
//!   migrated onto a new image by [`reload::Reloader`] ([`subsystem::Subsystem::reload_legacy`]).
//! - **Modern**: bindings hold a direct reference obtained via
//!   [`subsystem::Subsystem::bind_modern`]; staleness is checked against
//!   on-disk identity on every lookup, and a stale Module is replaced and
//!   orphaned rather than reloaded in place.
//!
//! ## Collaborators consumed as injected seams
//!
//! Package-to-path resolution ([`resolver::PathResolver`]), dynamic
//! library loading ([`linker::DynamicLinker`]), and the cooperative-task
//! scheduler ([`scheduler::TaskExecutor`]) are all traits so that tests can
//! exercise reload and rollback deterministically without a compiled
//! fixture `.so`. Production adapters ([`resolver::DirectoryResolver`],
//! [`linker::LibloadingLinker`], [`scheduler::InlineExecutor`]) are
//! provided for standalone use.
//!
//! Single-threaded cooperative concurrency only — this subsystem does not
//! claim thread safety across OS threads; see [`module`] for why shared
//! state is modeled with `Rc`/`RefCell` rather than `Arc`/`Mutex`.

mod binding;
mod cache;
mod call;
mod error;
mod identity;
mod legacy;
mod linker;
mod loader;
mod module;
mod modern;
mod name;
mod reload;
mod resolver;
mod scheduler;
mod subsystem;

pub use binding::Binding;
pub use cache::{CacheStats, Generation};
pub use call::NativeOutcome;
pub use error::{Error, Result};
pub use linker::{Address, DynamicLinker, LibloadingImage, LibloadingLinker, LoadedImage};
pub use loader::{Loader, LoaderConfig};
pub use module::Module;
pub use name::{parse, ParsedName};
pub use resolver::{DirectoryResolver, PathResolver};
pub use scheduler::{InlineExecutor, InlineTask, ScratchArena, TaskExecutor};
pub use subsystem::{GenerationStats, Subsystem, SubsystemStats};

#[cfg(any(test, feature = "test-util"))]
pub use linker::testing as linker_testing;
#[cfg(any(test, feature = "test-util"))]
pub use resolver::testing as resolver_testing;
