//! Error types for the module cache and symbol-resolution subsystem.
//!
//! Mirrors the host's established pattern for FFI-adjacent errors: a plain
//! `enum` with a manual `Display` and `std::error::Error` impl. No `thiserror`.

use std::fmt;
use std::path::PathBuf;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the module cache and symbol-resolution subsystem.
#[derive(Debug)]
pub enum Error {
    /// A dotted logical name was empty or otherwise malformed.
    BadName {
        /// The offending name.
        name: String,
    },

    /// The injected path resolver could not locate a package.
    NotFound {
        /// The logical package name that was searched for.
        package: String,
    },

    /// A filesystem syscall failed.
    Io {
        /// The syscall that failed (`stat`, `open`, `copy`, `mkdtemp`, ...).
        syscall: &'static str,
        /// The path involved, if any.
        path: Option<PathBuf>,
        /// The underlying OS error.
        source: std::io::Error,
    },

    /// The dynamic linker rejected the staged image.
    Load {
        /// The staged path that failed to open.
        path: PathBuf,
        /// The linker's own message.
        reason: String,
    },

    /// A requested symbol was absent from an otherwise successfully loaded image.
    SymbolNotFound {
        /// Owning package.
        package: String,
        /// Symbol that could not be found.
        symbol: String,
    },

    /// `reload_legacy` was invoked for a package with no cached legacy Module.
    NoSuchModule {
        /// The package name that was not found in the legacy cache.
        package: String,
    },

    /// Allocation failed.
    OutOfMemory,

    /// User code returned a non-zero status.
    NativeError {
        /// The binding's logical name.
        name: String,
        /// The callee's own diagnostic message, if it set one. `None`
        /// means the callee returned failure without explaining why, in
        /// which case a generic message is synthesized on display (§4.G.call
        /// step 4).
        diagnostic: Option<String>,
    },
}

impl Error {
    /// Shorthand for [`Error::BadName`].
    pub fn bad_name(name: impl Into<String>) -> Self {
        Error::BadName { name: name.into() }
    }

    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(package: impl Into<String>) -> Self {
        Error::NotFound {
            package: package.into(),
        }
    }

    /// Shorthand for [`Error::Io`].
    pub fn io(syscall: &'static str, path: impl Into<Option<PathBuf>>, source: std::io::Error) -> Self {
        Error::Io {
            syscall,
            path: path.into(),
            source,
        }
    }

    /// Shorthand for [`Error::Load`].
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::SymbolNotFound`].
    pub fn symbol_not_found(package: impl Into<String>, symbol: impl Into<String>) -> Self {
        Error::SymbolNotFound {
            package: package.into(),
            symbol: symbol.into(),
        }
    }

    /// Shorthand for [`Error::NoSuchModule`].
    pub fn no_such_module(package: impl Into<String>) -> Self {
        Error::NoSuchModule {
            package: package.into(),
        }
    }

    /// Shorthand for [`Error::NativeError`].
    pub fn native_error(name: impl Into<String>, diagnostic: Option<String>) -> Self {
        Error::NativeError {
            name: name.into(),
            diagnostic,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadName { name } => write!(f, "bad module name: {name:?}"),
            Error::NotFound { package } => write!(f, "package not found: {package}"),
            Error::Io { syscall, path, source } => match path {
                Some(path) => write!(f, "{syscall} failed on {}: {source}", path.display()),
                None => write!(f, "{syscall} failed: {source}"),
            },
            Error::Load { path, reason } => {
                write!(f, "failed to load {}: {reason}", path.display())
            }
            Error::SymbolNotFound { package, symbol } => {
                write!(f, "symbol '{symbol}' not found in package '{package}'")
            }
            Error::NoSuchModule { package } => {
                write!(f, "no cached module for package '{package}'")
            }
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::NativeError { name, diagnostic: Some(msg) } => {
                write!(f, "native call '{name}' failed: {msg}")
            }
            Error::NativeError { name, diagnostic: None } => {
                write!(f, "native call '{name}' failed with no diagnostic set")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identifying_context() {
        let err = Error::symbol_not_found("m", "f1");
        assert_eq!(err.to_string(), "symbol 'f1' not found in package 'm'");
    }

    #[test]
    fn io_error_wraps_source() {
        use std::error::Error as _;
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err = Error::io("stat", PathBuf::from("/tmp/x"), source);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("stat failed on /tmp/x"));
    }
}
