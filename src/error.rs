//! Error Types
//!
//! Failure taxonomy for locating, binding and calling into native libraries.
//! Per-candidate load failures never surface on their own; they are folded into
//! [`LibraryNotFoundError`] once every candidate has been tried.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::PrimitiveType;

/// What a failed OS loader call was operating on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadTarget {
    /// `dlopen` / `LoadLibrary` of a file path
    Library(PathBuf),
    /// `dlsym` / `GetProcAddress` of an exported symbol
    Symbol(String),
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadTarget::Library(path) => write!(f, "library '{}'", path.display()),
            LoadTarget::Symbol(name) => write!(f, "symbol '{}'", name),
        }
    }
}

/// A single OS-level loader call failed.
#[derive(Debug, Clone, Error)]
#[error("failed to load {target}: {reason}")]
pub struct NativeLoadError {
    /// Path or symbol name the call was made with
    pub target: LoadTarget,
    /// Raw error text reported by the OS loader
    pub reason: String,
}

impl NativeLoadError {
    pub fn library(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            target: LoadTarget::Library(path.into()),
            reason: reason.into(),
        }
    }

    pub fn symbol(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: LoadTarget::Symbol(name.into()),
            reason: reason.into(),
        }
    }
}

/// One entry of the search trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchAttempt {
    pub path: PathBuf,
    pub reason: String,
}

/// Every candidate path was tried and none could be loaded.
#[derive(Debug, Clone, Error)]
#[error("{}", search_trail(.library, .searched))]
pub struct LibraryNotFoundError {
    /// Logical library name that was searched for
    pub library: String,
    /// Attempts in the exact order they were made
    pub searched: Vec<SearchAttempt>,
}

impl LibraryNotFoundError {
    /// The attempted paths, in search order.
    pub fn searched_paths(&self) -> Vec<&Path> {
        self.searched.iter().map(|a| a.path.as_path()).collect()
    }
}

/// Numbered search trail, one attempt per line
fn search_trail(library: &str, searched: &[SearchAttempt]) -> String {
    let mut out = format!(
        "unable to locate native library '{}' ({} candidates tried):",
        library,
        searched.len()
    );
    for (idx, attempt) in searched.iter().enumerate() {
        out.push_str(&format!(
            "\n  {:>3}. {}: {}",
            idx + 1,
            attempt.path.display(),
            attempt.reason
        ));
    }
    out
}

/// Errors raised while binding an interface or calling a bound operation.
#[derive(Debug, Clone, Error)]
pub enum BindError {
    #[error("entry point '{operation}' not found in '{library}': {reason}")]
    MissingEntryPoint {
        operation: String,
        library: String,
        reason: String,
    },

    #[error("operation '{operation}' has an unsupported signature: {reason}")]
    UnsupportedSignature { operation: String, reason: String },

    #[error("operation '{0}' is not part of this interface")]
    UnknownOperation(String),

    #[error("operation '{operation}' expects {expected} arguments, got {got}")]
    ArgumentCount {
        operation: String,
        expected: usize,
        got: usize,
    },

    #[error("argument {index} of '{operation}' must be {expected}")]
    ArgumentType {
        operation: String,
        index: usize,
        expected: PrimitiveType,
    },

    #[error("operation '{operation}' returned a value that is not {expected}")]
    ValueMismatch {
        operation: String,
        expected: PrimitiveType,
    },

    #[error("native library '{0}' has already been released")]
    Released(String),
}

/// Top-level failure of [`crate::NativeImport`].
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error(transparent)]
    LibraryNotFound(#[from] LibraryNotFoundError),

    #[error(transparent)]
    Bind(#[from] BindError),
}

/// A detection step that fell back to a guess instead of failing.
///
/// Never raised; recorded on [`crate::PlatformInfo`] and logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformFallback {
    /// Kernel identification failed; the family was guessed
    #[error("OS family guessed: {reason}")]
    OsFamily { reason: String },
    /// Architecture was unknown; the tag was guessed from pointer width
    #[error("architecture guessed: {reason}")]
    Architecture { reason: String },
}
