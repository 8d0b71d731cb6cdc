//! Library Lifecycle
//!
//! A [`LoadedLibrary`] owns one OS handle and moves through exactly one
//! transition, `Live -> Released`. Release happens on [`LoadedLibrary::release`]
//! or on drop, whichever comes first; later attempts are no-ops.
//!
//! Native calls hold the read side of the state lock and release takes the
//! write side, so a handle can never be unloaded while a call through it is in
//! flight, and nothing reaches the loader once the handle is gone.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::NativeLoadError;
use crate::loader::{DynamicLoader, LibraryHandle, SymbolAddress};

/// What release does with the OS-level library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnloadPolicy {
    /// Unload the library when released
    #[default]
    Unload,
    /// Mark released but keep the library mapped until process exit
    Retain,
}

impl UnloadPolicy {
    pub fn from_suppress_flag(suppress_unload: bool) -> Self {
        if suppress_unload {
            UnloadPolicy::Retain
        } else {
            UnloadPolicy::Unload
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryState {
    Live,
    Released,
}

impl fmt::Display for LibraryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryState::Live => write!(f, "live"),
            LibraryState::Released => write!(f, "released"),
        }
    }
}

/// A loaded native library and the loader that will unload it
#[derive(Debug)]
pub struct LoadedLibrary {
    path: PathBuf,
    /// `None` once released
    handle: RwLock<Option<LibraryHandle>>,
    loader: Arc<dyn DynamicLoader>,
    policy: UnloadPolicy,
}

impl LoadedLibrary {
    /// Take ownership of `handle`, which `loader` produced by loading `path`
    pub fn new(
        path: impl Into<PathBuf>,
        handle: LibraryHandle,
        loader: Arc<dyn DynamicLoader>,
    ) -> Self {
        Self {
            path: path.into(),
            handle: RwLock::new(Some(handle)),
            loader,
            policy: UnloadPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnloadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The path the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> UnloadPolicy {
        self.policy
    }

    pub fn state(&self) -> LibraryState {
        if self.handle.read().is_some() {
            LibraryState::Live
        } else {
            LibraryState::Released
        }
    }

    pub fn is_live(&self) -> bool {
        self.state() == LibraryState::Live
    }

    /// Run `f` against the live handle, or return `None` if released.
    ///
    /// Release blocks until `f` returns. `f` must not release this library.
    pub(crate) fn with_live<R>(
        &self,
        f: impl FnOnce(&LibraryHandle, &dyn DynamicLoader) -> R,
    ) -> Option<R> {
        let guard = self.handle.read_recursive();
        let handle = guard.as_ref()?;
        Some(f(handle, self.loader.as_ref()))
    }

    /// Resolve an exported symbol while the library is live
    pub fn resolve(&self, name: &str) -> Result<SymbolAddress, NativeLoadError> {
        self.with_live(|handle, loader| loader.resolve_symbol(handle, name))
            .unwrap_or_else(|| {
                Err(NativeLoadError::symbol(
                    name,
                    format!("library '{}' has been released", self.path.display()),
                ))
            })
    }

    /// Move to `Released`, unloading unless the policy retains the library.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn release(&self) -> bool {
        let Some(handle) = self.handle.write().take() else {
            return false;
        };

        match self.policy {
            UnloadPolicy::Unload => {
                self.loader.unload_library(handle);
                debug!(path = %self.path.display(), "native library unloaded");
            }
            UnloadPolicy::Retain => {
                warn!(
                    path = %self.path.display(),
                    "native library released without unloading"
                );
            }
        }
        true
    }
}

impl Drop for LoadedLibrary {
    fn drop(&mut self) {
        self.release();
    }
}
