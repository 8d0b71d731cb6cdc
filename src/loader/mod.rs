//! Dynamic Loader
//!
//! The capability every other component uses to touch the OS dynamic loader:
//! load a file, resolve a symbol, unload, and translate a logical library name
//! into a platform filename.
//!
//! ```text
//!            DynamicLoader
//!       ┌──────────┼───────────┐
//!       ▼          ▼           ▼
//!  PosixLoader WindowsLoader StubLoader
//!  (dlopen)    (LoadLibrary)  (in-memory)
//! ```
//!
//! The variant used for real work is chosen once per process by
//! [`system_loader`].

use std::ffi::c_void;
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::NativeLoadError;
use crate::platform::{OsFamily, PlatformInfo};

#[cfg(unix)]
pub mod posix;
pub mod stub;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use posix::PosixLoader;
pub use stub::StubLoader;
#[cfg(windows)]
pub use windows::WindowsLoader;

/// Opaque handle to a loaded library
///
/// Neither `Clone` nor `Copy`: the value returned by `load_library` is the only
/// token for that load, and `unload_library` consumes it.
#[derive(PartialEq, Eq, Hash)]
pub struct LibraryHandle(NonNull<c_void>);

// Handles are plain tokens; the OS loader is thread-safe for load/resolve/unload.
unsafe impl Send for LibraryHandle {}
unsafe impl Sync for LibraryHandle {}

impl LibraryHandle {
    /// Wrap a raw handle.
    ///
    /// # Safety
    ///
    /// `raw` must be a handle produced by the loader it will be passed back to,
    /// and no other `LibraryHandle` may wrap the same load.
    pub unsafe fn from_raw(raw: NonNull<c_void>) -> Self {
        Self(raw)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LibraryHandle({:p})", self.0)
    }
}

/// Non-null address of a resolved symbol
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolAddress(NonNull<c_void>);

unsafe impl Send for SymbolAddress {}
unsafe impl Sync for SymbolAddress {}

impl SymbolAddress {
    /// Wrap a resolved address.
    ///
    /// # Safety
    ///
    /// `raw` must point at the exported entry point it will be called as.
    pub unsafe fn from_raw(raw: NonNull<c_void>) -> Self {
        Self(raw)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl fmt::Debug for SymbolAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolAddress({:p})", self.0)
    }
}

/// Filename conventions for shared libraries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameStyle {
    /// `name.dll`
    Windows,
    /// `libname.so`
    Posix,
    /// `libname.dylib`
    Darwin,
}

impl NameStyle {
    pub fn for_family(family: OsFamily) -> Self {
        match family {
            OsFamily::Windows => NameStyle::Windows,
            OsFamily::Darwin => NameStyle::Darwin,
            OsFamily::Linux | OsFamily::Other => NameStyle::Posix,
        }
    }

    /// Turn a logical name into a physical filename
    pub fn translate(&self, logical: &str) -> String {
        match self {
            NameStyle::Windows => format!("{}.dll", logical),
            NameStyle::Posix => format!("lib{}.so", logical),
            NameStyle::Darwin => format!("lib{}.dylib", logical),
        }
    }
}

/// OS dynamic loader capability
///
/// Implementations are stateless with respect to the libraries they load: a
/// handle is owned by whoever received it from `load_library`.
pub trait DynamicLoader: Send + Sync + fmt::Debug {
    /// Load the shared library at `path`
    fn load_library(&self, path: &Path) -> Result<LibraryHandle, NativeLoadError>;

    /// Resolve an exported symbol; a null address is a failure
    fn resolve_symbol(
        &self,
        handle: &LibraryHandle,
        name: &str,
    ) -> Result<SymbolAddress, NativeLoadError>;

    /// Unload a library, consuming its handle. Best effort: OS failures are
    /// ignored.
    fn unload_library(&self, handle: LibraryHandle);

    /// Physical filename for a logical library name
    fn translate_name(&self, logical: &str) -> String;
}

static SYSTEM_LOADER: Lazy<Arc<dyn DynamicLoader>> =
    Lazy::new(|| select_loader(PlatformInfo::current().family));

/// The loader for this process, selected once by OS family
pub fn system_loader() -> Arc<dyn DynamicLoader> {
    Arc::clone(&SYSTEM_LOADER)
}

#[cfg(unix)]
fn select_loader(family: OsFamily) -> Arc<dyn DynamicLoader> {
    Arc::new(PosixLoader::with_style(NameStyle::for_family(family)))
}

#[cfg(windows)]
fn select_loader(_family: OsFamily) -> Arc<dyn DynamicLoader> {
    Arc::new(WindowsLoader::new())
}

#[cfg(not(any(unix, windows)))]
fn select_loader(family: OsFamily) -> Arc<dyn DynamicLoader> {
    Arc::new(UnsupportedLoader {
        style: NameStyle::for_family(family),
    })
}

/// Fallback for targets without a dynamic loader; every load fails
#[cfg(not(any(unix, windows)))]
#[derive(Debug)]
struct UnsupportedLoader {
    style: NameStyle,
}

#[cfg(not(any(unix, windows)))]
impl DynamicLoader for UnsupportedLoader {
    fn load_library(&self, path: &Path) -> Result<LibraryHandle, NativeLoadError> {
        Err(NativeLoadError::library(
            path,
            format!("dynamic loading is not supported on {}", std::env::consts::OS),
        ))
    }

    fn resolve_symbol(
        &self,
        _handle: &LibraryHandle,
        name: &str,
    ) -> Result<SymbolAddress, NativeLoadError> {
        Err(NativeLoadError::symbol(name, "dynamic loading is not supported"))
    }

    fn unload_library(&self, _handle: LibraryHandle) {}

    fn translate_name(&self, logical: &str) -> String {
        self.style.translate(logical)
    }
}
