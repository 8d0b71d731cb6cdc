//! POSIX loader built on `dlopen`/`dlsym`/`dlclose` via libloading.
//!
//! libloading clears `dlerror` before each call and reads it afterwards, so a
//! failure is never attributed to an earlier call's leftover error.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::path::Path;
use std::ptr::NonNull;

use libloading::os::unix::{Library, RTLD_LOCAL, RTLD_NOW};
use tracing::trace;

use super::{DynamicLoader, LibraryHandle, NameStyle, SymbolAddress};
use crate::error::NativeLoadError;
use crate::platform::PlatformInfo;

/// Loader for Linux, Darwin and other POSIX kernels
#[derive(Debug, Clone)]
pub struct PosixLoader {
    style: NameStyle,
}

impl PosixLoader {
    /// Loader whose naming follows the detected kernel (`.dylib` on Darwin)
    pub fn new() -> Self {
        Self::with_style(NameStyle::for_family(PlatformInfo::current().family))
    }

    pub fn with_style(style: NameStyle) -> Self {
        Self { style }
    }

    pub fn name_style(&self) -> NameStyle {
        self.style
    }
}

impl Default for PosixLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicLoader for PosixLoader {
    fn load_library(&self, path: &Path) -> Result<LibraryHandle, NativeLoadError> {
        // Safety: dlopen runs the library's initializers. Callers choose which
        // files are candidates.
        let library = unsafe { Library::open(Some(path), RTLD_NOW | RTLD_LOCAL) }
            .map_err(|e| NativeLoadError::library(path, e.to_string()))?;

        match NonNull::new(library.into_raw()) {
            Some(raw) => Ok(unsafe { LibraryHandle::from_raw(raw) }),
            None => Err(NativeLoadError::library(path, "dlopen returned no handle")),
        }
    }

    fn resolve_symbol(
        &self,
        handle: &LibraryHandle,
        name: &str,
    ) -> Result<SymbolAddress, NativeLoadError> {
        // Safety: `handle` came from `load_library` and has not been consumed by
        // `unload_library`. The wrapper is never dropped, so no dlclose here.
        let library = ManuallyDrop::new(unsafe { Library::from_raw(handle.as_ptr()) });

        let raw = unsafe { library.get::<*mut c_void>(name.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(|e| NativeLoadError::symbol(name, e.to_string()))?;

        NonNull::new(raw)
            .map(|raw| unsafe { SymbolAddress::from_raw(raw) })
            .ok_or_else(|| NativeLoadError::symbol(name, "symbol resolved to a null address"))
    }

    fn unload_library(&self, handle: LibraryHandle) {
        trace!(?handle, "dlclose");
        // Safety: the handle is consumed, so this is the only close of this load.
        let library = unsafe { Library::from_raw(handle.as_ptr()) };
        if let Err(e) = library.close() {
            trace!(error = %e, "dlclose failed");
        }
    }

    fn translate_name(&self, logical: &str) -> String {
        self.style.translate(logical)
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::error::LoadTarget;

    #[test]
    fn test_load_and_resolve_libc() {
        let loader = PosixLoader::new();
        let handle = loader.load_library(Path::new("libc.so.6")).unwrap();
        let addr = loader.resolve_symbol(&handle, "getpid").unwrap();
        assert!(!addr.as_ptr().is_null());
        loader.unload_library(handle);
    }

    #[test]
    fn test_missing_symbol_is_an_error() {
        let loader = PosixLoader::new();
        let handle = loader.load_library(Path::new("libc.so.6")).unwrap();
        let err = loader
            .resolve_symbol(&handle, "autonative_definitely_missing")
            .unwrap_err();
        assert_eq!(
            err.target,
            LoadTarget::Symbol("autonative_definitely_missing".to_string())
        );
        assert!(!err.reason.is_empty());
        loader.unload_library(handle);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let loader = PosixLoader::new();
        let path = Path::new("/nonexistent/autonative/libnope.so");
        let err = loader.load_library(path).unwrap_err();
        assert_eq!(err.target, LoadTarget::Library(path.to_path_buf()));
        assert!(err.reason.contains("libnope.so"));
    }

    #[test]
    fn test_stale_error_not_attributed_to_success() {
        let loader = PosixLoader::new();
        // Leave an error in the channel, then make a call that succeeds.
        let _ = loader.load_library(Path::new("/nonexistent/libstale.so"));
        let handle = loader.load_library(Path::new("libc.so.6")).unwrap();
        assert!(loader.resolve_symbol(&handle, "strlen").is_ok());
        loader.unload_library(handle);
    }

    #[test]
    fn test_translate_uses_configured_style() {
        assert_eq!(
            PosixLoader::with_style(NameStyle::Darwin).translate_name("demo"),
            "libdemo.dylib"
        );
        assert_eq!(
            PosixLoader::with_style(NameStyle::Posix).translate_name("demo"),
            "libdemo.so"
        );
    }
}
