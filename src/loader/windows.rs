//! Windows loader built on `LoadLibraryExW`/`GetProcAddress` via libloading.

use std::ffi::c_void;
use std::path::Path;
use std::ptr::NonNull;

use libloading::os::windows::Library;
use tracing::trace;

use super::{DynamicLoader, LibraryHandle, NameStyle, SymbolAddress};
use crate::error::NativeLoadError;

/// Loader for Windows; filenames get a `.dll` suffix
#[derive(Debug, Clone, Default)]
pub struct WindowsLoader;

impl WindowsLoader {
    pub fn new() -> Self {
        Self
    }
}

impl DynamicLoader for WindowsLoader {
    fn load_library(&self, path: &Path) -> Result<LibraryHandle, NativeLoadError> {
        // Safety: loading runs DllMain; callers choose which files are candidates.
        // libloading reports a null HMODULE as an error.
        let library = unsafe { Library::new(path) }
            .map_err(|e| NativeLoadError::library(path, e.to_string()))?;

        let raw = Box::into_raw(Box::new(library)).cast::<c_void>();
        match NonNull::new(raw) {
            Some(raw) => Ok(unsafe { LibraryHandle::from_raw(raw) }),
            None => Err(NativeLoadError::library(path, "null library handle")),
        }
    }

    fn resolve_symbol(
        &self,
        handle: &LibraryHandle,
        name: &str,
    ) -> Result<SymbolAddress, NativeLoadError> {
        // Safety: handles from this loader always point at a boxed Library that
        // stays alive until `unload_library`.
        let library = unsafe { &*handle.as_ptr().cast::<Library>() };

        let mut symbol_name = name.as_bytes().to_vec();
        symbol_name.push(0);

        let raw = unsafe { library.get::<*mut c_void>(&symbol_name) }
            .map(|symbol| *symbol)
            .map_err(|e| NativeLoadError::symbol(name, e.to_string()))?;

        NonNull::new(raw)
            .map(|raw| unsafe { SymbolAddress::from_raw(raw) })
            .ok_or_else(|| NativeLoadError::symbol(name, "symbol resolved to a null address"))
    }

    fn unload_library(&self, handle: LibraryHandle) {
        // Safety: see `resolve_symbol`; ownership of the box returns here once.
        trace!(?handle, "FreeLibrary");
        let library = unsafe { Box::from_raw(handle.as_ptr().cast::<Library>()) };
        if let Err(e) = library.close() {
            trace!(error = %e, "FreeLibrary failed");
        }
    }

    fn translate_name(&self, logical: &str) -> String {
        NameStyle::Windows.translate(logical)
    }
}
