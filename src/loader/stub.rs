//! In-memory loader for tests
//!
//! Maps physical paths to export tables and records every call made against
//! it, so search order, early exit and unload counts can be asserted without
//! touching the filesystem.

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use parking_lot::Mutex;

use super::{DynamicLoader, LibraryHandle, NameStyle, SymbolAddress};
use crate::error::NativeLoadError;

#[derive(Debug, Clone)]
struct StubLibrary {
    path: PathBuf,
    exports: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct StubLog {
    attempts: Vec<PathBuf>,
    resolves: Vec<String>,
    unloads: usize,
    invalid_unloads: usize,
    refcounts: Vec<usize>,
}

/// A [`DynamicLoader`] backed by a fixed table of fake libraries
#[derive(Debug)]
pub struct StubLoader {
    style: NameStyle,
    libraries: Vec<StubLibrary>,
    log: Mutex<StubLog>,
}

impl StubLoader {
    pub fn new(style: NameStyle) -> Self {
        Self {
            style,
            libraries: Vec::new(),
            log: Mutex::new(StubLog::default()),
        }
    }

    /// Register a library at `path` exporting `(symbol, address)` pairs
    ///
    /// Addresses are usually real `extern "C" fn` items cast to `usize`; an
    /// address of 0 simulates a symbol that resolves to null.
    pub fn with_library<'a, I>(mut self, path: impl Into<PathBuf>, exports: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        self.libraries.push(StubLibrary {
            path: path.into(),
            exports: exports
                .into_iter()
                .map(|(name, addr)| (name.to_string(), addr))
                .collect(),
        });
        self.log.lock().refcounts.push(0);
        self
    }

    /// Every path passed to `load_library`, in call order
    pub fn attempts(&self) -> Vec<PathBuf> {
        self.log.lock().attempts.clone()
    }

    pub fn load_calls(&self) -> usize {
        self.log.lock().attempts.len()
    }

    /// Symbol names passed to `resolve_symbol`, in call order
    pub fn resolved(&self) -> Vec<String> {
        self.log.lock().resolves.clone()
    }

    pub fn unload_calls(&self) -> usize {
        self.log.lock().unloads
    }

    /// Unloads issued against a library that was not loaded at the time
    pub fn invalid_unloads(&self) -> usize {
        self.log.lock().invalid_unloads
    }

    /// Loads not yet matched by an unload
    pub fn open_count(&self) -> usize {
        self.log.lock().refcounts.iter().sum()
    }

    /// Forget recorded attempts and resolutions; open counts are kept
    pub fn reset_log(&self) {
        let mut log = self.log.lock();
        log.attempts.clear();
        log.resolves.clear();
    }

    fn library_for(&self, handle: &LibraryHandle) -> Option<(usize, &StubLibrary)> {
        let index = (handle.as_ptr() as usize).checked_sub(1)?;
        self.libraries.get(index).map(|lib| (index, lib))
    }
}

impl DynamicLoader for StubLoader {
    fn load_library(&self, path: &Path) -> Result<LibraryHandle, NativeLoadError> {
        let mut log = self.log.lock();
        log.attempts.push(path.to_path_buf());

        let index = self
            .libraries
            .iter()
            .position(|lib| lib.path == path)
            .ok_or_else(|| {
                NativeLoadError::library(path, "cannot open shared object file: No such file")
            })?;
        log.refcounts[index] += 1;

        // Handles are 1-based indices; they are never dereferenced.
        let raw = NonNull::new((index + 1) as *mut c_void)
            .ok_or_else(|| NativeLoadError::library(path, "null handle"))?;
        Ok(unsafe { LibraryHandle::from_raw(raw) })
    }

    fn resolve_symbol(
        &self,
        handle: &LibraryHandle,
        name: &str,
    ) -> Result<SymbolAddress, NativeLoadError> {
        self.log.lock().resolves.push(name.to_string());

        let (_, library) = self
            .library_for(handle)
            .ok_or_else(|| NativeLoadError::symbol(name, "invalid handle"))?;
        let addr = library
            .exports
            .get(name)
            .copied()
            .ok_or_else(|| NativeLoadError::symbol(name, format!("undefined symbol: {}", name)))?;

        NonNull::new(addr as *mut c_void)
            .map(|raw| unsafe { SymbolAddress::from_raw(raw) })
            .ok_or_else(|| NativeLoadError::symbol(name, "symbol resolved to a null address"))
    }

    fn unload_library(&self, handle: LibraryHandle) {
        let index = self.library_for(&handle).map(|(index, _)| index);
        let mut log = self.log.lock();
        log.unloads += 1;
        match index {
            Some(index) if log.refcounts[index] > 0 => log.refcounts[index] -= 1,
            _ => log.invalid_unloads += 1,
        }
    }

    fn translate_name(&self, logical: &str) -> String {
        self.style.translate(logical)
    }
}
