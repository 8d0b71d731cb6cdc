//! Native import
//!
//! Chains the pipeline for callers: platform, loader, candidates, locate,
//! bind. Each stage can also be driven on its own through the modules it
//! delegates to.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::binding::{self, Adapter, NativeInterface};
use crate::config::LoaderConfig;
use crate::error::{ImportError, LibraryNotFoundError};
use crate::lifecycle::{LoadedLibrary, UnloadPolicy};
use crate::loader::{system_loader, DynamicLoader};
use crate::locator;
use crate::platform::PlatformInfo;
use crate::search::{self, CandidatePath, SearchLayout, DEFAULT_ARCH_BASE};
use crate::types::InterfaceDescriptor;

/// Builder for locating and binding one native library
///
/// Unset options fall back to the detected platform, the system loader, the
/// running executable's directory and `native` as the arch base.
#[derive(Debug, Clone)]
pub struct NativeImport {
    library: String,
    version: String,
    loader: Option<Arc<dyn DynamicLoader>>,
    platform: Option<PlatformInfo>,
    base_dir: Option<PathBuf>,
    arch_base: Option<String>,
    policy: Option<UnloadPolicy>,
}

impl NativeImport {
    /// `version` is dotted (`"1.2.3"`); pass `""` for unversioned names
    pub fn new(library: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            version: version.into(),
            loader: None,
            platform: None,
            base_dir: None,
            arch_base: None,
            policy: None,
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn DynamicLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Use `platform` instead of the detected one for the arch tag
    pub fn with_platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_arch_base(mut self, arch_base: impl Into<String>) -> Self {
        self.arch_base = Some(arch_base.into());
        self
    }

    /// Keep the library mapped when the adapter is released
    pub fn suppress_unload(mut self, suppress: bool) -> Self {
        self.policy = Some(UnloadPolicy::from_suppress_flag(suppress));
        self
    }

    /// Fill options not set explicitly from `config`
    pub fn with_config(mut self, config: &LoaderConfig) -> Self {
        if self.arch_base.is_none() {
            self.arch_base = Some(config.search.arch_base.clone());
        }
        if self.base_dir.is_none() {
            self.base_dir = config.search.base_dir.clone();
        }
        if self.policy.is_none() {
            self.policy = Some(config.unload_policy());
        }
        self
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn loader(&self) -> Arc<dyn DynamicLoader> {
        self.loader.clone().unwrap_or_else(system_loader)
    }

    pub fn platform(&self) -> &PlatformInfo {
        self.platform
            .as_ref()
            .unwrap_or_else(|| PlatformInfo::current())
    }

    pub fn policy(&self) -> UnloadPolicy {
        self.policy.unwrap_or_default()
    }

    /// Directory layout the search is rooted in
    ///
    /// Without a configured base directory the running executable's directory
    /// is used. If that is unknown too, only the OS search path is searched.
    pub fn layout(&self) -> SearchLayout {
        self.layout_in(self.base_dir.clone().or_else(search::module_base_dir))
    }

    fn layout_in(&self, base_dir: Option<PathBuf>) -> SearchLayout {
        let arch_tag = self.platform().arch_tag.clone();
        let arch_base = self.arch_base.as_deref().unwrap_or(DEFAULT_ARCH_BASE);

        let layout = match base_dir {
            Some(dir) => SearchLayout::new(dir, arch_tag),
            None => {
                warn!(
                    library = %self.library,
                    "executable directory unknown; searching the OS path only"
                );
                SearchLayout::system_only(arch_tag)
            }
        };
        layout.with_arch_base(arch_base)
    }

    /// Every path [`Self::locate`] would try, in order
    pub fn candidates(&self) -> Vec<CandidatePath> {
        let loader = self.loader();
        search::generate(&self.library, &self.version, &self.layout(), loader.as_ref())
    }

    /// Load the first candidate that succeeds
    pub fn locate(&self) -> Result<LoadedLibrary, LibraryNotFoundError> {
        let loader = self.loader();
        let candidates =
            search::generate(&self.library, &self.version, &self.layout(), loader.as_ref());
        let library = locator::locate(&self.library, &candidates, loader)?;
        Ok(library.with_policy(self.policy()))
    }

    /// Locate the library and bind `descriptor` against it
    pub fn bind(&self, descriptor: &InterfaceDescriptor) -> Result<Adapter, ImportError> {
        let library = self.locate()?;
        Ok(binding::bind(descriptor, library)?)
    }

    /// Locate the library and bind a typed interface
    pub fn bind_interface<T: NativeInterface>(&self) -> Result<T, ImportError> {
        self.bind(&T::descriptor()).map(T::from_adapter)
    }
}
