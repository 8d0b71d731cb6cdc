//! Candidate Generation
//!
//! Produces the ordered list of file paths to try for a library. Directories
//! are walked from most to least preferred; within a directory every versioned
//! name is tried from most to least specific.
//!
//! ```text
//! {base}/native/{arch}/libdemo-1.2.3.so
//! {base}/native/{arch}/libdemo-1.2.so
//! {base}/native/{arch}/libdemo-1.so
//! {base}/native/{arch}/libdemo.so
//! {base}/native/...            (same four names)
//! {base}/{arch}/...
//! {base}/...
//! libdemo-1.2.3.so ... libdemo.so   (OS search path)
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::loader::DynamicLoader;

/// Default name of the directory holding per-architecture subdirectories
pub const DEFAULT_ARCH_BASE: &str = "native";

/// Versioned fallback chain for a logical library name
///
/// `("demo", "1.2.3")` gives `demo-1.2.3, demo-1.2, demo-1, demo`. Empty
/// version segments are ignored, so irregular versions still end in the bare
/// name.
pub fn logical_names(name: &str, version: &str) -> Vec<String> {
    let segments: Vec<&str> = version
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut names = Vec::with_capacity(segments.len() + 1);
    for len in (1..=segments.len()).rev() {
        names.push(format!("{}-{}", name, segments[..len].join(".")));
    }
    names.push(name.to_string());
    names
}

/// Where a candidate sits in the search order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTier {
    /// `{base}/{arch_base}/{arch}`
    ArchScoped,
    /// `{base}/{arch_base}`
    ArchBase,
    /// `{base}/{arch}`
    Arch,
    /// `{base}`
    ModuleDir,
    /// Bare filename resolved by the OS loader's own search path
    SystemPath,
}

impl fmt::Display for SearchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchTier::ArchScoped => "arch-scoped",
            SearchTier::ArchBase => "arch-base",
            SearchTier::Arch => "arch",
            SearchTier::ModuleDir => "module-dir",
            SearchTier::SystemPath => "system-path",
        };
        f.write_str(name)
    }
}

/// One file the locator will try to load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidatePath {
    pub tier: SearchTier,
    /// `None` for the system search path tier
    pub directory: Option<PathBuf>,
    pub logical_name: String,
    pub physical_name: String,
}

impl CandidatePath {
    /// A candidate left to the OS search path
    pub fn bare(logical_name: impl Into<String>, physical_name: impl Into<String>) -> Self {
        Self {
            tier: SearchTier::SystemPath,
            directory: None,
            logical_name: logical_name.into(),
            physical_name: physical_name.into(),
        }
    }

    /// The path handed to the loader
    pub fn path(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.join(&self.physical_name),
            None => PathBuf::from(&self.physical_name),
        }
    }
}

/// Directory layout a search is rooted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLayout {
    /// The running module's install directory; `None` when it is unknown,
    /// which leaves only the OS search path tier
    pub base_dir: Option<PathBuf>,
    pub arch_base: String,
    pub arch_tag: String,
}

impl SearchLayout {
    pub fn new(base_dir: impl Into<PathBuf>, arch_tag: impl Into<String>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            arch_base: DEFAULT_ARCH_BASE.to_string(),
            arch_tag: arch_tag.into(),
        }
    }

    /// Layout with no module directory; only bare names are tried
    pub fn system_only(arch_tag: impl Into<String>) -> Self {
        Self {
            base_dir: None,
            arch_base: DEFAULT_ARCH_BASE.to_string(),
            arch_tag: arch_tag.into(),
        }
    }

    pub fn with_arch_base(mut self, arch_base: impl Into<String>) -> Self {
        self.arch_base = arch_base.into();
        self
    }

    /// Search directories, most preferred first
    pub fn directories(&self) -> Vec<(SearchTier, PathBuf)> {
        let Some(base) = self.base_dir.as_deref() else {
            return Vec::new();
        };
        vec![
            (
                SearchTier::ArchScoped,
                base.join(&self.arch_base).join(&self.arch_tag),
            ),
            (SearchTier::ArchBase, base.join(&self.arch_base)),
            (SearchTier::Arch, base.join(&self.arch_tag)),
            (SearchTier::ModuleDir, base.to_path_buf()),
        ]
    }
}

/// Build the full candidate sequence for `library` at `version`.
///
/// The result is deterministic and never empty.
pub fn generate(
    library: &str,
    version: &str,
    layout: &SearchLayout,
    loader: &dyn DynamicLoader,
) -> Vec<CandidatePath> {
    let names: Vec<(String, String)> = logical_names(library, version)
        .into_iter()
        .map(|logical| {
            let physical = loader.translate_name(&logical);
            (logical, physical)
        })
        .collect();

    let directories = layout.directories();
    let mut candidates = Vec::with_capacity(names.len() * (directories.len() + 1));

    for (tier, dir) in directories {
        for (logical, physical) in &names {
            candidates.push(CandidatePath {
                tier,
                directory: Some(dir.clone()),
                logical_name: logical.clone(),
                physical_name: physical.clone(),
            });
        }
    }

    for (logical, physical) in names {
        candidates.push(CandidatePath::bare(logical, physical));
    }

    candidates
}

/// Directory of the running executable, the default search base
pub fn module_base_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.parent().map(Path::to_path_buf)
}
