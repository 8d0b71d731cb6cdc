//! Platform Detection
//!
//! Identifies the OS family and process architecture used to pick a loader
//! variant and to build the per-architecture search directories.
//!
//! Detection never fails. Anything that cannot be determined is guessed and the
//! guess is recorded as a [`PlatformFallback`].

use std::fmt;

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::warn;

use crate::error::PlatformFallback;

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Linux,
    Darwin,
    Other,
}

impl OsFamily {
    /// Map a kernel name (`uname -s`) or Rust `target_os` value to a family
    pub fn from_kernel_name(name: &str) -> OsFamily {
        match name.trim().to_ascii_lowercase().as_str() {
            "linux" | "android" => OsFamily::Linux,
            "darwin" | "macos" | "ios" => OsFamily::Darwin,
            "windows" => OsFamily::Windows,
            n if n.starts_with("mingw") || n.starts_with("cygwin") || n.starts_with("msys") => {
                OsFamily::Windows
            }
            _ => OsFamily::Other,
        }
    }

    pub fn is_posix(&self) -> bool {
        !matches!(self, OsFamily::Windows)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Windows => write!(f, "windows"),
            OsFamily::Linux => write!(f, "linux"),
            OsFamily::Darwin => write!(f, "darwin"),
            OsFamily::Other => write!(f, "other"),
        }
    }
}

/// What the current process runs on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformInfo {
    pub family: OsFamily,
    /// Normalized architecture token, e.g. `amd64`, `i386`, `arm64`
    pub arch_tag: String,
    /// Guesses made while detecting
    #[serde(skip)]
    pub fallbacks: Vec<PlatformFallback>,
}

static CURRENT: Lazy<PlatformInfo> = Lazy::new(|| {
    let info = detect();
    for fallback in &info.fallbacks {
        warn!(%fallback, "platform detection fell back to a guess");
    }
    info
});

impl PlatformInfo {
    pub fn new(family: OsFamily, arch_tag: impl Into<String>) -> Self {
        Self {
            family,
            arch_tag: arch_tag.into(),
            fallbacks: Vec::new(),
        }
    }

    /// Detected platform, computed once per process
    pub fn current() -> &'static PlatformInfo {
        &CURRENT
    }
}

impl fmt::Display for PlatformInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.family, self.arch_tag)
    }
}

/// Detect the host platform.
///
/// Prefer [`PlatformInfo::current`], which caches the result.
pub fn detect() -> PlatformInfo {
    detect_with(kernel_name(), std::env::consts::ARCH)
}

/// Build a [`PlatformInfo`] from raw OS query results.
///
/// A failed kernel query or an empty architecture never fails detection: the
/// value is guessed and a [`PlatformFallback`] recorded for it.
pub fn detect_with(kernel: Result<String, String>, raw_arch: &str) -> PlatformInfo {
    let mut fallbacks = Vec::new();

    let family = match kernel {
        Ok(name) => OsFamily::from_kernel_name(&name),
        Err(reason) => {
            let guess = guess_family();
            fallbacks.push(PlatformFallback::OsFamily {
                reason: format!("{}; assuming {}", reason, guess),
            });
            guess
        }
    };

    let arch_tag = match normalize_arch(raw_arch) {
        Some(tag) => tag,
        None => {
            let guess = pointer_width_arch();
            fallbacks.push(PlatformFallback::Architecture {
                reason: format!("no architecture reported; assuming {}", guess),
            });
            guess.to_string()
        }
    };

    PlatformInfo {
        family,
        arch_tag,
        fallbacks,
    }
}

/// Normalize a raw architecture name into a directory tag
///
/// Unknown names are lower-cased; an empty name yields `None`.
pub fn normalize_arch(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let tag = match raw.to_ascii_lowercase().as_str() {
        "x86_64" | "amd64" | "x64" => "amd64".to_string(),
        "x86" | "i386" | "i486" | "i586" | "i686" => "i386".to_string(),
        "aarch64" | "arm64" => "arm64".to_string(),
        "arm" | "armv7" | "armv7l" | "armhf" => "arm".to_string(),
        other => other.to_string(),
    };
    Some(tag)
}

/// Best guess at the architecture from pointer width alone
pub fn pointer_width_arch() -> &'static str {
    if cfg!(target_pointer_width = "64") {
        "amd64"
    } else {
        "i386"
    }
}

#[cfg(unix)]
fn kernel_name() -> Result<String, String> {
    let uts = nix::sys::utsname::uname().map_err(|e| format!("uname failed: {}", e))?;
    let name = uts.sysname().to_string_lossy().into_owned();
    if name.is_empty() {
        return Err("uname reported an empty kernel name".to_string());
    }
    Ok(name)
}

#[cfg(windows)]
fn kernel_name() -> Result<String, String> {
    Ok("windows".to_string())
}

#[cfg(not(any(unix, windows)))]
fn kernel_name() -> Result<String, String> {
    Err(format!("no kernel query on {}", std::env::consts::OS))
}

/// Family assumed when the kernel cannot be identified.
///
/// On POSIX builds the compile-time target is the safest answer; anywhere else
/// Windows is assumed since that branch makes no POSIX calls.
fn guess_family() -> OsFamily {
    if cfg!(unix) {
        match OsFamily::from_kernel_name(std::env::consts::OS) {
            OsFamily::Windows => OsFamily::Other,
            family => family,
        }
    } else {
        OsFamily::Windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_arches() {
        assert_eq!(normalize_arch("x86_64").as_deref(), Some("amd64"));
        assert_eq!(normalize_arch("AMD64").as_deref(), Some("amd64"));
        assert_eq!(normalize_arch("x86").as_deref(), Some("i386"));
        assert_eq!(normalize_arch("i686").as_deref(), Some("i386"));
        assert_eq!(normalize_arch("aarch64").as_deref(), Some("arm64"));
        assert_eq!(normalize_arch("arm").as_deref(), Some("arm"));
    }

    #[test]
    fn test_normalize_unknown_lowercases() {
        assert_eq!(normalize_arch("RISCV64").as_deref(), Some("riscv64"));
        assert_eq!(normalize_arch("  "), None);
    }

    #[test]
    fn test_kernel_name_mapping() {
        assert_eq!(OsFamily::from_kernel_name("Linux"), OsFamily::Linux);
        assert_eq!(OsFamily::from_kernel_name("Darwin"), OsFamily::Darwin);
        assert_eq!(OsFamily::from_kernel_name("macos"), OsFamily::Darwin);
        assert_eq!(OsFamily::from_kernel_name("MINGW64_NT-10.0"), OsFamily::Windows);
        assert_eq!(OsFamily::from_kernel_name("FreeBSD"), OsFamily::Other);
        assert!(OsFamily::Other.is_posix());
        assert!(!OsFamily::Windows.is_posix());
    }

    #[test]
    fn test_detect_matches_build_target() {
        let info = detect();
        assert!(!info.arch_tag.is_empty());
        assert!(info.fallbacks.is_empty());
        #[cfg(target_os = "linux")]
        assert_eq!(info.family, OsFamily::Linux);
        #[cfg(target_os = "macos")]
        assert_eq!(info.family, OsFamily::Darwin);
        #[cfg(windows)]
        assert_eq!(info.family, OsFamily::Windows);
        #[cfg(target_arch = "x86_64")]
        assert_eq!(info.arch_tag, "amd64");
        #[cfg(target_arch = "aarch64")]
        assert_eq!(info.arch_tag, "arm64");
    }

    #[test]
    fn test_failed_kernel_query_guesses_family() {
        let info = detect_with(Err("uname failed: EFAULT".to_string()), "x86_64");

        assert_eq!(info.family, guess_family());
        assert_eq!(info.arch_tag, "amd64");
        assert_eq!(info.fallbacks.len(), 1);
        match &info.fallbacks[0] {
            PlatformFallback::OsFamily { reason } => {
                assert!(reason.contains("uname failed"));
                assert!(reason.contains(&guess_family().to_string()));
            }
            other => panic!("unexpected fallback: {:?}", other),
        }
        #[cfg(target_os = "linux")]
        assert_eq!(info.family, OsFamily::Linux);
    }

    #[test]
    fn test_empty_arch_uses_pointer_width() {
        let info = detect_with(Ok("Darwin".to_string()), "");

        assert_eq!(info.family, OsFamily::Darwin);
        assert_eq!(info.arch_tag, pointer_width_arch());
        assert_eq!(
            info.fallbacks,
            vec![PlatformFallback::Architecture {
                reason: format!("no architecture reported; assuming {}", pointer_width_arch()),
            }]
        );
    }

    #[test]
    fn test_both_queries_failing_still_usable() {
        let info = detect_with(Err("no kernel query".to_string()), "  ");
        assert!(!info.arch_tag.is_empty());
        assert_eq!(info.fallbacks.len(), 2);
        assert!(info.to_string().ends_with(pointer_width_arch()));
    }

    #[test]
    fn test_current_is_cached() {
        let a = PlatformInfo::current();
        let b = PlatformInfo::current();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_display() {
        let info = PlatformInfo::new(OsFamily::Linux, "amd64");
        assert_eq!(info.to_string(), "linux-amd64");
    }
}
