//! autonative - Native Library Discovery and Binding
//!
//! Finds the right shared library for the running platform, loads it, resolves
//! the entry points a caller declares and hands back an adapter that calls
//! them. The library is released exactly once, when the adapter is released
//! or dropped.
//!
//! # Features
//!
//! - **Platform detection**: OS family and a normalized architecture tag, computed once
//! - **Versioned search**: `demo-1.2.3`, `demo-1.2`, `demo-1`, `demo` across four directories, then the OS search path
//! - **Eager binding**: every entry point resolved up front; a missing one fails the whole bind
//! - **Shared call shapes**: operations with the same register layout share one invoker
//! - **Guarded release**: idempotent, serialized against in-flight calls, optional unload suppression
//! - **Typed interfaces**: `native_interface!` generates methods over an adapter
//!
//! # Example
//!
//! ```rust,no_run
//! use autonative::{InterfaceDescriptor, NativeImport, NativeValue};
//!
//! let descriptor = InterfaceDescriptor::parse_many("i32 demo_ping()").unwrap();
//! let adapter = NativeImport::new("demo", "1.2.3").bind(&descriptor).unwrap();
//!
//! let pong = adapter.call("demo_ping", &[]).unwrap();
//! assert_eq!(pong, NativeValue::Int(1));
//! ```
//!
//! # Search Order
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ {base}/native/{arch}/        │  libdemo-1.2.3.so ... libdemo.so
//! ├──────────────────────────────┤
//! │ {base}/native/               │
//! ├──────────────────────────────┤
//! │ {base}/{arch}/               │
//! ├──────────────────────────────┤
//! │ {base}/                      │  directory of the running executable
//! ├──────────────────────────────┤
//! │ OS search path               │  bare filenames
//! └──────────────────────────────┘
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod binding;
pub mod config;
pub mod error;
pub mod import;
pub mod lifecycle;
pub mod loader;
pub mod locator;
pub mod logging;
pub mod platform;
pub mod search;
pub mod types;

pub use binding::{bind, Adapter, BoundFunction, CallShape, NativeInterface, NativeType};
pub use config::{ConfigError, LoaderConfig};
pub use error::{
    BindError, ImportError, LibraryNotFoundError, LoadTarget, NativeLoadError, PlatformFallback,
    SearchAttempt,
};
pub use import::NativeImport;
pub use lifecycle::{LibraryState, LoadedLibrary, UnloadPolicy};
pub use loader::{
    system_loader, DynamicLoader, LibraryHandle, NameStyle, StubLoader, SymbolAddress,
};
pub use locator::locate;
pub use platform::{OsFamily, PlatformInfo};
pub use search::{CandidatePath, SearchLayout, SearchTier};
pub use types::{InterfaceDescriptor, NativeValue, OperationSignature, PrimitiveType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    extern "C" fn ping() -> i32 {
        1
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_root_exports_cover_pipeline() {
        let loader = Arc::new(
            StubLoader::new(NameStyle::Posix).with_library("libdemo.so", [("demo_ping", ping as usize)]),
        );
        let candidates = vec![CandidatePath::bare("demo", "libdemo.so")];
        let library = locate("demo", &candidates, loader).unwrap();
        let descriptor = InterfaceDescriptor::parse_many("i32 demo_ping()").unwrap();
        let adapter = bind(&descriptor, library).unwrap();
        assert_eq!(adapter.call("demo_ping", &[]).unwrap(), NativeValue::Int(1));
    }
}
