//! End-to-end binding scenarios
//!
//! Drives the full locate-and-bind pipeline against an in-memory loader with
//! real `extern "C"` functions as exports.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use autonative::{
    BindError, DynamicLoader, ImportError, InterfaceDescriptor, LibraryState, NameStyle,
    NativeImport, NativeInterface, NativeValue, OsFamily, PlatformInfo, StubLoader,
    UnloadPolicy,
};

const ARCH_DIR_LIB: &str = "/opt/app/native/amd64/libdemo.so";

extern "C" fn ping() -> i32 {
    42
}

extern "C" fn add(a: i64, b: i64) -> i64 {
    a + b
}

extern "C" fn sub(a: i64, b: i64) -> i64 {
    a - b
}

static PULSES: AtomicUsize = AtomicUsize::new(0);

extern "C" fn pulse() {
    PULSES.fetch_add(1, Ordering::SeqCst);
}

fn stub<'a>(path: &str, exports: impl IntoIterator<Item = (&'a str, usize)>) -> Arc<StubLoader> {
    Arc::new(StubLoader::new(NameStyle::Posix).with_library(path, exports))
}

fn demo_import(loader: &Arc<StubLoader>) -> NativeImport {
    NativeImport::new("demo", "1.2.3")
        .with_loader(Arc::clone(loader) as Arc<dyn DynamicLoader>)
        .with_platform(PlatformInfo::new(OsFamily::Linux, "amd64"))
        .with_base_dir("/opt/app")
}

fn descriptor(source: &str) -> InterfaceDescriptor {
    InterfaceDescriptor::parse_many(source).unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_scenario_a_ping_through_arch_scoped_library() {
    let loader = stub(ARCH_DIR_LIB, [("ping", ping as usize)]);
    let adapter = demo_import(&loader)
        .bind(&descriptor("i32 ping()"))
        .unwrap();

    assert_eq!(adapter.call("ping", &[]).unwrap(), NativeValue::Int(42));
    assert_eq!(adapter.library_path(), PathBuf::from(ARCH_DIR_LIB));

    // versioned names in the same directory come first
    let attempts = loader.attempts();
    assert_eq!(
        attempts,
        vec![
            PathBuf::from("/opt/app/native/amd64/libdemo-1.2.3.so"),
            PathBuf::from("/opt/app/native/amd64/libdemo-1.2.so"),
            PathBuf::from("/opt/app/native/amd64/libdemo-1.so"),
            PathBuf::from(ARCH_DIR_LIB),
        ]
    );
}

#[test]
fn test_scenario_a_forced_failure_trail() {
    let loader = stub("/elsewhere/libdemo.so", [("ping", ping as usize)]);
    let err = demo_import(&loader).locate().unwrap_err();

    let trail: Vec<String> = err
        .searched_paths()
        .iter()
        .map(|p| p.display().to_string())
        .collect();

    let dirs = [
        "/opt/app/native/amd64/",
        "/opt/app/native/",
        "/opt/app/amd64/",
        "/opt/app/",
        "",
    ];
    let names = [
        "libdemo-1.2.3.so",
        "libdemo-1.2.so",
        "libdemo-1.so",
        "libdemo.so",
    ];
    let expected: Vec<String> = dirs
        .iter()
        .flat_map(|dir| names.iter().map(move |name| format!("{}{}", dir, name)))
        .collect();
    assert_eq!(trail, expected);

    let message = err.to_string();
    assert!(message.contains("demo"));
    assert!(message.contains("/opt/app/native/amd64/libdemo-1.2.3.so"));
}

#[test]
fn test_scenario_b_missing_ping() {
    let loader = stub(ARCH_DIR_LIB, [("pong", ping as usize)]);
    let err = demo_import(&loader)
        .bind(&descriptor("i32 ping()"))
        .unwrap_err();

    match err {
        ImportError::Bind(BindError::MissingEntryPoint { operation, .. }) => {
            assert_eq!(operation, "ping")
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(loader.open_count(), 0);
}

#[test]
fn test_scenario_c_nothing_loads() {
    for (version, segments) in [("1.2.3", 3), ("4", 1), ("", 0)] {
        let loader = Arc::new(StubLoader::new(NameStyle::Posix));
        let err = NativeImport::new("demo", version)
            .with_loader(Arc::clone(&loader) as Arc<dyn DynamicLoader>)
            .with_platform(PlatformInfo::new(OsFamily::Linux, "arm64"))
            .with_base_dir("/srv")
            .bind(&descriptor("i32 ping()"))
            .unwrap_err();

        let ImportError::LibraryNotFound(err) = err else {
            panic!("expected LibraryNotFound for version {:?}", version);
        };
        let expected = (segments + 1) * 4 + (segments + 1);
        assert_eq!(err.searched.len(), expected);
        assert_eq!(loader.load_calls(), expected);
    }
}

// ============================================================================
// Binding atomicity
// ============================================================================

#[test]
fn test_kth_missing_symbol_leaves_nothing_behind() {
    let loader = stub(ARCH_DIR_LIB, [("add", add as usize), ("sub", sub as usize)]);
    let err = demo_import(&loader)
        .bind(&descriptor(
            "i64 add(i64, i64)\ni64 sub(i64, i64)\ni64 mul(i64, i64)\ni64 div(i64, i64)",
        ))
        .unwrap_err();

    assert!(matches!(
        err,
        ImportError::Bind(BindError::MissingEntryPoint { ref operation, .. }) if operation == "mul"
    ));
    // resolution stops at the first missing entry point
    assert_eq!(loader.resolved(), vec!["add", "sub", "mul"]);
    assert_eq!(loader.unload_calls(), 1);
    assert_eq!(loader.open_count(), 0);
}

#[test]
fn test_identical_signatures_share_a_shape() {
    let loader = stub(
        ARCH_DIR_LIB,
        [("add", add as usize), ("sub", sub as usize), ("ping", ping as usize)],
    );
    let adapter = demo_import(&loader)
        .bind(&descriptor("i64 add(i64, i64)\ni64 sub(i64, i64)\ni32 ping()"))
        .unwrap();

    assert_eq!(adapter.shape_count(), 2);
    assert_eq!(adapter.get("add").unwrap().shape(), adapter.get("sub").unwrap().shape());
    assert_ne!(
        adapter.get("add").unwrap().address(),
        adapter.get("sub").unwrap().address()
    );
    let args = [NativeValue::Int(10), NativeValue::Int(3)];
    assert_eq!(adapter.call("add", &args).unwrap(), NativeValue::Int(13));
    assert_eq!(adapter.call("sub", &args).unwrap(), NativeValue::Int(7));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_explicit_release_then_drop_unloads_once() {
    let loader = stub(ARCH_DIR_LIB, [("ping", ping as usize)]);
    let adapter = demo_import(&loader)
        .bind(&descriptor("i32 ping()"))
        .unwrap();

    assert!(adapter.release());
    assert_eq!(adapter.state(), LibraryState::Released);
    assert!(matches!(adapter.call("ping", &[]), Err(BindError::Released(_))));
    drop(adapter);

    assert_eq!(loader.unload_calls(), 1);
    assert_eq!(loader.invalid_unloads(), 0);
}

#[test]
fn test_located_library_resolves_only_while_live() {
    let loader = stub(ARCH_DIR_LIB, [("ping", ping as usize)]);
    let library = demo_import(&loader).locate().unwrap();

    assert_eq!(library.resolve("ping").unwrap().as_ptr() as usize, ping as usize);
    assert!(library.release());
    assert!(library.resolve("ping").is_err());
    assert!(!library.release());
    drop(library);

    assert_eq!(loader.resolved(), vec!["ping"]);
    assert_eq!(loader.unload_calls(), 1);
    assert_eq!(loader.invalid_unloads(), 0);
}

#[test]
fn test_suppressed_release_never_unloads() {
    let loader = stub(ARCH_DIR_LIB, [("ping", ping as usize)]);
    let adapter = demo_import(&loader)
        .suppress_unload(true)
        .bind(&descriptor("i32 ping()"))
        .unwrap();
    assert_eq!(adapter.policy(), UnloadPolicy::Retain);

    assert!(adapter.release());
    assert!(!adapter.release());
    assert!(matches!(adapter.call("ping", &[]), Err(BindError::Released(_))));
    drop(adapter);

    assert_eq!(loader.unload_calls(), 0);
    assert_eq!(loader.open_count(), 1);
}

#[test]
fn test_release_races_with_calls() {
    let loader = stub(ARCH_DIR_LIB, [("add", add as usize)]);
    let adapter = Arc::new(
        demo_import(&loader)
            .bind(&descriptor("i64 add(i64, i64)"))
            .unwrap(),
    );

    let callers: Vec<_> = (0..4)
        .map(|t| {
            let adapter = Arc::clone(&adapter);
            thread::spawn(move || {
                let mut released_seen = false;
                for i in 0..500i64 {
                    match adapter.call("add", &[NativeValue::Int(t), NativeValue::Int(i)]) {
                        Ok(value) => {
                            // no successful call once release has been observed
                            assert!(!released_seen);
                            assert_eq!(value, NativeValue::Int(t + i));
                        }
                        Err(BindError::Released(_)) => released_seen = true,
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
            })
        })
        .collect();

    let releasers: Vec<_> = (0..4)
        .map(|_| {
            let adapter = Arc::clone(&adapter);
            thread::spawn(move || adapter.release())
        })
        .collect();

    for handle in callers {
        handle.join().unwrap();
    }
    let winners = releasers
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    drop(adapter);
    assert_eq!(loader.unload_calls(), 1);
}

#[test]
fn test_independent_adapters_for_same_library() {
    let loader = stub(ARCH_DIR_LIB, [("ping", ping as usize)]);
    let import = demo_import(&loader);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let import = import.clone();
            thread::spawn(move || {
                let adapter = import.bind(&descriptor("i32 ping()")).unwrap();
                adapter.call("ping", &[]).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), NativeValue::Int(42));
    }

    // each bind loaded and released its own copy
    assert_eq!(loader.unload_calls(), 4);
    assert_eq!(loader.open_count(), 0);
}

// ============================================================================
// Typed interfaces
// ============================================================================

autonative::native_interface! {
    struct Demo {
        fn ping() -> i32;
        fn add(a: i64, b: i64) -> i64;
        fn pulse();
    }
}

#[test]
fn test_typed_interface() {
    let loader = stub(
        ARCH_DIR_LIB,
        [
            ("ping", ping as usize),
            ("add", add as usize),
            ("pulse", pulse as usize),
        ],
    );
    let demo: Demo = demo_import(&loader).bind_interface().unwrap();

    assert_eq!(demo.ping().unwrap(), 42);
    assert_eq!(demo.add(-2, 5).unwrap(), 3);
    let before = PULSES.load(Ordering::SeqCst);
    demo.pulse().unwrap();
    assert_eq!(PULSES.load(Ordering::SeqCst), before + 1);

    assert_eq!(demo.adapter().len(), 3);
    assert!(demo.release());
    assert!(matches!(demo.ping(), Err(BindError::Released(_))));
}

#[test]
fn test_typed_interface_missing_export() {
    let loader = stub(ARCH_DIR_LIB, [("ping", ping as usize)]);
    let result = demo_import(&loader).bind_interface::<Demo>();
    assert!(matches!(
        result,
        Err(ImportError::Bind(BindError::MissingEntryPoint { .. }))
    ));
}
