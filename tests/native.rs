//! Integration tests against the real Windows APIs.
//!
//! These only read well-known system state (the current token, the
//! registry's `CurrentVersion` key, the NT object namespace), so they run
//! unprivileged on any Windows host.

#![cfg(windows)]
#![expect(clippy::tests_outside_test_module)]

use winhold::family::{FILE, NT_OBJECT, REGISTRY_KEY};
use winhold::{
    BufferPool, FailureKind, Invoker, RegistryRoot, RegistryValue, ResourceFactory, access,
};

const CURRENT_VERSION: &str = r"SOFTWARE\Microsoft\Windows NT\CurrentVersion";

fn system_root() -> std::path::PathBuf {
    std::env::var_os("SystemRoot")
        .map(Into::into)
        .unwrap_or_else(|| r"C:\Windows".into())
}

// -----------------------------------------------------------------------
// Tokens
// -----------------------------------------------------------------------

#[test]
fn process_token_user_sid() {
    let factory = ResourceFactory::shared();
    let token = factory.open_process_token(access::TOKEN_QUERY).unwrap();
    assert!(!token.is_invalid());

    let sid = factory.token_user_sid(&token).unwrap();
    assert!(sid.starts_with("S-1-"), "{sid}");

    token.release().unwrap();
    assert!(token.borrow().unwrap_err().is_invalid_handle());
}

// -----------------------------------------------------------------------
// Files
// -----------------------------------------------------------------------

#[test]
fn final_path_of_system_directory() {
    let factory = ResourceFactory::shared();
    let root = system_root();
    let dir = factory
        .open_file(
            &root,
            access::FILE_READ_ATTRIBUTES,
            access::FILE_SHARE_READ | access::FILE_SHARE_WRITE | access::FILE_SHARE_DELETE,
            access::OPEN_EXISTING,
        )
        .unwrap();
    assert_eq!(dir.family().name(), FILE.name());

    let path = factory.final_path(&dir).unwrap();
    assert!(path.starts_with(r"\\?\"), "{path}");
    assert!(path.to_ascii_lowercase().ends_with("windows"), "{path}");

    let object = factory.object_name(&dir).unwrap();
    assert!(object.starts_with(r"\Device\"), "{object}");
}

#[test]
fn object_type_names() {
    let pool = BufferPool::new();
    let factory = ResourceFactory::new(Invoker::new(&pool));
    let cases = [
        (
            factory
                .open_file(
                    &system_root(),
                    access::FILE_READ_ATTRIBUTES,
                    access::FILE_SHARE_READ | access::FILE_SHARE_WRITE | access::FILE_SHARE_DELETE,
                    access::OPEN_EXISTING,
                )
                .unwrap(),
            "File",
        ),
        (
            factory
                .open_registry_key(
                    &RegistryRoot::LocalMachine.key(),
                    CURRENT_VERSION,
                    access::KEY_READ,
                )
                .unwrap(),
            "Key",
        ),
        (factory.open_directory_object(r"\", access::DIRECTORY_QUERY).unwrap(), "Directory"),
        (factory.open_process_token(access::TOKEN_QUERY).unwrap(), "Token"),
    ];

    for (resource, expected) in &cases {
        let type_name = factory.object_type(resource).unwrap_or_else(|e| panic!("{expected}: {e}"));
        assert_eq!(type_name, *expected, "{expected}");
    }
    assert!(pool.len() <= 1, "one buffer serves every query");

    let (token, _) = &cases[3];
    token.release().unwrap();
    assert!(factory.object_type(token).unwrap_err().is_invalid_handle());
}

#[test]
fn missing_file_is_not_found_with_path_context() {
    let factory = ResourceFactory::shared();
    let missing = system_root().join("winhold-does-not-exist.bin");

    let err = factory
        .open_file(&missing, access::GENERIC_READ, access::FILE_SHARE_READ, access::OPEN_EXISTING)
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::NotFound, "{err:?}");
    assert!(err.context().unwrap().ends_with("winhold-does-not-exist.bin"));
    assert!(err.code().is_some());
}

// -----------------------------------------------------------------------
// Registry
// -----------------------------------------------------------------------

#[test]
fn current_version_values() {
    let factory = ResourceFactory::shared();
    let key = factory
        .open_registry_key(&RegistryRoot::LocalMachine.key(), CURRENT_VERSION, access::KEY_READ)
        .unwrap();
    assert_eq!(key.family().name(), REGISTRY_KEY.name());

    let product = factory.query_value(&key, "ProductName").unwrap();
    match product {
        Some(RegistryValue::String(name)) => assert!(name.contains("Windows"), "{name}"),
        other => panic!("unexpected ProductName: {other:?}"),
    }

    let missing = factory.query_value(&key, "winhold-no-such-value").unwrap();
    assert_eq!(missing, None);
}

#[test]
fn subkeys_of_microsoft() {
    let factory = ResourceFactory::shared();
    let key = factory
        .open_registry_key(&RegistryRoot::LocalMachine.key(), r"SOFTWARE\Microsoft", access::KEY_READ)
        .unwrap();

    let names = factory.subkey_names(&key).unwrap();
    assert!(names.iter().any(|n| n.eq_ignore_ascii_case("Windows NT")), "{names:?}");
}

#[test]
fn missing_registry_key_is_not_found() {
    let factory = ResourceFactory::shared();
    let err = factory
        .open_registry_key(
            &RegistryRoot::LocalMachine.key(),
            r"SOFTWARE\winhold-does-not-exist",
            access::KEY_READ,
        )
        .unwrap_err();

    assert!(err.is_not_found(), "{err:?}");
    assert_eq!(err.context(), Some(r"SOFTWARE\winhold-does-not-exist"));
}

// -----------------------------------------------------------------------
// NT object namespace
// -----------------------------------------------------------------------

#[test]
fn root_directory_entries() {
    let pool = BufferPool::new();
    let factory = ResourceFactory::new(Invoker::new(&pool));
    let root = factory.open_directory_object(r"\", access::DIRECTORY_QUERY).unwrap();
    assert_eq!(root.family().name(), NT_OBJECT.name());

    let entries = factory.directory_entries(&root).unwrap();
    let find = |name: &str| entries.iter().find(|e| e.name == name);
    let known = find("KnownDlls").expect("\\KnownDlls is present");
    assert_eq!(known.type_name, "Directory");
    assert!(find("GLOBAL??").is_some(), "{entries:?}");
}

#[test]
fn dos_drive_link_target() {
    let factory = ResourceFactory::shared();
    let drive = system_root()
        .to_string_lossy()
        .get(..2)
        .unwrap_or("C:")
        .to_owned();
    let link = factory
        .open_symbolic_link_object(&format!(r"\GLOBAL??\{drive}"), access::SYMBOLIC_LINK_QUERY)
        .unwrap();

    let target = factory.symbolic_link_target(&link).unwrap();
    assert!(target.starts_with(r"\Device\"), "{target}");
}

#[test]
fn missing_directory_object_is_not_found() {
    let factory = ResourceFactory::shared();
    let err = factory
        .open_directory_object(r"\winhold-does-not-exist", access::DIRECTORY_QUERY)
        .unwrap_err();

    assert!(err.is_not_found(), "{err:?}");
    assert_eq!(err.context(), Some(r"\winhold-does-not-exist"));
}

// -----------------------------------------------------------------------
// Memory and stores
// -----------------------------------------------------------------------

#[test]
fn heap_and_global_allocations() {
    let factory = ResourceFactory::shared();
    let cases = [
        (factory.allocate_heap(4096).unwrap(), "heap"),
        (factory.allocate_global(4096).unwrap(), "global"),
    ];

    for (block, label) in &cases {
        assert!(!block.is_invalid(), "{label}");
        assert!(block.owns(), "{label}");
        block.release().unwrap_or_else(|e| panic!("{label}: {e}"));
        assert!(block.is_released(), "{label}");
    }
}

#[test]
fn root_certificate_store() {
    let factory = ResourceFactory::shared();
    let store = factory.open_system_store("ROOT").unwrap();
    assert!(!store.is_invalid());
    store.release().unwrap();
}
