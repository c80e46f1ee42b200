//! Acquisition of Windows resources.
//!
//! [`ResourceFactory`] opens files, registry keys, NT directory and
//! symbolic-link objects, access tokens and certificate stores, and
//! allocates heap and global memory. Every acquisition:
//!
//! 1. calls the native open or allocate function directly,
//! 2. checks the returned value against the family's sentinel,
//! 3. wraps it in an owning [`OwnedResource`],
//!
//! and annotates any failure with the path or name it was given.
//!
//! The follow-up queries that return variable-length data (a file's final
//! path, a registry value, a directory listing, an object's name or type) run
//! through the factory's [`Invoker`] so they share its pool and limits.

use crate::abi;
use crate::family::{
    CERT_STORE, FILE, GLOBAL_MEMORY, HEAP_MEMORY, KERNEL_OBJECT, NT_OBJECT, REGISTRY_KEY,
};
use crate::handle::{Family, OwnedResource, RawHandle};
use crate::invoke::Invoker;
use crate::status::{NativeErrorCode, win32};
use crate::value::RegistryValue;
use crate::Error;
use std::cell::Cell;
use std::path::Path;

/// Starting size for path queries, in characters (`MAX_PATH`).
const PATH_CHARS: usize = 260;
/// Starting size for registry value data, in bytes.
const VALUE_BYTES: usize = 256;
/// Starting size for registry key names, in bytes (the 255-character
/// limit plus terminator).
const KEY_NAME_BYTES: usize = 512;
/// Starting size for one batch of NT directory entries, in bytes.
const DIRECTORY_BYTES: usize = 4096;
/// Starting size for a symbolic link target, in bytes.
const LINK_TARGET_BYTES: usize = 512;
/// Starting size for `OBJECT_NAME_INFORMATION`, in bytes.
const OBJECT_NAME_BYTES: usize = 16 + PATH_CHARS * 2;
/// Starting size for `PUBLIC_OBJECT_TYPE_INFORMATION`, in bytes.
const OBJECT_TYPE_BYTES: usize = 16;
/// Starting size for `TOKEN_USER`, in bytes. Too small for most SIDs, so
/// the first call usually reports the exact size.
const TOKEN_USER_BYTES: usize = 32;

/// Access masks, share modes and dispositions accepted by the factory.
pub mod access {
    /// Read access to files and objects.
    pub const GENERIC_READ: u32 = 0x8000_0000;
    /// Write access to files and objects.
    pub const GENERIC_WRITE: u32 = 0x4000_0000;
    /// Read a file's attributes only. Enough for `final_path`.
    pub const FILE_READ_ATTRIBUTES: u32 = 0x0080;
    /// Let other openers read.
    pub const FILE_SHARE_READ: u32 = 0x0001;
    /// Let other openers write.
    pub const FILE_SHARE_WRITE: u32 = 0x0002;
    /// Let other openers delete or rename.
    pub const FILE_SHARE_DELETE: u32 = 0x0004;
    /// Create a new file; fail if it exists.
    pub const CREATE_NEW: u32 = 1;
    /// Create a new file, truncating any existing one.
    pub const CREATE_ALWAYS: u32 = 2;
    /// Open an existing file; fail if it is missing.
    pub const OPEN_EXISTING: u32 = 3;
    /// Open a file, creating it if it is missing.
    pub const OPEN_ALWAYS: u32 = 4;
    /// Query values and enumerate subkeys of a registry key.
    pub const KEY_READ: u32 = 0x0002_0019;
    /// List an NT directory object.
    pub const DIRECTORY_QUERY: u32 = 0x0001;
    /// Read an NT symbolic link's target.
    pub const SYMBOLIC_LINK_QUERY: u32 = 0x0001;
    /// Query an access token.
    pub const TOKEN_QUERY: u32 = 0x0008;
}

/// `FILE_FLAG_BACKUP_SEMANTICS`, so directories can be opened as files.
const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;

/// The predefined registry roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryRoot {
    /// `HKEY_CLASSES_ROOT`.
    ClassesRoot,
    /// `HKEY_CURRENT_USER`.
    CurrentUser,
    /// `HKEY_LOCAL_MACHINE`.
    LocalMachine,
    /// `HKEY_USERS`.
    Users,
    /// `HKEY_CURRENT_CONFIG`.
    CurrentConfig,
}

impl RegistryRoot {
    /// A non-owning view of the root key. Predefined keys are never closed.
    pub fn key(self) -> OwnedResource {
        let value: u32 = match self {
            RegistryRoot::ClassesRoot => 0x8000_0000,
            RegistryRoot::CurrentUser => 0x8000_0001,
            RegistryRoot::LocalMachine => 0x8000_0002,
            RegistryRoot::Users => 0x8000_0003,
            RegistryRoot::CurrentConfig => 0x8000_0005,
        };
        // Predefined handles are sign-extended 32-bit values.
        OwnedResource::wrap(value as i32 as RawHandle, &REGISTRY_KEY, false)
    }
}

/// One entry of an NT object directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Object name, relative to the directory.
    pub name: String,
    /// Object type, such as `Directory`, `SymbolicLink` or `Device`.
    pub type_name: String,
}

/// Opens Windows resources and queries their variable-length metadata.
#[derive(Debug, Clone, Copy)]
pub struct ResourceFactory<'p> {
    invoker: Invoker<'p>,
}

impl ResourceFactory<'static> {
    /// A factory over [`Invoker::shared()`].
    pub fn shared() -> Self {
        Self::new(Invoker::shared())
    }
}

impl<'p> ResourceFactory<'p> {
    /// A factory running its queries through `invoker`.
    pub fn new(invoker: Invoker<'p>) -> Self {
        Self { invoker }
    }

    /// The invoker used for metadata queries.
    pub fn invoker(&self) -> &Invoker<'p> {
        &self.invoker
    }

    // -- Files --

    /// Open a file or directory with `CreateFileW`.
    ///
    /// `access`, `share` and `disposition` take the constants in
    /// [`access`]. Directories open too.
    pub fn open_file(
        &self,
        path: impl AsRef<Path>,
        access: u32,
        share: u32,
        disposition: u32,
    ) -> Result<OwnedResource, Error> {
        let path = path.as_ref();
        let wide = abi::os_to_wide(path.as_os_str());
        let raw = abi::create_file(&wide, access, share, disposition, FILE_FLAG_BACKUP_SEMANTICS);
        adopt(raw, &FILE, &path.display().to_string())
    }

    /// The normalized path of an open file (`GetFinalPathNameByHandleW`),
    /// in `\\?\` form.
    pub fn final_path(&self, file: &OwnedResource) -> Result<String, Error> {
        let raw = file.borrow()?;
        self.invoker
            .invoke_counted(PATH_CHARS, |buffer| abi::get_final_path_name(raw, buffer, 0))
    }

    // -- Registry --

    /// Open `subkey` below `parent`, which may be a
    /// [`RegistryRoot::key`] view.
    pub fn open_registry_key(
        &self,
        parent: &OwnedResource,
        subkey: &str,
        access: u32,
    ) -> Result<OwnedResource, Error> {
        let parent = parent.borrow()?;
        let wide = abi::to_wide(subkey);
        let raw = abi::reg_open_key(parent, &wide, access).map_err(|e| e.with_context(subkey))?;
        adopt_checked(raw, &REGISTRY_KEY, subkey)
    }

    /// Read the value `name` of `key`. An empty name reads the default
    /// value. A missing value yields `Ok(None)`.
    pub fn query_value(
        &self,
        key: &OwnedResource,
        name: &str,
    ) -> Result<Option<RegistryValue>, Error> {
        let raw = key.borrow()?;
        let wide = abi::to_wide(name);
        let value_type = Cell::new(0_u32);
        let result = self.invoker.invoke_with_growth(
            VALUE_BYTES,
            |buffer| {
                let (call, kind) = abi::reg_query_value(raw, &wide, buffer);
                value_type.set(kind);
                call
            },
            |buffer, _| RegistryValue::decode(value_type.get(), buffer.as_bytes()),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == Some(NativeErrorCode::Win32(win32::ERROR_FILE_NOT_FOUND)) => {
                Ok(None)
            }
            Err(e) => Err(e.with_context(name)),
        }
    }

    /// Names of the immediate subkeys of `key`, in enumeration order.
    pub fn subkey_names(&self, key: &OwnedResource) -> Result<Vec<String>, Error> {
        let raw = key.borrow()?;
        let mut names = Vec::new();
        for index in 0..=u32::MAX {
            let name = self.invoker.invoke_with_growth(
                KEY_NAME_BYTES,
                |buffer| abi::reg_enum_key(raw, index, buffer),
                |buffer, _| Ok(buffer.to_string_lossy()),
            );
            match name {
                Ok(name) => names.push(name),
                Err(e) if e.code() == Some(NativeErrorCode::Win32(win32::ERROR_NO_MORE_ITEMS)) => {
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(names)
    }

    // -- NT object manager --

    /// Open an NT object directory such as `\` or `\BaseNamedObjects`.
    pub fn open_directory_object(&self, path: &str, access: u32) -> Result<OwnedResource, Error> {
        let wide: Vec<u16> = path.encode_utf16().collect();
        let raw =
            abi::nt_open_directory_object(&wide, access).map_err(|e| e.with_context(path))?;
        adopt_checked(raw, &NT_OBJECT, path)
    }

    /// All entries of an NT object directory.
    pub fn directory_entries(&self, directory: &OwnedResource) -> Result<Vec<DirectoryEntry>, Error> {
        let raw = directory.borrow()?;
        let mut context = 0_u32;
        self.invoker.enumerate_with_growth(
            DIRECTORY_BYTES,
            |buffer| abi::nt_query_directory_object(raw, buffer, &mut context),
            |buffer, _| {
                Ok(abi::decode_directory_entries(buffer)
                    .into_iter()
                    .map(|(name, type_name)| DirectoryEntry { name, type_name }))
            },
        )
    }

    /// Open an NT symbolic link object such as `\DosDevices\C:`.
    pub fn open_symbolic_link_object(
        &self,
        path: &str,
        access: u32,
    ) -> Result<OwnedResource, Error> {
        let wide: Vec<u16> = path.encode_utf16().collect();
        let raw =
            abi::nt_open_symbolic_link_object(&wide, access).map_err(|e| e.with_context(path))?;
        adopt_checked(raw, &NT_OBJECT, path)
    }

    /// The target path of an NT symbolic link.
    pub fn symbolic_link_target(&self, link: &OwnedResource) -> Result<String, Error> {
        let raw = link.borrow()?;
        self.invoker.invoke_with_growth(
            LINK_TARGET_BYTES,
            |buffer| abi::nt_query_symbolic_link_object(raw, buffer),
            |buffer, _| Ok(buffer.to_string_lossy()),
        )
    }

    /// The object manager name of any open resource (`NtQueryObject`).
    ///
    /// Files report their device path, such as
    /// `\Device\HarddiskVolume3\Windows`. Unnamed objects report an empty
    /// string.
    pub fn object_name(&self, resource: &OwnedResource) -> Result<String, Error> {
        let raw = resource.borrow()?;
        self.invoker.invoke_with_growth(
            OBJECT_NAME_BYTES,
            |buffer| abi::nt_query_object_name(raw, buffer),
            |buffer, _| Ok(abi::decode_object_string(buffer)),
        )
    }

    /// The object type name of any open resource, such as `File`, `Key`,
    /// `Directory` or `Token`.
    ///
    /// The first attempt is sized for the header alone, so the call
    /// usually reports the exact size it needs.
    pub fn object_type(&self, resource: &OwnedResource) -> Result<String, Error> {
        let raw = resource.borrow()?;
        self.invoker.invoke_with_growth(
            OBJECT_TYPE_BYTES,
            |buffer| abi::nt_query_object_type(raw, buffer),
            |buffer, _| Ok(abi::decode_object_string(buffer)),
        )
    }

    // -- Tokens --

    /// Open the current process's access token.
    pub fn open_process_token(&self, access: u32) -> Result<OwnedResource, Error> {
        let raw = abi::open_process_token(abi::current_process(), access)
            .map_err(|e| e.with_context("current process"))?;
        adopt_checked(raw, &KERNEL_OBJECT, "current process")
    }

    /// The user SID of a token, as an `S-1-...` string.
    pub fn token_user_sid(&self, token: &OwnedResource) -> Result<String, Error> {
        let raw = token.borrow()?;
        self.invoker.invoke_with_growth(
            TOKEN_USER_BYTES,
            |buffer| abi::get_token_user(raw, buffer),
            |buffer, _| abi::token_user_sid_string(buffer),
        )
    }

    // -- Certificate stores --

    /// Open a system certificate store such as `MY` or `ROOT`.
    pub fn open_system_store(&self, name: &str) -> Result<OwnedResource, Error> {
        let wide = abi::to_wide(name);
        let raw = abi::cert_open_system_store(&wide);
        adopt(raw, &CERT_STORE, name)
    }

    // -- Memory --

    /// Allocate `bytes` zeroed bytes from the process heap.
    pub fn allocate_heap(&self, bytes: usize) -> Result<OwnedResource, Error> {
        let raw = abi::heap_alloc(bytes);
        allocated(raw, &HEAP_MEMORY, bytes)
    }

    /// Allocate `bytes` zeroed bytes with `GlobalAlloc`.
    pub fn allocate_global(&self, bytes: usize) -> Result<OwnedResource, Error> {
        let raw = abi::global_alloc(bytes);
        allocated(raw, &GLOBAL_MEMORY, bytes)
    }
}

/// Wrap the result of a call that reports failure by returning the
/// sentinel. Must run before anything else can change the last error.
fn adopt(raw: RawHandle, family: &'static Family, context: &str) -> Result<OwnedResource, Error> {
    if family.is_sentinel(raw) {
        return Err(abi::last_win32_error().with_context(context));
    }
    Ok(OwnedResource::wrap(raw, family, true))
}

/// Wrap the result of a call that already reported success.
fn adopt_checked(
    raw: RawHandle,
    family: &'static Family,
    context: &str,
) -> Result<OwnedResource, Error> {
    if family.is_sentinel(raw) {
        return Err(Error::invalid_handle(format!(
            "open succeeded but returned an invalid {} handle",
            family.name()
        ))
        .with_context(context));
    }
    Ok(OwnedResource::wrap(raw, family, true))
}

/// Wrap an allocation. The allocators do not set a useful last error.
fn allocated(raw: RawHandle, family: &'static Family, bytes: usize) -> Result<OwnedResource, Error> {
    if family.is_sentinel(raw) {
        return Err(Error::out_of_memory(format!(
            "{} allocation of {bytes} bytes failed",
            family.name()
        )));
    }
    Ok(OwnedResource::wrap(raw, family, true))
}
