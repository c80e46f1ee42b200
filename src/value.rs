//! Registry value decoding.
//!
//! Turns the raw bytes and type tag returned by a registry value query
//! into a [`RegistryValue`]. The query itself is Windows-only; decoding
//! is not, so it is tested on every host.

use crate::Error;
use crate::util::split_multi_sz;
use bytes::Bytes;

/// Registry value type tags.
pub mod kind {
    /// No defined type.
    pub const REG_NONE: u32 = 0;
    /// Null-terminated string.
    pub const REG_SZ: u32 = 1;
    /// String with unexpanded `%VAR%` references.
    pub const REG_EXPAND_SZ: u32 = 2;
    /// Arbitrary binary data.
    pub const REG_BINARY: u32 = 3;
    /// 32-bit number, little-endian.
    pub const REG_DWORD: u32 = 4;
    /// 32-bit number, big-endian.
    pub const REG_DWORD_BIG_ENDIAN: u32 = 5;
    /// Symbolic link to another key.
    pub const REG_LINK: u32 = 6;
    /// Double-null-terminated list of strings.
    pub const REG_MULTI_SZ: u32 = 7;
    /// 64-bit number, little-endian.
    pub const REG_QWORD: u32 = 11;
}

/// A decoded registry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryValue {
    /// `REG_NONE`.
    None,
    /// `REG_SZ`, with trailing nulls removed.
    String(String),
    /// `REG_EXPAND_SZ`, unexpanded.
    ExpandString(String),
    /// `REG_MULTI_SZ`.
    MultiString(Vec<String>),
    /// `REG_BINARY`.
    Binary(Bytes),
    /// `REG_DWORD` or `REG_DWORD_BIG_ENDIAN`.
    DWord(u32),
    /// `REG_QWORD`.
    QWord(u64),
}

impl RegistryValue {
    /// Decode `data` according to the type tag `value_type`.
    ///
    /// Types outside the variants above fail with `Unsupported`. Numbers
    /// whose data is too short fail with `InvalidArgument`.
    pub fn decode(value_type: u32, data: &[u8]) -> Result<Self, Error> {
        match value_type {
            kind::REG_NONE => Ok(RegistryValue::None),
            kind::REG_SZ => Ok(RegistryValue::String(decode_string(data))),
            kind::REG_EXPAND_SZ => Ok(RegistryValue::ExpandString(decode_string(data))),
            kind::REG_MULTI_SZ => Ok(RegistryValue::MultiString(split_multi_sz(&to_wide(data)))),
            kind::REG_BINARY => Ok(RegistryValue::Binary(Bytes::copy_from_slice(data))),
            kind::REG_DWORD => Ok(RegistryValue::DWord(u32::from_le_bytes(fixed(data, "REG_DWORD")?))),
            kind::REG_DWORD_BIG_ENDIAN => Ok(RegistryValue::DWord(u32::from_be_bytes(fixed(
                data,
                "REG_DWORD_BIG_ENDIAN",
            )?))),
            kind::REG_QWORD => Ok(RegistryValue::QWord(u64::from_le_bytes(fixed(data, "REG_QWORD")?))),
            other => Err(Error::unsupported(format!("registry value type {other}"))),
        }
    }

    /// The string payload of `String` and `ExpandString` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RegistryValue::String(s) | RegistryValue::ExpandString(s) => Some(s),
            _ => None,
        }
    }
}

/// Reassemble little-endian UTF-16 code units. A trailing odd byte is
/// dropped.
fn to_wide(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Decode a string value, stopping at the first null. Stored strings may
/// or may not include their terminator.
fn decode_string(data: &[u8]) -> String {
    let wide = to_wide(data);
    let end = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..end])
}

/// The leading `N` bytes of a fixed-size value.
fn fixed<const N: usize>(data: &[u8], type_name: &str) -> Result<[u8; N], Error> {
    data.get(..N)
        .and_then(|head| head.try_into().ok())
        .ok_or_else(|| {
            Error::invalid_argument(format!("{type_name} value holds {} of {N} bytes", data.len()))
        })
}
