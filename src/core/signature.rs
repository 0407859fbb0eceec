//! Compile-time block signatures
//!
//! A signature is the exact byte image of an empty block as it is embedded in
//! a program: a sealed header with only `data_cap` set, `data_cap` zero bytes,
//! and an optional trailing suffix that tells equal-capacity blocks apart.
//!
//! The `const fn` builders let a program bake a block into its own binary:
//!
//! ```
//! use embedblock::{signature, signature_len};
//!
//! #[used]
//! static SETTINGS: [u8; signature_len(1024, 1)] = signature(1024, b"1");
//!
//! assert_eq!(SETTINGS.len(), 52 + 1024 + 1);
//! ```
//!
//! At runtime the same bytes serve as the key passed to
//! [`Embed::allocate`](crate::Embed::allocate).

use crate::header::{HEADER_SIZE, MAGIC};
use std::fmt::Write as _;

pub const SIZE_1KB: u32 = 1024;
pub const SIZE_2KB: u32 = 2 * SIZE_1KB;
pub const SIZE_4KB: u32 = 4 * SIZE_1KB;
pub const SIZE_8KB: u32 = 8 * SIZE_1KB;
pub const SIZE_16KB: u32 = 16 * SIZE_1KB;
pub const SIZE_32KB: u32 = 32 * SIZE_1KB;
pub const SIZE_64KB: u32 = 64 * SIZE_1KB;
pub const SIZE_128KB: u32 = 128 * SIZE_1KB;
pub const SIZE_512KB: u32 = 512 * SIZE_1KB;
pub const SIZE_1MB: u32 = 1024 * SIZE_1KB;
pub const SIZE_2MB: u32 = 2 * SIZE_1MB;
pub const SIZE_4MB: u32 = 4 * SIZE_1MB;
pub const SIZE_8MB: u32 = 8 * SIZE_1MB;
pub const SIZE_16MB: u32 = 16 * SIZE_1MB;
pub const SIZE_32MB: u32 = 32 * SIZE_1MB;

// CRC-32/IEEE, reflected polynomial. Runtime code uses crc32fast; this table
// exists only so headers can be sealed in const context.
const CRC_POLY: u32 = 0xEDB8_8320;
const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut k = 0;
        while k < 8 {
            crc = if crc & 1 != 0 {
                CRC_POLY ^ (crc >> 1)
            } else {
                crc >> 1
            };
            k += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-32/IEEE usable in const context
pub const fn const_crc32(bytes: &[u8]) -> u32 {
    let mut crc = !0u32;
    let mut i = 0;
    while i < bytes.len() {
        crc = CRC_TABLE[((crc ^ bytes[i] as u32) & 0xFF) as usize] ^ (crc >> 8);
        i += 1;
    }
    !crc
}

/// Sealed, empty header bytes for a block of `capacity` bytes
pub const fn header_template(capacity: u32) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];

    let mut i = 0;
    while i < MAGIC.len() {
        header[i] = MAGIC[i];
        i += 1;
    }

    let cap = capacity.to_be_bytes();
    let mut i = 0;
    while i < 4 {
        header[16 + i] = cap[i];
        i += 1;
    }

    let crc = const_crc32(&header).to_be_bytes();
    let mut i = 0;
    while i < 4 {
        header[8 + i] = crc[i];
        i += 1;
    }

    header
}

/// Length of the signature for `capacity` with a `suffix_len`-byte suffix
pub const fn signature_len(capacity: u32, suffix_len: usize) -> usize {
    HEADER_SIZE + capacity as usize + suffix_len
}

/// Build a signature in const context.
///
/// `N` must equal [`signature_len`]`(capacity, suffix.len())`; anything else
/// fails const evaluation.
pub const fn signature<const N: usize>(capacity: u32, suffix: &[u8]) -> [u8; N] {
    assert!(
        N == signature_len(capacity, suffix.len()),
        "signature length must be header + capacity + suffix"
    );

    let mut out = [0u8; N];
    let header = header_template(capacity);

    let mut i = 0;
    while i < HEADER_SIZE {
        out[i] = header[i];
        i += 1;
    }

    let start = HEADER_SIZE + capacity as usize;
    let mut i = 0;
    while i < suffix.len() {
        out[start + i] = suffix[i];
        i += 1;
    }

    out
}

/// Runtime signature builder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    /// Signature of an empty block with no suffix
    pub fn for_capacity(capacity: u32) -> Self {
        let mut bytes = Vec::with_capacity(signature_len(capacity, 0));
        bytes.extend_from_slice(&header_template(capacity));
        bytes.resize(signature_len(capacity, 0), 0);
        Signature { bytes }
    }

    /// Append disambiguating bytes after the capacity region
    pub fn with_suffix(mut self, suffix: &[u8]) -> Self {
        self.bytes.extend_from_slice(suffix);
        self
    }

    /// Wrap raw signature bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Signature {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Render bytes as `\xNN` escapes, suitable for a byte string literal
pub fn escape_hex(bytes: &[u8]) -> String {
    let mut escaped = String::with_capacity(bytes.len() * 4);
    for b in bytes {
        let _ = write!(escaped, "\\x{:02x}", b);
    }
    escaped
}

/// Rust source declaring a static signature for `capacity` and `suffix`
pub fn static_declaration(name: &str, capacity: u32, suffix: &[u8]) -> String {
    format!(
        "#[used]\nstatic {name}: [u8; embedblock::signature_len({capacity}, {len})] =\n    embedblock::signature({capacity}, b\"{suffix}\");",
        name = name,
        capacity = capacity,
        len = suffix.len(),
        suffix = escape_hex(suffix),
    )
}
