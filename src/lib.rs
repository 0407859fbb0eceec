//! # embedblock - Checksummed Storage Blocks Embedded in Files
//!
//! `embedblock` lets a program carry small, mutable storage regions inside a
//! file, typically its own executable. Each block is a 52-byte header
//! followed by a fixed-capacity data area. Blocks are found by scanning for a
//! magic tag, validated by CRC32 checksums over both header and data, and
//! claimed at runtime by their compile-time byte image.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use embedblock::{signature, signature_len, Embed, Result};
//!
//! #[used]
//! static SETTINGS: [u8; signature_len(1024, 1)] = signature(1024, b"1");
//!
//! # fn main() -> Result<()> {
//! // A copy of the executable is writable; the running binary is not.
//! let embed = Embed::open("my-program.copy")?;
//!
//! let mut block = embed.allocate(&SETTINGS)?;
//! block.write(b"hello")?;
//! assert_eq!(block.read_all()?, b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! ## Inspecting a File
//!
//! ```rust,no_run
//! use embedblock::{BlockStore, LinkMode, Result, StoreConfig};
//!
//! # fn main() -> Result<()> {
//! let config = StoreConfig::default().with_link_mode(LinkMode::Never);
//! let store = BlockStore::open_with("some.bin", config)?;
//!
//! for block in store.blocks()? {
//!     println!("{}", block);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;

// Re-export core modules internally so crate:: paths in core resolve
#[allow(unused_imports)]
pub(crate) use crate::core::{
    allocator, block, buffer_pool, config, header, io, scanner, signature, validation,
};

pub use crate::core::{
    allocator::{Embed, EmbedBuilder},
    block::Block,
    buffer_pool::{BufferPool, BufferPoolStats},
    config::{LinkMode, StoreConfig},
    header::{Header, HEADER_SIZE, MAGIC},
    io::BlockStore,
    signature::{
        escape_hex, signature, signature_len, static_declaration, Signature, SIZE_128KB,
        SIZE_16KB, SIZE_16MB, SIZE_1KB, SIZE_1MB, SIZE_2KB, SIZE_2MB, SIZE_32KB, SIZE_32MB,
        SIZE_4KB, SIZE_4MB, SIZE_512KB, SIZE_64KB, SIZE_8KB, SIZE_8MB,
    },
};
pub use crate::error::{CorruptKind, EmbedError, Result};
