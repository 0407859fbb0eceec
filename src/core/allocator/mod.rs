//! Signature allocator
//!
//! Claims the live block whose on-disk layout matches a compile-time
//! signature. Each distinct signature can be claimed once per [`Embed`]
//! context; claims are keyed by the SHA-256 digest of the signature bytes.

pub mod matcher;

use crate::block::Block;
use crate::config::StoreConfig;
use crate::error::{EmbedError, Result};
use crate::header::HEADER_SIZE;
use crate::io::BlockStore;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type ClaimKey = [u8; 32];

fn claim_key(signature: &[u8]) -> ClaimKey {
    Sha256::digest(signature).into()
}

/// Block store plus the set of signatures already claimed from it.
///
/// Construct one per file (typically the running executable) at startup and
/// pass it to whatever needs embedded storage.
pub struct Embed {
    store: BlockStore,
    claimed: Mutex<HashSet<ClaimKey>>,
}

impl Embed {
    pub fn new(store: BlockStore) -> Self {
        Embed {
            store,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Open a file with the default configuration
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BlockStore::open(path)?))
    }

    /// Open the running executable
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(BlockStore::open_current_exe()?))
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// The ordered blocks currently in the file
    pub fn blocks(&self) -> Result<Vec<Block<'_>>> {
        self.store.blocks()
    }

    /// Claim the first block matching `signature`.
    ///
    /// # Errors
    ///
    /// - `InvalidSize` if the signature is shorter than a header
    /// - `AlreadyAllocated` if this signature was claimed before
    /// - `NotFound` if no block matches
    pub fn allocate(&self, signature: impl AsRef<[u8]>) -> Result<Block<'_>> {
        let signature = signature.as_ref();
        if signature.len() < HEADER_SIZE {
            return Err(EmbedError::InvalidSize {
                len: signature.len(),
                min: HEADER_SIZE,
            });
        }

        let key = claim_key(signature);
        let mut claimed = self.claimed.lock();
        if claimed.contains(&key) {
            return Err(EmbedError::AlreadyAllocated);
        }

        for block in self.store.blocks()? {
            if matcher::matches(&block, signature)? {
                claimed.insert(key);
                info!(
                    position = block.header().position(),
                    cap = block.cap(),
                    "Allocated embedded block"
                );
                return Ok(block);
            }
        }

        debug!(len = signature.len(), "No block matches signature");
        Err(EmbedError::NotFound(format!(
            "no block matches {}-byte signature",
            signature.len()
        )))
    }

    /// Claim a block or panic.
    ///
    /// A missing embedded block is a build or deployment defect, so startup
    /// code that cannot run without it should fail loudly.
    pub fn must_allocate(&self, signature: impl AsRef<[u8]>) -> Block<'_> {
        match self.allocate(signature) {
            Ok(block) => block,
            Err(e) => panic!("embedded block allocation failed: {}", e),
        }
    }

    /// Whether `signature` has been claimed through this context
    pub fn is_allocated(&self, signature: impl AsRef<[u8]>) -> bool {
        self.claimed.lock().contains(&claim_key(signature.as_ref()))
    }

    /// Number of claimed signatures
    pub fn allocated(&self) -> usize {
        self.claimed.lock().len()
    }

    /// Release the underlying file handle
    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

/// Builder for [`Embed`]
///
/// ```rust,no_run
/// use embedblock::{EmbedBuilder, LinkMode, StoreConfig};
///
/// # fn main() -> embedblock::Result<()> {
/// let embed = EmbedBuilder::new()
///     .path("state.bin")
///     .config(StoreConfig::default().with_link_mode(LinkMode::Never))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct EmbedBuilder {
    path: Option<PathBuf>,
    config: StoreConfig,
}

impl EmbedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// File to open (defaults to the running executable)
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Target the running executable
    pub fn current_exe(mut self) -> Self {
        self.path = None;
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a TOML file
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.config = StoreConfig::from_file(path)?;
        Ok(self)
    }

    pub fn build(self) -> Result<Embed> {
        let store = match self.path {
            Some(path) => BlockStore::open_with(path, self.config)?,
            None => BlockStore::open_current_exe_with(self.config)?,
        };
        Ok(Embed::new(store))
    }
}
