//! File-backed block store

use crate::block::Block;
use crate::buffer_pool::{BufferPool, DEFAULT_MAX_PER_SIZE, DEFAULT_MAX_SIZES};
use crate::config::StoreConfig;
use crate::error::{EmbedError, Result};
use crate::header::{Header, MAGIC};
use crate::scanner;
use crate::validation;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Owner of one open file and the discovery pipeline over it.
///
/// Every call to [`BlockStore::blocks`] rescans the file, so the result always
/// reflects what is on disk at call time.
pub struct BlockStore {
    file: Mutex<File>,
    path: PathBuf,
    writable: bool,
    config: StoreConfig,
    pool: BufferPool,
}

impl BlockStore {
    /// Open a file with the default configuration
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, StoreConfig::default())
    }

    /// Open a file.
    ///
    /// The running program's own executable is opened read-only; everything
    /// else is opened read-write.
    pub fn open_with<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        config.check()?;

        let path = path.as_ref();
        let writable = !is_current_exe(path);
        let file = OpenOptions::new().read(true).write(writable).open(path)?;

        info!(path = %path.display(), writable, "Opened block store");

        // Scratch buffers larger than one scan chunk are not worth keeping.
        let pool = BufferPool::with_limits(
            DEFAULT_MAX_PER_SIZE,
            config.scan_chunk_size,
            DEFAULT_MAX_SIZES,
        );

        Ok(BlockStore {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            writable,
            config,
            pool,
        })
    }

    /// Open the running executable (read-only)
    pub fn open_current_exe() -> Result<Self> {
        Self::open_current_exe_with(StoreConfig::default())
    }

    pub fn open_current_exe_with(config: StoreConfig) -> Result<Self> {
        let exe = std::env::current_exe()?;
        Self::open_with(exe, config)
    }

    /// Scan, validate and (per [`LinkMode`](crate::LinkMode)) link the headers
    /// currently in the file, ordered by offset.
    pub fn headers(&self) -> Result<Vec<Header>> {
        let mut file = self.file.lock();

        let offsets = scanner::scan(&mut *file, &MAGIC, &self.config, &self.pool)?;
        let mut headers = validation::check_headers(&mut *file, &offsets, &self.pool)?;
        headers.sort_by_key(|h| h.offset);

        debug!(
            candidates = offsets.len(),
            valid = headers.len(),
            "Scanned block headers"
        );

        if !self.config.link_mode.applies(self.writable) {
            return Ok(headers);
        }

        let mut updated = validation::linked(&headers, chrono::Utc::now().timestamp());
        let written = validation::write_headers(&mut *file, &headers, &mut updated)
            .and_then(|written| {
                if written > 0 {
                    file.sync_all()?;
                }
                Ok(written)
            });

        match written {
            Ok(0) => Ok(headers),
            Ok(written) => {
                debug!(written, "Linked block headers");
                Ok(updated)
            }
            Err(e) => {
                // Chain and creation stamps are advisory; fall back to the
                // headers exactly as validated.
                warn!(error = %e, "Skipping header write-back");
                Ok(headers)
            }
        }
    }

    /// The ordered blocks currently in the file
    pub fn blocks(&self) -> Result<Vec<Block<'_>>> {
        Ok(self
            .headers()?
            .into_iter()
            .map(|header| Block::new(&self.file, header))
            .collect())
    }

    /// Block at position `index` in discovery order
    pub fn block(&self, index: usize) -> Result<Block<'_>> {
        let mut blocks = self.blocks()?;
        if index >= blocks.len() {
            return Err(EmbedError::NotFound(format!(
                "block {} (store has {})",
                index,
                blocks.len()
            )));
        }
        Ok(blocks.swap_remove(index))
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was opened read-write
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Scratch buffers shared by this store's I/O paths
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Release the file handle.
    ///
    /// Writable files are synced first so pending writes surface as errors here.
    pub fn close(self) -> Result<()> {
        let file = self.file.into_inner();
        if self.writable {
            file.sync_all()?;
        }
        drop(file);
        debug!(path = %self.path.display(), "Closed block store");
        Ok(())
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("path", &self.path)
            .field("writable", &self.writable)
            .field("config", &self.config)
            .finish()
    }
}

/// Whether `path` names the running executable
fn is_current_exe(path: &Path) -> bool {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            debug!(error = %e, "Cannot resolve current executable");
            return false;
        }
    };

    if exe == path {
        return true;
    }

    match (exe.canonicalize(), path.canonicalize()) {
        (Ok(exe), Ok(path)) => exe == path,
        _ => false,
    }
}
