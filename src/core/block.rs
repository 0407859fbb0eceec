//! Bounded, checksum-guarded data region addressed by one validated header

use crate::error::{EmbedError, Result};
use crate::header::Header;
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// A block discovered in a [`BlockStore`](crate::BlockStore).
///
/// Holds a snapshot of its header and borrows the store's file handle, so a
/// block can never outlive the store that produced it. Blocks from one store
/// share the handle; each operation takes the file lock for its whole
/// seek-then-transfer sequence.
pub struct Block<'a> {
    file: &'a Mutex<File>,
    header: Header,
}

impl<'a> Block<'a> {
    pub(crate) fn new(file: &'a Mutex<File>, header: Header) -> Self {
        Block { file, header }
    }

    /// Bytes currently stored
    pub fn len(&self) -> u32 {
        self.header.data_len
    }

    pub fn is_empty(&self) -> bool {
        self.header.data_len == 0
    }

    /// Fixed capacity in bytes
    pub fn cap(&self) -> u32 {
        self.header.data_cap
    }

    /// Header snapshot as of discovery or the last successful write
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// File position where the data begins
    pub fn offset(&self) -> u64 {
        self.header.offset
    }

    /// Read up to `len()` bytes into `buf`, returning the count read.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let want = buf.len().min(self.header.data_len as usize);
        let buf = &mut buf[..want];

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.header.offset))?;

        let mut filled = 0;
        while filled < want {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(filled)
    }

    /// Read the whole live data region
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.header.data_len as usize];
        let n = self.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Replace the block contents with `data`.
    ///
    /// Writes the data, then the updated header, then syncs. The two writes are
    /// not atomic: a crash between them leaves a header that no longer matches
    /// the data, and the block is dropped from discovery until rewritten.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        if data.len() > self.header.data_cap as usize {
            return Err(EmbedError::DataTooLarge {
                len: data.len(),
                cap: self.header.data_cap,
            });
        }

        let now = chrono::Utc::now().timestamp();
        let mut next = self.header;
        next.data_len = data.len() as u32;
        next.data_crc32 = crc32fast::hash(data);
        next.update_time = now;
        if !next.is_init() {
            next.create_time = now;
        }
        next.seal();
        next.verify(data)?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(next.offset))?;
        file.write_all(data)?;

        file.seek(SeekFrom::Start(next.position()))?;
        file.write_all(&next.to_bytes())?;
        file.sync_all()?;

        debug!(
            position = next.position(),
            len = next.data_len,
            cap = next.data_cap,
            "Wrote block"
        );

        self.header = next;
        Ok(data.len())
    }

    /// Copy the live data region into a standalone file
    pub fn export<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = self.read_all()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Read `len` bytes that follow the capacity region.
    ///
    /// Returns `None` when the file ends first.
    pub(crate) fn read_trailer(&self, len: usize) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; len];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(
            self.header.offset + self.header.data_cap as u64,
        ))?;

        match file.read_exact(&mut buf) {
            Ok(()) => Ok(Some(buf)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Display for Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.header.to_json() {
            Ok(json) => f.write_str(&json),
            Err(e) => write!(f, "<err>: {}", e),
        }
    }
}

impl fmt::Debug for Block<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block").field("header", &self.header).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HEADER_SIZE;
    use crate::error::CorruptKind;
    use tempfile::tempfile;

    fn single_block(cap: u32) -> (Mutex<File>, Header) {
        let mut file = tempfile().unwrap();
        let mut header = Header::new(cap);
        file.write_all(&header.to_bytes()).unwrap();
        file.write_all(&vec![0u8; cap as usize]).unwrap();
        header.offset = HEADER_SIZE as u64;
        (Mutex::new(file), header)
    }

    fn header_on_disk(file: &Mutex<File>) -> Header {
        let mut file = file.lock();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut bytes).unwrap();
        Header::decode_at(&bytes, 0).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let (file, header) = single_block(1024);
        let mut block = Block::new(&file, header);
        assert_eq!(block.cap(), 1024);
        assert!(block.is_empty());

        assert_eq!(block.write(b"0123456789").unwrap(), 10);
        assert_eq!(block.len(), 10);

        let mut buf = [0u8; 10];
        assert_eq!(block.read(&mut buf).unwrap(), 10);
        assert_eq!(&buf, b"0123456789");
    }

    #[test]
    fn test_read_clamps_to_len() {
        let (file, header) = single_block(64);
        let mut block = Block::new(&file, header);
        block.write(b"abc").unwrap();

        let mut buf = [0xFFu8; 32];
        assert_eq!(block.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(buf[3], 0xFF);
    }

    #[test]
    fn test_empty_operations_are_noops() {
        let (file, header) = single_block(16);
        let mut block = Block::new(&file, header);

        assert_eq!(block.write(&[]).unwrap(), 0);
        assert_eq!(block.read(&mut []).unwrap(), 0);
        assert_eq!(header_on_disk(&file), Header::decode_at(&header.to_bytes(), 0).unwrap());
    }

    #[test]
    fn test_write_too_large() {
        let (file, header) = single_block(4);
        let mut block = Block::new(&file, header);

        let result = block.write(b"12345");
        assert!(matches!(
            result,
            Err(EmbedError::DataTooLarge { len: 5, cap: 4 })
        ));
        assert_eq!(block.len(), 0);
        assert_eq!(header_on_disk(&file).data_len, 0);
    }

    #[test]
    fn test_header_persisted_and_verifies() {
        let (file, header) = single_block(32);
        let mut block = Block::new(&file, header);
        block.write(b"persist me").unwrap();

        let on_disk = header_on_disk(&file);
        assert_eq!(on_disk.data_len, 10);
        assert!(on_disk.is_init());
        assert!(on_disk.update_time >= on_disk.create_time);
        assert_eq!(on_disk.verify(b"persist me"), Ok(()));
        assert_eq!(on_disk.verify(b"persist mE"), Err(CorruptKind::DataChecksum));
    }

    #[test]
    fn test_create_time_set_once() {
        let (file, mut header) = single_block(32);
        header.create_time = 1_000;
        header.seal();
        let mut block = Block::new(&file, header);

        block.write(b"first").unwrap();
        block.write(b"second").unwrap();
        assert_eq!(block.header().create_time, 1_000);
        assert!(block.header().update_time > 1_000);
    }

    #[test]
    fn test_shorter_rewrite() {
        let (file, header) = single_block(32);
        let mut block = Block::new(&file, header);
        block.write(b"a longer payload").unwrap();
        block.write(b"short").unwrap();
        assert_eq!(block.read_all().unwrap(), b"short");
    }

    #[test]
    fn test_export() {
        let (file, header) = single_block(32);
        let mut block = Block::new(&file, header);
        block.write(b"exported").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        block.export(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"exported");
    }

    #[test]
    fn test_read_trailer() {
        let (file, header) = single_block(8);
        {
            let mut f = file.lock();
            f.seek(SeekFrom::End(0)).unwrap();
            f.write_all(b"tail").unwrap();
        }
        let block = Block::new(&file, header);
        assert_eq!(block.read_trailer(4).unwrap(), Some(b"tail".to_vec()));
        assert_eq!(block.read_trailer(5).unwrap(), None);
    }

    #[test]
    fn test_display_is_json() {
        let (file, header) = single_block(8);
        let block = Block::new(&file, header);
        let shown = block.to_string();
        assert!(shown.starts_with('{'));
        assert!(shown.contains("\"data_cap\":8"));
    }
}
