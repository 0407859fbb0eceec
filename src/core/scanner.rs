//! Magic tag scanner
//!
//! Finds every non-overlapping occurrence of a byte tag in a file, left to
//! right. Small files are read whole; larger ones are streamed in fixed-size
//! chunks, carrying the last `tag.len() - 1` unmatched bytes across chunk
//! boundaries so a tag split between two reads is still found.

use crate::buffer_pool::BufferPool;
use crate::config::StoreConfig;
use std::io::{self, Read, Seek, SeekFrom};

/// Position of the first occurrence of `needle` in `haystack`
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Every non-overlapping occurrence of `tag` in `data`
pub fn find_all(data: &[u8], tag: &[u8]) -> Vec<u64> {
    let mut offsets = Vec::new();
    if tag.is_empty() {
        return offsets;
    }

    let mut pos = 0;
    while let Some(index) = find(&data[pos..], tag) {
        offsets.push((pos + index) as u64);
        pos += index + tag.len();
    }
    offsets
}

/// Locate every occurrence of `tag` in `reader`.
///
/// The reader is rewound first; its cursor position afterwards is unspecified.
pub fn scan<R: Read + Seek>(
    reader: &mut R,
    tag: &[u8],
    config: &StoreConfig,
    pool: &BufferPool,
) -> io::Result<Vec<u64>> {
    let size = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    if size <= config.in_memory_scan_limit {
        let mut data = Vec::with_capacity(size as usize);
        reader.read_to_end(&mut data)?;
        return Ok(find_all(&data, tag));
    }

    scan_streaming(reader, tag, config.scan_chunk_size, pool)
}

/// Chunked scan with memory bounded by `chunk_size + tag.len()`
pub fn scan_streaming<R: Read>(
    reader: &mut R,
    tag: &[u8],
    chunk_size: usize,
    pool: &BufferPool,
) -> io::Result<Vec<u64>> {
    let mut offsets = Vec::new();
    if tag.is_empty() {
        return Ok(offsets);
    }

    let mut chunk = pool.acquire(chunk_size.max(tag.len()));
    let mut window: Vec<u8> = Vec::with_capacity(chunk.len() + tag.len());
    // Absolute file position of window[0]
    let mut base: u64 = 0;

    let result = loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        };
        window.extend_from_slice(&chunk[..n]);

        let mut pos = 0;
        while let Some(index) = find(&window[pos..], tag) {
            offsets.push(base + (pos + index) as u64);
            pos += index + tag.len();
        }

        let keep_from = pos.max(window.len().saturating_sub(tag.len() - 1));
        window.drain(..keep_from);
        base += keep_from as u64;
    };

    pool.release(chunk);
    result.map(|()| offsets)
}
