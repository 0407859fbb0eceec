//! Header validation and linking
//!
//! Reduces the raw magic offsets found by the scanner to the headers that are
//! structurally sound and whose checksums match, then (optionally) links them
//! into an ascending chain and stamps creation times.
//!
//! # Rules
//! - Reserved fields must be zero
//! - `offset + data_cap` must lie within the file
//! - Exactly `data_len` bytes must be readable at `offset`
//! - Header CRC32 (field zeroed) and data CRC32 must both match

use crate::buffer_pool::BufferPool;
use crate::error::{CorruptKind, EmbedError, Result};
use crate::header::{Header, HEADER_SIZE};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::debug;

/// Decode the header stored at `position`
pub fn read_header<R: Read + Seek>(reader: &mut R, position: u64) -> Result<Header> {
    reader.seek(SeekFrom::Start(position))?;
    let mut bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes)?;
    Header::decode_at(&bytes, position)
}

/// Validate a single decoded header against the file contents.
///
/// Structural and checksum failures are reported as [`EmbedError::CorruptHeader`];
/// anything else is a genuine I/O failure.
pub fn check_header<R: Read + Seek>(
    reader: &mut R,
    header: &Header,
    file_len: u64,
    pool: &BufferPool,
) -> Result<()> {
    if header.reserve1 != 0 || header.reserve2 != 0 {
        return Err(CorruptKind::ReservedNotZero.into());
    }

    if header.offset + header.data_cap as u64 > file_len {
        return Err(CorruptKind::CapacityOutOfBounds.into());
    }

    // A data_len beyond capacity is rejected by verify; never read past the region.
    if header.data_len > header.data_cap {
        return Err(CorruptKind::InvalidDataLength.into());
    }

    // Stray tag matches fail here, before any data is buffered.
    if header.crc32 != header.compute_crc32() {
        return Err(CorruptKind::HeaderChecksum.into());
    }

    reader.seek(SeekFrom::Start(header.offset))?;
    let mut buf = pool.acquire(header.data_len as usize);
    let read: Result<()> = match reader.read_exact(&mut buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CorruptKind::ShortData.into()),
        Err(e) => Err(EmbedError::Io(e)),
    };
    let verified = read.and_then(|()| header.verify(&buf).map_err(EmbedError::from));
    pool.release(buf);
    verified
}

/// Decode and validate every candidate, keeping only sound headers.
///
/// Candidates that fail validation are logged and dropped. I/O errors other
/// than truncation abort the whole pass.
pub fn check_headers<R: Read + Seek>(
    reader: &mut R,
    offsets: &[u64],
    pool: &BufferPool,
) -> Result<Vec<Header>> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    let mut headers = Vec::with_capacity(offsets.len());

    for &position in offsets {
        if position + HEADER_SIZE as u64 > file_len {
            debug!(position, reason = %CorruptKind::Truncated, "Skipping header candidate");
            continue;
        }

        let header = read_header(reader, position)?;
        match check_header(reader, &header, file_len, pool) {
            Ok(()) => headers.push(header),
            Err(EmbedError::CorruptHeader(kind)) => {
                debug!(position, reason = %kind, "Skipping header candidate");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(headers)
}

/// Sort by data offset and chain each header to the next one's position.
///
/// The last header's `next_offset` is 0. Positions that do not fit the 32-bit
/// field are left unlinked (0).
pub fn link_headers(headers: &mut [Header]) {
    headers.sort_by_key(|h| h.offset);

    let count = headers.len();
    for i in 0..count {
        headers[i].next_offset = if i + 1 < count {
            u32::try_from(headers[i + 1].position()).unwrap_or(0)
        } else {
            0
        };
    }
}

/// Stamp `now` as the creation time of every header not yet initialized
pub fn init_headers(headers: &mut [Header], now: i64) {
    for header in headers.iter_mut().filter(|h| !h.is_init()) {
        header.create_time = now;
    }
}

/// Reseal and write back every header that differs from its original.
///
/// Returns the number of headers written. Callers are expected to sync.
pub fn write_headers<W: Write + Seek>(
    writer: &mut W,
    original: &[Header],
    updated: &mut [Header],
) -> Result<usize> {
    let mut written = 0;

    for header in updated.iter_mut() {
        header.seal();
        if original.iter().any(|o| o == header) {
            continue;
        }

        writer.seek(SeekFrom::Start(header.position()))?;
        writer.write_all(&header.to_bytes())?;
        written += 1;
    }

    Ok(written)
}

/// Run the full link pass in memory and return the updated headers.
///
/// `headers` is left untouched.
pub fn linked(headers: &[Header], now: i64) -> Vec<Header> {
    let mut updated = headers.to_vec();
    link_headers(&mut updated);
    init_headers(&mut updated, now);
    for header in updated.iter_mut() {
        header.seal();
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::MAGIC;
    use std::io::Cursor;

    fn block(cap: u32, data: &[u8]) -> Vec<u8> {
        let mut header = Header::new(cap);
        header.data_len = data.len() as u32;
        header.data_crc32 = crc32fast::hash(data);
        header.seal();

        let mut bytes = header.to_bytes().to_vec();
        let mut region = vec![0u8; cap as usize];
        region[..data.len()].copy_from_slice(data);
        bytes.extend_from_slice(&region);
        bytes
    }

    #[test]
    fn test_read_header() {
        let mut file = vec![0xAAu8; 10];
        file.extend(block(32, b"abc"));
        let header = read_header(&mut Cursor::new(file), 10).unwrap();
        assert_eq!(header.magic, MAGIC);
        assert_eq!(header.data_len, 3);
        assert_eq!(header.offset, 10 + HEADER_SIZE as u64);
    }

    #[test]
    fn test_check_headers_keeps_valid() {
        let mut file = block(64, b"first");
        let second = file.len() as u64;
        file.extend(block(16, b""));

        let pool = BufferPool::new();
        let headers = check_headers(&mut Cursor::new(file), &[0, second], &pool).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].position(), second);
    }

    #[test]
    fn test_reserved_not_zero() {
        let mut header = Header::new(8);
        header.reserve2 = 1;
        header.seal();
        let mut file = header.to_bytes().to_vec();
        file.extend([0u8; 8]);

        let pool = BufferPool::new();
        let mut cursor = Cursor::new(file);
        let decoded = read_header(&mut cursor, 0).unwrap();
        let result = check_header(&mut cursor, &decoded, 60, &pool);
        assert!(matches!(
            result,
            Err(EmbedError::CorruptHeader(CorruptKind::ReservedNotZero))
        ));
    }

    #[test]
    fn test_capacity_past_end() {
        let mut file = block(100, b"x");
        file.truncate(HEADER_SIZE + 50);

        let pool = BufferPool::new();
        let mut cursor = Cursor::new(file);
        let header = read_header(&mut cursor, 0).unwrap();
        let len = (HEADER_SIZE + 50) as u64;
        assert!(matches!(
            check_header(&mut cursor, &header, len, &pool),
            Err(EmbedError::CorruptHeader(CorruptKind::CapacityOutOfBounds))
        ));
        assert!(check_headers(&mut cursor, &[0], &pool).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_candidate_skipped() {
        let mut file = block(8, b"ok");
        let tail = file.len() as u64;
        file.extend_from_slice(&MAGIC);

        let pool = BufferPool::new();
        let headers = check_headers(&mut Cursor::new(file), &[0, tail], &pool).unwrap();
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_header_checksum_checked_before_data_read() {
        let mut file = block(4096, &[7u8; 4000]);
        file[8] ^= 0xFF;

        let pool = BufferPool::new();
        let mut cursor = Cursor::new(file);
        let header = read_header(&mut cursor, 0).unwrap();
        let len = (HEADER_SIZE + 4096) as u64;
        assert!(matches!(
            check_header(&mut cursor, &header, len, &pool),
            Err(EmbedError::CorruptHeader(CorruptKind::HeaderChecksum))
        ));

        let stats = pool.stats();
        assert_eq!(stats.misses + stats.hits, 0);
        assert_eq!(stats.pooled, 0);
    }

    #[test]
    fn test_data_checksum_mismatch() {
        let mut file = block(16, b"payload");
        file[HEADER_SIZE] ^= 0xFF;

        let pool = BufferPool::new();
        let headers = check_headers(&mut Cursor::new(file), &[0], &pool).unwrap();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_link_headers() {
        let mut a = Header::new(8);
        a.offset = 500 + HEADER_SIZE as u64;
        let mut b = Header::new(8);
        b.offset = 100 + HEADER_SIZE as u64;
        let mut c = Header::new(8);
        c.offset = 300 + HEADER_SIZE as u64;
        c.next_offset = 999;

        let mut headers = vec![a, b, c];
        link_headers(&mut headers);

        assert_eq!(headers[0].position(), 100);
        assert_eq!(headers[0].next_offset, 300);
        assert_eq!(headers[1].next_offset, 500);
        assert_eq!(headers[2].next_offset, 0);
    }

    #[test]
    fn test_init_headers() {
        let fresh = Header::new(8);
        let mut used = Header::new(8);
        used.create_time = 42;

        let mut headers = [fresh, used];
        init_headers(&mut headers, 1_000);
        assert_eq!(headers[0].create_time, 1_000);
        assert_eq!(headers[1].create_time, 42);
    }

    #[test]
    fn test_write_headers_only_changed() {
        let mut file = block(8, b"");
        let second = file.len() as u64;
        file.extend(block(8, b""));

        let pool = BufferPool::new();
        let mut cursor = Cursor::new(file);
        let original = check_headers(&mut cursor, &[0, second], &pool).unwrap();

        let mut updated = linked(&original, 1_700_000_000);
        let written = write_headers(&mut cursor, &original, &mut updated).unwrap();
        assert_eq!(written, 2);

        // Linked and stamped headers still validate.
        let reread = check_headers(&mut cursor, &[0, second], &pool).unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread[0].next_offset as u64, second);
        assert_eq!(reread[0].create_time, 1_700_000_000);

        // A second pass has nothing to do.
        let mut again = linked(&reread, 1_800_000_000);
        assert_eq!(write_headers(&mut cursor, &reread, &mut again).unwrap(), 0);
    }
}
