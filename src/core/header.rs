use crate::error::{CorruptKind, EmbedError, Result};
use serde::{Deserialize, Serialize};

/// Tag marking the start of every block header.
///
/// The UTF-8 encoding of `"\u{EEEE}GO\u{EEEE}"`: two private-use code points
/// around an ASCII pair, unlikely to occur by accident in compiled code.
pub const MAGIC: [u8; 8] = [0xEE, 0xBB, 0xAE, 0x47, 0x4F, 0xEE, 0xBB, 0xAE];

/// Encoded header size in bytes
pub const HEADER_SIZE: usize = 52;

const CRC_RANGE: std::ops::Range<usize> = 8..12;

/// Block header
///
/// Fixed 52-byte big-endian layout stored immediately before the block data:
///
/// ```text
///  0..8   magic
///  8..12  crc32        (of the header with this field zeroed)
/// 12..16  data_len
/// 16..20  data_cap
/// 20..24  data_crc32
/// 24..28  next_offset
/// 28..36  create_time
/// 36..44  update_time
/// 44..48  reserve1
/// 48..52  reserve2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Magic tag, see [`MAGIC`]
    pub magic: [u8; 8],

    /// CRC32 of the encoded header with this field zeroed
    pub crc32: u32,

    /// Bytes currently occupied in the block
    pub data_len: u32,

    /// Fixed capacity of the block
    pub data_cap: u32,

    /// CRC32 of the live `data_len` bytes
    pub data_crc32: u32,

    /// Position of the next block's header, 0 for the last block
    pub next_offset: u32,

    /// Unix seconds of the first write, 0 until then
    pub create_time: i64,

    /// Unix seconds of the most recent write
    pub update_time: i64,

    pub reserve1: u32,
    pub reserve2: u32,

    /// Absolute file position where the data begins (not persisted)
    #[serde(skip)]
    pub offset: u64,
}

impl Header {
    /// Empty header for a block of the given capacity, with its checksum sealed.
    pub fn new(data_cap: u32) -> Self {
        let mut header = Header {
            magic: MAGIC,
            crc32: 0,
            data_len: 0,
            data_cap,
            data_crc32: 0,
            next_offset: 0,
            create_time: 0,
            update_time: 0,
            reserve1: 0,
            reserve2: 0,
            offset: 0,
        };
        header.seal();
        header
    }

    /// True once the block has been written (or stamped by a link pass)
    pub fn is_init(&self) -> bool {
        self.create_time != 0
    }

    /// File position of the header itself
    pub fn position(&self) -> u64 {
        self.offset.saturating_sub(HEADER_SIZE as u64)
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];

        bytes[0..8].copy_from_slice(&self.magic);
        bytes[8..12].copy_from_slice(&self.crc32.to_be_bytes());
        bytes[12..16].copy_from_slice(&self.data_len.to_be_bytes());
        bytes[16..20].copy_from_slice(&self.data_cap.to_be_bytes());
        bytes[20..24].copy_from_slice(&self.data_crc32.to_be_bytes());
        bytes[24..28].copy_from_slice(&self.next_offset.to_be_bytes());
        bytes[28..36].copy_from_slice(&self.create_time.to_be_bytes());
        bytes[36..44].copy_from_slice(&self.update_time.to_be_bytes());
        bytes[44..48].copy_from_slice(&self.reserve1.to_be_bytes());
        bytes[48..52].copy_from_slice(&self.reserve2.to_be_bytes());

        bytes
    }

    /// Deserialize header from bytes
    ///
    /// Decoding does not validate anything; see [`Header::verify`].
    /// The returned header has `offset == 0`; use [`Header::decode_at`] when the
    /// file position is known.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(EmbedError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for header",
            )));
        }

        let u32_at = |at: usize| {
            u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let i64_at = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            i64::from_be_bytes(raw)
        };

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);

        Ok(Header {
            magic,
            crc32: u32_at(8),
            data_len: u32_at(12),
            data_cap: u32_at(16),
            data_crc32: u32_at(20),
            next_offset: u32_at(24),
            create_time: i64_at(28),
            update_time: i64_at(36),
            reserve1: u32_at(44),
            reserve2: u32_at(48),
            offset: 0,
        })
    }

    /// Decode a header that was read from `position` in a file
    pub fn decode_at(bytes: &[u8], position: u64) -> Result<Self> {
        let mut header = Self::from_bytes(bytes)?;
        header.offset = position + HEADER_SIZE as u64;
        Ok(header)
    }

    /// CRC32 of the encoded header with the checksum field zeroed
    pub fn compute_crc32(&self) -> u32 {
        let mut bytes = self.to_bytes();
        bytes[CRC_RANGE].fill(0);
        crc32fast::hash(&bytes)
    }

    /// Recompute and store the header checksum
    pub fn seal(&mut self) {
        self.crc32 = self.compute_crc32();
    }

    /// Check the header against the live data it guards.
    ///
    /// `data` must be exactly the `data_len` bytes stored at `offset`.
    pub fn verify(&self, data: &[u8]) -> std::result::Result<(), CorruptKind> {
        if self.magic != MAGIC {
            return Err(CorruptKind::InvalidMagic);
        }

        if self.crc32 != self.compute_crc32() {
            return Err(CorruptKind::HeaderChecksum);
        }

        if self.data_len > self.data_cap || data.len() != self.data_len as usize {
            return Err(CorruptKind::InvalidDataLength);
        }

        if self.data_crc32 != crc32fast::hash(data) {
            return Err(CorruptKind::DataChecksum);
        }

        Ok(())
    }

    /// Render the persisted fields as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        let header = Header::new(0);
        assert_eq!(header.to_bytes().len(), HEADER_SIZE);
    }

    #[test]
    fn test_empty_header_checksum() {
        // Well-known values baked into existing signatures.
        assert_eq!(Header::new(0).crc32, 0xf151_cd41);
        assert_eq!(Header::new(1024).crc32, 0x6358_8999);
        assert_eq!(Header::new(1024 * 1024).crc32, 0xbeab_890a);
    }

    #[test]
    fn test_big_endian_layout() {
        let mut header = Header::new(0x0000_0400);
        header.data_len = 0x0102_0304;
        header.create_time = 0x0A0B_0C0D_0E0F_1011;

        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..8], &MAGIC);
        assert_eq!(&bytes[12..16], &[1, 2, 3, 4]);
        assert_eq!(&bytes[16..20], &[0, 0, 4, 0]);
        assert_eq!(&bytes[28..36], &[0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11]);
    }

    #[test]
    fn test_header_serialization() {
        let mut header = Header::new(4096);
        header.data_len = 10;
        header.data_crc32 = 0xDEAD_BEEF;
        header.next_offset = 9000;
        header.create_time = 1_700_000_000;
        header.update_time = 1_700_000_100;
        header.seal();

        let decoded = Header::decode_at(&header.to_bytes(), 128).unwrap();
        assert_eq!(decoded.offset, 128 + HEADER_SIZE as u64);
        assert_eq!(decoded.position(), 128);
        assert_eq!(decoded.data_len, 10);
        assert_eq!(decoded.next_offset, 9000);
        assert_eq!(decoded.update_time, 1_700_000_100);
        assert_eq!(decoded.crc32, header.crc32);
    }

    #[test]
    fn test_from_bytes_too_short() {
        let result = Header::from_bytes(&[0u8; HEADER_SIZE - 1]);
        assert!(matches!(result, Err(EmbedError::Io(_))));
    }

    #[test]
    fn test_is_init() {
        let mut header = Header::new(16);
        assert!(!header.is_init());
        header.create_time = 1;
        assert!(header.is_init());
    }

    #[test]
    fn test_verify_empty() {
        assert!(Header::new(0).verify(&[]).is_ok());
        assert!(Header::new(1024).verify(&[]).is_ok());
    }

    #[test]
    fn test_verify_detects_corruption() {
        let data = b"hello";
        let mut header = Header::new(8);
        header.data_len = data.len() as u32;
        header.data_crc32 = crc32fast::hash(data);
        header.seal();
        assert!(header.verify(data).is_ok());

        assert_eq!(header.verify(b"hellO"), Err(CorruptKind::DataChecksum));
        assert_eq!(header.verify(b"hell"), Err(CorruptKind::InvalidDataLength));

        let mut bad_magic = header;
        bad_magic.magic = *b"INVALID!";
        assert_eq!(bad_magic.verify(data), Err(CorruptKind::InvalidMagic));

        let mut stale = header;
        stale.update_time = 42;
        assert_eq!(stale.verify(data), Err(CorruptKind::HeaderChecksum));

        let mut overfull = header;
        overfull.data_cap = 2;
        overfull.seal();
        assert_eq!(overfull.verify(data), Err(CorruptKind::InvalidDataLength));
    }

    #[test]
    fn test_offset_not_in_checksum() {
        let mut header = Header::new(64);
        let crc = header.crc32;
        header.offset = 777;
        assert_eq!(header.compute_crc32(), crc);
    }

    #[test]
    fn test_to_json() {
        let json = Header::new(1024).to_json().unwrap();
        assert!(json.contains("\"data_cap\":1024"));
        assert!(!json.contains("\"offset\""));
    }
}
