//! Shared helpers for building files with embedded blocks

#![allow(dead_code)]

use embedblock::{Header, HEADER_SIZE};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// One block to lay out: capacity and the bytes that follow its capacity region
pub struct Layout<'a> {
    pub cap: u32,
    pub trailer: &'a [u8],
}

impl<'a> Layout<'a> {
    pub fn new(cap: u32) -> Self {
        Layout { cap, trailer: b"" }
    }

    pub fn with_trailer(cap: u32, trailer: &'a [u8]) -> Self {
        Layout { cap, trailer }
    }
}

/// Write `prefix`, then each block's empty header, zeroed capacity and trailer.
///
/// Returns the file and the header position of each block.
pub fn build_file(prefix: &[u8], layout: &[Layout<'_>]) -> (NamedTempFile, Vec<u64>) {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(prefix).unwrap();

    let mut positions = Vec::with_capacity(layout.len());
    let mut at = prefix.len() as u64;
    for block in layout {
        positions.push(at);
        temp.write_all(&Header::new(block.cap).to_bytes()).unwrap();
        temp.write_all(&vec![0u8; block.cap as usize]).unwrap();
        temp.write_all(block.trailer).unwrap();
        at += (HEADER_SIZE + block.cap as usize + block.trailer.len()) as u64;
    }

    temp.flush().unwrap();
    (temp, positions)
}

/// File of empty blocks with the given capacities and a short gap between them
pub fn blocks_file(caps: &[u32]) -> (NamedTempFile, Vec<u64>) {
    let layout: Vec<Layout<'_>> = caps
        .iter()
        .map(|&cap| Layout::with_trailer(cap, b"--"))
        .collect();
    build_file(b"#!prefix", &layout)
}

/// Overwrite bytes in place
pub fn patch(path: &Path, at: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(at)).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

/// Read `len` bytes from `at`
pub fn peek(path: &Path, at: u64, len: usize) -> Vec<u8> {
    let data = std::fs::read(path).unwrap();
    data[at as usize..at as usize + len].to_vec()
}
