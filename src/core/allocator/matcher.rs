//! Signature-to-block matching

use crate::block::Block;
use crate::error::Result;
use crate::header::HEADER_SIZE;

/// Whether `block` is the on-disk image of `signature`.
///
/// A block matches when the signature covers at least its header and capacity
/// and any bytes beyond that equal the bytes that follow the block's capacity
/// region in the file. Header contents are not compared: a block that has
/// been written no longer looks like its compile-time template.
pub fn matches(block: &Block<'_>, signature: &[u8]) -> Result<bool> {
    let base = HEADER_SIZE + block.cap() as usize;
    if signature.len() < base {
        return Ok(false);
    }

    let suffix = &signature[base..];
    if suffix.is_empty() {
        return Ok(true);
    }

    Ok(block
        .read_trailer(suffix.len())?
        .map_or(false, |trailer| trailer == suffix))
}
