//! Block format, discovery and allocation

pub mod allocator;
pub mod block;
pub mod buffer_pool;
pub mod config;
pub mod header;
pub mod io;
pub mod scanner;
pub mod signature;
pub mod validation;

pub use allocator::{Embed, EmbedBuilder};
pub use block::Block;
pub use io::BlockStore;
