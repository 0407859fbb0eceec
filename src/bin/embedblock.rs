//! embedblock CLI
//!
//! Inspect and edit the embedded blocks of a file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use embedblock::{
    signature, signature_len, static_declaration, Block, BlockStore, StoreConfig, SIZE_1KB,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// Two 1 KiB blocks carried by the tool itself, so a copy of this binary can be
// used to try out the commands below.
#[used]
static BLOCK_1: [u8; signature_len(SIZE_1KB, 1)] = signature(SIZE_1KB, b"1");
#[used]
static BLOCK_2: [u8; signature_len(SIZE_1KB, 1)] = signature(SIZE_1KB, b"2");

#[derive(Parser, Debug)]
#[command(name = "embedblock")]
#[command(about = "Inspect and edit checksummed blocks embedded in a file")]
struct Args {
    /// Store configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print block headers as JSON
    Show {
        file: PathBuf,
        #[arg(default_value = "all")]
        block: Selector,
    },

    /// Print block contents
    Print {
        file: PathBuf,
        #[arg(default_value = "all")]
        block: Selector,
    },

    /// Write files into blocks (one file per block for `all`)
    Import {
        file: PathBuf,
        block: Selector,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Write block contents to files (`<output>.<NN>` for `all`)
    Export {
        file: PathBuf,
        block: Selector,
        output: PathBuf,
    },

    /// Print a static declaration for a block signature
    Sig {
        /// Block capacity in bytes
        capacity: u32,

        /// Trailing bytes that tell equal-capacity blocks apart
        #[arg(short, long, default_value = "")]
        suffix: String,

        /// Name of the generated static
        #[arg(short, long, default_value = "BLOCK")]
        name: String,
    },
}

/// Block selector: `all` or a zero-based index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    All,
    Index(usize),
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Selector::All);
        }
        s.parse::<usize>()
            .map(Selector::Index)
            .map_err(|_| format!("'{}' is not a block id (expected `all` or a number)", s))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    // Keep the built-in blocks linked in.
    std::hint::black_box((&BLOCK_1, &BLOCK_2));
    debug!(command = ?args.command, "Parsed arguments");

    let config = match &args.config {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };

    match args.command {
        Command::Show { file, block } => {
            let store = open(&file, config)?;
            for (id, block) in select(&store, block)? {
                println!("Block {}:", id);
                println!("{}", block);
                println!();
            }
            store.close()?;
        }
        Command::Print { file, block } => {
            let store = open(&file, config)?;
            for (id, block) in select(&store, block)? {
                let data = block
                    .read_all()
                    .with_context(|| format!("reading block {}", id))?;
                println!("Block {}:", id);
                println!("{}", String::from_utf8_lossy(&data));
            }
            store.close()?;
        }
        Command::Import {
            file,
            block,
            inputs,
        } => {
            let store = open(&file, config)?;
            let mut blocks = select(&store, block)?;
            check_input_count(block, blocks.len(), inputs.len())?;

            for ((id, block), input) in blocks.iter_mut().zip(&inputs) {
                let data = std::fs::read(input)
                    .with_context(|| format!("reading {}", input.display()))?;
                block
                    .write(&data)
                    .with_context(|| format!("writing block {}", id))?;
            }
            drop(blocks);
            store.close()?;

            match block {
                Selector::All => println!("Import blocks successful."),
                Selector::Index(id) => println!("Import block {} successful.", id),
            }
        }
        Command::Export {
            file,
            block,
            output,
        } => {
            let store = open(&file, config)?;
            let blocks = select(&store, block)?;
            match block {
                Selector::All => {
                    let width = blocks.len().to_string().len();
                    for (id, block) in &blocks {
                        let path = numbered(&output, *id, width);
                        block
                            .export(&path)
                            .with_context(|| format!("exporting block {}", id))?;
                    }
                }
                Selector::Index(id) => {
                    if let Some((_, block)) = blocks.first() {
                        block
                            .export(&output)
                            .with_context(|| format!("exporting block {}", id))?;
                    }
                }
            }
            drop(blocks);
            store.close()?;

            match block {
                Selector::All => println!("Export blocks successful."),
                Selector::Index(id) => println!("Export block {} successful.", id),
            }
        }
        Command::Sig {
            capacity,
            suffix,
            name,
        } => {
            println!("{}", static_declaration(&name, capacity, suffix.as_bytes()));
        }
    }

    Ok(())
}

fn open(path: &Path, config: StoreConfig) -> Result<BlockStore> {
    BlockStore::open_with(path, config).with_context(|| format!("opening {}", path.display()))
}

fn select(store: &BlockStore, selector: Selector) -> Result<Vec<(usize, Block<'_>)>> {
    match selector {
        Selector::All => Ok(store.blocks()?.into_iter().enumerate().collect()),
        Selector::Index(id) => Ok(vec![(id, store.block(id)?)]),
    }
}

/// Import takes exactly one input per selected block
fn check_input_count(selector: Selector, blocks: usize, inputs: usize) -> Result<()> {
    match selector {
        Selector::All if blocks != inputs => bail!(
            "Block count mismatch: {} blocks, {} input files",
            blocks,
            inputs
        ),
        Selector::Index(id) if inputs != 1 => bail!(
            "Block {} takes exactly one input file, got {}",
            id,
            inputs
        ),
        _ => Ok(()),
    }
}

/// `<output>.<id>` with `id` zero-padded to `width` digits
fn numbered(output: &Path, id: usize, width: usize) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(format!(".{:0width$}", id, width = width));
    PathBuf::from(name)
}
