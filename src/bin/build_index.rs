//! Indexing driver: builds an index directory from tokenized documents.
//!
//! Input files hold one document per line, `<docid>\t<space-separated
//! tokens>`, with strictly increasing docids across the whole input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use clap::Parser;
use log::info;

use fts_chain_core::{BloomConfig, IndexConfig, Indexer, PostingsMode};

#[derive(Parser, Debug)]
#[command(author, version, about = "Build a chained-postings index from tokenized documents")]
struct Args {
    /// Output index directory
    #[arg(long)]
    index: PathBuf,

    /// Postings mode: nonpositional | tfonly | positional
    #[arg(long, default_value = "nonpositional")]
    mode: String,

    /// Per-term buffer growth cap, in 128-entry blocks
    #[arg(long, default_value_t = 16)]
    max_blocks: usize,

    /// Document frequency below which a term never reaches the pool
    #[arg(long, default_value_t = fts_chain_core::DF_CUTOFF)]
    df_cutoff: usize,

    /// Store chains for newest-first traversal
    #[arg(long)]
    reverse: bool,

    /// Keep per-document termid vectors
    #[arg(long)]
    vectors: bool,

    /// Build Bloom filter chains (needed by the BWAND algorithms)
    #[arg(long)]
    bloom: bool,

    /// Bloom filter hash count
    #[arg(long, default_value_t = 3)]
    bloom_hashes: u32,

    /// Bloom filter bits per element
    #[arg(long, default_value_t = 16)]
    bloom_bits: u32,

    /// Input files, one document per line
    #[arg(required = true)]
    input: Vec<PathBuf>,
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mode = PostingsMode::from_name(&args.mode)
        .ok_or_else(|| format!("unknown mode {:?} (nonpositional | tfonly | positional)", args.mode))?;

    let config = IndexConfig {
        mode,
        reverse: args.reverse,
        df_cutoff: args.df_cutoff,
        max_blocks: args.max_blocks,
        vectors: args.vectors,
        bloom: args.bloom.then_some(BloomConfig {
            n_hash: args.bloom_hashes,
            bits_per_element: args.bloom_bits,
        }),
        ..Default::default()
    };
    let mut indexer = Indexer::new(config)?;

    for path in &args.input {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = 0u64;
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            indexer.index_line(&line)?;
            lines += 1;
        }
        info!("{}: {lines} documents", path.display());
    }

    let index = indexer.finish()?;
    index.save(&args.index)?;
    println!(
        "indexed {} documents, {} terms -> {}",
        index.pointers.total_docs(),
        index.dictionary.len(),
        args.index.display()
    );
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
