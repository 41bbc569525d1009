//! In-memory full-text search core with pooled, chain-linked compressed postings.
//!
//! Postings are packed into fixed-capacity integer arenas (the segment pool)
//! as compressed blocks of up to 128 entries, linked into one chain per term.
//! Indexing accumulates postings in per-term buffers and flushes full blocks;
//! queries walk the chains with block-level skipping:
//! - `SvS`: conjunctive sort-merge intersection
//! - `WAND` / `MBWAND`: disjunctive top-k with upper-bound pruning
//! - `BWAND_AND` / `BWAND_OR`: boolean retrieval over Bloom filter chains

pub mod error;
pub mod codec;
pub mod bloom;
pub mod pointer;
pub mod score;
pub mod pool;
pub mod dictionary;
pub mod pointers;
pub mod buffers;
pub mod vectors;
pub mod indexer;
pub mod index;
pub mod query;

pub use error::{IndexError, SearchError};
pub use codec::BLOCK_SIZE;
pub use pointer::SegmentPointer;
pub use score::Bm25Params;
pub use pool::{BloomConfig, PostingsMode, SegmentPool};
pub use dictionary::Dictionary;
pub use pointers::PointersTable;
pub use vectors::DocumentVectors;
pub use indexer::{IndexConfig, Indexer};
pub use index::InvertedIndex;
pub use query::{search, Algorithm, QueryOutput, RankedDoc};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default document-frequency cutoff below which a term stays in its
/// scratch buffer and never reaches the pool
pub const DF_CUTOFF: usize = 9;

/// File names inside an index directory
pub const INDEX_FILE: &str = "index";
pub const POINTERS_FILE: &str = "pointers";
pub const DICTIONARY_FILE: &str = "dictionary";
pub const VECTORS_FILE: &str = "vectors";
