//! Inverted index facade and directory persistence
//!
//! An [`InvertedIndex`] bundles the segment pool, the pointers table, the
//! dictionary and optional document vectors. On disk an index is a
//! directory of four files: `index` (pool header + arenas), `pointers`,
//! `dictionary` and optionally `vectors`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, info};

use crate::dictionary::Dictionary;
use crate::error::IndexError;
use crate::indexer::IndexConfig;
use crate::pointer::SegmentPointer;
use crate::pointers::PointersTable;
use crate::pool::{PoolHeader, SegmentPool};
use crate::vectors::DocumentVectors;
use crate::{DICTIONARY_FILE, INDEX_FILE, POINTERS_FILE, VECTORS_FILE};

pub struct InvertedIndex {
    pub pool: SegmentPool,
    pub pointers: PointersTable,
    pub dictionary: Dictionary,
    pub vectors: Option<DocumentVectors>,
}

impl InvertedIndex {
    /// Fresh, empty index for the given build configuration
    pub(crate) fn create(config: &IndexConfig) -> Result<Self, IndexError> {
        Ok(Self {
            pool: SegmentPool::new(
                config.mode,
                config.reverse,
                config.bloom,
                config.arena_capacity,
            )?,
            pointers: PointersTable::default(),
            dictionary: Dictionary::new(),
            vectors: config.vectors.then(DocumentVectors::new),
        })
    }

    /// Head pointer for a term, if it has postings in the pool
    pub fn head_pointer(&self, term: &str) -> Option<SegmentPointer> {
        let id = self.dictionary.term_id(term)?;
        self.pointers.head_pointer(id)
    }

    /// Write the index directory (created if missing)
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(), IndexError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut w = BufWriter::new(File::create(dir.join(INDEX_FILE))?);
        self.pool.write_to(&mut w)?;

        let mut w = BufWriter::new(File::create(dir.join(POINTERS_FILE))?);
        self.pointers.write_to(&mut w)?;

        let mut w = BufWriter::new(File::create(dir.join(DICTIONARY_FILE))?);
        self.dictionary.write_to(&mut w)?;

        if let Some(vectors) = &self.vectors {
            let mut w = BufWriter::new(File::create(dir.join(VECTORS_FILE))?);
            vectors.write_to(&mut w)?;
        }

        info!(
            "saved index to {}: {} terms, {} documents, {} pool words",
            dir.display(),
            self.dictionary.len(),
            self.pointers.total_docs(),
            self.pool.words_used()
        );
        Ok(())
    }

    /// Load a full index directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, IndexError> {
        let dir = dir.as_ref();

        let mut r = BufReader::new(File::open(dir.join(INDEX_FILE))?);
        let pool = SegmentPool::read_from(&mut r)?;

        let mut r = BufReader::new(File::open(dir.join(POINTERS_FILE))?);
        let pointers = PointersTable::read_from(&mut r)?;

        let mut r = BufReader::new(File::open(dir.join(DICTIONARY_FILE))?);
        let dictionary = Dictionary::read_from(&mut r)?;

        let vectors_path = dir.join(VECTORS_FILE);
        let vectors = if vectors_path.exists() {
            let mut r = BufReader::new(File::open(vectors_path)?);
            Some(DocumentVectors::read_from(&mut r)?)
        } else {
            None
        };

        debug!(
            "opened index at {}: {} terms, {} documents",
            dir.display(),
            dictionary.len(),
            pointers.total_docs()
        );
        Ok(Self {
            pool,
            pointers,
            dictionary,
            vectors,
        })
    }

    /// Copy a single term's chain out of an on-disk index into a fresh pool
    /// without loading the other postings, rewriting the chain links to the
    /// relocated addresses. Returns the pool and the copied chain's head.
    pub fn load_term_postings(
        dir: impl AsRef<Path>,
        head: SegmentPointer,
    ) -> Result<(SegmentPool, SegmentPointer), IndexError> {
        let mut file = File::open(dir.as_ref().join(INDEX_FILE))?;
        let src = PoolHeader::read(&mut file)?;
        let mut pool = SegmentPool::new(src.mode, src.reverse, src.bloom, src.capacity)?;
        let new_head = pool.read_postings_for_term(&mut file, &src, head)?;
        Ok((pool, new_head))
    }
}
