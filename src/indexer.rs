//! Document-by-document indexing driver
//!
//! Drives one document at a time through the dictionary, statistics and
//! ingestion buffers, flushing full buffers into the segment pool. Documents
//! must arrive with strictly increasing docids (strictly decreasing when the
//! pool stores postings backwards); docids start at 1.

use log::{debug, info};
use rustc_hash::FxHashSet;

use crate::buffers::IngestionBuffers;
use crate::codec::BLOCK_SIZE;
use crate::error::IndexError;
use crate::index::InvertedIndex;
use crate::pool::{BloomConfig, PostingsMode, DEFAULT_ARENA_CAPACITY};
use crate::score::Bm25Params;
use crate::DF_CUTOFF;

/// Index construction options
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// What each postings block carries
    pub mode: PostingsMode,
    /// Store postings backwards (descending docids)
    pub reverse: bool,
    /// Terms below this df stay in scratch buffers and never hit the pool
    pub df_cutoff: usize,
    /// Per-term buffer growth cap, in 128-entry blocks; 1 disables growth
    pub max_blocks: usize,
    /// Keep per-document termid vectors
    pub vectors: bool,
    /// Build Bloom filter chains (required by the BWAND algorithms)
    pub bloom: Option<BloomConfig>,
    /// Arena capacity in words
    pub arena_capacity: usize,
    /// Parameters for the max-BM25-tf bookkeeping
    pub bm25: Bm25Params,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            mode: PostingsMode::Docids,
            reverse: false,
            df_cutoff: DF_CUTOFF,
            max_blocks: 16,
            vectors: false,
            bloom: None,
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            bm25: Bm25Params::default(),
        }
    }
}

impl IndexConfig {
    fn validate(&self) -> Result<(), IndexError> {
        if self.max_blocks < 1 {
            return Err(IndexError::Config("max_blocks must be at least 1".into()));
        }
        if self.df_cutoff < 1 {
            return Err(IndexError::Config("df_cutoff must be at least 1".into()));
        }
        if self.df_cutoff > BLOCK_SIZE {
            return Err(IndexError::Config(format!(
                "df_cutoff must not exceed the block size {BLOCK_SIZE}"
            )));
        }
        Ok(())
    }
}

/// Streaming index builder; call [`Indexer::finish`] to flush residual
/// buffers and obtain the index
pub struct Indexer {
    index: InvertedIndex,
    buffers: IngestionBuffers,
    config: IndexConfig,
    /// Unique termids of the current document, in first-occurrence order
    doc_terms: Vec<u32>,
    seen: FxHashSet<u32>,
    /// Raw termid sequence of the current document (vectors only)
    doc_buf: Vec<u32>,
    last_docid: Option<u32>,
    docs_indexed: u64,
}

impl Indexer {
    pub fn new(config: IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        let index = InvertedIndex::create(&config)?;
        let buffers = IngestionBuffers::new(config.mode, config.df_cutoff);
        Ok(Self {
            index,
            buffers,
            config,
            doc_terms: Vec::new(),
            seen: FxHashSet::default(),
            doc_buf: Vec::new(),
            last_docid: None,
            docs_indexed: 0,
        })
    }

    /// Index one `<docid>\t<space-separated tokens>` line
    pub fn index_line(&mut self, line: &str) -> Result<(), IndexError> {
        let (id_part, text) = line
            .split_once('\t')
            .ok_or_else(|| IndexError::MalformedLine("missing docid tab".into()))?;
        let docid: u32 = id_part
            .trim()
            .parse()
            .map_err(|_| IndexError::MalformedLine(format!("bad docid {id_part:?}")))?;
        self.index_document(docid, text.split_whitespace())
    }

    /// Index one pre-tokenized document
    pub fn index_document<'a>(
        &mut self,
        docid: u32,
        tokens: impl Iterator<Item = &'a str>,
    ) -> Result<(), IndexError> {
        if docid == 0 {
            return Err(IndexError::InvalidDocid(0));
        }
        if let Some(last) = self.last_docid {
            if docid <= last {
                return Err(IndexError::DocidOrder {
                    expected: "increasing",
                    docid,
                    previous: last,
                });
            }
        }
        self.last_docid = Some(docid);

        let mode = self.config.mode;
        self.doc_terms.clear();
        self.seen.clear();
        self.doc_buf.clear();

        // positions start from 1
        let mut position: u32 = 1;
        for token in tokens {
            let id = self.index.dictionary.id_or_insert(token);
            let first = self.seen.insert(id);
            if first {
                self.doc_terms.push(id);
            }
            self.index.pointers.incr_cf(id);
            if self.config.vectors {
                self.doc_buf.push(id);
            }
            if mode.has_tf() {
                self.buffers
                    .ensure(id)
                    .record_occurrence(position, first, mode);
            }
            position += 1;
        }

        let doc_len = position - 1;
        self.index.pointers.set_doc_len(docid, doc_len);
        self.index.pointers.add_document(doc_len);
        if let Some(vectors) = &mut self.index.vectors {
            vectors.add(docid, &self.doc_buf);
        }

        let avg_doc_len = self.index.pointers.avg_doc_len();
        let doc_terms = std::mem::take(&mut self.doc_terms);
        for &id in &doc_terms {
            self.finish_doc_term(id, docid, doc_len, avg_doc_len)?;
        }
        self.doc_terms = doc_terms;

        self.docs_indexed += 1;
        if self.docs_indexed % 1_000_000 == 0 {
            info!("indexed {} documents", self.docs_indexed);
        }
        Ok(())
    }

    /// Per-document bookkeeping and buffer appends for one unique term
    fn finish_doc_term(
        &mut self,
        id: u32,
        docid: u32,
        doc_len: u32,
        avg_doc_len: f32,
    ) -> Result<(), IndexError> {
        let mode = self.config.mode;

        if mode.has_tf() {
            let tf = {
                let buf = self.buffers.ensure(id);
                let tf = buf.tfs[buf.write];
                if mode.is_positional() {
                    buf.end_doc();
                }
                tf
            };
            let bm25 = self.config.bm25;
            let current = bm25.tf_component(tf, doc_len, avg_doc_len);
            let stored = bm25.tf_component(
                self.index.pointers.max_tf(id),
                self.index.pointers.max_tf_doc_len(id),
                avg_doc_len,
            );
            if current > stored {
                self.index.pointers.set_max_tf(id, tf, doc_len);
            }
        }

        let df = self.index.pointers.df(id) as usize;
        if df + 1 < self.config.df_cutoff {
            // below the cutoff: stay in the scratch buffer
            self.buffers.ensure(id).append_docid(docid);
            self.index.pointers.incr_df(id);
            return Ok(());
        }

        let full = {
            let buf = self.buffers.ensure(id);
            if !buf.promoted() {
                buf.promote(mode);
            }
            buf.append_docid(docid);
            if mode.is_positional() && buf.write % BLOCK_SIZE == 0 {
                buf.mark_block_boundary();
            }
            buf.write == buf.docids.len()
        };
        self.index.pointers.incr_df(id);

        if full {
            let capacity = self.buffers.ensure(id).docids.len();
            self.flush_buffer(id, capacity)?;
            let max_words = self.config.max_blocks * BLOCK_SIZE;
            let buf = self.buffers.ensure(id);
            if self.config.max_blocks > 1 {
                buf.expand(max_words, mode);
            }
            buf.reset_after_flush(mode);
        }
        Ok(())
    }

    /// Compress the first `len` buffered postings of `id` into chain blocks
    fn flush_buffer(&mut self, id: u32, len: usize) -> Result<(), IndexError> {
        let mode = self.config.mode;
        let reverse = self.index.pool.reverse();
        let mut tail = self.index.pointers.tail_pointer(id);

        let nb = len / BLOCK_SIZE;
        let residual = len % BLOCK_SIZE;
        let mut ps = 0usize;

        for j in 0..=nb {
            let (start, blen) = if j < nb {
                (j * BLOCK_SIZE, BLOCK_SIZE)
            } else if residual > 0 {
                (nb * BLOCK_SIZE, residual)
            } else {
                break;
            };

            let buf = self.buffers.ensure(id);
            let range = start..start + blen;
            let ptr = match mode {
                PostingsMode::Docids => self
                    .index
                    .pool
                    .compress_and_add_non_positional(&buf.docids[range], tail)?,
                PostingsMode::DocidsTf => self.index.pool.compress_and_add_tf_only(
                    &buf.docids[range.clone()],
                    &buf.tfs[range],
                    tail,
                )?,
                PostingsMode::Positional => {
                    let count = buf.positions[ps] as usize;
                    let ptr = self.index.pool.compress_and_add_positional(
                        &buf.docids[range.clone()],
                        &buf.tfs[range],
                        &buf.positions[ps + 1..ps + 1 + count],
                        tail,
                    )?;
                    ps += count + 1;
                    ptr
                }
            };

            tail = Some(ptr);
            if reverse || self.index.pointers.head_pointer(id).is_none() {
                self.index.pointers.set_head_pointer(id, ptr);
            }
            self.index.pointers.set_tail_pointer(id, ptr);
        }
        Ok(())
    }

    /// Flush every promoted buffer's remaining blocks (full blocks plus one
    /// residual) and return the finished index
    pub fn finish(mut self) -> Result<InvertedIndex, IndexError> {
        let ids: Vec<u32> = self.buffers.ids().collect();
        let mut flushed = 0usize;
        for id in ids {
            let buf = self.buffers.ensure(id);
            if !buf.promoted() || buf.write == 0 {
                continue;
            }
            let len = buf.write;
            self.flush_buffer(id, len)?;
            flushed += 1;
        }
        debug!("final flush covered {flushed} promoted terms");
        info!(
            "indexing done: {} documents, {} terms, {} pool words",
            self.index.pointers.total_docs(),
            self.index.dictionary.len(),
            self.index.pool.words_used()
        );
        Ok(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::SegmentPointer;

    fn build(config: IndexConfig, docs: &[(u32, &str)]) -> InvertedIndex {
        let mut indexer = Indexer::new(config).unwrap();
        for &(docid, text) in docs {
            indexer.index_document(docid, text.split_whitespace()).unwrap();
        }
        indexer.finish().unwrap()
    }

    fn chain_docids(index: &InvertedIndex, term: &str) -> Vec<u32> {
        let id = index.dictionary.term_id(term).unwrap();
        let mut out = Vec::new();
        let mut block = [0u32; BLOCK_SIZE];
        let mut cur = index.pointers.head_pointer(id);
        while let Some(p) = cur {
            let n = index.pool.decompress_docid_block(p, &mut block);
            out.extend_from_slice(&block[..n]);
            cur = index.pool.next(p);
        }
        out
    }

    fn chain_blocks(index: &InvertedIndex, term: &str) -> Vec<SegmentPointer> {
        let id = index.dictionary.term_id(term).unwrap();
        let mut out = Vec::new();
        let mut cur = index.pointers.head_pointer(id);
        while let Some(p) = cur {
            out.push(p);
            cur = index.pool.next(p);
        }
        out
    }

    #[test]
    fn test_single_doc_statistics() {
        // S1: one document, two terms, below the cutoff
        let index = build(IndexConfig::default(), &[(1, "a b a")]);

        let a = index.dictionary.term_id("a").unwrap();
        let b = index.dictionary.term_id("b").unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(index.pointers.df(a), 1);
        assert_eq!(index.pointers.df(b), 1);
        assert_eq!(index.pointers.cf(a), 2);
        assert_eq!(index.pointers.cf(b), 1);
        assert_eq!(index.pointers.doc_len(1), 3);
        assert_eq!(index.pointers.total_docs(), 1);
        // neither term was promoted, so nothing reached the pool
        assert_eq!(index.pointers.head_pointer(a), None);
        assert_eq!(index.pointers.head_pointer(b), None);
        assert_eq!(index.pool.words_used(), 0);
    }

    #[test]
    fn test_promotion_at_cutoff() {
        // S2: a term in exactly df_cutoff documents gets promoted and is
        // flushed as one residual block at end of stream
        let docs: Vec<(u32, String)> = (1..=9).map(|i| (i, "x".to_string())).collect();
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();
        let index = build(IndexConfig::default(), &doc_refs);

        assert_eq!(chain_docids(&index, "x"), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let x = index.dictionary.term_id("x").unwrap();
        assert_eq!(index.pointers.df(x), 9);
        assert_eq!(chain_blocks(&index, "x").len(), 1);
    }

    #[test]
    fn test_below_cutoff_never_flushed() {
        let docs: Vec<(u32, String)> = (1..=8).map(|i| (i, "y".to_string())).collect();
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();
        let index = build(IndexConfig::default(), &doc_refs);
        let y = index.dictionary.term_id("y").unwrap();
        assert_eq!(index.pointers.df(y), 8);
        assert_eq!(index.pointers.head_pointer(y), None);
    }

    #[test]
    fn test_exact_block_flush_positional() {
        // S3: 128 single-occurrence documents make exactly one full block
        let config = IndexConfig {
            mode: PostingsMode::Positional,
            ..Default::default()
        };
        let docs: Vec<(u32, String)> = (1..=128).map(|i| (i, "y".to_string())).collect();
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();
        let index = build(config, &doc_refs);

        let blocks = chain_blocks(&index, "y");
        assert_eq!(blocks.len(), 1);
        let p = blocks[0];
        assert_eq!(index.pool.block_len(p), 128);
        assert_eq!(index.pool.block_max_docid(p), 128);

        let expect: Vec<u32> = (1..=128).collect();
        assert_eq!(chain_docids(&index, "y"), expect);

        let mut tf = [0u32; BLOCK_SIZE];
        let n = index.pool.decompress_tf_block(p, &mut tf);
        assert!(tf[..n].iter().all(|&t| t == 1));

        // every document holds the term at position 1
        let mut stream = vec![0u32; index.pool.num_position_blocks(p) * BLOCK_SIZE];
        let plen = index.pool.decompress_position_blocks(p, &mut stream);
        assert_eq!(plen, 128);
        assert!(stream[..plen].iter().all(|&x| x == 1));
    }

    #[test]
    fn test_block_roll_at_129() {
        // boundary: B + 1 postings split into a full and a residual block
        let docs: Vec<(u32, String)> = (1..=129).map(|i| (i, "z".to_string())).collect();
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();
        let config = IndexConfig {
            max_blocks: 1,
            ..Default::default()
        };
        let index = build(config, &doc_refs);

        let blocks = chain_blocks(&index, "z");
        assert_eq!(blocks.len(), 2);
        assert_eq!(index.pool.block_len(blocks[0]), 128);
        assert_eq!(index.pool.block_len(blocks[1]), 1);
        let expect: Vec<u32> = (1..=129).collect();
        assert_eq!(chain_docids(&index, "z"), expect);
    }

    #[test]
    fn test_buffer_expansion_defers_flush() {
        // with growth enabled the second flush happens at 128 + 256
        let docs: Vec<(u32, String)> = (1..=500).map(|i| (i, "w".to_string())).collect();
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();
        let config = IndexConfig {
            max_blocks: 4,
            ..Default::default()
        };
        let index = build(config, &doc_refs);

        let expect: Vec<u32> = (1..=500).collect();
        assert_eq!(chain_docids(&index, "w"), expect);

        // chain max docids are strictly increasing
        let blocks = chain_blocks(&index, "w");
        let maxes: Vec<u32> = blocks
            .iter()
            .map(|&p| index.pool.block_max_docid(p))
            .collect();
        assert!(maxes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_reverse_mode_chain() {
        // S5: a reverse index reads back newest-first, docids descending
        let config = IndexConfig {
            reverse: true,
            mode: PostingsMode::DocidsTf,
            max_blocks: 1,
            ..Default::default()
        };
        let docs: Vec<(u32, String)> = (1..=300).map(|i| (i, "z z".to_string())).collect();
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();
        let index = build(config, &doc_refs);

        // chain order is the reverse of ingestion order
        let expect: Vec<u32> = (1..=300).rev().collect();
        assert_eq!(chain_docids(&index, "z"), expect);

        let blocks = chain_blocks(&index, "z");
        assert!(blocks.len() > 1);
        let maxes: Vec<u32> = blocks
            .iter()
            .map(|&p| index.pool.block_max_docid(p))
            .collect();
        assert!(maxes.windows(2).all(|w| w[0] > w[1]));

        let mut tf = [0u32; BLOCK_SIZE];
        let n = index.pool.decompress_tf_block(blocks[0], &mut tf);
        assert!(tf[..n].iter().all(|&t| t == 2));
    }

    #[test]
    fn test_repeated_term_positions() {
        // a document of one repeated term: tf = doc_len, positions 1..n
        let config = IndexConfig {
            mode: PostingsMode::Positional,
            df_cutoff: 1,
            ..Default::default()
        };
        let index = build(config, &[(1, "q q q q q"), (2, "q")]);
        let q = index.dictionary.term_id("q").unwrap();
        assert_eq!(index.pointers.cf(q), 6);

        let blocks = chain_blocks(&index, "q");
        assert_eq!(blocks.len(), 1);
        let p = blocks[0];
        let mut tf = [0u32; BLOCK_SIZE];
        let n = index.pool.decompress_tf_block(p, &mut tf);
        assert_eq!(&tf[..n], &[5, 1]);

        let mut out = Vec::new();
        index.pool.positions_for(p, &tf[..n], 0, &mut out);
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
        index.pool.positions_for(p, &tf[..n], 1, &mut out);
        assert_eq!(out, vec![1]);
    }

    #[test]
    fn test_df_cf_accounting_multi_term() {
        let config = IndexConfig {
            mode: PostingsMode::DocidsTf,
            df_cutoff: 2,
            ..Default::default()
        };
        let index = build(
            config,
            &[(1, "a b a"), (2, "b c"), (3, "a a a"), (4, "c b a")],
        );
        let a = index.dictionary.term_id("a").unwrap();
        let b = index.dictionary.term_id("b").unwrap();
        let c = index.dictionary.term_id("c").unwrap();
        assert_eq!(index.pointers.df(a), 3);
        assert_eq!(index.pointers.cf(a), 6);
        assert_eq!(index.pointers.df(b), 3);
        assert_eq!(index.pointers.cf(b), 3);
        assert_eq!(index.pointers.df(c), 2);
        assert_eq!(index.pointers.cf(c), 2);

        assert_eq!(chain_docids(&index, "a"), vec![1, 3, 4]);
        assert_eq!(chain_docids(&index, "b"), vec![1, 2, 4]);
        assert_eq!(chain_docids(&index, "c"), vec![2, 4]);

        // df equals the docids reachable from the head pointer
        for term in ["a", "b", "c"] {
            let id = index.dictionary.term_id(term).unwrap();
            assert_eq!(
                index.pointers.df(id) as usize,
                chain_docids(&index, term).len()
            );
        }
    }

    #[test]
    fn test_max_bm25_tf_dominates() {
        let config = IndexConfig {
            mode: PostingsMode::DocidsTf,
            df_cutoff: 1,
            ..Default::default()
        };
        let docs = &[
            (1, "m m m filler filler filler filler filler"),
            (2, "m"),
            (3, "m m filler"),
        ];
        let index = build(config, docs);
        let m = index.dictionary.term_id("m").unwrap();

        let avg = index.pointers.avg_doc_len();
        let bm25 = Bm25Params::default();
        let stored = bm25.tf_component(
            index.pointers.max_tf(m),
            index.pointers.max_tf_doc_len(m),
            avg,
        );
        for (tf, dl) in [(3u32, 8u32), (1, 1), (2, 3)] {
            assert!(stored + 1e-6 >= bm25.tf_component(tf, dl, avg));
        }
    }

    #[test]
    fn test_docid_order_enforced() {
        let mut indexer = Indexer::new(IndexConfig::default()).unwrap();
        indexer.index_document(5, "a".split_whitespace()).unwrap();
        let err = indexer
            .index_document(5, "a".split_whitespace())
            .unwrap_err();
        assert!(matches!(err, IndexError::DocidOrder { .. }));

        let err = indexer
            .index_document(4, "a".split_whitespace())
            .unwrap_err();
        assert!(matches!(err, IndexError::DocidOrder { .. }));
    }

    #[test]
    fn test_docid_zero_rejected() {
        let mut indexer = Indexer::new(IndexConfig::default()).unwrap();
        let err = indexer
            .index_document(0, "a".split_whitespace())
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidDocid(0)));
    }

    #[test]
    fn test_index_line_parsing() {
        let mut indexer = Indexer::new(IndexConfig::default()).unwrap();
        indexer.index_line("1\thello world hello").unwrap();
        assert!(indexer.index_line("no tab here").is_err());
        assert!(indexer.index_line("abc\ttokens").is_err());
        let index = indexer.finish().unwrap();
        assert_eq!(index.pointers.doc_len(1), 3);
        let hello = index.dictionary.term_id("hello").unwrap();
        assert_eq!(index.pointers.cf(hello), 2);
    }

    #[test]
    fn test_document_vectors_recorded() {
        let config = IndexConfig {
            vectors: true,
            ..Default::default()
        };
        let index = build(config, &[(1, "a b a c")]);
        let vectors = index.vectors.as_ref().unwrap();
        assert_eq!(vectors.get(1, 4).unwrap(), vec![0, 1, 0, 2]);
    }
}
