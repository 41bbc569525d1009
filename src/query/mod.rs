//! Query evaluation over postings chains
//!
//! All algorithms receive resolved head pointers and walk chains through a
//! block cursor that skips whole blocks by their `max_docid` word and
//! decodes a block at most once per touched position. Conjunctive
//! algorithms (SvS, BWAND_AND) return docids in chain order; disjunctive
//! ones (WAND, MBWAND, BWAND_OR) return scored top-k results.

mod svs;
mod wand;
mod bwand;

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::codec::BLOCK_SIZE;
use crate::error::SearchError;
use crate::index::InvertedIndex;
use crate::pointer::SegmentPointer;
use crate::pool::SegmentPool;
use crate::score::{idf, Bm25Params};

/// Default result count for disjunctive algorithms when `hits` is not given
/// (conjunctive algorithms default to the smallest query-term df)
pub const DEFAULT_HITS: usize = 1000;

/// Retrieval algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Conjunctive sort-merge intersection
    Svs,
    /// Disjunctive top-k BM25 with upper-bound pruning
    Wand,
    /// WAND driver with IDF bounds and IDF-sum (impact) scoring
    Mbwand,
    /// Disjunctive IDF sum over Bloom filter chains
    BwandOr,
    /// Conjunctive membership over Bloom filter chains
    BwandAnd,
}

impl Algorithm {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "svs" => Some(Self::Svs),
            "wand" => Some(Self::Wand),
            "mbwand" => Some(Self::Mbwand),
            "bwand_or" => Some(Self::BwandOr),
            "bwand_and" => Some(Self::BwandAnd),
            _ => None,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            Self::Svs => "SvS",
            Self::Wand => "WAND",
            Self::Mbwand => "MBWAND",
            Self::BwandOr => "BWAND_OR",
            Self::BwandAnd => "BWAND_AND",
        }
    }

    /// Conjunctive algorithms default `hits` to the minimum df and return
    /// plain docids
    pub fn conjunctive(&self) -> bool {
        matches!(self, Self::Svs | Self::BwandAnd)
    }

    fn needs_bloom(&self) -> bool {
        matches!(self, Self::BwandOr | Self::BwandAnd)
    }
}

/// One scored hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedDoc {
    pub docid: u32,
    pub score: f32,
}

/// Result of a query: docids in chain order, or scored top-k
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Docids(Vec<u32>),
    Ranked(Vec<RankedDoc>),
}

impl QueryOutput {
    pub fn len(&self) -> usize {
        match self {
            Self::Docids(v) => v.len(),
            Self::Ranked(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evaluate one query over the index.
///
/// Tokens without a dictionary entry or without postings in the pool are
/// dropped; an effectively empty query returns an empty result. `hits`
/// defaults to the smallest query-term df for conjunctive algorithms and to
/// [`DEFAULT_HITS`] otherwise.
pub fn search(
    index: &InvertedIndex,
    algorithm: Algorithm,
    tokens: &[&str],
    hits: Option<usize>,
    bm25: &Bm25Params,
) -> Result<QueryOutput, SearchError> {
    if algorithm.needs_bloom() && index.pool.bloom().is_none() {
        return Err(SearchError::BloomRequired(algorithm.as_name()));
    }
    if algorithm == Algorithm::Wand && !index.pool.mode().has_tf() {
        return Err(SearchError::TfRequired(algorithm.as_name()));
    }

    // resolve tokens, dropping unknown and postings-free terms
    let mut terms: Vec<(u32, SegmentPointer, u32)> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Some(id) = index.dictionary.term_id(token) {
            if let Some(head) = index.pointers.head_pointer(id) {
                terms.push((id, head, index.pointers.df(id)));
            }
        }
    }
    if terms.is_empty() {
        return Ok(if algorithm.conjunctive() {
            QueryOutput::Docids(Vec::new())
        } else {
            QueryOutput::Ranked(Vec::new())
        });
    }

    // term order: ascending df everywhere except the WAND family, which
    // keeps query order and sorts its own cursors by docid
    if matches!(
        algorithm,
        Algorithm::Svs | Algorithm::BwandAnd | Algorithm::BwandOr
    ) {
        terms.sort_by_key(|&(_, _, df)| df);
    }

    let min_df = terms.iter().map(|&(_, _, df)| df).min().unwrap() as usize;
    let hits = hits.unwrap_or(if algorithm.conjunctive() {
        min_df
    } else {
        DEFAULT_HITS
    });

    let heads: Vec<SegmentPointer> = terms.iter().map(|&(_, h, _)| h).collect();
    let dfs: Vec<u32> = terms.iter().map(|&(_, _, df)| df).collect();
    let total_docs = index.pointers.total_docs();

    Ok(match algorithm {
        Algorithm::Svs => QueryOutput::Docids(svs::intersect(&index.pool, &heads, hits)),
        Algorithm::Wand | Algorithm::Mbwand => {
            let idf_only = algorithm == Algorithm::Mbwand;
            let avg = index.pointers.avg_doc_len();
            let upper_bounds: Vec<f32> = terms
                .iter()
                .map(|&(id, _, df)| {
                    if idf_only {
                        idf(total_docs, df)
                    } else {
                        bm25.score(
                            index.pointers.max_tf(id),
                            df,
                            total_docs,
                            index.pointers.max_tf_doc_len(id),
                            avg,
                        )
                    }
                })
                .collect();
            QueryOutput::Ranked(wand::wand(
                &index.pool,
                &index.pointers,
                bm25,
                &heads,
                &dfs,
                &upper_bounds,
                hits,
                idf_only,
            ))
        }
        Algorithm::BwandOr => {
            let idfs: Vec<f32> = dfs.iter().map(|&df| idf(total_docs, df)).collect();
            QueryOutput::Ranked(bwand::bwand_or(&index.pool, &heads, &idfs, hits))
        }
        Algorithm::BwandAnd => QueryOutput::Docids(bwand::bwand_and(&index.pool, &heads, hits)),
    })
}

/// Block-at-a-time chain cursor.
///
/// States: fresh (head block decoded on creation), ready (some block
/// decoded, `doc()` valid), exhausted (`ptr` is `None`). Whole blocks are
/// skipped by their `max_docid` word without decoding; a landed-on block is
/// decoded once, its tf run only on demand.
pub(crate) struct PostingsCursor<'a> {
    pool: &'a SegmentPool,
    ptr: Option<SegmentPointer>,
    docids: [u32; BLOCK_SIZE],
    tfs: [u32; BLOCK_SIZE],
    len: usize,
    pos: usize,
    tf_loaded: bool,
}

impl<'a> PostingsCursor<'a> {
    pub fn new(pool: &'a SegmentPool, head: SegmentPointer) -> Self {
        let mut cursor = Self {
            pool,
            ptr: Some(head),
            docids: [0; BLOCK_SIZE],
            tfs: [0; BLOCK_SIZE],
            len: 0,
            pos: 0,
            tf_loaded: false,
        };
        cursor.load_block();
        cursor
    }

    fn load_block(&mut self) {
        if let Some(p) = self.ptr {
            self.len = self.pool.decompress_docid_block(p, &mut self.docids);
            self.pos = 0;
            self.tf_loaded = false;
        }
    }

    pub fn exhausted(&self) -> bool {
        self.ptr.is_none()
    }

    /// Current docid; only valid while not exhausted
    pub fn doc(&self) -> u32 {
        self.docids[self.pos]
    }

    /// Term frequency at the current posting (tf modes only)
    pub fn tf(&mut self) -> u32 {
        if !self.tf_loaded {
            if let Some(p) = self.ptr {
                self.pool.decompress_tf_block(p, &mut self.tfs);
                self.tf_loaded = true;
            }
        }
        self.tfs[self.pos]
    }

    /// Step to the next posting; false once the chain is exhausted
    pub fn advance(&mut self) -> bool {
        if self.ptr.is_none() {
            return false;
        }
        self.pos += 1;
        if self.pos >= self.len {
            self.ptr = self.pool.next(self.ptr.unwrap());
            self.load_block();
        }
        self.ptr.is_some()
    }

    /// Move to the first posting whose docid does not precede `d` in pool
    /// order; false once the chain is exhausted
    pub fn skip_to(&mut self, d: u32) -> bool {
        let mut moved = false;
        while let Some(p) = self.ptr {
            if self.pool.doc_lt(self.pool.block_max_docid(p), d) {
                self.ptr = self.pool.next(p);
                moved = true;
            } else {
                break;
            }
        }
        if self.ptr.is_none() {
            return false;
        }
        if moved {
            self.load_block();
        }
        while self.pos < self.len && self.pool.doc_lt(self.docids[self.pos], d) {
            self.pos += 1;
        }
        debug_assert!(self.pos < self.len);
        true
    }
}

/// f32 with total ordering for the result heap
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct OrderedFloat(pub f32);

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for OrderedFloat {}

/// Fixed-size min-heap of the best `(score, docid)` pairs seen so far.
///
/// Ties on score keep the smaller docid, matching the pruning rule: a
/// candidate whose bound only equals the threshold cannot enter, and
/// candidates arrive in chain order.
pub(crate) struct TopK {
    heap: BinaryHeap<Reverse<(OrderedFloat, Reverse<u32>)>>,
    k: usize,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k + 1),
            k,
        }
    }

    /// Score a new entry must beat to make the heap once it is full
    pub fn threshold(&self) -> f32 {
        if self.heap.len() < self.k {
            f32::NEG_INFINITY
        } else {
            self.heap.peek().map_or(f32::NEG_INFINITY, |r| r.0 .0 .0)
        }
    }

    pub fn insert(&mut self, docid: u32, score: f32) {
        let entry = Reverse((OrderedFloat(score), Reverse(docid)));
        if self.heap.len() < self.k {
            self.heap.push(entry);
        } else if let Some(min) = self.heap.peek() {
            if entry < *min {
                self.heap.pop();
                self.heap.push(entry);
            }
        }
    }

    /// Drain into a vector sorted by descending score, ascending docid
    pub fn into_sorted(self) -> Vec<RankedDoc> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse((score, Reverse(docid)))| RankedDoc {
                docid,
                score: score.0,
            })
            .collect()
    }
}
