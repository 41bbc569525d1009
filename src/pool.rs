//! Segment pool: the append-only block store behind every postings chain
//!
//! The pool owns an ordered sequence of fixed-capacity `u32` arenas. Each
//! flushed postings block is laid out as
//!
//! ```text
//! [reqspace][next_segment][next_offset][max_docid][bloom_base][len][dcsize]
//! [compressed docids...]
//! [tfcsize][compressed tf...]                       (tf and positional modes)
//! [plen][pnb][pnb size-prefixed position blocks...] (positional mode)
//! [filter_words][filter bits...]                    (bloom chains, at bloom_base)
//! ```
//!
//! and addressed by a [`SegmentPointer`]. Blocks of one term form a singly
//! linked chain. Appends always arrive with ascending docids; the pool's
//! `reverse` flag decides the chain orientation:
//!
//! - forward: every append patches the previous block's next-link, chains
//!   run oldest-first and block `max_docid` strictly increases;
//! - reverse: the new block links back to its predecessor, the head moves to
//!   every new block, decoded blocks come out descending, and chains run
//!   newest-first with strictly decreasing `max_docid` words.
//!
//! Either way the `max_docid` word holds the block's maximum under the
//! pool's ordering, so chain skipping is one comparison per block. A block
//! is never moved or rewritten once its successor links to it.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bloom;
use crate::codec::{self, BLOCK_SIZE, MAX_ENCODED_WORDS};
use crate::error::IndexError;
use crate::pointer::SegmentPointer;

/// Marker in a block's `next_segment` word for the end of a chain
const NO_NEXT: u32 = u32::MAX;

/// Fixed header words in front of every block
const HEADER_WORDS: usize = 7;

const W_NEXT_SEG: usize = 1;
const W_NEXT_OFF: usize = 2;
const W_MAX_DOCID: usize = 3;
const W_BLOOM_BASE: usize = 4;
const W_LEN: usize = 5;
const W_DCSIZE: usize = 6;

/// Default arena capacity in words (16 MiB per arena)
pub const DEFAULT_ARENA_CAPACITY: usize = 1 << 22;

/// Smallest accepted arena capacity; anything below risks single blocks
/// overflowing an arena on ordinary input
pub const MIN_ARENA_CAPACITY: usize = 1 << 16;

/// What a postings block carries besides docids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingsMode {
    /// Docids only
    Docids,
    /// Docids and term frequencies
    DocidsTf,
    /// Docids, term frequencies and term positions
    Positional,
}

impl PostingsMode {
    pub fn has_tf(&self) -> bool {
        !matches!(self, PostingsMode::Docids)
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, PostingsMode::Positional)
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "nonpositional" | "docids" => Some(Self::Docids),
            "tfonly" | "tf" => Some(Self::DocidsTf),
            "positional" => Some(Self::Positional),
            _ => None,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            Self::Docids => "nonpositional",
            Self::DocidsTf => "tfonly",
            Self::Positional => "positional",
        }
    }

    fn as_u32(self) -> u32 {
        match self {
            Self::Docids => 0,
            Self::DocidsTf => 1,
            Self::Positional => 2,
        }
    }

    fn from_u32(v: u32) -> Result<Self, IndexError> {
        match v {
            0 => Ok(Self::Docids),
            1 => Ok(Self::DocidsTf),
            2 => Ok(Self::Positional),
            other => Err(IndexError::Corrupted(format!(
                "unknown postings mode {other}"
            ))),
        }
    }
}

/// Bloom filter chain parameters
#[derive(Debug, Clone, Copy)]
pub struct BloomConfig {
    /// Number of hash probes per docid
    pub n_hash: u32,
    /// Filter bits per stored docid
    pub bits_per_element: u32,
}

/// On-disk pool header; also drives the partial per-term chain loader
#[derive(Debug, Clone, Copy)]
pub struct PoolHeader {
    pub mode: PostingsMode,
    pub reverse: bool,
    pub bloom: Option<BloomConfig>,
    pub capacity: usize,
    pub segment: usize,
    pub offset: usize,
}

const INDEX_MAGIC: &[u8; 4] = b"FCIX";
const INDEX_VERSION: u32 = 1;

impl PoolHeader {
    /// Byte length of the serialized header (start of arena data)
    pub const BYTES: u64 = 4 + 4 + 8 * 4;

    pub fn read<R: Read>(reader: &mut R) -> Result<Self, IndexError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != INDEX_MAGIC {
            return Err(IndexError::Corrupted("bad index file magic".into()));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != INDEX_VERSION {
            return Err(IndexError::Corrupted(format!(
                "unsupported index version {version}"
            )));
        }
        let mode = PostingsMode::from_u32(reader.read_u32::<LittleEndian>()?)?;
        let reverse = reader.read_u32::<LittleEndian>()? != 0;
        let bloom_enabled = reader.read_u32::<LittleEndian>()? != 0;
        let n_hash = reader.read_u32::<LittleEndian>()?;
        let bits_per_element = reader.read_u32::<LittleEndian>()?;
        let capacity = reader.read_u32::<LittleEndian>()? as usize;
        let segment = reader.read_u32::<LittleEndian>()? as usize;
        let offset = reader.read_u32::<LittleEndian>()? as usize;
        Ok(Self {
            mode,
            reverse,
            bloom: bloom_enabled.then_some(BloomConfig {
                n_hash,
                bits_per_element,
            }),
            capacity,
            segment,
            offset,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<(), IndexError> {
        writer.write_all(INDEX_MAGIC)?;
        writer.write_u32::<LittleEndian>(INDEX_VERSION)?;
        writer.write_u32::<LittleEndian>(self.mode.as_u32())?;
        writer.write_u32::<LittleEndian>(self.reverse as u32)?;
        writer.write_u32::<LittleEndian>(self.bloom.is_some() as u32)?;
        writer.write_u32::<LittleEndian>(self.bloom.map_or(0, |b| b.n_hash))?;
        writer.write_u32::<LittleEndian>(self.bloom.map_or(0, |b| b.bits_per_element))?;
        writer.write_u32::<LittleEndian>(self.capacity as u32)?;
        writer.write_u32::<LittleEndian>(self.segment as u32)?;
        writer.write_u32::<LittleEndian>(self.offset as u32)?;
        Ok(())
    }
}

/// The arena store holding every compressed postings block
#[derive(Debug)]
pub struct SegmentPool {
    arenas: Vec<Box<[u32]>>,
    /// Arena currently being written
    segment: usize,
    /// Write cursor inside the current arena
    offset: usize,
    capacity: usize,
    mode: PostingsMode,
    reverse: bool,
    bloom: Option<BloomConfig>,
}

impl SegmentPool {
    pub fn new(
        mode: PostingsMode,
        reverse: bool,
        bloom: Option<BloomConfig>,
        capacity: usize,
    ) -> Result<Self, IndexError> {
        if capacity < MIN_ARENA_CAPACITY {
            return Err(IndexError::Config(format!(
                "arena capacity {capacity} below minimum {MIN_ARENA_CAPACITY}"
            )));
        }
        if let Some(b) = bloom {
            if b.n_hash == 0 || b.bits_per_element == 0 {
                return Err(IndexError::Config(
                    "bloom chains need at least one hash and one bit per element".into(),
                ));
            }
        }
        Ok(Self {
            arenas: vec![vec![0u32; capacity].into_boxed_slice()],
            segment: 0,
            offset: 0,
            capacity,
            mode,
            reverse,
            bloom,
        })
    }

    pub fn mode(&self) -> PostingsMode {
        self.mode
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn bloom(&self) -> Option<BloomConfig> {
        self.bloom
    }

    pub fn arena_capacity(&self) -> usize {
        self.capacity
    }

    /// Words currently written across all arenas
    pub fn words_used(&self) -> usize {
        self.segment * self.capacity + self.offset
    }

    /// Pool-order strict comparison: `a` precedes `b` along a chain
    #[inline]
    pub fn doc_lt(&self, a: u32, b: u32) -> bool {
        if self.reverse {
            a > b
        } else {
            a < b
        }
    }

    #[inline]
    fn block(&self, p: SegmentPointer) -> &[u32] {
        &self.arenas[p.segment() as usize][p.offset() as usize..]
    }

    /// Roll to a fresh arena if `reqspace` does not fit the current one
    fn ensure_space(&mut self, reqspace: usize) -> Result<(), IndexError> {
        if reqspace > self.capacity {
            return Err(IndexError::Capacity {
                required: reqspace,
                capacity: self.capacity,
            });
        }
        if reqspace > self.capacity - self.offset {
            self.segment += 1;
            self.offset = 0;
            if self.segment == self.arenas.len() {
                self.arenas
                    .push(vec![0u32; self.capacity].into_boxed_slice());
            }
        }
        Ok(())
    }

    /// Chain the freshly written block to its predecessor.
    ///
    /// Forward pools patch the previous block's next-link; reverse pools
    /// point the new block back at the previous one.
    fn link(&mut self, prev: Option<SegmentPointer>, new: SegmentPointer) {
        let Some(prev) = prev else { return };
        if !self.reverse {
            let arena = &mut self.arenas[prev.segment() as usize];
            let at = prev.offset() as usize;
            arena[at + W_NEXT_SEG] = new.segment();
            arena[at + W_NEXT_OFF] = new.offset();
        } else {
            let arena = &mut self.arenas[new.segment() as usize];
            let at = new.offset() as usize;
            arena[at + W_NEXT_SEG] = prev.segment();
            arena[at + W_NEXT_OFF] = prev.offset();
        }
    }

    /// The block's maximum docid under the pool's ordering: the last docid
    /// of an ascending run for forward pools, the first for reverse pools
    /// (whose chains are traversed from large docids down)
    #[inline]
    fn ordering_max(&self, docids: &[u32]) -> u32 {
        if self.reverse {
            docids[0]
        } else {
            docids[docids.len() - 1]
        }
    }

    fn build_filter(&self, docids: &[u32]) -> Option<Vec<u32>> {
        self.bloom.map(|cfg| {
            let mut filter = vec![0u32; bloom::filter_words(docids.len(), cfg.bits_per_element)];
            for &d in docids {
                bloom::insert(&mut filter, cfg.n_hash, d);
            }
            filter
        })
    }

    /// Compress an ascending docid run into a new block, linked behind
    /// `tail` (the previously appended block of the same term)
    pub fn compress_and_add_non_positional(
        &mut self,
        docids: &[u32],
        tail: Option<SegmentPointer>,
    ) -> Result<SegmentPointer, IndexError> {
        debug_assert_eq!(self.mode, PostingsMode::Docids);
        let len = docids.len();
        debug_assert!(len > 0 && len <= BLOCK_SIZE);

        let max_docid = self.ordering_max(docids);
        let filter = self.build_filter(docids);

        let mut dbuf = [0u32; MAX_ENCODED_WORDS];
        let dcsize = codec::encode(docids, &mut dbuf, true);

        let bloom_base = HEADER_WORDS + dcsize;
        let reqspace = bloom_base + filter.as_ref().map_or(0, |f| 1 + f.len());
        self.ensure_space(reqspace)?;

        let seg = self.segment;
        let at = self.offset;
        let arena = &mut self.arenas[seg];
        arena[at] = reqspace as u32;
        arena[at + W_NEXT_SEG] = NO_NEXT;
        arena[at + W_NEXT_OFF] = 0;
        arena[at + W_MAX_DOCID] = max_docid;
        arena[at + W_BLOOM_BASE] = bloom_base as u32;
        arena[at + W_LEN] = len as u32;
        arena[at + W_DCSIZE] = dcsize as u32;
        arena[at + HEADER_WORDS..at + HEADER_WORDS + dcsize].copy_from_slice(&dbuf[..dcsize]);
        if let Some(f) = &filter {
            arena[at + bloom_base] = f.len() as u32;
            arena[at + bloom_base + 1..at + bloom_base + 1 + f.len()].copy_from_slice(f);
        }

        let ptr = SegmentPointer::new(seg as u32, at as u32);
        self.offset += reqspace;
        self.link(tail, ptr);
        Ok(ptr)
    }

    /// As [`Self::compress_and_add_non_positional`], with a parallel tf run
    pub fn compress_and_add_tf_only(
        &mut self,
        docids: &[u32],
        tfs: &[u32],
        tail: Option<SegmentPointer>,
    ) -> Result<SegmentPointer, IndexError> {
        debug_assert_eq!(self.mode, PostingsMode::DocidsTf);
        let len = docids.len();
        debug_assert!(len > 0 && len <= BLOCK_SIZE);
        debug_assert_eq!(len, tfs.len());

        let max_docid = self.ordering_max(docids);
        let filter = self.build_filter(docids);

        let mut dbuf = [0u32; MAX_ENCODED_WORDS];
        let mut tbuf = [0u32; MAX_ENCODED_WORDS];
        let dcsize = codec::encode(docids, &mut dbuf, true);
        let tfcsize = codec::encode(tfs, &mut tbuf, false);

        let bloom_base = HEADER_WORDS + dcsize + 1 + tfcsize;
        let reqspace = bloom_base + filter.as_ref().map_or(0, |f| 1 + f.len());
        self.ensure_space(reqspace)?;

        let seg = self.segment;
        let at = self.offset;
        let arena = &mut self.arenas[seg];
        arena[at] = reqspace as u32;
        arena[at + W_NEXT_SEG] = NO_NEXT;
        arena[at + W_NEXT_OFF] = 0;
        arena[at + W_MAX_DOCID] = max_docid;
        arena[at + W_BLOOM_BASE] = bloom_base as u32;
        arena[at + W_LEN] = len as u32;
        arena[at + W_DCSIZE] = dcsize as u32;
        arena[at + HEADER_WORDS..at + HEADER_WORDS + dcsize].copy_from_slice(&dbuf[..dcsize]);
        arena[at + HEADER_WORDS + dcsize] = tfcsize as u32;
        arena[at + HEADER_WORDS + dcsize + 1..at + HEADER_WORDS + dcsize + 1 + tfcsize]
            .copy_from_slice(&tbuf[..tfcsize]);
        if let Some(f) = &filter {
            arena[at + bloom_base] = f.len() as u32;
            arena[at + bloom_base + 1..at + bloom_base + 1 + f.len()].copy_from_slice(f);
        }

        let ptr = SegmentPointer::new(seg as u32, at as u32);
        self.offset += reqspace;
        self.link(tail, ptr);
        Ok(ptr)
    }

    /// As [`Self::compress_and_add_tf_only`], plus the block's gap-encoded
    /// position stream. `positions` holds one run per docid in the same
    /// (ascending) order; its length must equal the tf sum.
    pub fn compress_and_add_positional(
        &mut self,
        docids: &[u32],
        tfs: &[u32],
        positions: &[u32],
        tail: Option<SegmentPointer>,
    ) -> Result<SegmentPointer, IndexError> {
        debug_assert_eq!(self.mode, PostingsMode::Positional);
        let len = docids.len();
        let plen = positions.len();
        debug_assert!(len > 0 && len <= BLOCK_SIZE);
        debug_assert_eq!(len, tfs.len());
        debug_assert_eq!(plen as u64, tfs.iter().map(|&t| t as u64).sum::<u64>());

        let max_docid = self.ordering_max(docids);
        let filter = self.build_filter(docids);

        let mut dbuf = [0u32; MAX_ENCODED_WORDS];
        let mut tbuf = [0u32; MAX_ENCODED_WORDS];
        let dcsize = codec::encode(docids, &mut dbuf, true);
        let tfcsize = codec::encode(tfs, &mut tbuf, false);

        // positions split into 128-entry sub-blocks, each with a size prefix
        let pnb = (plen + BLOCK_SIZE - 1) / BLOCK_SIZE;
        let mut pblock = Vec::with_capacity(pnb * (MAX_ENCODED_WORDS + 1));
        let mut sbuf = [0u32; MAX_ENCODED_WORDS];
        for chunk in positions.chunks(BLOCK_SIZE) {
            let sb = codec::encode(chunk, &mut sbuf, false);
            pblock.push(sb as u32);
            pblock.extend_from_slice(&sbuf[..sb]);
        }
        let pcsize = pblock.len();

        let bloom_base = HEADER_WORDS + dcsize + 1 + tfcsize + 2 + pcsize;
        let reqspace = bloom_base + filter.as_ref().map_or(0, |f| 1 + f.len());
        self.ensure_space(reqspace)?;

        let seg = self.segment;
        let at = self.offset;
        let arena = &mut self.arenas[seg];
        arena[at] = reqspace as u32;
        arena[at + W_NEXT_SEG] = NO_NEXT;
        arena[at + W_NEXT_OFF] = 0;
        arena[at + W_MAX_DOCID] = max_docid;
        arena[at + W_BLOOM_BASE] = bloom_base as u32;
        arena[at + W_LEN] = len as u32;
        arena[at + W_DCSIZE] = dcsize as u32;
        arena[at + HEADER_WORDS..at + HEADER_WORDS + dcsize].copy_from_slice(&dbuf[..dcsize]);
        let mut idx = at + HEADER_WORDS + dcsize;
        arena[idx] = tfcsize as u32;
        arena[idx + 1..idx + 1 + tfcsize].copy_from_slice(&tbuf[..tfcsize]);
        idx += 1 + tfcsize;
        arena[idx] = plen as u32;
        arena[idx + 1] = pnb as u32;
        arena[idx + 2..idx + 2 + pcsize].copy_from_slice(&pblock);
        if let Some(f) = &filter {
            arena[at + bloom_base] = f.len() as u32;
            arena[at + bloom_base + 1..at + bloom_base + 1 + f.len()].copy_from_slice(f);
        }

        let ptr = SegmentPointer::new(seg as u32, at as u32);
        self.offset += reqspace;
        self.link(tail, ptr);
        Ok(ptr)
    }

    /// Pointer to the block after `p` in its chain, if any
    pub fn next(&self, p: SegmentPointer) -> Option<SegmentPointer> {
        let b = self.block(p);
        if b[W_NEXT_SEG] == NO_NEXT {
            None
        } else {
            Some(SegmentPointer::new(b[W_NEXT_SEG], b[W_NEXT_OFF]))
        }
    }

    /// Number of docids stored in the block at `p`
    pub fn block_len(&self, p: SegmentPointer) -> usize {
        self.block(p)[W_LEN] as usize
    }

    /// The block's maximum docid under the pool's ordering
    pub fn block_max_docid(&self, p: SegmentPointer) -> u32 {
        self.block(p)[W_MAX_DOCID]
    }

    /// Decode the docid run at `p` into `out` (native order: ascending for
    /// forward pools, descending for reverse pools); returns `len`
    pub fn decompress_docid_block(&self, p: SegmentPointer, out: &mut [u32]) -> usize {
        let b = self.block(p);
        codec::decode(&b[HEADER_WORDS..], out, true, self.reverse)
    }

    /// Decode the tf run at `p` into `out` (native order); returns `len`
    pub fn decompress_tf_block(&self, p: SegmentPointer, out: &mut [u32]) -> usize {
        debug_assert!(self.mode.has_tf());
        let b = self.block(p);
        let dcsize = b[W_DCSIZE] as usize;
        codec::decode(&b[HEADER_WORDS + 1 + dcsize..], out, false, self.reverse)
    }

    /// Index of the `plen` word inside a positional block
    fn position_area(&self, b: &[u32]) -> usize {
        let dcsize = b[W_DCSIZE] as usize;
        let tfcsize = b[HEADER_WORDS + dcsize] as usize;
        HEADER_WORDS + dcsize + 1 + tfcsize
    }

    /// Number of 128-position sub-blocks in the block at `p`
    pub fn num_position_blocks(&self, p: SegmentPointer) -> usize {
        debug_assert!(self.mode.is_positional());
        let b = self.block(p);
        b[self.position_area(b) + 1] as usize
    }

    /// Decode the whole position stream of the block at `p`.
    ///
    /// `out` must hold `num_position_blocks(p) * 128` words. Returns the
    /// number of positions. The stream stays in stored (ascending-docid)
    /// order and gap form; [`Self::positions_for`] resolves one docid's
    /// absolute positions.
    pub fn decompress_position_blocks(&self, p: SegmentPointer, out: &mut [u32]) -> usize {
        debug_assert!(self.mode.is_positional());
        let b = self.block(p);
        let pa = self.position_area(b);
        let plen = b[pa] as usize;
        let pnb = b[pa + 1] as usize;
        let mut idx = pa + 2;
        for i in 0..pnb {
            let sb = b[idx] as usize;
            codec::decode(&b[idx + 1..], &mut out[i * BLOCK_SIZE..], false, false);
            idx += sb + 1;
        }
        plen
    }

    /// Absolute positions of the `index`-th docid of the block at `p`.
    ///
    /// `tf` is the block's tf run in stored (ascending-docid) order and
    /// `index` counts in the same order. Skips whole sub-blocks ahead of the
    /// run, slices it (runs may straddle sub-block boundaries), then
    /// prefix-sums the gaps.
    pub fn positions_for(
        &self,
        p: SegmentPointer,
        tf: &[u32],
        index: usize,
        out: &mut Vec<u32>,
    ) {
        debug_assert!(self.mode.is_positional());
        out.clear();
        let count = tf[index] as usize;
        if count == 0 {
            return;
        }
        let skip: usize = tf[..index].iter().map(|&t| t as usize).sum();

        let b = self.block(p);
        let pa = self.position_area(b);
        let first_sb = skip / BLOCK_SIZE;
        let last_sb = (skip + count - 1) / BLOCK_SIZE;

        let mut idx = pa + 2;
        for _ in 0..first_sb {
            idx += b[idx] as usize + 1;
        }

        out.reserve(count);
        let mut tmp = [0u32; BLOCK_SIZE];
        let mut start = skip % BLOCK_SIZE;
        let mut remaining = count;
        for _ in first_sb..=last_sb {
            let n = codec::decode(&b[idx + 1..], &mut tmp, false, false);
            let take = remaining.min(n - start);
            out.extend_from_slice(&tmp[start..start + take]);
            idx += b[idx] as usize + 1;
            remaining -= take;
            start = 0;
        }

        for i in 1..out.len() {
            out[i] += out[i - 1];
        }
    }

    /// Resumable membership test along a chain.
    ///
    /// Advances `pointer` while the block's `max_docid` precedes `docid` in
    /// pool order. An exact `max_docid` hit answers true; otherwise the
    /// candidate block's Bloom filter decides (or, on pools without filters,
    /// an exact block decode). `pointer` is left at the inspected block so
    /// later probes with later docids resume instead of rescanning; it
    /// becomes `None` when the chain is exhausted.
    pub fn contains_docid(&self, docid: u32, pointer: &mut Option<SegmentPointer>) -> bool {
        let Some(mut p) = *pointer else {
            return false;
        };
        loop {
            let b = self.block(p);
            if !self.doc_lt(b[W_MAX_DOCID], docid) {
                break;
            }
            if b[W_NEXT_SEG] == NO_NEXT {
                *pointer = None;
                return false;
            }
            p = SegmentPointer::new(b[W_NEXT_SEG], b[W_NEXT_OFF]);
        }
        *pointer = Some(p);

        let b = self.block(p);
        if b[W_MAX_DOCID] == docid {
            return true;
        }
        if let Some(cfg) = self.bloom {
            let base = b[W_BLOOM_BASE] as usize;
            let fw = b[base] as usize;
            bloom::contains(&b[base + 1..base + 1 + fw], cfg.n_hash, docid)
        } else {
            let mut buf = [0u32; BLOCK_SIZE];
            let n = self.decompress_docid_block(p, &mut buf);
            buf[..n].contains(&docid)
        }
    }

    pub fn header(&self) -> PoolHeader {
        PoolHeader {
            mode: self.mode,
            reverse: self.reverse,
            bloom: self.bloom,
            capacity: self.capacity,
            segment: self.segment,
            offset: self.offset,
        }
    }

    /// Serialize header, all full arenas, then the partial tail arena
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), IndexError> {
        self.header().write(writer)?;
        for arena in &self.arenas[..self.segment] {
            for &w in arena.iter() {
                writer.write_u32::<LittleEndian>(w)?;
            }
        }
        for &w in &self.arenas[self.segment][..self.offset] {
            writer.write_u32::<LittleEndian>(w)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, IndexError> {
        let header = PoolHeader::read(reader)?;
        let mut pool = Self::new(header.mode, header.reverse, header.bloom, header.capacity)?;
        for seg in 0..=header.segment {
            let words = if seg == header.segment {
                header.offset
            } else {
                header.capacity
            };
            if seg == pool.arenas.len() {
                pool.arenas
                    .push(vec![0u32; header.capacity].into_boxed_slice());
            }
            let arena = &mut pool.arenas[seg];
            for w in arena.iter_mut().take(words) {
                *w = reader.read_u32::<LittleEndian>()?;
            }
        }
        pool.segment = header.segment;
        pool.offset = header.offset;
        Ok(pool)
    }

    /// Copy one term's chain out of an on-disk pool into this (fresh) pool,
    /// rewriting every next-link to the relocated addresses. Returns the
    /// head of the copied chain.
    ///
    /// `src` is the header of the file behind `reader`; this pool must have
    /// been created with the same mode and flags.
    pub fn read_postings_for_term<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        src: &PoolHeader,
        head: SegmentPointer,
    ) -> Result<SegmentPointer, IndexError> {
        let mut new_head = None;
        let mut prev: Option<SegmentPointer> = None;
        let mut cur = Some(head);

        while let Some(p) = cur {
            let pos = PoolHeader::BYTES
                + (p.segment() as u64 * src.capacity as u64 + p.offset() as u64) * 4;
            reader.seek(SeekFrom::Start(pos))?;
            let reqspace = reader.read_u32::<LittleEndian>()? as usize;
            if reqspace < HEADER_WORDS {
                return Err(IndexError::Corrupted("postings block too short".into()));
            }
            self.ensure_space(reqspace)?;

            let seg = self.segment;
            let at = self.offset;
            {
                let arena = &mut self.arenas[seg];
                arena[at] = reqspace as u32;
                for w in arena[at + 1..at + reqspace].iter_mut() {
                    *w = reader.read_u32::<LittleEndian>()?;
                }
                cur = if arena[at + W_NEXT_SEG] == NO_NEXT {
                    None
                } else {
                    Some(SegmentPointer::new(
                        arena[at + W_NEXT_SEG],
                        arena[at + W_NEXT_OFF],
                    ))
                };
                arena[at + W_NEXT_SEG] = NO_NEXT;
                arena[at + W_NEXT_OFF] = 0;
            }

            let ptr = SegmentPointer::new(seg as u32, at as u32);
            self.offset += reqspace;
            if let Some(pp) = prev {
                let arena = &mut self.arenas[pp.segment() as usize];
                let pat = pp.offset() as usize;
                arena[pat + W_NEXT_SEG] = ptr.segment();
                arena[pat + W_NEXT_OFF] = ptr.offset();
            }
            if new_head.is_none() {
                new_head = Some(ptr);
            }
            prev = Some(ptr);
        }

        new_head.ok_or_else(|| IndexError::Corrupted("empty postings chain".into()))
    }
}
