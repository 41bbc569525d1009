//! Per-term ingestion buffers
//!
//! Every term starts in a scratch buffer sized by the df cutoff; terms that
//! never reach the cutoff stay there and never touch the pool. Once a term's
//! df reaches the cutoff it is promoted to a block-sized buffer, flushed to
//! the pool whenever full, and optionally doubled after each flush up to a
//! configured cap.
//!
//! Positional buffers interleave bookkeeping with the gap stream: the word
//! at `psum` counts the positions of the current 128-docid block group, the
//! gaps follow it, and the word at `pwrite` holds the raw last position of
//! the current document so the next occurrence can be gap-encoded (that
//! stash is zeroed at document end and is not part of the stream).

use crate::codec::BLOCK_SIZE;
use crate::pool::PostingsMode;

pub(crate) struct TermBuffer {
    pub docids: Vec<u32>,
    pub tfs: Vec<u32>,
    pub positions: Vec<u32>,
    /// Docids buffered so far (also the tf slot of the current document)
    pub write: usize,
    /// Next free slot in the position buffer
    pub pwrite: usize,
    /// Index of the position-count word of the current block group
    pub psum: usize,
}

impl TermBuffer {
    fn new_scratch(mode: PostingsMode, df_cutoff: usize) -> Self {
        Self {
            docids: vec![0; df_cutoff],
            tfs: if mode.has_tf() {
                vec![0; df_cutoff + 1]
            } else {
                Vec::new()
            },
            positions: if mode.is_positional() {
                vec![0; df_cutoff.max(2)]
            } else {
                Vec::new()
            },
            write: 0,
            pwrite: 1,
            psum: 0,
        }
    }

    pub fn promoted(&self) -> bool {
        self.docids.len() >= BLOCK_SIZE
    }

    /// Grow scratch buffers to one full block, keeping buffered entries
    pub fn promote(&mut self, mode: PostingsMode) {
        self.docids.resize(BLOCK_SIZE, 0);
        if mode.has_tf() {
            self.tfs.resize(BLOCK_SIZE, 0);
        }
        if mode.is_positional() {
            let len = self.positions.len();
            self.positions
                .resize(2 * (len / BLOCK_SIZE + 1) * BLOCK_SIZE, 0);
        }
    }

    /// Record one occurrence of the term at `position` in the current
    /// document (tf and positional modes)
    pub fn record_occurrence(&mut self, position: u32, first_in_doc: bool, mode: PostingsMode) {
        if mode.has_tf() {
            self.tfs[self.write] += 1;
        }
        if !mode.is_positional() {
            return;
        }

        while self.positions.len() <= self.pwrite + 1 {
            let len = self.positions.len();
            self.positions.resize(len * 2, 0);
        }

        let pw = self.pwrite;
        if first_in_doc {
            self.positions[pw] = position;
        } else {
            // slot holds the raw previous position; turn it into a gap
            self.positions[pw] = position - self.positions[pw];
        }
        self.positions[pw + 1] = position;
        self.pwrite += 1;
        self.positions[self.psum] += 1;
    }

    /// Clear the raw-position stash once the document is done
    pub fn end_doc(&mut self) {
        self.positions[self.pwrite] = 0;
    }

    pub fn append_docid(&mut self, docid: u32) {
        self.docids[self.write] = docid;
        self.write += 1;
    }

    /// Open a new position block group after every 128 buffered docids
    pub fn mark_block_boundary(&mut self) {
        self.psum = self.pwrite;
        self.pwrite += 1;
    }

    /// Double the docid/tf buffers after a flush, up to `max_words`
    pub fn expand(&mut self, max_words: usize, mode: PostingsMode) {
        let len = self.docids.len();
        if len >= max_words {
            return;
        }
        let new_len = (len * 2).min(max_words);
        self.docids = vec![0; new_len];
        if mode.has_tf() {
            self.tfs = vec![0; new_len];
        }
    }

    pub fn reset_after_flush(&mut self, mode: PostingsMode) {
        self.docids.fill(0);
        self.write = 0;
        if mode.has_tf() {
            self.tfs.fill(0);
        }
        if mode.is_positional() {
            self.positions.fill(0);
            self.pwrite = 1;
            self.psum = 0;
        }
    }
}

/// Sparse, grow-on-demand table of term buffers keyed by dense termid
pub(crate) struct IngestionBuffers {
    terms: Vec<Option<Box<TermBuffer>>>,
    mode: PostingsMode,
    df_cutoff: usize,
}

impl IngestionBuffers {
    pub fn new(mode: PostingsMode, df_cutoff: usize) -> Self {
        Self {
            terms: Vec::new(),
            mode,
            df_cutoff,
        }
    }

    pub fn ensure(&mut self, id: u32) -> &mut TermBuffer {
        let idx = id as usize;
        if idx >= self.terms.len() {
            self.terms.resize_with(idx + 1, || None);
        }
        self.terms[idx]
            .get_or_insert_with(|| Box::new(TermBuffer::new_scratch(self.mode, self.df_cutoff)))
    }

    /// Termids holding a buffer, in id order
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.terms
            .iter()
            .enumerate()
            .filter_map(|(id, b)| b.as_ref().map(|_| id as u32))
    }
}
