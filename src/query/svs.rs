//! Conjunctive intersection (SvS)
//!
//! The shortest postings list seeds the candidate set; every further list
//! probes the candidates with a resumable block cursor, skipping whole
//! blocks by their `max_docid` word and decoding each touched block once.

use crate::codec::BLOCK_SIZE;
use crate::pointer::SegmentPointer;
use crate::pool::SegmentPool;

use super::PostingsCursor;

/// Intersect chains (heads sorted by ascending df) and return up to `hits`
/// docids in chain order
pub(crate) fn intersect(pool: &SegmentPool, heads: &[SegmentPointer], hits: usize) -> Vec<u32> {
    let mut candidates = Vec::new();
    let mut block = [0u32; BLOCK_SIZE];
    let mut cur = Some(heads[0]);
    while let Some(p) = cur {
        let n = pool.decompress_docid_block(p, &mut block);
        candidates.extend_from_slice(&block[..n]);
        cur = pool.next(p);
    }

    for &head in &heads[1..] {
        let mut cursor = PostingsCursor::new(pool, head);
        candidates.retain(|&c| cursor.skip_to(c) && cursor.doc() == c);
        if candidates.is_empty() {
            break;
        }
    }

    candidates.truncate(hits);
    candidates
}
