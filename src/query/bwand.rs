//! Boolean retrieval over Bloom filter chains (BWAND)
//!
//! Both variants walk the shortest postings list exactly and test every
//! candidate against the other terms' chains with resumable
//! `contains_docid` probes. BWAND_AND keeps candidates present in every
//! chain; BWAND_OR scores candidates by the IDF sum of their matching
//! terms. False positives of the filters can surface extra candidates, at
//! the configured filter rate.

use crate::pointer::SegmentPointer;
use crate::pool::SegmentPool;

use super::{PostingsCursor, RankedDoc, TopK};

/// Conjunction: up to `hits` docids of the shortest list found in every
/// other chain, in chain order
pub(crate) fn bwand_and(pool: &SegmentPool, heads: &[SegmentPointer], hits: usize) -> Vec<u32> {
    let mut results = Vec::new();
    let mut probes: Vec<Option<SegmentPointer>> =
        heads[1..].iter().map(|&h| Some(h)).collect();

    let mut cursor = PostingsCursor::new(pool, heads[0]);
    loop {
        let docid = cursor.doc();
        if probes
            .iter_mut()
            .all(|probe| pool.contains_docid(docid, probe))
        {
            results.push(docid);
            if results.len() >= hits {
                break;
            }
        }
        if !cursor.advance() {
            break;
        }
    }
    results
}

/// Disjunction over the shortest list's candidates: IDF-weighted membership
/// sum, top-k. `idfs` aligns with `heads`.
pub(crate) fn bwand_or(
    pool: &SegmentPool,
    heads: &[SegmentPointer],
    idfs: &[f32],
    hits: usize,
) -> Vec<RankedDoc> {
    let mut heap = TopK::new(hits);
    let mut probes: Vec<Option<SegmentPointer>> =
        heads[1..].iter().map(|&h| Some(h)).collect();

    let mut cursor = PostingsCursor::new(pool, heads[0]);
    loop {
        let docid = cursor.doc();
        let mut score = idfs[0];
        for (probe, &weight) in probes.iter_mut().zip(&idfs[1..]) {
            if pool.contains_docid(docid, probe) {
                score += weight;
            }
        }
        heap.insert(docid, score);
        if !cursor.advance() {
            break;
        }
    }
    heap.into_sorted()
}

#[cfg(test)]
mod tests {
    use crate::indexer::IndexConfig;
    use crate::pool::BloomConfig;
    use crate::query::tests::build_index;
    use crate::query::{search, Algorithm, QueryOutput, RankedDoc};
    use crate::score::Bm25Params;

    fn bloom_config() -> IndexConfig {
        IndexConfig {
            df_cutoff: 2,
            bloom: Some(BloomConfig {
                n_hash: 3,
                bits_per_element: 16,
            }),
            ..Default::default()
        }
    }

    fn alternating_docs(n: u32) -> Vec<(u32, String)> {
        (1..=n)
            .map(|i| {
                let text = if i % 2 == 0 { "a b" } else { "a" };
                (i, text.to_string())
            })
            .collect()
    }

    fn and_query(index: &crate::index::InvertedIndex, tokens: &[&str], hits: usize) -> Vec<u32> {
        match search(
            index,
            Algorithm::BwandAnd,
            tokens,
            Some(hits),
            &Bm25Params::default(),
        )
        .unwrap()
        {
            QueryOutput::Docids(v) => v,
            QueryOutput::Ranked(_) => unreachable!(),
        }
    }

    fn or_query(
        index: &crate::index::InvertedIndex,
        tokens: &[&str],
        hits: usize,
    ) -> Vec<RankedDoc> {
        match search(
            index,
            Algorithm::BwandOr,
            tokens,
            Some(hits),
            &Bm25Params::default(),
        )
        .unwrap()
        {
            QueryOutput::Ranked(v) => v,
            QueryOutput::Docids(_) => unreachable!(),
        }
    }

    #[test]
    fn test_bwand_and_finds_conjunction() {
        let docs = alternating_docs(300);
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();
        let index = build_index(bloom_config(), &doc_refs);

        // membership has no false negatives: every even docid must appear
        let out = and_query(&index, &["a", "b"], 5);
        assert_eq!(out, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_bwand_and_no_false_negatives_full_run() {
        let docs = alternating_docs(300);
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();
        let index = build_index(bloom_config(), &doc_refs);

        let out = and_query(&index, &["a", "b"], 1000);
        let expect: Vec<u32> = (1..=150).map(|i| i * 2).collect();
        // filters may admit extra docids but never drop a true member
        for d in expect {
            assert!(out.contains(&d), "dropped true member {d}");
        }
    }

    #[test]
    fn test_bwand_or_prefers_docs_matching_both() {
        let docs = alternating_docs(100);
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();
        let index = build_index(bloom_config(), &doc_refs);

        let out = or_query(&index, &["b", "a"], 10);
        assert_eq!(out.len(), 10);
        // docs holding both terms (evens) outscore single-term docs; within
        // a tie the smaller docid ranks first
        assert!(out[0].docid % 2 == 0);
        assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_bwand_or_single_term() {
        let docs = alternating_docs(40);
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();
        let index = build_index(bloom_config(), &doc_refs);

        let out = or_query(&index, &["b"], 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].docid, 2);
    }
}
