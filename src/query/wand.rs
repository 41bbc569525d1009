//! WAND and MBWAND disjunctive top-k
//!
//! Classic WAND: cursors sorted by current docid, upper bounds accumulated
//! until they beat the heap threshold, the pivot document either fully
//! scored (when every earlier cursor is aligned on it) or approached by
//! skipping the smallest cursor forward, with whole blocks skipped via
//! their `max_docid` word. WAND proper uses BM25 bounds from the stored
//! `(max_bm25_tf, max_tf_doclen)` pair and scores with BM25; MBWAND uses
//! raw IDF as both bound and score, ranking by summed term impacts.

use std::cmp::Ordering;

use crate::pointer::SegmentPointer;
use crate::pointers::PointersTable;
use crate::pool::SegmentPool;
use crate::score::Bm25Params;

use super::{PostingsCursor, RankedDoc, TopK};

#[allow(clippy::too_many_arguments)]
pub(crate) fn wand(
    pool: &SegmentPool,
    pointers: &PointersTable,
    bm25: &Bm25Params,
    heads: &[SegmentPointer],
    dfs: &[u32],
    upper_bounds: &[f32],
    hits: usize,
    idf_only: bool,
) -> Vec<RankedDoc> {
    let total_docs = pointers.total_docs();
    let avg_doc_len = pointers.avg_doc_len();

    let mut cursors: Vec<PostingsCursor> = heads
        .iter()
        .map(|&h| PostingsCursor::new(pool, h))
        .collect();
    let mut order: Vec<usize> = (0..cursors.len()).collect();
    let mut heap = TopK::new(hits);

    loop {
        order.retain(|&i| !cursors[i].exhausted());
        if order.is_empty() {
            break;
        }
        order.sort_by(|&a, &b| {
            let (da, db) = (cursors[a].doc(), cursors[b].doc());
            if da == db {
                Ordering::Equal
            } else if pool.doc_lt(da, db) {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        });

        // find the pivot: the first cursor whose prefix of upper bounds
        // could still beat the current threshold
        let threshold = heap.threshold();
        let mut accumulated = 0.0f32;
        let mut pivot = None;
        for (k, &i) in order.iter().enumerate() {
            accumulated += upper_bounds[i];
            if accumulated > threshold {
                pivot = Some(k);
                break;
            }
        }
        let Some(pivot) = pivot else {
            // not even the full bound sum beats the threshold
            break;
        };
        let pivot_doc = cursors[order[pivot]].doc();

        if cursors[order[0]].doc() == pivot_doc {
            // every cursor up to the pivot sits on the candidate: score it
            let doc_len = pointers.doc_len(pivot_doc);
            let mut score = 0.0f32;
            for &i in &order {
                if cursors[i].doc() != pivot_doc {
                    break;
                }
                score += if idf_only {
                    upper_bounds[i]
                } else {
                    bm25.score(cursors[i].tf(), dfs[i], total_docs, doc_len, avg_doc_len)
                };
                cursors[i].advance();
            }
            heap.insert(pivot_doc, score);
        } else {
            // move the smallest cursor up to the pivot document
            cursors[order[0]].skip_to(pivot_doc);
        }
    }

    heap.into_sorted()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rustc_hash::FxHashMap;

    use crate::indexer::IndexConfig;
    use crate::pool::PostingsMode;
    use crate::query::tests::build_index;
    use crate::query::{search, Algorithm, QueryOutput, RankedDoc};
    use crate::score::{idf, Bm25Params};

    fn ranked(
        index: &crate::index::InvertedIndex,
        algorithm: Algorithm,
        tokens: &[&str],
        hits: usize,
    ) -> Vec<RankedDoc> {
        match search(index, algorithm, tokens, Some(hits), &Bm25Params::default()).unwrap() {
            QueryOutput::Ranked(v) => v,
            QueryOutput::Docids(_) => unreachable!(),
        }
    }

    #[test]
    fn test_wand_scores_single_term() {
        let config = IndexConfig {
            mode: PostingsMode::DocidsTf,
            df_cutoff: 1,
            ..Default::default()
        };
        // doc 2 has the term twice in the same length, so it must rank first
        let index = build_index(
            config,
            &[(1, "t x y"), (2, "t t x"), (3, "x y z")],
        );
        let out = ranked(&index, Algorithm::Wand, &["t"], 10);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].docid, 2);
        assert_eq!(out[1].docid, 1);
        assert!(out[0].score > out[1].score);
    }

    #[test]
    fn test_mbwand_ranks_by_idf_sum() {
        let config = IndexConfig {
            mode: PostingsMode::DocidsTf,
            df_cutoff: 1,
            ..Default::default()
        };
        // "rare" appears once, "common" in most documents
        let index = build_index(
            config,
            &[
                (1, "common filler"),
                (2, "common rare"),
                (3, "common filler"),
                (4, "common filler"),
                (5, "filler pad"),
            ],
        );
        let out = ranked(&index, Algorithm::Mbwand, &["common", "rare"], 3);
        assert_eq!(out[0].docid, 2);

        let n = index.pointers.total_docs();
        let common = index.dictionary.term_id("common").unwrap();
        let rare = index.dictionary.term_id("rare").unwrap();
        let expect = idf(n, index.pointers.df(common)) + idf(n, index.pointers.df(rare));
        assert!((out[0].score - expect).abs() < 1e-6);
    }

    /// Randomized index with a fixed document length (so the stored
    /// max-BM25-tf pair gives exact upper bounds); WAND must match a
    /// brute-force BM25 ranking exactly
    #[test]
    fn test_wand_agrees_with_brute_force() {
        const NUM_DOCS: u32 = 1000;
        const NUM_TERMS: usize = 50;
        const DOC_LEN: usize = 6;
        const K: usize = 10;

        let mut rng = StdRng::seed_from_u64(42);
        let vocabulary: Vec<String> = (0..NUM_TERMS).map(|t| format!("t{t:02}")).collect();

        let mut docs: Vec<(u32, String)> = Vec::new();
        // tfs[docid] : term -> tf
        let mut tfs: Vec<FxHashMap<usize, u32>> = vec![FxHashMap::default(); NUM_DOCS as usize + 1];
        for docid in 1..=NUM_DOCS {
            let mut tokens = Vec::with_capacity(DOC_LEN);
            for _ in 0..DOC_LEN {
                let t = rng.gen_range(0..NUM_TERMS);
                tokens.push(vocabulary[t].as_str());
                *tfs[docid as usize].entry(t).or_insert(0) += 1;
            }
            docs.push((docid, tokens.join(" ")));
        }
        let doc_refs: Vec<(u32, &str)> = docs.iter().map(|(d, s)| (*d, s.as_str())).collect();

        let config = IndexConfig {
            mode: PostingsMode::DocidsTf,
            df_cutoff: 1,
            ..Default::default()
        };
        let index = build_index(config, &doc_refs);

        let bm25 = Bm25Params::default();
        let total_docs = index.pointers.total_docs();
        let avg = index.pointers.avg_doc_len();

        for _ in 0..20 {
            let qlen = rng.gen_range(2..=5);
            let query: Vec<usize> = (0..qlen).map(|_| rng.gen_range(0..NUM_TERMS)).collect();
            let tokens: Vec<&str> = query.iter().map(|&t| vocabulary[t].as_str()).collect();

            // brute force: score every document over the same resolved terms
            let mut brute: Vec<(u32, f32)> = Vec::new();
            for docid in 1..=NUM_DOCS {
                let mut score = 0.0f32;
                let mut matched = false;
                for &t in &query {
                    if let Some(&tf) = tfs[docid as usize].get(&t) {
                        let df = index
                            .pointers
                            .df(index.dictionary.term_id(&vocabulary[t]).unwrap());
                        score += bm25.score(tf, df, total_docs, DOC_LEN as u32, avg);
                        matched = true;
                    }
                }
                if matched {
                    brute.push((docid, score));
                }
            }
            // descending score, ascending docid on ties: the same total
            // order the heap maintains
            brute.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
            brute.truncate(K);

            let out = ranked(&index, Algorithm::Wand, &tokens, K);
            let got: Vec<u32> = out.iter().map(|r| r.docid).collect();
            let expect: Vec<u32> = brute.iter().map(|&(d, _)| d).collect();
            assert_eq!(got, expect, "query {tokens:?}");
            for (r, &(_, s)) in out.iter().zip(brute.iter()) {
                assert!(
                    (r.score - s).abs() < 1e-5,
                    "score mismatch for doc {}: {} vs {}",
                    r.docid,
                    r.score,
                    s
                );
            }
        }
    }

    #[test]
    fn test_wand_handles_hits_beyond_matches() {
        let config = IndexConfig {
            mode: PostingsMode::DocidsTf,
            df_cutoff: 1,
            ..Default::default()
        };
        let index = build_index(config, &[(1, "a"), (2, "a b")]);
        let out = ranked(&index, Algorithm::Wand, &["a", "b"], 100);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].docid, 2);
    }
}
