//! Query driver: evaluates a batch of queries against an index directory.
//!
//! The query file starts with the query count, then one query per record:
//! `<qid> <qlen> <tokens...>` (whitespace-separated, newlines not
//! significant). Tokens without postings are dropped; queries left empty
//! are skipped with a warning.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use log::{info, warn};

use fts_chain_core::{search, Algorithm, Bm25Params, InvertedIndex, QueryOutput, SearchError};

/// Run tag printed in TREC-format output lines
const RUN_TAG: &str = "fts_chain_core";

#[derive(Parser, Debug)]
#[command(author, version, about = "Evaluate queries against a chained-postings index")]
struct Args {
    /// Index directory
    #[arg(long)]
    index: PathBuf,

    /// Query file
    #[arg(long)]
    query: PathBuf,

    /// Output file (no retrieval output when absent)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Algorithm: SvS | WAND | MBWAND | BWAND_OR | BWAND_AND
    #[arg(long, default_value = "SvS")]
    algorithm: String,

    /// Result count (defaults to the smallest query-term df for
    /// conjunctive algorithms, 1000 otherwise)
    #[arg(long)]
    hits: Option<usize>,

    /// File mapping docids to external docnos, one per line, docid 1 first
    #[arg(long)]
    docno_mapping: Option<PathBuf>,

    /// BM25 k1
    #[arg(long, default_value_t = 0.9)]
    k1: f32,

    /// BM25 b
    #[arg(long, default_value_t = 0.4)]
    b: f32,
}

struct Query {
    qid: u32,
    tokens: Vec<String>,
}

fn parse_queries(text: &str) -> Result<Vec<Query>, SearchError> {
    let mut words = text.split_whitespace();
    let count: usize = words
        .next()
        .ok_or_else(|| SearchError::MalformedQuery("empty query file".into()))?
        .parse()
        .map_err(|_| SearchError::MalformedQuery("bad query count".into()))?;

    let mut queries = Vec::with_capacity(count);
    for _ in 0..count {
        let qid: u32 = words
            .next()
            .ok_or_else(|| SearchError::MalformedQuery("missing query id".into()))?
            .parse()
            .map_err(|_| SearchError::MalformedQuery("bad query id".into()))?;
        let qlen: usize = words
            .next()
            .ok_or_else(|| SearchError::MalformedQuery("missing query length".into()))?
            .parse()
            .map_err(|_| SearchError::MalformedQuery("bad query length".into()))?;
        let tokens: Vec<String> = (&mut words).take(qlen).map(str::to_string).collect();
        if tokens.len() < qlen {
            return Err(SearchError::MalformedQuery(format!(
                "query {qid} truncated"
            )));
        }
        queries.push(Query { qid, tokens });
    }
    Ok(queries)
}

fn docno<'a>(mapping: &'a Option<Vec<String>>, docid: u32) -> std::borrow::Cow<'a, str> {
    match mapping {
        Some(names) if docid as usize <= names.len() => {
            std::borrow::Cow::Borrowed(&names[docid as usize - 1])
        }
        _ => std::borrow::Cow::Owned(docid.to_string()),
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let algorithm = Algorithm::from_name(&args.algorithm)
        .ok_or(SearchError::UnknownAlgorithm(args.algorithm.clone()))?;
    let bm25 = Bm25Params {
        k1: args.k1,
        b: args.b,
    };

    let index = InvertedIndex::open(&args.index)?;
    let queries = parse_queries(&std::fs::read_to_string(&args.query)?)?;

    let mapping: Option<Vec<String>> = match &args.docno_mapping {
        Some(path) => Some(
            std::fs::read_to_string(path)?
                .lines()
                .map(str::to_string)
                .collect(),
        ),
        None => None,
    };

    let mut out: Option<BufWriter<File>> = match &args.output {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    for query in &queries {
        if query.tokens.is_empty() {
            warn!("query {} is empty, skipping", query.qid);
            continue;
        }
        let tokens: Vec<&str> = query.tokens.iter().map(String::as_str).collect();

        let start = Instant::now();
        let result = search(&index, algorithm, &tokens, args.hits, &bm25)?;
        info!(
            "query {}: {} terms, {} hits, {} us",
            query.qid,
            tokens.len(),
            result.len(),
            start.elapsed().as_micros()
        );

        let Some(writer) = out.as_mut() else { continue };
        match &result {
            QueryOutput::Docids(docids) => {
                for &d in docids {
                    writeln!(writer, "{} {}", query.qid, docno(&mapping, d))?;
                }
            }
            QueryOutput::Ranked(ranked) => {
                for (rank, hit) in ranked.iter().enumerate() {
                    writeln!(
                        writer,
                        "{} Q0 {} {} {:.6} {RUN_TAG}",
                        query.qid,
                        docno(&mapping, hit.docid),
                        rank + 1,
                        hit.score
                    )?;
                }
            }
        }
    }

    if let Some(writer) = out.as_mut() {
        writer.flush()?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
