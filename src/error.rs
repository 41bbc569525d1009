//! Error types for index construction and query evaluation

/// Errors raised while building, persisting or loading an index
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("posting block needs {required} words but arena capacity is {capacity}")]
    Capacity { required: usize, capacity: usize },

    #[error("index corrupted: {0}")]
    Corrupted(String),

    #[error("document ids must be strictly {expected}: got {docid} after {previous}")]
    DocidOrder {
        expected: &'static str,
        docid: u32,
        previous: u32,
    },

    #[error("invalid document id {0}: ids start at 1")]
    InvalidDocid(u32),

    #[error("malformed document line: {0}")]
    MalformedLine(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised while evaluating queries
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("unknown algorithm: {0} (options: SvS | WAND | MBWAND | BWAND_OR | BWAND_AND)")]
    UnknownAlgorithm(String),

    #[error("{0} requires an index built with Bloom filter chains")]
    BloomRequired(&'static str),

    #[error("{0} requires an index with term frequencies")]
    TfRequired(&'static str),

    #[error("malformed query file: {0}")]
    MalformedQuery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
