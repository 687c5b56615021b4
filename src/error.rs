//! Error types for the hybseq library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hybseq operations.
pub type Result<T> = std::result::Result<T, HybseqError>;

/// Errors that can occur during a hybseq run.
#[derive(Error, Debug)]
pub enum HybseqError {
    /// Input file not found
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Organism or gene name failed the sane-identifier check
    #[error("bad identifier: {0:?}")]
    BadIdentifier(String),

    /// Two catalog entries resolved to the same organism/gene pair
    #[error("duplicate organism/gene: organism = {organism}, gene = {gene}, seq id = {seq_id}")]
    DuplicateTarget {
        organism: String,
        gene: String,
        seq_id: String,
    },

    /// Target sequence contains symbols outside {A,C,G,T}
    #[error("target {target}: illegal base(s) {symbols}")]
    InvalidSequence { target: String, symbols: String },

    /// Alignment record line could not be parsed
    #[error("malformed alignment record: {0}")]
    MalformedRecord(String),

    /// CIGAR string contains an unparseable element
    #[error("malformed CIGAR {cigar:?} (stuck at {rest:?})")]
    MalformedCigar { cigar: String, rest: String },

    /// Mapping reference name points at an organism not in the catalog
    #[error("unknown organism: {0}")]
    UnknownOrganism(String),

    /// Mapping reference name points at a gene not in the catalog
    #[error("unknown gene: {0}")]
    UnknownGene(String),

    /// Organism exists but has no target for the gene
    #[error("no entry for gene {gene} in organism {organism}")]
    MissingTarget { organism: String, gene: String },

    /// Paired FASTQ streams disagree on read names or lengths
    #[error("paired read files out of sync: {0}")]
    ReadPairSync(String),

    /// Containment tie-break exhausted all criteria
    #[error("cannot break containment tie: {0}")]
    TieBreak(String),

    /// External tool binary could not be located
    #[error("{tool} not found; install it or put it on PATH")]
    ToolNotFound { tool: String },

    /// External tool exited with a non-zero status
    #[error("{tool} exited with status {status}: {detail}")]
    ToolFailed {
        tool: String,
        status: i32,
        detail: String,
    },

    /// External tool exceeded the configured bounded wait
    #[error("{tool} timed out after {seconds} s")]
    ToolTimeout { tool: String, seconds: u64 },

    /// Protein-to-genome aligner output could not be parsed
    #[error("failed to parse exonerate output: {0}")]
    ExonerateParse(String),

    /// Homology search output could not be parsed
    #[error("malformed homology hit: {0}")]
    HomologyParse(String),

    /// Operation attempted in a state that does not permit it
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// CSV serialization failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
