//! # hybseq: targeted gene recovery from capture sequencing reads
//!
//! This library reconstructs gene coding sequences from short-read
//! sequencing data following a HybPiper-style workflow:
//!
//! 1. Load a target catalog of `organism-gene` reference sequences.
//! 2. Map reads against the catalog (`bwa mem`) and record, per target,
//!    which reads hit it and how confidently.
//! 3. Pick one representative target per gene (highest aggregate mapping
//!    score) and distribute reads into per-gene FASTA bins.
//! 4. Assemble each bin into contigs (`spades.py`), align the translated
//!    representative against them (`exonerate protein2genome`), filter and
//!    order the alignments, and splice a supercontig.
//! 5. Re-align against the supercontig to produce one reconstructed CDS per
//!    gene, or a named reason why not.
//!
//! ## Example
//!
//! ```no_run
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! use hybseq::{Config, HybseqPipeline};
//! use std::path::Path;
//!
//! let config = Config::builder()
//!     .percent_identity_threshold(65.0)
//!     .num_threads(8)
//!     .build();
//!
//! let mut pipeline = HybseqPipeline::new(
//!     config,
//!     Path::new("targets.fasta"),
//!     Path::new("sample_R1.fastq.gz"),
//!     Some(Path::new("sample_R2.fastq.gz")),
//!     None,
//! )?;
//!
//! let result = pipeline.analyse()?;
//! for (gene, outcome) in &result.outcomes {
//!     match outcome.cds() {
//!         Some(cds) => println!("{gene}: {} bp", cds.sequence.len()),
//!         None => println!("{gene}: {}", outcome.skip_reason().unwrap()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - `catalog`: arena of targets with organism and gene registries
//! - `sam`: alignment record model for mapper output
//! - `binning`: per-gene read distribution
//! - `reconcile`: contig reconciliation and supercontig reconstruction
//! - `mapping`/`assembly`/`exonerate`/`homology`: external tool wrappers
//! - `stats`: derived row-sets for CSV reporting
//! - `pipeline`: run orchestration and working-directory lifecycle
//!
//! External heavy lifting (mapping, assembly, protein-to-genome alignment,
//! homology search) runs in subprocesses; only their interfaces matter here.
//! Genes are reconciled in parallel, everything else is sequential.

pub mod assembly;
pub mod binning;
pub mod catalog;
pub mod config;
pub mod error;
pub mod exec;
pub mod exonerate;
pub mod homology;
pub mod mapping;
pub mod pipeline;
pub mod reconcile;
pub mod sam;
pub mod seqio;
pub mod stats;
pub mod translate;

pub use catalog::{MappedRead, Organism, Gene, Target, TargetSet};
pub use config::{BwaParams, Config, ConfigBuilder};
pub use error::{HybseqError, Result};
pub use exonerate::{ExonerateResult, ProteinAligner, Strand};
pub use pipeline::{HybseqPipeline, RunResult};
pub use reconcile::{GeneOutcome, ReconstructedCds, Reconciler, SkipReason};
pub use sam::SamRecord;
