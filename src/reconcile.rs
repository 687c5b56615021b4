//! Contig reconciliation and supercontig reconstruction.
//!
//! Per gene: assemble the read bin, align translated representative against
//! the contigs, filter the alignments down to a consistent non-redundant
//! set, concatenate the surviving coding segments into a supercontig,
//! re-align against that, and splice the final CDS. Every way out of the
//! state machine is either a reconstructed sequence or a named skip reason;
//! nothing here aborts the run.

use crate::assembly::Assembler;
use crate::catalog::Target;
use crate::error::{HybseqError, Result};
use crate::exonerate::{ExonerateResult, ProteinAligner, Strand};
use crate::seqio::{write_fasta_file, FastaRecord};
use crate::translate::{invalid_protein_symbols, translate, truncates_to_codons};
use itertools::Itertools;
use log::{debug, warn};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Why a gene ended without a reconstructed CDS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No organism's target was selected for the gene.
    NoRepresentative,
    /// The assembler produced no contigs.
    NoContigs,
    /// The representative translates outside the amino-acid alphabet.
    InvalidTranslation,
    /// The aligner produced no results against the contig set.
    NoAlignments,
    /// Filtering removed every alignment.
    NothingAfterFiltering,
    /// The surviving alignments carried no coding sequence.
    EmptySupercontig,
    /// The aligner produced no results against the supercontig.
    NoSupercontigAlignment,
    /// A per-gene error was caught at the gene-loop boundary.
    GeneError(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoRepresentative => write!(f, "no representative"),
            SkipReason::NoContigs => write!(f, "no contigs"),
            SkipReason::InvalidTranslation => write!(f, "invalid translation"),
            SkipReason::NoAlignments => write!(f, "no alignments"),
            SkipReason::NothingAfterFiltering => write!(f, "nothing after filtering"),
            SkipReason::EmptySupercontig => write!(f, "empty supercontig"),
            SkipReason::NoSupercontigAlignment => write!(f, "no alignment to supercontig"),
            SkipReason::GeneError(message) => write!(f, "gene error: {message}"),
        }
    }
}

/// A reconstructed coding sequence with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedCds {
    /// Gene name.
    pub gene: String,
    /// Reconstructed coding sequence.
    pub sequence: String,
    /// Provenance: targets file and read file identifiers.
    pub description: String,
}

/// Terminal outcome of reconciling one gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneOutcome {
    Reconstructed(ReconstructedCds),
    Skipped(SkipReason),
}

impl GeneOutcome {
    /// The reconstructed CDS, if any.
    pub fn cds(&self) -> Option<&ReconstructedCds> {
        match self {
            GeneOutcome::Reconstructed(cds) => Some(cds),
            GeneOutcome::Skipped(_) => None,
        }
    }

    /// The skip reason, if the gene produced no CDS.
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            GeneOutcome::Reconstructed(_) => None,
            GeneOutcome::Skipped(reason) => Some(reason),
        }
    }
}

/// Source file identifiers attached to reconstructed sequences.
#[derive(Debug, Clone)]
pub struct Provenance {
    /// Targets catalog file identifier.
    pub targets_spec: String,
    /// Read file identifier(s), comma-separated for pairs.
    pub reads_spec: String,
}

/// Sorts results by ascending query alignment start.
///
/// The sort is stable: results sharing a start keep their arrival order.
pub fn sort_by_query_alignment_start(results: &mut [ExonerateResult]) {
    results.sort_by_key(|r| r.query_alignment_start);
}

/// Drops results below the percent-identity floor.
pub fn filter_by_percent_identity(
    results: Vec<ExonerateResult>,
    threshold: f64,
) -> Vec<ExonerateResult> {
    results
        .into_iter()
        .filter(|r| r.percent_identity >= threshold)
        .collect()
}

/// Decides whether `result` is contained by `other` and should be dropped.
///
/// Containment requires `other` to cover `result`'s query alignment range.
/// When the two ranges cover each other mutually, a total order decides the
/// survivor: shorter target alignment wins, then smaller target alignment
/// start, then lexicographically smaller target identifier. A tie that
/// reaches identifiers without both being set, or that survives all
/// criteria, is a data-integrity error.
fn is_contained_with_tiebreak(
    result: &ExonerateResult,
    other: &ExonerateResult,
) -> Result<bool> {
    if !other.contains_query_alignment_range(result) {
        return Ok(false);
    }
    if !result.contains_query_alignment_range(other) {
        return Ok(true);
    }
    // mutual containment: prefer the shorter target alignment (fewer gaps)
    if result.target_alignment_length() < other.target_alignment_length() {
        return Ok(false);
    }
    if result.target_alignment_length() > other.target_alignment_length() {
        return Ok(true);
    }
    if result.target_alignment_start < other.target_alignment_start {
        return Ok(false);
    }
    if result.target_alignment_start > other.target_alignment_start {
        return Ok(true);
    }
    let result_id = result.target_id.as_deref().ok_or_else(|| {
        HybseqError::TieBreak(format!("target id unset on {result}"))
    })?;
    let other_id = other.target_id.as_deref().ok_or_else(|| {
        HybseqError::TieBreak(format!("target id unset on {other}"))
    })?;
    if result_id < other_id {
        return Ok(false);
    }
    if other_id < result_id {
        return Ok(true);
    }
    Err(HybseqError::TieBreak(format!(
        "result = {result}, other = {other}"
    )))
}

/// Removes every result whose query alignment range is contained by another
/// result's range, under the deterministic tie-break order.
pub fn filter_by_containment(results: Vec<ExonerateResult>) -> Result<Vec<ExonerateResult>> {
    let mut survivors = Vec::with_capacity(results.len());
    for (i, result) in results.iter().enumerate() {
        let mut contained = false;
        for (j, other) in results.iter().enumerate() {
            if i != j && is_contained_with_tiebreak(result, other)? {
                contained = true;
                break;
            }
        }
        if !contained {
            survivors.push(result.clone());
        }
    }
    Ok(survivors)
}

/// Reports pairwise query-alignment overlaps among the survivors.
///
/// Overlaps are detected but not resolved; consensus building across
/// overlapping contigs is out of scope.
pub fn scan_overlaps(results: &[ExonerateResult]) {
    warn!("scanning for overlaps but not resolving them, pending development of concept");
    for (i, result) in results.iter().enumerate() {
        for (j, other) in results.iter().enumerate() {
            if i != j && result.overlaps_query_alignment_range(other) {
                warn!("overlap found, but not resolved: {result}, {other}");
            }
        }
    }
}

/// Runs the full filter chain for one gene.
pub fn filter_exonerate_results(
    gene_name: &str,
    results: Vec<ExonerateResult>,
    percent_identity_threshold: f64,
) -> Result<Vec<ExonerateResult>> {
    debug!("gene {gene_name}: {} exonerate results", results.len());
    let results = filter_by_percent_identity(results, percent_identity_threshold);
    debug!(
        "gene {gene_name}: {} sufficiently close exonerate results",
        results.len()
    );
    let results = filter_by_containment(results)?;
    debug!(
        "gene {gene_name}: {} non-contained exonerate results",
        results.len()
    );
    scan_overlaps(&results);
    Ok(results)
}

/// The per-gene reconciliation engine.
pub struct Reconciler<'a> {
    assembler: &'a dyn Assembler,
    aligner: &'a dyn ProteinAligner,
    percent_identity_threshold: f64,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        assembler: &'a dyn Assembler,
        aligner: &'a dyn ProteinAligner,
        percent_identity_threshold: f64,
    ) -> Self {
        Reconciler {
            assembler,
            aligner,
            percent_identity_threshold,
        }
    }

    /// Reconstructs the CDS of one gene.
    ///
    /// Errors returned here are per-gene data-integrity or tool failures;
    /// the caller converts them into [`SkipReason::GeneError`] and carries
    /// on with the remaining genes.
    pub fn reconstruct_cds(
        &self,
        gene_name: &str,
        representative: Option<&Target>,
        bin_fasta: &Path,
        gene_workdir: &Path,
        paired: bool,
        provenance: &Provenance,
    ) -> Result<GeneOutcome> {
        debug!("reconstructing CDS for gene {gene_name}");
        let Some(representative) = representative else {
            warn!("gene {gene_name}: no representative");
            return Ok(GeneOutcome::Skipped(SkipReason::NoRepresentative));
        };

        let contigs = match self
            .assembler
            .assemble(gene_name, bin_fasta, gene_workdir, paired)?
        {
            None => {
                warn!("gene {gene_name}: no contigs");
                return Ok(GeneOutcome::Skipped(SkipReason::NoContigs));
            }
            Some(contigs) if contigs.is_empty() => {
                warn!("gene {gene_name}: empty contig list");
                return Ok(GeneOutcome::Skipped(SkipReason::NoContigs));
            }
            Some(contigs) => contigs,
        };
        debug!("gene {gene_name}: {} contigs", contigs.len());

        if truncates_to_codons(&representative.sequence) {
            warn!(
                "gene {}: length {} is not an integer multiple of 3 -- not a CDS?",
                representative.seq_id,
                representative.sequence.len()
            );
        }
        let protein_seq = translate(&representative.sequence);
        let invalid = invalid_protein_symbols(&protein_seq);
        if !invalid.is_empty() {
            warn!(
                "gene {gene_name}: invalid amino acids {}",
                invalid.iter().join(", ")
            );
            return Ok(GeneOutcome::Skipped(SkipReason::InvalidTranslation));
        }
        let protein = FastaRecord {
            id: format!("{}-pep", representative.seq_id),
            description: None,
            seq: protein_seq,
        };

        let contigs_fasta = gene_workdir.join(format!("{gene_name}-contigs.fasta"));
        write_fasta_file(&contigs_fasta, &contigs)?;
        let mut results = self
            .aligner
            .align(&protein, &contigs_fasta, contigs.len(), gene_workdir)?;
        if results.is_empty() {
            warn!(
                "gene {gene_name}: no exonerate results from {} contigs",
                contigs.len()
            );
            return Ok(GeneOutcome::Skipped(SkipReason::NoAlignments));
        }

        sort_by_query_alignment_start(&mut results);
        for result in &mut results {
            if result.target_strand == Strand::Reverse {
                result.reverse_complement_target();
            }
        }

        let filtered =
            filter_exonerate_results(gene_name, results, self.percent_identity_threshold)?;
        if filtered.is_empty() {
            warn!("gene {gene_name}: no exonerate results left after filtering");
            return Ok(GeneOutcome::Skipped(SkipReason::NothingAfterFiltering));
        }

        let supercontig: String = filtered.iter().map(|r| r.target_cds_seq.as_str()).collect();
        if supercontig.is_empty() {
            warn!("gene {gene_name}: empty supercontig");
            return Ok(GeneOutcome::Skipped(SkipReason::EmptySupercontig));
        }
        let supercontig_fasta = gene_workdir.join(format!("{gene_name}-supercontig.fasta"));
        {
            let mut w = BufWriter::new(File::create(&supercontig_fasta)?);
            crate::seqio::write_fasta_record(
                &mut w,
                &format!("{gene_name}_supercontig"),
                &supercontig,
            )?;
        }

        let supercontig_results =
            self.aligner
                .align(&protein, &supercontig_fasta, contigs.len(), gene_workdir)?;
        if supercontig_results.is_empty() {
            warn!("gene {gene_name}: no exonerate results from supercontig");
            return Ok(GeneOutcome::Skipped(SkipReason::NoSupercontigAlignment));
        }

        // percent identity was already enforced against the contig set
        let spliced: String = supercontig_results
            .iter()
            .map(|r| r.target_cds_seq.as_str())
            .collect();
        Ok(GeneOutcome::Reconstructed(ReconstructedCds {
            gene: gene_name.to_string(),
            sequence: spliced,
            description: format!(
                "reconstructed CDS, targets: {}, reads: {}",
                provenance.targets_spec, provenance.reads_spec
            ),
        }))
    }
}
