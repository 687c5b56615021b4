//! Protein-to-genome alignment results and the exonerate wrapper.
//!
//! One [`ExonerateResult`] describes the alignment of a translated
//! representative target (the protein query) against one contig or
//! supercontig (the nucleotide target), including the spliced coding
//! subsequence exonerate extracted from the target.

use crate::error::{HybseqError, Result};
use crate::exec::{check_status, find_tool, run_tool};
use crate::seqio::{write_fasta_record, FastaRecord};
use crate::translate::reverse_complement;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Alignment strand of the nucleotide target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            other => Err(HybseqError::ExonerateParse(format!(
                "bad strand: {other:?}"
            ))),
        }
    }
}

/// One protein-to-genome alignment record.
#[derive(Debug, Clone, PartialEq)]
pub struct ExonerateResult {
    /// Protein query identifier.
    pub query_id: String,
    /// Query (protein) alignment start.
    pub query_alignment_start: u64,
    /// Query (protein) alignment end.
    pub query_alignment_end: u64,
    /// Nucleotide target (contig) identifier.
    pub target_id: Option<String>,
    /// Target alignment start, as reported.
    pub target_alignment_start: u64,
    /// Target alignment end, as reported.
    pub target_alignment_end: u64,
    /// Target strand.
    pub target_strand: Strand,
    /// Percent identity of the alignment.
    pub percent_identity: f64,
    /// Spliced nucleotide subsequence covering the coding portion of the
    /// alignment.
    pub target_cds_seq: String,
}

impl ExonerateResult {
    /// True if this result's query alignment range covers `other`'s on both
    /// ends.
    pub fn contains_query_alignment_range(&self, other: &ExonerateResult) -> bool {
        self.query_alignment_start <= other.query_alignment_start
            && self.query_alignment_end >= other.query_alignment_end
    }

    /// True if the query alignment ranges intersect.
    pub fn overlaps_query_alignment_range(&self, other: &ExonerateResult) -> bool {
        self.query_alignment_start < other.query_alignment_end
            && other.query_alignment_start < self.query_alignment_end
    }

    /// Length of the target alignment range.
    pub fn target_alignment_length(&self) -> u64 {
        self.target_alignment_start.abs_diff(self.target_alignment_end)
    }

    /// Reverse-complements the spliced coding subsequence in place.
    ///
    /// Applied exactly once to reverse-strand results; coordinates are not
    /// renormalized.
    pub fn reverse_complement_target(&mut self) {
        self.target_cds_seq = reverse_complement(&self.target_cds_seq);
    }
}

impl fmt::Display for ExonerateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}] -> {} [{}, {}] ({:.1}%)",
            self.query_id,
            self.query_alignment_start,
            self.query_alignment_end,
            self.target_id.as_deref().unwrap_or("?"),
            self.target_alignment_start,
            self.target_alignment_end,
            self.percent_identity
        )
    }
}

/// `--ryo` template producing one machine-readable header per alignment,
/// followed by the spliced coding sequence and a terminator line.
pub const RYO_FORMAT: &str = "cdsbegin\t%qi\t%qab\t%qae\t%ti\t%tab\t%tae\t%tS\t%pi\n%tcs\ncdsend\n";

/// Parses exonerate `--ryo` output into alignment records.
///
/// Lines outside `cdsbegin`/`cdsend` blocks (banners, completion notices)
/// are ignored.
pub fn parse_ryo_output(text: &str) -> Result<Vec<ExonerateResult>> {
    let mut results = Vec::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let Some(header) = line.strip_prefix("cdsbegin\t") else {
            continue;
        };
        let fields: Vec<&str> = header.split('\t').collect();
        if fields.len() != 8 {
            return Err(HybseqError::ExonerateParse(format!(
                "expected 8 header fields, got {}: {line}",
                fields.len()
            )));
        }
        let parse_u64 = |s: &str, what: &str| -> Result<u64> {
            s.parse().map_err(|_| {
                HybseqError::ExonerateParse(format!("bad {what}: {s:?} in {line}"))
            })
        };
        let mut seq = String::new();
        let mut terminated = false;
        for seq_line in lines.by_ref() {
            if seq_line == "cdsend" {
                terminated = true;
                break;
            }
            seq.push_str(seq_line.trim_end());
        }
        if !terminated {
            return Err(HybseqError::ExonerateParse(
                "unterminated coding sequence block".to_string(),
            ));
        }
        results.push(ExonerateResult {
            query_id: fields[0].to_string(),
            query_alignment_start: parse_u64(fields[1], "query alignment start")?,
            query_alignment_end: parse_u64(fields[2], "query alignment end")?,
            target_id: Some(fields[3].to_string()).filter(|t| !t.is_empty()),
            target_alignment_start: parse_u64(fields[4], "target alignment start")?,
            target_alignment_end: parse_u64(fields[5], "target alignment end")?,
            target_strand: Strand::parse(fields[6])?,
            percent_identity: fields[7].parse().map_err(|_| {
                HybseqError::ExonerateParse(format!("bad percent identity: {:?}", fields[7]))
            })?,
            target_cds_seq: seq,
        });
    }
    Ok(results)
}

/// Seam for the protein-to-genome alignment step, so the reconciliation
/// engine can run against stub aligners in tests.
pub trait ProteinAligner: Sync {
    /// Aligns a protein query against a nucleotide target FASTA, returning
    /// zero or more alignment records.
    fn align(
        &self,
        protein: &FastaRecord,
        target_fasta: &Path,
        bestn: usize,
        workdir: &Path,
    ) -> Result<Vec<ExonerateResult>>;
}

/// Subprocess wrapper around `exonerate --model protein2genome`.
#[derive(Debug, Clone, Default)]
pub struct ExonerateRunner {
    /// Bounded wait applied to each invocation.
    pub timeout: Option<Duration>,
}

impl ExonerateRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        ExonerateRunner { timeout }
    }
}

impl ProteinAligner for ExonerateRunner {
    fn align(
        &self,
        protein: &FastaRecord,
        target_fasta: &Path,
        bestn: usize,
        workdir: &Path,
    ) -> Result<Vec<ExonerateResult>> {
        let query_path = workdir.join("protein-query.fasta");
        {
            let mut w = BufWriter::new(File::create(&query_path)?);
            write_fasta_record(&mut w, &protein.id, &protein.seq)?;
        }
        let exonerate = find_tool("exonerate")?;
        let mut command = Command::new(exonerate);
        command
            .arg("--model")
            .arg("protein2genome")
            .arg("--query")
            .arg(&query_path)
            .arg("--target")
            .arg(target_fasta)
            .arg("--showalignment")
            .arg("no")
            .arg("--showvulgar")
            .arg("no")
            .arg("--bestn")
            .arg(bestn.to_string())
            .arg("--ryo")
            .arg(RYO_FORMAT);
        let output = run_tool(command, "exonerate", self.timeout)?;
        check_status(&output, "exonerate")?;
        parse_ryo_output(&String::from_utf8(output.stdout)?)
    }
}
