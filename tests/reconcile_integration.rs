//! Integration tests for the contig reconciliation engine, driven by stub
//! assemblers and aligners so no external binaries are needed.

use hybseq::assembly::Assembler;
use hybseq::exonerate::{ExonerateResult, ProteinAligner, Strand};
use hybseq::reconcile::{GeneOutcome, Provenance, Reconciler, SkipReason};
use hybseq::seqio::{FastaReader, FastaRecord};
use hybseq::Result;
use pretty_assertions::assert_eq;
use std::path::Path;

/// Assembler returning a fixed contig set.
struct StubAssembler {
    contigs: Option<Vec<FastaRecord>>,
}

impl Assembler for StubAssembler {
    fn assemble(
        &self,
        _gene_name: &str,
        _bin_fasta: &Path,
        _gene_workdir: &Path,
        _paired: bool,
    ) -> Result<Option<Vec<FastaRecord>>> {
        Ok(self.contigs.clone())
    }
}

/// Aligner returning scripted results against the contig set, and a single
/// full-length alignment against whatever supercontig was written out.
struct ScriptedAligner {
    contig_results: Vec<ExonerateResult>,
}

impl ProteinAligner for ScriptedAligner {
    fn align(
        &self,
        protein: &FastaRecord,
        target_fasta: &Path,
        _bestn: usize,
        _workdir: &Path,
    ) -> Result<Vec<ExonerateResult>> {
        let name = target_fasta
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !name.contains("supercontig") {
            return Ok(self.contig_results.clone());
        }
        // splice the whole supercontig back out
        let record = FastaReader::open(target_fasta)?
            .read_next()?
            .expect("supercontig written before re-alignment");
        Ok(vec![ExonerateResult {
            query_id: protein.id.clone(),
            query_alignment_start: 0,
            query_alignment_end: protein.seq.len() as u64,
            target_id: Some(record.id),
            target_alignment_start: 0,
            target_alignment_end: record.seq.len() as u64,
            target_strand: Strand::Forward,
            percent_identity: 100.0,
            target_cds_seq: record.seq,
        }])
    }
}

fn contig(id: &str, seq: &str) -> FastaRecord {
    FastaRecord {
        id: id.to_string(),
        description: None,
        seq: seq.to_string(),
    }
}

fn contig_result(
    id: &str,
    qas: u64,
    qae: u64,
    strand: Strand,
    identity: f64,
    seq: &str,
) -> ExonerateResult {
    ExonerateResult {
        query_id: "rep-pep".to_string(),
        query_alignment_start: qas,
        query_alignment_end: qae,
        target_id: Some(id.to_string()),
        target_alignment_start: 0,
        target_alignment_end: seq.len() as u64,
        target_strand: strand,
        percent_identity: identity,
        target_cds_seq: seq.to_string(),
    }
}

fn representative(seq: &str) -> hybseq::Target {
    let target_set = hybseq::TargetSet::read_from(FastaReader::new(std::io::Cursor::new(
        format!(">sp1-geneA\n{seq}\n").into_bytes(),
    )))
    .unwrap();
    target_set.target(0).clone()
}

fn provenance() -> Provenance {
    Provenance {
        targets_spec: "targets.fasta".to_string(),
        reads_spec: "r1.fastq, r2.fastq".to_string(),
    }
}

fn run_engine(
    assembler: &StubAssembler,
    aligner: &ScriptedAligner,
    rep: Option<&hybseq::Target>,
) -> GeneOutcome {
    let dir = tempfile::tempdir().unwrap();
    let reconciler = Reconciler::new(assembler, aligner, 65.0);
    reconciler
        .reconstruct_cds(
            "geneA",
            rep,
            &dir.path().join("gene-geneA.fasta"),
            dir.path(),
            true,
            &provenance(),
        )
        .unwrap()
}

#[test]
fn missing_representative_is_a_named_skip() {
    let assembler = StubAssembler { contigs: None };
    let aligner = ScriptedAligner {
        contig_results: vec![],
    };
    let outcome = run_engine(&assembler, &aligner, None);
    assert_eq!(
        outcome.skip_reason(),
        Some(&SkipReason::NoRepresentative)
    );
    assert_eq!(outcome.skip_reason().unwrap().to_string(), "no representative");
}

#[test]
fn empty_assembly_yields_no_contigs_and_run_continues() {
    let rep = representative("ATGGCTGCTTAA");
    let aligner = ScriptedAligner {
        contig_results: vec![],
    };

    for contigs in [None, Some(vec![])] {
        let assembler = StubAssembler { contigs };
        let outcome = run_engine(&assembler, &aligner, Some(&rep));
        assert_eq!(outcome.skip_reason(), Some(&SkipReason::NoContigs));
        assert_eq!(outcome.skip_reason().unwrap().to_string(), "no contigs");
    }

    // a healthy gene processed afterwards still succeeds
    let assembler = StubAssembler {
        contigs: Some(vec![contig("c1", "ATGGCTGCTTAA")]),
    };
    let aligner = ScriptedAligner {
        contig_results: vec![contig_result(
            "c1",
            0,
            4,
            Strand::Forward,
            100.0,
            "ATGGCTGCTTAA",
        )],
    };
    let outcome = run_engine(&assembler, &aligner, Some(&rep));
    assert!(outcome.cds().is_some());
}

#[test]
fn invalid_translation_is_rejected_not_crashed() {
    // N in a codon translates to X, outside the amino-acid alphabet
    let rep = representative("ATGNNNTAA");
    let assembler = StubAssembler {
        contigs: Some(vec![contig("c1", "ATG")]),
    };
    let aligner = ScriptedAligner {
        contig_results: vec![],
    };
    let outcome = run_engine(&assembler, &aligner, Some(&rep));
    assert_eq!(
        outcome.skip_reason(),
        Some(&SkipReason::InvalidTranslation)
    );
}

#[test]
fn segments_concatenate_in_query_order() {
    let rep = representative("ATGGCTGCTGCTGCTTAA");
    let assembler = StubAssembler {
        contigs: Some(vec![contig("c1", "AAA"), contig("c2", "CCC")]),
    };
    // arrival order disagrees with query order on purpose
    let aligner = ScriptedAligner {
        contig_results: vec![
            contig_result("c2", 3, 6, Strand::Forward, 95.0, "CCCCCC"),
            contig_result("c1", 0, 3, Strand::Forward, 95.0, "AAAAAA"),
        ],
    };
    let outcome = run_engine(&assembler, &aligner, Some(&rep));
    let cds = outcome.cds().expect("reconstruction succeeds");
    assert_eq!(cds.sequence, "AAAAAACCCCCC");
    assert_eq!(cds.gene, "geneA");
    assert!(cds.description.contains("targets.fasta"));
    assert!(cds.description.contains("r1.fastq, r2.fastq"));
}

#[test]
fn reverse_strand_segment_is_complemented_once() {
    let rep = representative("ATGGCTGCTGCTGCTTAA");
    let assembler = StubAssembler {
        contigs: Some(vec![contig("c1", "AAA"), contig("c2", "GGG")]),
    };
    let aligner = ScriptedAligner {
        contig_results: vec![
            contig_result("c1", 0, 3, Strand::Forward, 95.0, "ATGGCA"),
            contig_result("c2", 3, 6, Strand::Reverse, 95.0, "AACGTG"),
        ],
    };
    let outcome = run_engine(&assembler, &aligner, Some(&rep));
    let cds = outcome.cds().expect("reconstruction succeeds");
    // reverse-complement of AACGTG is CACGTT
    assert_eq!(cds.sequence, "ATGGCACACGTT");
}

#[test]
fn contained_and_low_identity_results_are_dropped() {
    let rep = representative("ATGGCTGCTGCTGCTTAA");
    let assembler = StubAssembler {
        contigs: Some(vec![
            contig("c1", "AAA"),
            contig("c2", "CCC"),
            contig("c3", "TTT"),
        ]),
    };
    let aligner = ScriptedAligner {
        contig_results: vec![
            contig_result("c1", 0, 6, Strand::Forward, 95.0, "AAAAAA"),
            // contained inside c1's query range
            contig_result("c2", 1, 5, Strand::Forward, 99.0, "CCCCCC"),
            // below the identity floor
            contig_result("c3", 6, 9, Strand::Forward, 40.0, "TTTTTT"),
        ],
    };
    let outcome = run_engine(&assembler, &aligner, Some(&rep));
    let cds = outcome.cds().expect("reconstruction succeeds");
    assert_eq!(cds.sequence, "AAAAAA");
}

#[test]
fn tie_break_failure_is_a_per_gene_error() {
    let rep = representative("ATGGCTGCTGCTGCTTAA");
    let assembler = StubAssembler {
        contigs: Some(vec![contig("c1", "AAA")]),
    };
    let mut unset_a = contig_result("x", 0, 6, Strand::Forward, 95.0, "AAAAAA");
    let mut unset_b = contig_result("x", 0, 6, Strand::Forward, 95.0, "CCCCCC");
    unset_a.target_id = None;
    unset_b.target_id = None;
    let aligner = ScriptedAligner {
        contig_results: vec![unset_a, unset_b],
    };
    let dir = tempfile::tempdir().unwrap();
    let reconciler = Reconciler::new(&assembler, &aligner, 65.0);
    let err = reconciler
        .reconstruct_cds(
            "geneA",
            Some(&rep),
            &dir.path().join("gene-geneA.fasta"),
            dir.path(),
            false,
            &provenance(),
        )
        .unwrap_err();
    assert!(matches!(err, hybseq::HybseqError::TieBreak(_)));
}

#[test]
fn reconciliation_is_idempotent() {
    let rep = representative("ATGGCTGCTGCTGCTTAA");
    let assembler = StubAssembler {
        contigs: Some(vec![contig("c1", "AAA"), contig("c2", "CCC")]),
    };
    let aligner = ScriptedAligner {
        contig_results: vec![
            contig_result("c2", 3, 6, Strand::Reverse, 95.0, "GGGTTT"),
            contig_result("c1", 0, 3, Strand::Forward, 95.0, "AAAAAA"),
        ],
    };
    let first = run_engine(&assembler, &aligner, Some(&rep));
    let second = run_engine(&assembler, &aligner, Some(&rep));
    assert_eq!(
        first.cds().expect("reconstruction succeeds").sequence,
        second.cds().expect("reconstruction succeeds").sequence
    );
}
