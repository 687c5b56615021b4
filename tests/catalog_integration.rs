//! Integration tests for catalog loading, read assignment and statistics
//! through the public API.

use hybseq::seqio::FastaReader;
use hybseq::stats::{gene_stats, organism_stats, target_stats};
use hybseq::{HybseqError, SamRecord, TargetSet};
use pretty_assertions::assert_eq;
use std::io::Cursor;

fn catalog(fasta: &str) -> hybseq::Result<TargetSet> {
    TargetSet::read_from(FastaReader::new(Cursor::new(fasta.as_bytes().to_vec())))
}

fn mapped(qname: &str, rname: &str, mapq: u8) -> SamRecord {
    SamRecord::parse(&format!(
        "{qname}\t0\t{rname}\t1\t{mapq}\t4M\t*\t0\t0\tACGT\tIIII"
    ))
    .unwrap()
}

#[test]
fn stats_row_counts_equal_distinct_names_in_input() {
    let ts = catalog(
        ">sp1-geneA\nACGT\n>sp2-geneA\nACGT\n>sp1-geneB\nACGT\n>sp3-geneC\nACGT\n",
    )
    .unwrap();
    assert_eq!(organism_stats(&ts).len(), 3);
    assert_eq!(gene_stats(&ts).len(), 3);
    assert_eq!(target_stats(&ts).len(), 4);
}

#[test]
fn duplicate_identifier_pair_never_overwrites() {
    let err = catalog(">sp1-geneA\nACGT\n>sp2-geneA\nCCCC\n>sp1-geneA\nTTTT\n").unwrap_err();
    match err {
        HybseqError::DuplicateTarget {
            organism, gene, ..
        } => {
            assert_eq!(organism, "sp1");
            assert_eq!(gene, "geneA");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn representative_selection_end_to_end() {
    let mut ts = catalog(">sp1-geneA\nACGTACGT\n>sp2-geneA\nACGTACGT\n").unwrap();
    // sp1 accumulates the higher aggregate mapping score
    ts.ingest_alignment(&mapped("r1", "sp1-geneA", 40)).unwrap();
    ts.ingest_alignment(&mapped("r2", "sp1-geneA", 40)).unwrap();
    ts.ingest_alignment(&mapped("r3", "sp2-geneA", 60)).unwrap();

    let reps = ts.representatives();
    let rep = ts.target(reps["geneA"].expect("gene has organisms"));
    assert_eq!(rep.organism, "sp1");
    assert_eq!(rep.gene, "geneA");
}

#[test]
fn unmapped_records_count_as_off_target_only() {
    let mut ts = catalog(">sp1-geneA\nACGT\n").unwrap();
    let unmapped = SamRecord::parse("r1\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII").unwrap();
    ts.ingest_alignment(&unmapped).unwrap();
    ts.ingest_alignment(&mapped("r2", "sp1-geneA", 60)).unwrap();

    assert_eq!(ts.off_target_reads(), 1);
    assert_eq!(ts.num_mapped_reads(), 1);
    let names = ts.read_names_for_gene("geneA").unwrap();
    assert_eq!(names.len(), 1);
    assert!(names.contains("r2"));
}
