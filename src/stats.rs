//! Derived statistics over the catalog and reconstruction outcomes.
//!
//! All rows are computed on demand from append-only run state, so there is
//! no caching to invalidate. Rows serialize directly to CSV.

use crate::catalog::TargetSet;
use crate::error::Result;
use crate::reconcile::GeneOutcome;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;

/// Per-target statistics row.
#[derive(Debug, Clone, Serialize)]
pub struct TargetStatsRow {
    pub organism: String,
    pub gene: String,
    pub seq_length: usize,
    pub num_mapped_reads: usize,
}

/// Per-gene statistics row.
#[derive(Debug, Clone, Serialize)]
pub struct GeneStatsRow {
    pub gene: String,
    pub num_organisms: usize,
    pub mean_target_length: Option<f64>,
    pub num_mapped_reads: usize,
}

/// Per-organism statistics row.
#[derive(Debug, Clone, Serialize)]
pub struct OrganismStatsRow {
    pub organism: String,
    pub num_genes: usize,
    pub num_mapped_reads: usize,
}

/// One row of the full run summary, combining read counts with the
/// reconstruction outcome of one gene.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub sample_name: String,
    pub targets_file: String,
    pub gene: String,
    pub representative_organism: Option<String>,
    pub mean_target_length: Option<f64>,
    pub num_reads_forward: u64,
    pub num_reads_reverse: Option<u64>,
    pub num_mapped_reads: usize,
    pub reconstructed_length: Option<usize>,
    pub outcome: String,
}

/// Per-target rows, in catalog order.
pub fn target_stats(target_set: &TargetSet) -> Vec<TargetStatsRow> {
    target_set
        .targets()
        .iter()
        .map(|t| TargetStatsRow {
            organism: t.organism.clone(),
            gene: t.gene.clone(),
            seq_length: t.sequence.len(),
            num_mapped_reads: t.num_mapped_reads(),
        })
        .collect()
}

/// Per-gene rows, in catalog order.
pub fn gene_stats(target_set: &TargetSet) -> Vec<GeneStatsRow> {
    target_set
        .genes()
        .values()
        .map(|gene| {
            let num_mapped_reads = gene
                .targets()
                .values()
                .map(|&i| target_set.target(i).num_mapped_reads())
                .sum();
            GeneStatsRow {
                gene: gene.name.clone(),
                num_organisms: gene.targets().len(),
                mean_target_length: target_set
                    .mean_target_length(&gene.name)
                    .expect("gene taken from the registry"),
                num_mapped_reads,
            }
        })
        .collect()
}

/// Per-organism rows, in catalog order.
pub fn organism_stats(target_set: &TargetSet) -> Vec<OrganismStatsRow> {
    target_set
        .organisms()
        .values()
        .map(|organism| OrganismStatsRow {
            organism: organism.name.clone(),
            num_genes: organism.targets().len(),
            num_mapped_reads: organism
                .targets()
                .values()
                .map(|&i| target_set.target(i).num_mapped_reads())
                .sum(),
        })
        .collect()
}

/// Inputs to the run summary beyond the catalog itself.
pub struct SummaryInputs<'a> {
    pub sample_name: &'a str,
    pub targets_file: &'a str,
    pub num_reads_forward: u64,
    pub num_reads_reverse: Option<u64>,
    pub representatives: &'a IndexMap<String, Option<usize>>,
    pub outcomes: &'a IndexMap<String, GeneOutcome>,
}

/// Builds the full summary row-set, one row per gene in catalog order.
pub fn summary_rows(target_set: &TargetSet, inputs: &SummaryInputs) -> Vec<SummaryRow> {
    target_set
        .genes()
        .values()
        .map(|gene| {
            let representative_organism = inputs
                .representatives
                .get(&gene.name)
                .and_then(|r| r.map(|i| target_set.target(i).organism.clone()));
            let num_mapped_reads = gene
                .targets()
                .values()
                .map(|&i| target_set.target(i).num_mapped_reads())
                .sum();
            let (reconstructed_length, outcome) = match inputs.outcomes.get(&gene.name) {
                Some(GeneOutcome::Reconstructed(cds)) => {
                    (Some(cds.sequence.len()), "reconstructed".to_string())
                }
                Some(GeneOutcome::Skipped(reason)) => (None, reason.to_string()),
                None => (None, "not processed".to_string()),
            };
            SummaryRow {
                sample_name: inputs.sample_name.to_string(),
                targets_file: inputs.targets_file.to_string(),
                gene: gene.name.clone(),
                representative_organism,
                mean_target_length: target_set
                    .mean_target_length(&gene.name)
                    .expect("gene taken from the registry"),
                num_reads_forward: inputs.num_reads_forward,
                num_reads_reverse: inputs.num_reads_reverse,
                num_mapped_reads,
                reconstructed_length,
                outcome,
            }
        })
        .collect()
}

/// Serializes rows to a CSV file with a header row.
pub fn write_csv<T: Serialize>(rows: &[T], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{ReconstructedCds, SkipReason};
    use crate::sam::SamRecord;
    use crate::seqio::FastaReader;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn target_set() -> TargetSet {
        let mut ts = TargetSet::read_from(FastaReader::new(Cursor::new(
            b">sp1-geneA\nACGTAC\n>sp2-geneA\nACGT\n>sp1-geneB\nACGT\n".to_vec(),
        )))
        .unwrap();
        ts.ingest_alignment(
            &SamRecord::parse("read1\t0\tsp1-geneA\t1\t60\t4M\t*\t0\t0\tACGT\tIIII").unwrap(),
        )
        .unwrap();
        ts
    }

    #[test]
    fn row_counts_match_catalog_cardinalities() {
        let ts = target_set();
        assert_eq!(target_stats(&ts).len(), 3);
        assert_eq!(gene_stats(&ts).len(), 2);
        assert_eq!(organism_stats(&ts).len(), 2);

        let gene_a = &gene_stats(&ts)[0];
        assert_eq!(gene_a.gene, "geneA");
        assert_eq!(gene_a.num_organisms, 2);
        assert_eq!(gene_a.mean_target_length, Some(5.0));
        assert_eq!(gene_a.num_mapped_reads, 1);
    }

    #[test]
    fn summary_reports_every_gene() {
        let ts = target_set();
        let representatives = ts.representatives();
        let mut outcomes = IndexMap::new();
        outcomes.insert(
            "geneA".to_string(),
            GeneOutcome::Reconstructed(ReconstructedCds {
                gene: "geneA".to_string(),
                sequence: "ATGTAA".to_string(),
                description: String::new(),
            }),
        );
        outcomes.insert(
            "geneB".to_string(),
            GeneOutcome::Skipped(SkipReason::NoContigs),
        );
        let rows = summary_rows(
            &ts,
            &SummaryInputs {
                sample_name: "sample1",
                targets_file: "targets.fasta",
                num_reads_forward: 10,
                num_reads_reverse: Some(10),
                representatives: &representatives,
                outcomes: &outcomes,
            },
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].gene, "geneA");
        assert_eq!(rows[0].reconstructed_length, Some(6));
        assert_eq!(rows[0].outcome, "reconstructed");
        assert_eq!(rows[0].representative_organism.as_deref(), Some("sp1"));
        assert_eq!(rows[1].outcome, "no contigs");
        assert_eq!(rows[1].reconstructed_length, None);
    }

    #[test]
    fn csv_round_trip_has_header_and_rows() {
        let ts = target_set();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.csv");
        write_csv(&target_stats(&ts), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "organism,gene,seq_length,num_mapped_reads"
        );
        assert_eq!(lines.count(), 3);
    }
}
