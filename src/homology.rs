//! Homology-search ingestion, an alternative to read mapping.
//!
//! Queries are streamed into `blastn` on its standard input from a writer
//! thread while this thread drains standard output, and both are joined
//! before the exit status is inspected. That keeps either pipe from filling
//! up and deadlocking the child.

use crate::catalog::TargetSet;
use crate::error::{HybseqError, Result};
use crate::exec::{check_status, find_tool, run_tool};
use crate::seqio::FastaRecord;
use indexmap::IndexMap;
use log::debug;
use std::fmt::Write as _;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// One tabular homology hit.
#[derive(Debug, Clone, PartialEq)]
pub struct HomologyHit {
    /// Query sequence identifier.
    pub query_id: String,
    /// Subject (catalog target) identifier.
    pub subject_id: String,
    /// Bit score of the hit.
    pub bit_score: f64,
}

/// Subprocess wrapper around `makeblastdb` and `blastn`.
#[derive(Debug, Clone, Default)]
pub struct BlastRunner {
    /// Bounded wait applied to database construction.
    pub timeout: Option<Duration>,
}

impl BlastRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        BlastRunner { timeout }
    }

    /// Builds a nucleotide BLAST database over the catalog FASTA.
    pub fn make_database(&self, fasta: &Path) -> Result<()> {
        let makeblastdb = find_tool("makeblastdb")?;
        let mut command = Command::new(makeblastdb);
        command.arg("-dbtype").arg("nucl").arg("-in").arg(fasta);
        let output = run_tool(command, "makeblastdb", self.timeout)?;
        check_status(&output, "makeblastdb")
    }

    /// Searches the given queries against a prepared database, returning
    /// all hits in output order.
    pub fn search(&self, database: &Path, queries: &[FastaRecord]) -> Result<Vec<HomologyHit>> {
        let blastn = find_tool("blastn")?;
        let mut command = Command::new(blastn);
        command
            .arg("-db")
            .arg(database)
            .arg("-outfmt")
            .arg("6 qseqid sseqid bitscore");
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("{command:?}");
        let mut child = command.spawn()?;

        let mut query_text = String::new();
        for record in queries {
            let _ = writeln!(query_text, ">{}\n{}", record.id, record.seq);
        }
        let mut stdin = child.stdin.take().expect("stdin piped above");
        let writer = thread::spawn(move || {
            let result = stdin.write_all(query_text.as_bytes());
            drop(stdin);
            result
        });
        let mut stderr = child.stderr.take().expect("stderr piped above");
        let stderr_thread = thread::spawn(move || {
            let mut buf = String::new();
            let _ = std::io::Read::read_to_string(&mut stderr, &mut buf);
            buf
        });

        let stdout = child.stdout.take().expect("stdout piped above");
        let mut hits = Vec::new();
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            hits.push(parse_hit_line(&line)?);
        }

        writer
            .join()
            .map_err(|_| HybseqError::IllegalState("blastn writer thread panicked".to_string()))??;
        let status = child.wait()?;
        let stderr_text = stderr_thread.join().unwrap_or_default();
        if !status.success() {
            return Err(HybseqError::ToolFailed {
                tool: "blastn".to_string(),
                status: status.code().unwrap_or(-1),
                detail: stderr_text.lines().last().unwrap_or("").to_string(),
            });
        }
        Ok(hits)
    }
}

fn parse_hit_line(line: &str) -> Result<HomologyHit> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 {
        return Err(HybseqError::HomologyParse(line.to_string()));
    }
    Ok(HomologyHit {
        query_id: fields[0].to_string(),
        subject_id: fields[1].to_string(),
        bit_score: fields[2]
            .parse()
            .map_err(|_| HybseqError::HomologyParse(line.to_string()))?,
    })
}

/// Groups hits per query, preserving arrival order inside each group.
pub fn group_hits_by_query(hits: &[HomologyHit]) -> IndexMap<String, Vec<&HomologyHit>> {
    let mut groups: IndexMap<String, Vec<&HomologyHit>> = IndexMap::new();
    for hit in hits {
        groups.entry(hit.query_id.clone()).or_default().push(hit);
    }
    groups
}

/// Ingests the best hit per (query, subject) pair into the catalog as
/// homology-derived mapped reads.
pub fn ingest_best_hits(target_set: &mut TargetSet, hits: &[HomologyHit]) -> Result<()> {
    let mut best: IndexMap<(String, String), f64> = IndexMap::new();
    for hit in hits {
        let key = (hit.query_id.clone(), hit.subject_id.clone());
        let entry = best.entry(key).or_insert(hit.bit_score);
        if hit.bit_score > *entry {
            *entry = hit.bit_score;
        }
    }
    for ((query_id, subject_id), bit_score) in best {
        target_set.ingest_homology_hit(&subject_id, &query_id, bit_score)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seqio::FastaReader;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn hit(query: &str, subject: &str, score: f64) -> HomologyHit {
        HomologyHit {
            query_id: query.to_string(),
            subject_id: subject.to_string(),
            bit_score: score,
        }
    }

    #[test]
    fn parses_tabular_hits() {
        let parsed = parse_hit_line("read1\tsp1-geneA\t87.5").unwrap();
        assert_eq!(parsed, hit("read1", "sp1-geneA", 87.5));
        assert!(parse_hit_line("read1\tsp1-geneA").is_err());
    }

    #[test]
    fn groups_hits_per_query() {
        let hits = vec![
            hit("read1", "sp1-geneA", 50.0),
            hit("read2", "sp1-geneA", 40.0),
            hit("read1", "sp2-geneA", 60.0),
        ];
        let groups = group_hits_by_query(&hits);
        assert_eq!(groups["read1"].len(), 2);
        assert_eq!(groups["read2"].len(), 1);
    }

    #[test]
    fn best_hit_per_pair_reaches_the_catalog() {
        let mut ts = TargetSet::read_from(FastaReader::new(Cursor::new(
            b">sp1-geneA\nACGT\n".to_vec(),
        )))
        .unwrap();
        let hits = vec![
            hit("read1", "sp1-geneA", 50.0),
            hit("read1", "sp1-geneA", 75.0),
            hit("read1", "sp1-geneA", 60.0),
        ];
        ingest_best_hits(&mut ts, &hits).unwrap();
        let target = ts.target(0);
        assert_eq!(target.num_mapped_reads(), 1);
        assert_eq!(target.score_sum(), Some(75.0));
        assert_eq!(target.mapped_reads()[0].read_id(), "read1");
    }
}
