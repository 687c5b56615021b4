//! Distribution of raw reads into per-gene FASTA bin files.
//!
//! Reads are streamed once; every read that mapped to any organism's copy of
//! a gene is appended to that gene's bin. Bins grow incrementally on disk so
//! no bin is ever held in memory. Paired-end input is consumed in lockstep
//! and any disagreement between the two streams aborts the run.

use crate::catalog::TargetSet;
use crate::error::{HybseqError, Result};
use crate::seqio::{write_fasta_record, FastqFile, FastqRecord};
use indexmap::IndexMap;
use log::debug;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// File name of a gene's read bin inside the working directory.
pub fn gene_bin_filename(gene_name: &str) -> String {
    format!("gene-{gene_name}.fasta")
}

/// Streams FASTQ input into per-gene FASTA bins.
pub struct ReadBinner {
    index: IndexMap<String, Vec<String>>,
    workdir: PathBuf,
    bins: HashMap<String, BufWriter<File>>,
    num_reads_forward: u64,
    num_reads_reverse: u64,
}

impl ReadBinner {
    /// Builds a binner over the catalog's read-to-genes index.
    pub fn new(target_set: &TargetSet, workdir: &Path) -> Self {
        ReadBinner {
            index: target_set.read_to_genes_index(),
            workdir: workdir.to_path_buf(),
            bins: HashMap::new(),
            num_reads_forward: 0,
            num_reads_reverse: 0,
        }
    }

    /// Number of reads seen in the forward stream.
    pub fn num_reads_forward(&self) -> u64 {
        self.num_reads_forward
    }

    /// Number of reads seen in the reverse stream.
    pub fn num_reads_reverse(&self) -> u64 {
        self.num_reads_reverse
    }

    /// Bins reads from one FASTQ file, or from a pair consumed in lockstep.
    pub fn bin_reads(&mut self, forward: &Path, reverse: Option<&Path>) -> Result<()> {
        match reverse {
            Some(reverse) => self.bin_paired(forward, reverse),
            None => self.bin_single(forward),
        }?;
        for bin in self.bins.values_mut() {
            use std::io::Write;
            bin.flush()?;
        }
        Ok(())
    }

    fn bin_single(&mut self, forward: &Path) -> Result<()> {
        let mut reader = FastqFile::open(forward)?;
        while let Some(record) = reader.read_next()? {
            self.num_reads_forward += 1;
            for gene_name in self.genes_for(record.name()) {
                self.append(&gene_name, &[&record])?;
            }
        }
        Ok(())
    }

    fn bin_paired(&mut self, forward: &Path, reverse: &Path) -> Result<()> {
        let mut forward_reader = FastqFile::open(forward)?;
        let mut reverse_reader = FastqFile::open(reverse)?;
        while let Some(fwd) = forward_reader.read_next()? {
            self.num_reads_forward += 1;
            let rev = reverse_reader.read_next()?.ok_or_else(|| {
                HybseqError::ReadPairSync(format!(
                    "{} ended before {} at read {}",
                    reverse.display(),
                    forward.display(),
                    fwd.title
                ))
            })?;
            self.num_reads_reverse += 1;
            if fwd.name() != rev.name() {
                return Err(HybseqError::ReadPairSync(format!(
                    "{} / {} out of sync at read {} / {}",
                    forward.display(),
                    reverse.display(),
                    fwd.title,
                    rev.title
                )));
            }
            for gene_name in self.genes_for(fwd.name()) {
                self.append(&gene_name, &[&fwd, &rev])?;
            }
        }
        if reverse_reader.read_next()?.is_some() {
            return Err(HybseqError::ReadPairSync(format!(
                "{} ended before {}",
                forward.display(),
                reverse.display()
            )));
        }
        Ok(())
    }

    fn genes_for(&self, read_name: &str) -> Vec<String> {
        self.index.get(read_name).cloned().unwrap_or_default()
    }

    fn append(&mut self, gene_name: &str, records: &[&FastqRecord]) -> Result<()> {
        if !self.bins.contains_key(gene_name) {
            let path = self.workdir.join(gene_bin_filename(gene_name));
            debug!("appending to {}", path.display());
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            self.bins
                .insert(gene_name.to_string(), BufWriter::new(file));
        }
        let bin = self.bins.get_mut(gene_name).expect("bin opened above");
        for record in records {
            write_fasta_record(bin, &record.title, &record.seq)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sam::SamRecord;
    use crate::seqio::FastaReader;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn target_set_with_reads() -> TargetSet {
        let mut ts = TargetSet::read_from(FastaReader::new(Cursor::new(
            b">sp1-geneA\nACGT\n>sp1-geneB\nACGT\n".to_vec(),
        )))
        .unwrap();
        for (read, rname) in [("read1", "sp1-geneA"), ("read1", "sp1-geneB"), ("read2", "sp1-geneB")] {
            ts.ingest_alignment(
                &SamRecord::parse(&format!("{read}\t0\t{rname}\t1\t60\t4M\t*\t0\t0\tACGT\tIIII"))
                    .unwrap(),
            )
            .unwrap();
        }
        ts
    }

    fn write_fastq(path: &Path, records: &[(&str, &str)]) {
        use std::io::Write;
        let mut f = File::create(path).unwrap();
        for (title, seq) in records {
            writeln!(f, "@{title}\n{seq}\n+\n{}", "I".repeat(seq.len())).unwrap();
        }
    }

    #[test]
    fn single_end_reads_land_in_every_matching_bin() {
        let ts = target_set_with_reads();
        let dir = tempfile::tempdir().unwrap();
        let fastq = dir.path().join("reads.fastq");
        write_fastq(&fastq, &[("read1", "ACGT"), ("read2", "GGGG"), ("read3", "TTTT")]);

        let mut binner = ReadBinner::new(&ts, dir.path());
        binner.bin_reads(&fastq, None).unwrap();
        assert_eq!(binner.num_reads_forward(), 3);

        let bin_a = std::fs::read_to_string(dir.path().join(gene_bin_filename("geneA"))).unwrap();
        assert_eq!(bin_a, ">read1\nACGT\n");
        let bin_b = std::fs::read_to_string(dir.path().join(gene_bin_filename("geneB"))).unwrap();
        assert_eq!(bin_b, ">read1\nACGT\n>read2\nGGGG\n");
    }

    #[test]
    fn paired_reads_are_interleaved() {
        let ts = target_set_with_reads();
        let dir = tempfile::tempdir().unwrap();
        let fwd = dir.path().join("r1.fastq");
        let rev = dir.path().join("r2.fastq");
        write_fastq(&fwd, &[("read2 1", "AAAA")]);
        write_fastq(&rev, &[("read2 2", "CCCC")]);

        let mut binner = ReadBinner::new(&ts, dir.path());
        binner.bin_reads(&fwd, Some(&rev)).unwrap();

        let bin_b = std::fs::read_to_string(dir.path().join(gene_bin_filename("geneB"))).unwrap();
        assert_eq!(bin_b, ">read2 1\nAAAA\n>read2 2\nCCCC\n");
    }

    #[test]
    fn name_mismatch_is_fatal() {
        let ts = target_set_with_reads();
        let dir = tempfile::tempdir().unwrap();
        let fwd = dir.path().join("r1.fastq");
        let rev = dir.path().join("r2.fastq");
        write_fastq(&fwd, &[("read1", "AAAA")]);
        write_fastq(&rev, &[("readX", "CCCC")]);

        let mut binner = ReadBinner::new(&ts, dir.path());
        assert!(matches!(
            binner.bin_reads(&fwd, Some(&rev)),
            Err(HybseqError::ReadPairSync(_))
        ));
    }

    #[test]
    fn premature_end_of_either_stream_is_fatal() {
        let ts = target_set_with_reads();
        let dir = tempfile::tempdir().unwrap();
        let fwd = dir.path().join("r1.fastq");
        let rev = dir.path().join("r2.fastq");
        write_fastq(&fwd, &[("read1", "AAAA"), ("read2", "AAAA")]);
        write_fastq(&rev, &[("read1", "CCCC")]);

        let mut binner = ReadBinner::new(&ts, dir.path());
        assert!(matches!(
            binner.bin_reads(&fwd, Some(&rev)),
            Err(HybseqError::ReadPairSync(_))
        ));

        // reverse longer than forward
        write_fastq(&fwd, &[("read1", "AAAA")]);
        write_fastq(&rev, &[("read1", "CCCC"), ("read2", "CCCC")]);
        let mut binner = ReadBinner::new(&ts, dir.path());
        assert!(matches!(
            binner.bin_reads(&fwd, Some(&rev)),
            Err(HybseqError::ReadPairSync(_))
        ));
    }
}
