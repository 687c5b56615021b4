//! Per-gene de novo assembly via SPAdes.
//!
//! Assembler failure is not fatal: a gene whose assembly crashes simply has
//! no contigs, and the run moves on to the next gene.

use crate::error::Result;
use crate::exec::{find_tool, run_tool};
use crate::seqio::{FastaReader, FastaRecord};
use log::{debug, warn};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Seam for the per-gene assembly step, so the reconciliation engine can run
/// against stub assemblers in tests.
pub trait Assembler: Sync {
    /// Assembles a gene's read bin into contigs.
    ///
    /// Returns `None` when no contigs could be produced, for whatever
    /// reason; only infrastructure problems (tool missing, unreadable
    /// output) are errors.
    fn assemble(
        &self,
        gene_name: &str,
        bin_fasta: &Path,
        gene_workdir: &Path,
        paired: bool,
    ) -> Result<Option<Vec<FastaRecord>>>;
}

/// Subprocess wrapper around `spades.py --only-assembler`.
#[derive(Debug, Clone)]
pub struct SpadesAssembler {
    /// Coverage cutoff (`--cov-cutoff`)
    pub cov_cutoff: u32,
    /// Oligomer length list (`-k`), `None` for SPAdes defaults
    pub kval_list: Option<Vec<u32>>,
    /// Bounded wait applied to each invocation
    pub timeout: Option<Duration>,
}

impl SpadesAssembler {
    pub fn new(cov_cutoff: u32, kval_list: Option<Vec<u32>>, timeout: Option<Duration>) -> Self {
        SpadesAssembler {
            cov_cutoff,
            kval_list,
            timeout,
        }
    }
}

/// Name of the assembly output directory inside a gene's working directory.
pub fn assembly_dirname(gene_name: &str) -> String {
    format!("spades-{gene_name}")
}

impl Assembler for SpadesAssembler {
    fn assemble(
        &self,
        gene_name: &str,
        bin_fasta: &Path,
        gene_workdir: &Path,
        paired: bool,
    ) -> Result<Option<Vec<FastaRecord>>> {
        if !bin_fasta.exists() {
            debug!(
                "gene {gene_name}: read bin {} does not exist (no reads?)",
                bin_fasta.display()
            );
            return Ok(None);
        }
        let spades = find_tool("spades.py")?;
        let outdir = gene_workdir.join(assembly_dirname(gene_name));
        let mut command = Command::new(spades);
        command
            .arg("--only-assembler")
            .arg("--threads")
            .arg("1")
            .arg("--cov-cutoff")
            .arg(self.cov_cutoff.to_string());
        if let Some(kvals) = &self.kval_list {
            let joined = kvals
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(",");
            command.arg("-k").arg(joined);
        }
        if paired {
            command.arg("--12").arg(bin_fasta);
        } else {
            command.arg("-s").arg(bin_fasta);
        }
        command.arg("-o").arg(&outdir);

        let output = run_tool(command, "spades.py", self.timeout)?;
        if !output.status.success() {
            warn!(
                "gene {gene_name}: spades exited with {}",
                output.status.code().unwrap_or(-1)
            );
        }

        let contigs_path = outdir.join("contigs.fasta");
        if !contigs_path.exists() {
            return Ok(None);
        }
        let contigs: Vec<FastaRecord> =
            FastaReader::open(&contigs_path)?.collect::<Result<Vec<_>>>()?;
        Ok(Some(contigs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bin_yields_no_contigs() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = SpadesAssembler::new(8, None, None);
        let result = assembler
            .assemble("geneA", &dir.path().join("gene-geneA.fasta"), dir.path(), false)
            .unwrap();
        assert!(result.is_none());
    }
}
