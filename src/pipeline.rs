//! Whole-run orchestration.
//!
//! One run takes a targets FASTA plus one forward/reverse FASTQ pair and
//! produces a per-gene outcome map. Run-level failures propagate to the
//! caller; per-gene failures are caught at the gene-loop boundary and
//! recorded as skip reasons so the run always reports on every gene. The
//! working directory is archived and removed on every exit path.

use crate::assembly::SpadesAssembler;
use crate::binning::{gene_bin_filename, ReadBinner};
use crate::catalog::TargetSet;
use crate::config::Config;
use crate::error::{HybseqError, Result};
use crate::exec::{check_status, find_tool, run_tool};
use crate::exonerate::ExonerateRunner;
use crate::mapping::BwaRunner;
use crate::reconcile::{GeneOutcome, Provenance, Reconciler, SkipReason};
use crate::seqio::write_fasta_record;
use crate::stats::{
    gene_stats, organism_stats, summary_rows, target_stats, GeneStatsRow, OrganismStatsRow,
    SummaryInputs, SummaryRow, TargetStatsRow,
};
use indexmap::IndexMap;
use log::{debug, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Scoped working directory for one run.
///
/// Created once, handed to every stage, and torn down (or archived, or
/// deliberately kept) exactly once when the run ends, successful or not.
struct WorkDir {
    tmp: Option<TempDir>,
}

impl WorkDir {
    fn create(prefix: &str) -> Result<Self> {
        let tmp = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(WorkDir { tmp: Some(tmp) })
    }

    fn path(&self) -> &Path {
        self.tmp.as_ref().expect("workdir not finished yet").path()
    }

    /// Archives and/or releases the directory.
    fn finish(mut self, tgz: Option<&Path>, keep: bool) -> Result<()> {
        let tmp = self
            .tmp
            .take()
            .ok_or_else(|| HybseqError::IllegalState("workdir already finished".to_string()))?;
        if let Some(tgz) = tgz {
            archive_directory(tmp.path(), tgz)?;
        }
        if keep {
            warn!("not removing working directory {}", tmp.path().display());
            let _ = tmp.into_path();
        }
        Ok(())
    }
}

fn archive_directory(directory: &Path, tgz: &Path) -> Result<()> {
    let parent = directory
        .parent()
        .ok_or_else(|| HybseqError::IllegalState("working directory has no parent".to_string()))?;
    let name = directory
        .file_name()
        .ok_or_else(|| HybseqError::IllegalState("working directory has no name".to_string()))?;
    let tar = find_tool("tar")?;
    let mut command = Command::new(tar);
    command.arg("-zcf").arg(tgz).arg("-C").arg(parent).arg(name);
    let output = run_tool(command, "tar", None)?;
    check_status(&output, "tar")
}

/// Everything one run produces.
#[derive(Debug)]
pub struct RunResult {
    /// Per-gene outcome, in catalog gene order.
    pub outcomes: IndexMap<String, GeneOutcome>,
    /// Full summary row-set.
    pub summary: Vec<SummaryRow>,
    /// Per-target statistics.
    pub target_stats: Vec<TargetStatsRow>,
    /// Per-gene statistics.
    pub gene_stats: Vec<GeneStatsRow>,
    /// Per-organism statistics.
    pub organism_stats: Vec<OrganismStatsRow>,
}

impl RunResult {
    /// Writes the reconstructed sequences as FASTA, skipped genes omitted.
    pub fn write_cds_fasta(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        for outcome in self.outcomes.values() {
            if let GeneOutcome::Reconstructed(cds) = outcome {
                write_fasta_record(
                    &mut w,
                    &format!("{} {}", cds.gene, cds.description),
                    &cds.sequence,
                )?;
            }
        }
        use std::io::Write;
        w.flush()?;
        Ok(())
    }
}

/// A HybPiper-style analysis over one sample.
pub struct HybseqPipeline {
    config: Config,
    target_set: TargetSet,
    targets_path: PathBuf,
    forward_fastq: PathBuf,
    reverse_fastq: Option<PathBuf>,
    sample_name: String,
}

impl HybseqPipeline {
    /// Loads the target catalog and prepares a run.
    pub fn new(
        config: Config,
        targets_path: &Path,
        forward_fastq: &Path,
        reverse_fastq: Option<&Path>,
        sample_name: Option<&str>,
    ) -> Result<Self> {
        let target_set = TargetSet::load(targets_path)?;
        let sample_name = sample_name
            .map(|s| s.to_string())
            .or_else(|| {
                forward_fastq
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "sample".to_string());
        Ok(HybseqPipeline {
            config,
            target_set,
            targets_path: targets_path.to_path_buf(),
            forward_fastq: forward_fastq.to_path_buf(),
            reverse_fastq: reverse_fastq.map(Path::to_path_buf),
            sample_name,
        })
    }

    /// True when a reverse read file was supplied.
    pub fn is_paired(&self) -> bool {
        self.reverse_fastq.is_some()
    }

    /// The loaded target catalog.
    pub fn target_set(&self) -> &TargetSet {
        &self.target_set
    }

    /// Runs the whole analysis.
    ///
    /// The working directory is archived (when configured) and cleaned up
    /// whether or not the run succeeds.
    pub fn analyse(&mut self) -> Result<RunResult> {
        self.target_set
            .sanity_check(self.config.allow_invalid_bases)?;
        let workdir = WorkDir::create(&self.config.workdir_prefix)?;
        let result = self.run_in(workdir.path());
        let finish = workdir.finish(
            self.config.workdir_tgz.as_deref(),
            self.config.keep_workdir,
        );
        match result {
            Ok(run) => {
                finish?;
                Ok(run)
            }
            Err(e) => {
                if let Err(finish_error) = finish {
                    warn!("working directory teardown failed: {finish_error}");
                }
                Err(e)
            }
        }
    }

    fn reads_spec(&self) -> String {
        match &self.reverse_fastq {
            Some(reverse) => format!(
                "{}, {}",
                self.forward_fastq.display(),
                reverse.display()
            ),
            None => self.forward_fastq.display().to_string(),
        }
    }

    fn run_in(&mut self, workdir: &Path) -> Result<RunResult> {
        debug!("setting up working directory {}", workdir.display());
        let reference = workdir.join("targets.fasta");
        std::fs::copy(&self.targets_path, &reference)?;

        let bwa = BwaRunner::new(&self.config.bwa);
        bwa.index_reference(&reference)?;
        bwa.map_reads(
            &reference,
            &self.forward_fastq,
            self.reverse_fastq.as_deref(),
            &mut self.target_set,
        )?;

        let mut binner = ReadBinner::new(&self.target_set, workdir);
        binner.bin_reads(&self.forward_fastq, self.reverse_fastq.as_deref())?;

        let representatives = self.target_set.representatives();
        let assembler = SpadesAssembler::new(
            self.config.spades_cov_cutoff,
            self.config.spades_kval_list.clone(),
            self.config.tool_timeout,
        );
        let aligner = ExonerateRunner::new(self.config.tool_timeout);
        let reconciler = Reconciler::new(
            &assembler,
            &aligner,
            self.config.percent_identity_threshold,
        );
        let provenance = Provenance {
            targets_spec: self.targets_path.display().to_string(),
            reads_spec: self.reads_spec(),
        };

        let paired = self.is_paired();
        let target_set = &self.target_set;
        let gene_names = target_set.gene_names();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .map_err(|e| HybseqError::IllegalState(format!("thread pool: {e}")))?;

        // genes are independent; each gets its own working directory so
        // subprocess outputs cannot collide
        let outcome_list: Vec<(String, GeneOutcome)> = pool.install(|| {
            gene_names
                .par_iter()
                .map(|gene_name| {
                    let outcome = (|| -> Result<GeneOutcome> {
                        let gene_workdir = workdir.join(gene_name);
                        std::fs::create_dir(&gene_workdir)?;
                        let representative = representatives
                            .get(gene_name)
                            .and_then(|r| r.map(|i| target_set.target(i)));
                        reconciler.reconstruct_cds(
                            gene_name,
                            representative,
                            &workdir.join(gene_bin_filename(gene_name)),
                            &gene_workdir,
                            paired,
                            &provenance,
                        )
                    })();
                    let outcome = outcome.unwrap_or_else(|e| {
                        warn!("gene {gene_name}: {e}");
                        GeneOutcome::Skipped(SkipReason::GeneError(e.to_string()))
                    });
                    (gene_name.clone(), outcome)
                })
                .collect()
        });
        let outcomes: IndexMap<String, GeneOutcome> = outcome_list.into_iter().collect();

        let summary = summary_rows(
            target_set,
            &SummaryInputs {
                sample_name: &self.sample_name,
                targets_file: &self.targets_path.display().to_string(),
                num_reads_forward: binner.num_reads_forward(),
                num_reads_reverse: self
                    .reverse_fastq
                    .as_ref()
                    .map(|_| binner.num_reads_reverse()),
                representatives: &representatives,
                outcomes: &outcomes,
            },
        );
        Ok(RunResult {
            summary,
            target_stats: target_stats(target_set),
            gene_stats: gene_stats(target_set),
            organism_stats: organism_stats(target_set),
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workdir_is_removed_by_default() {
        let workdir = WorkDir::create("hybseqtest").unwrap();
        let path = workdir.path().to_path_buf();
        assert!(path.exists());
        workdir.finish(None, false).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn kept_workdir_survives_finish() {
        let workdir = WorkDir::create("hybseqtest").unwrap();
        let path = workdir.path().to_path_buf();
        workdir.finish(None, true).unwrap();
        assert!(path.exists());
        std::fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn archive_contains_workdir_contents() {
        if find_tool("tar").is_err() {
            eprintln!("tar not found, skipping");
            return;
        }
        let workdir = WorkDir::create("hybseqtest").unwrap();
        std::fs::write(workdir.path().join("marker.txt"), "x").unwrap();
        let out = tempfile::tempdir().unwrap();
        let tgz = out.path().join("work.tgz");
        workdir.finish(Some(&tgz), false).unwrap();
        assert!(tgz.exists());
        assert!(std::fs::metadata(&tgz).unwrap().len() > 0);
    }
}
