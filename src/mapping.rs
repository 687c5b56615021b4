//! Read mapping against the target catalog via `bwa`.
//!
//! `bwa mem` output is streamed line by line into the catalog; a dedicated
//! thread drains stderr concurrently so neither pipe can fill up and stall
//! the child.

use crate::catalog::TargetSet;
use crate::config::BwaParams;
use crate::error::{HybseqError, Result};
use crate::exec::{check_status, find_tool, run_tool};
use crate::sam::SamRecord;
use log::debug;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

/// Runs `bwa` against a reference built from the target catalog.
pub struct BwaRunner<'a> {
    params: &'a BwaParams,
}

impl<'a> BwaRunner<'a> {
    pub fn new(params: &'a BwaParams) -> Self {
        BwaRunner { params }
    }

    /// Builds the `bwa` index files next to the reference FASTA.
    pub fn index_reference(&self, reference: &Path) -> Result<()> {
        let bwa = find_tool("bwa")?;
        let mut command = Command::new(bwa);
        command.arg("index").arg(reference);
        let output = run_tool(command, "bwa index", None)?;
        check_status(&output, "bwa index")
    }

    fn mem_command(
        &self,
        reference: &Path,
        forward: &Path,
        reverse: Option<&Path>,
    ) -> Result<Command> {
        let bwa = find_tool("bwa")?;
        let mut command = Command::new(bwa);
        command.arg("mem").arg("-M");
        if let Some(k) = self.params.min_seed_length {
            command.arg("-k").arg(k.to_string());
        }
        if let Some(r) = self.params.reseed_trigger {
            command.arg("-r").arg(format!("{r}"));
        }
        if let Some(t) = self.params.score_threshold {
            command.arg("-T").arg(t.to_string());
        }
        if let Some(n) = self.params.num_threads {
            command.arg("-t").arg(n.to_string());
        }
        command.arg(reference).arg(forward);
        if let Some(reverse) = reverse {
            command.arg(reverse);
        }
        Ok(command)
    }

    /// Maps reads and ingests every alignment record into the catalog.
    ///
    /// Header lines are skipped; unmapped records reach the catalog too and
    /// feed its off-target counter. A non-zero mapper exit is fatal.
    pub fn map_reads(
        &self,
        reference: &Path,
        forward: &Path,
        reverse: Option<&Path>,
        target_set: &mut TargetSet,
    ) -> Result<()> {
        debug!("mapping reads to gene sequences");
        let mut command = self.mem_command(reference, forward, reverse)?;
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        debug!("{command:?}");
        let mut child = command.spawn()?;

        let mut stderr = child.stderr.take().expect("stderr piped above");
        let stderr_thread = thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            buf
        });

        let stdout = child.stdout.take().expect("stdout piped above");
        let mut ingest_result: Result<()> = Ok(());
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            if line.starts_with('@') {
                continue;
            }
            let record = SamRecord::parse(&line)?;
            if let Err(e) = target_set.ingest_alignment(&record) {
                // remember the first ingestion failure, but keep draining
                // the pipe so the child can exit
                if ingest_result.is_ok() {
                    ingest_result = Err(e);
                }
            }
        }

        let status = child.wait()?;
        let stderr_text = stderr_thread
            .join()
            .unwrap_or_else(|_| "stderr reader panicked".to_string());
        if !status.success() {
            return Err(HybseqError::ToolFailed {
                tool: "bwa mem".to_string(),
                status: status.code().unwrap_or(-1),
                detail: stderr_text.lines().last().unwrap_or("").to_string(),
            });
        }
        ingest_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_command_includes_configured_options() {
        // only run where bwa is discoverable; the command itself is not
        // executed
        if find_tool("bwa").is_err() {
            eprintln!("bwa not found, skipping");
            return;
        }
        let params = BwaParams {
            num_threads: Some(4),
            min_seed_length: Some(19),
            score_threshold: Some(30),
            reseed_trigger: Some(1.5),
        };
        let runner = BwaRunner::new(&params);
        let command = runner
            .mem_command(
                Path::new("targets.fasta"),
                Path::new("r1.fastq"),
                Some(Path::new("r2.fastq")),
            )
            .unwrap();
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert!(args.contains(&"-M".to_string()));
        assert!(args.contains(&"-k".to_string()));
        assert!(args.contains(&"19".to_string()));
        assert!(args.contains(&"r2.fastq".to_string()));
    }
}
