//! Command-line entry point for the hybseq pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use hybseq::stats::write_csv;
use hybseq::{BwaParams, Config, HybseqPipeline};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hybseq")]
#[command(version)]
#[command(about = "Targeted gene recovery from hybrid-capture sequencing reads")]
#[command(long_about = r#"
hybseq - reconstruct gene coding sequences from capture sequencing reads

WORKFLOW:
  Reads -> bwa mapping -> per-gene binning -> SPAdes assembly
        -> exonerate reconciliation -> one reconstructed CDS per gene

Genes that cannot be reconstructed are reported with an explicit reason
(e.g. "no contigs") and never abort the run.

EXTERNAL TOOLS:
  bwa, spades.py, exonerate and tar must be on PATH; HYBSEQ_<TOOL>
  environment variables override the lookup (e.g. HYBSEQ_SPADES_PY).
"#)]
struct Args {
    /// Targets FASTA with organism-gene record identifiers
    #[arg(short = 't', long)]
    targets: PathBuf,

    /// Forward reads FASTQ (plain or .gz)
    #[arg(short = '1', long)]
    forward: PathBuf,

    /// Reverse reads FASTQ for paired-end input
    #[arg(short = '2', long)]
    reverse: Option<PathBuf>,

    /// Sample name used in the summary (default: forward file stem)
    #[arg(long)]
    sample_name: Option<String>,

    /// Write reconstructed coding sequences to this FASTA file
    #[arg(short = 'o', long)]
    out_fasta: Option<PathBuf>,

    /// Write per-target statistics to this CSV file
    #[arg(long)]
    target_stats_csv: Option<PathBuf>,

    /// Write per-gene statistics to this CSV file
    #[arg(long)]
    gene_stats_csv: Option<PathBuf>,

    /// Write per-organism statistics to this CSV file
    #[arg(long)]
    organism_stats_csv: Option<PathBuf>,

    /// Write the full run summary to this CSV file
    #[arg(long)]
    summary_csv: Option<PathBuf>,

    /// Archive the working directory to this .tgz file
    #[arg(long)]
    workdir_tgz: Option<PathBuf>,

    /// Keep the working directory for debugging
    #[arg(long)]
    keep_workdir: bool,

    /// Percent-identity floor for exonerate results
    #[arg(long, default_value_t = 65.0)]
    identity_threshold: f64,

    /// SPAdes coverage cutoff
    #[arg(long, default_value_t = 8)]
    cov_cutoff: u32,

    /// SPAdes k-mer sizes, comma-separated (default: SPAdes chooses)
    #[arg(long, value_delimiter = ',')]
    kvals: Option<Vec<u32>>,

    /// Accept target sequences with non-ACGT symbols
    #[arg(long)]
    allow_invalid_bases: bool,

    /// bwa mapping threads
    #[arg(long)]
    bwa_threads: Option<u32>,

    /// bwa minimum seed length (-k)
    #[arg(long)]
    bwa_min_seed_length: Option<u32>,

    /// bwa score threshold (-T)
    #[arg(long)]
    bwa_score_threshold: Option<u32>,

    /// Genes reconciled concurrently (default: CPU cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Per-tool timeout in seconds for batch tool invocations
    #[arg(long)]
    tool_timeout: Option<u64>,

    /// Increase log verbosity (repeat for debug output)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn build_config(args: &Args) -> Config {
    let mut builder = Config::builder()
        .percent_identity_threshold(args.identity_threshold)
        .spades_cov_cutoff(args.cov_cutoff)
        .allow_invalid_bases(args.allow_invalid_bases)
        .keep_workdir(args.keep_workdir)
        .bwa(BwaParams {
            num_threads: args.bwa_threads,
            min_seed_length: args.bwa_min_seed_length,
            score_threshold: args.bwa_score_threshold,
            reseed_trigger: None,
        });
    if let Some(kvals) = &args.kvals {
        builder = builder.spades_kval_list(kvals.clone());
    }
    if args.threads > 0 {
        builder = builder.num_threads(args.threads);
    }
    if let Some(tgz) = &args.workdir_tgz {
        builder = builder.workdir_tgz(tgz.clone());
    }
    if let Some(seconds) = args.tool_timeout {
        builder = builder.tool_timeout(std::time::Duration::from_secs(seconds));
    }
    builder.build()
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = build_config(&args);
    let mut pipeline = HybseqPipeline::new(
        config,
        &args.targets,
        &args.forward,
        args.reverse.as_deref(),
        args.sample_name.as_deref(),
    )
    .context("failed to load target catalog")?;

    let result = pipeline.analyse().context("run failed")?;

    let reconstructed = result
        .outcomes
        .values()
        .filter(|o| o.cds().is_some())
        .count();
    eprintln!(
        "{} of {} genes reconstructed",
        reconstructed,
        result.outcomes.len()
    );
    for (gene, outcome) in &result.outcomes {
        if let Some(reason) = outcome.skip_reason() {
            eprintln!("  {gene}: {reason}");
        }
    }

    if let Some(path) = &args.out_fasta {
        result
            .write_cds_fasta(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &args.target_stats_csv {
        write_csv(&result.target_stats, path)?;
    }
    if let Some(path) = &args.gene_stats_csv {
        write_csv(&result.gene_stats, path)?;
    }
    if let Some(path) = &args.organism_stats_csv {
        write_csv(&result.organism_stats, path)?;
    }
    if let Some(path) = &args.summary_csv {
        write_csv(&result.summary, path)?;
    }
    Ok(())
}
