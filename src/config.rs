//! Configuration options for a hybseq run.
//!
//! This module provides a builder pattern for configuring the pipeline,
//! covering mapping, assembly, reconciliation and working-directory behavior.

use std::path::PathBuf;
use std::time::Duration;

/// Parameters passed through to `bwa` invocations.
///
/// Every field defaults to `None`, which leaves the corresponding `bwa`
/// default in effect.
#[derive(Debug, Clone, Default)]
pub struct BwaParams {
    /// Number of mapping threads (`-t` option)
    pub num_threads: Option<u32>,

    /// Minimum seed length (`-k` option)
    pub min_seed_length: Option<u32>,

    /// Score threshold for recording reads as mapped (`-T` option)
    pub score_threshold: Option<u32>,

    /// Re-seed trigger (`-r` option)
    pub reseed_trigger: Option<f64>,
}

/// Configuration for a hybseq pipeline run.
///
/// Use the builder to construct configurations with non-default values.
///
/// # Default Values
/// - `percent_identity_threshold`: 65.0
/// - `spades_cov_cutoff`: 8
/// - `spades_kval_list`: None (SPAdes default k values)
/// - `num_threads`: number of CPU cores
/// - `tool_timeout`: None (block until the tool finishes)
#[derive(Debug, Clone)]
pub struct Config {
    /// Percent-identity floor applied to exonerate results during filtering
    pub percent_identity_threshold: f64,

    /// Accept target sequences with symbols outside {A,C,G,T}
    pub allow_invalid_bases: bool,

    /// SPAdes coverage cutoff (`--cov-cutoff` option)
    pub spades_cov_cutoff: u32,

    /// SPAdes oligomer length list (`-k` option), `None` for SPAdes defaults
    pub spades_kval_list: Option<Vec<u32>>,

    /// Parameters forwarded to `bwa`
    pub bwa: BwaParams,

    /// Number of genes reconciled concurrently
    pub num_threads: usize,

    /// Keep the working directory instead of removing it on completion
    pub keep_workdir: bool,

    /// Archive the working directory to this `.tgz` path on completion
    pub workdir_tgz: Option<PathBuf>,

    /// Prefix for the generated working directory name
    pub workdir_prefix: String,

    /// Bounded wait applied to batch external tool invocations.
    ///
    /// Streaming tools (`bwa mem`, `blastn`) are drained to completion and
    /// are not subject to this limit.
    pub tool_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            percent_identity_threshold: 65.0,
            allow_invalid_bases: false,
            spades_cov_cutoff: 8,
            spades_kval_list: None,
            bwa: BwaParams::default(),
            num_threads: num_cpus::get().max(1),
            keep_workdir: false,
            workdir_tgz: None,
            workdir_prefix: "hybseqtmp".to_string(),
            tool_timeout: None,
        }
    }
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Example
    /// ```
    /// use hybseq::Config;
    ///
    /// let config = Config::builder()
    ///     .percent_identity_threshold(70.0)
    ///     .spades_cov_cutoff(4)
    ///     .num_threads(4)
    ///     .build();
    /// ```
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for constructing [`Config`] instances.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the percent-identity floor for exonerate result filtering.
    ///
    /// Value is a percentage between 0.0 and 100.0.
    /// Default: 65.0
    pub fn percent_identity_threshold(mut self, threshold: f64) -> Self {
        assert!(
            (0.0..=100.0).contains(&threshold),
            "percent identity threshold must be between 0.0 and 100.0"
        );
        self.config.percent_identity_threshold = threshold;
        self
    }

    /// Accept target catalog sequences containing non-ACGT symbols.
    ///
    /// Default: false
    pub fn allow_invalid_bases(mut self, allow: bool) -> Self {
        self.config.allow_invalid_bases = allow;
        self
    }

    /// Sets the SPAdes coverage cutoff.
    ///
    /// Default: 8
    pub fn spades_cov_cutoff(mut self, cutoff: u32) -> Self {
        self.config.spades_cov_cutoff = cutoff;
        self
    }

    /// Sets the SPAdes oligomer length list (`-k`).
    ///
    /// Default: None (SPAdes chooses)
    pub fn spades_kval_list(mut self, kvals: Vec<u32>) -> Self {
        self.config.spades_kval_list = Some(kvals);
        self
    }

    /// Sets the parameters forwarded to `bwa`.
    pub fn bwa(mut self, params: BwaParams) -> Self {
        self.config.bwa = params;
        self
    }

    /// Sets the number of genes reconciled concurrently.
    ///
    /// Default: number of CPU cores
    pub fn num_threads(mut self, threads: usize) -> Self {
        assert!(threads > 0, "number of threads must be positive");
        self.config.num_threads = threads;
        self
    }

    /// Keep the working directory for debugging.
    ///
    /// Default: false
    pub fn keep_workdir(mut self, keep: bool) -> Self {
        self.config.keep_workdir = keep;
        self
    }

    /// Archive the working directory to the given `.tgz` path.
    ///
    /// Default: None
    pub fn workdir_tgz(mut self, path: PathBuf) -> Self {
        self.config.workdir_tgz = Some(path);
        self
    }

    /// Sets the prefix of the generated working directory name.
    ///
    /// Default: "hybseqtmp"
    pub fn workdir_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.workdir_prefix = prefix.into();
        self
    }

    /// Sets a bounded wait for batch external tool invocations.
    ///
    /// Default: None (wait indefinitely)
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = Some(timeout);
        self
    }

    /// Builds the final [`Config`] instance.
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = Config::builder()
            .percent_identity_threshold(70.0)
            .spades_cov_cutoff(4)
            .num_threads(2)
            .keep_workdir(true)
            .build();

        assert_eq!(config.percent_identity_threshold, 70.0);
        assert_eq!(config.spades_cov_cutoff, 4);
        assert_eq!(config.num_threads, 2);
        assert!(config.keep_workdir);
        assert!(config.workdir_tgz.is_none());
    }

    #[test]
    #[should_panic(expected = "percent identity threshold")]
    fn builder_rejects_out_of_range_identity() {
        let _ = Config::builder().percent_identity_threshold(101.0);
    }
}
