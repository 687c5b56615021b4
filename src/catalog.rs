//! Target catalog: organisms, genes and their reference sequences.
//!
//! The catalog is an arena of [`Target`] records indexed by position;
//! [`Organism`] and [`Gene`] registries hold name-keyed maps of arena
//! indices, so the organism/gene/target triangle carries no reference
//! cycles. All maps preserve insertion order, which pins tie-breaking and
//! report ordering to the order of the input FASTA.

use crate::error::{HybseqError, Result};
use crate::sam::SamRecord;
use crate::seqio::{FastaReader, FastaRecord};
use indexmap::{IndexMap, IndexSet};
use log::info;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Organism name assigned to catalog entries without an `organism-gene`
/// identifier.
pub const UNKNOWN_ORGANISM: &str = "unknown";

/// One read mapped to a target, tagged by the evidence source.
///
/// Both variants expose a read identifier and a mapping-confidence score;
/// alignment-derived reads score by mapping quality, homology-derived reads
/// by best-hit bit score.
#[derive(Debug, Clone)]
pub enum MappedRead {
    /// Derived from a sequence-mapper alignment record.
    Alignment { read_id: String, mapq: u8 },
    /// Derived from a homology-search best hit.
    Homology { read_id: String, bit_score: f64 },
}

impl MappedRead {
    /// Identifier of the mapped read.
    pub fn read_id(&self) -> &str {
        match self {
            MappedRead::Alignment { read_id, .. } => read_id,
            MappedRead::Homology { read_id, .. } => read_id,
        }
    }

    /// Mapping-confidence score.
    pub fn score(&self) -> f64 {
        match self {
            MappedRead::Alignment { mapq, .. } => f64::from(*mapq),
            MappedRead::Homology { bit_score, .. } => *bit_score,
        }
    }
}

/// A gene's reference sequence as sampled in one organism.
#[derive(Debug, Clone)]
pub struct Target {
    /// Owning organism name.
    pub organism: String,
    /// Owning gene name.
    pub gene: String,
    /// Identifier of the source FASTA record.
    pub seq_id: String,
    /// Reference nucleotide sequence.
    pub sequence: String,
    mapped_reads: Vec<MappedRead>,
}

impl Target {
    /// Appends one mapped-read record.
    pub fn add_mapped_read(&mut self, read: MappedRead) {
        self.mapped_reads.push(read);
    }

    /// All mapped-read records, in arrival order.
    pub fn mapped_reads(&self) -> &[MappedRead] {
        &self.mapped_reads
    }

    /// Number of mapped-read records.
    pub fn num_mapped_reads(&self) -> usize {
        self.mapped_reads.len()
    }

    /// Sum of mapping-confidence scores, `None` when no read mapped here.
    pub fn score_sum(&self) -> Option<f64> {
        if self.mapped_reads.is_empty() {
            return None;
        }
        Some(self.mapped_reads.iter().map(MappedRead::score).sum())
    }

    /// Distinct identifiers of reads mapped to this target.
    pub fn read_names(&self) -> IndexSet<&str> {
        self.mapped_reads.iter().map(MappedRead::read_id).collect()
    }
}

/// An organism, owning one target per gene.
#[derive(Debug, Clone)]
pub struct Organism {
    /// Organism name (unique key).
    pub name: String,
    targets: IndexMap<String, usize>,
}

impl Organism {
    /// Gene-name-keyed arena indices of this organism's targets.
    pub fn targets(&self) -> &IndexMap<String, usize> {
        &self.targets
    }
}

/// A gene, owning one target per organism.
#[derive(Debug, Clone)]
pub struct Gene {
    /// Gene name (unique key).
    pub name: String,
    targets: IndexMap<String, usize>,
}

impl Gene {
    /// Organism-name-keyed arena indices of this gene's targets.
    pub fn targets(&self) -> &IndexMap<String, usize> {
        &self.targets
    }
}

/// Checks an organism or gene name for characters that would break file
/// names or downstream tool invocations.
pub fn is_sane_identifier(name: &str) -> bool {
    if name.is_empty() || name.starts_with('-') {
        return false;
    }
    !name
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "/;,$#".contains(c))
}

/// Splits a catalog identifier into organism and gene names.
///
/// The first hyphen-delimited pair wins; identifiers without such a pair
/// map to organism [`UNKNOWN_ORGANISM`] with the full identifier as gene.
pub fn split_target_id(id: &str) -> (&str, &str) {
    if let Some((organism, rest)) = id.split_once('-') {
        let gene = rest.split('-').next().unwrap_or("");
        if !organism.is_empty() && !gene.is_empty() {
            return (organism, gene);
        }
    }
    (UNKNOWN_ORGANISM, id)
}

/// The target catalog plus the read-assignment state accumulated while
/// ingesting mapper output.
#[derive(Debug, Default)]
pub struct TargetSet {
    targets: Vec<Target>,
    organisms: IndexMap<String, Organism>,
    genes: IndexMap<String, Gene>,
    off_target_reads: u64,
    source_path: Option<PathBuf>,
}

impl TargetSet {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a catalog from a FASTA file of `organism-gene` records.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HybseqError::FileNotFound(path.to_path_buf()));
        }
        let mut target_set = Self::read_from(FastaReader::open(path)?)?;
        target_set.source_path = Some(path.to_path_buf());
        info!(
            "{} organisms, {} genes",
            target_set.organisms.len(),
            target_set.genes.len()
        );
        Ok(target_set)
    }

    /// Loads a catalog from any FASTA source.
    pub fn read_from<R: Read>(reader: FastaReader<R>) -> Result<Self> {
        let mut target_set = Self::new();
        for record in reader {
            target_set.add_target(record?)?;
        }
        Ok(target_set)
    }

    /// Adds one catalog entry, registering organism and gene as needed.
    pub fn add_target(&mut self, record: FastaRecord) -> Result<()> {
        let (organism_name, gene_name) = split_target_id(&record.id);
        if !is_sane_identifier(organism_name) {
            return Err(HybseqError::BadIdentifier(organism_name.to_string()));
        }
        if !is_sane_identifier(gene_name) {
            return Err(HybseqError::BadIdentifier(gene_name.to_string()));
        }
        let organism_name = organism_name.to_string();
        let gene_name = gene_name.to_string();

        let organism = self
            .organisms
            .entry(organism_name.clone())
            .or_insert_with(|| Organism {
                name: organism_name.clone(),
                targets: IndexMap::new(),
            });
        if organism.targets.contains_key(&gene_name) {
            return Err(HybseqError::DuplicateTarget {
                organism: organism_name,
                gene: gene_name,
                seq_id: record.id,
            });
        }
        let gene = self.genes.entry(gene_name.clone()).or_insert_with(|| Gene {
            name: gene_name.clone(),
            targets: IndexMap::new(),
        });
        if gene.targets.contains_key(&organism_name) {
            return Err(HybseqError::DuplicateTarget {
                organism: organism_name,
                gene: gene_name,
                seq_id: record.id,
            });
        }

        let index = self.targets.len();
        self.targets.push(Target {
            organism: organism_name.clone(),
            gene: gene_name.clone(),
            seq_id: record.id,
            sequence: record.seq,
            mapped_reads: Vec::new(),
        });
        gene.targets.insert(organism_name.clone(), index);
        self.organisms
            .get_mut(&organism_name)
            .expect("organism registered above")
            .targets
            .insert(gene_name, index);
        Ok(())
    }

    /// Verifies that every target sequence consists solely of A, C, G, T
    /// (case-insensitive). Disabled when `allow_invalid_bases` is set.
    pub fn sanity_check(&self, allow_invalid_bases: bool) -> Result<()> {
        if allow_invalid_bases {
            return Ok(());
        }
        for target in &self.targets {
            let mut invalid: Vec<char> = Vec::new();
            for c in target.sequence.chars() {
                let l = c.to_ascii_lowercase();
                if !"acgt".contains(l) && !invalid.contains(&l) {
                    invalid.push(l);
                }
            }
            if !invalid.is_empty() {
                return Err(HybseqError::InvalidSequence {
                    target: target.seq_id.clone(),
                    symbols: invalid
                        .iter()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }
        Ok(())
    }

    fn resolve_target_index(&self, reference_name: &str) -> Result<usize> {
        let (organism_name, gene_name) = split_target_id(reference_name);
        let organism = self
            .organisms
            .get(organism_name)
            .ok_or_else(|| HybseqError::UnknownOrganism(organism_name.to_string()))?;
        if !self.genes.contains_key(gene_name) {
            return Err(HybseqError::UnknownGene(gene_name.to_string()));
        }
        organism
            .targets
            .get(gene_name)
            .copied()
            .ok_or_else(|| HybseqError::MissingTarget {
                organism: organism_name.to_string(),
                gene: gene_name.to_string(),
            })
    }

    /// Ingests one alignment record from the mapper.
    ///
    /// Mapped records attach a [`MappedRead`] to the referenced target;
    /// unmapped records increment the off-target counter.
    pub fn ingest_alignment(&mut self, record: &SamRecord) -> Result<()> {
        if !record.is_mapped() {
            self.off_target_reads += 1;
            return Ok(());
        }
        let index = self.resolve_target_index(&record.rname)?;
        self.targets[index].add_mapped_read(MappedRead::Alignment {
            read_id: record.qname.clone(),
            mapq: record.mapq,
        });
        Ok(())
    }

    /// Ingests one homology-search best hit against a catalog entry.
    pub fn ingest_homology_hit(
        &mut self,
        subject_id: &str,
        read_id: &str,
        bit_score: f64,
    ) -> Result<()> {
        let index = self.resolve_target_index(subject_id)?;
        self.targets[index].add_mapped_read(MappedRead::Homology {
            read_id: read_id.to_string(),
            bit_score,
        });
        Ok(())
    }

    /// Union of read names mapped to any organism's copy of the gene.
    pub fn read_names_for_gene(&self, gene_name: &str) -> Result<IndexSet<String>> {
        let gene = self
            .genes
            .get(gene_name)
            .ok_or_else(|| HybseqError::UnknownGene(gene_name.to_string()))?;
        let mut names = IndexSet::new();
        for &index in gene.targets.values() {
            for read in self.targets[index].mapped_reads() {
                names.insert(read.read_id().to_string());
            }
        }
        Ok(names)
    }

    /// Inverts the per-gene read sets into a read-name to gene-names index.
    ///
    /// A read mapping to several genes' targets appears under each of them;
    /// gene lists follow catalog gene order.
    pub fn read_to_genes_index(&self) -> IndexMap<String, Vec<String>> {
        let mut index: IndexMap<String, Vec<String>> = IndexMap::new();
        for gene in self.genes.values() {
            for &target_index in gene.targets.values() {
                for read in self.targets[target_index].mapped_reads() {
                    let genes = index.entry(read.read_id().to_string()).or_default();
                    if !genes.contains(&gene.name) {
                        genes.push(gene.name.clone());
                    }
                }
            }
        }
        index
    }

    /// Picks, per gene, the target with the strictly greatest summed
    /// mapping score; earlier organisms win ties. Genes without organisms
    /// yield `None`.
    pub fn representatives(&self) -> IndexMap<String, Option<usize>> {
        let mut representatives = IndexMap::new();
        for gene in self.genes.values() {
            let mut best: Option<usize> = None;
            let mut best_sum: Option<f64> = None;
            for &index in gene.targets.values() {
                let sum = self.targets[index].score_sum();
                let better = match (best, sum, best_sum) {
                    (None, _, _) => true,
                    (Some(_), Some(s), Some(b)) => s > b,
                    (Some(_), Some(_), None) => true,
                    (Some(_), None, _) => false,
                };
                if better {
                    best = Some(index);
                    best_sum = sum;
                }
            }
            representatives.insert(gene.name.clone(), best);
        }
        representatives
    }

    /// Target record at an arena index.
    pub fn target(&self, index: usize) -> &Target {
        &self.targets[index]
    }

    /// All targets in catalog order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Organism registry, in insertion order.
    pub fn organisms(&self) -> &IndexMap<String, Organism> {
        &self.organisms
    }

    /// Gene registry, in insertion order.
    pub fn genes(&self) -> &IndexMap<String, Gene> {
        &self.genes
    }

    /// Gene names in catalog order.
    pub fn gene_names(&self) -> Vec<String> {
        self.genes.keys().cloned().collect()
    }

    /// Mean reference sequence length of a gene across organisms.
    pub fn mean_target_length(&self, gene_name: &str) -> Result<Option<f64>> {
        let gene = self
            .genes
            .get(gene_name)
            .ok_or_else(|| HybseqError::UnknownGene(gene_name.to_string()))?;
        if gene.targets.is_empty() {
            return Ok(None);
        }
        let total: usize = gene
            .targets
            .values()
            .map(|&i| self.targets[i].sequence.len())
            .sum();
        Ok(Some(total as f64 / gene.targets.len() as f64))
    }

    /// Total mapped-read records across all targets.
    pub fn num_mapped_reads(&self) -> usize {
        self.targets.iter().map(Target::num_mapped_reads).sum()
    }

    /// Count of ingested records that were not mapped to any target.
    pub fn off_target_reads(&self) -> u64 {
        self.off_target_reads
    }

    /// Path the catalog was loaded from, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Writes the catalog back out as FASTA.
    pub fn write_fasta(&self, path: &Path) -> Result<()> {
        let records: Vec<FastaRecord> = self
            .targets
            .iter()
            .map(|t| FastaRecord {
                id: t.seq_id.clone(),
                description: None,
                seq: t.sequence.clone(),
            })
            .collect();
        crate::seqio::write_fasta_file(path, &records)
    }
}
