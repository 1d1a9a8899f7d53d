// ==============================================================================
// models.rs - Genotype Data Models
// ==============================================================================
// Description: Variant metadata, records and load configuration
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use crate::error::GenotypeError;

/// Allele value reserved for a missing call ('.' in a GT field)
pub const MISSING: u8 = u8::MAX;

/// Which allele the frequency column of a [`VariantTable`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyLabel {
    /// Frequency of the ALT allele, as loaded from the source
    #[serde(rename = "aaf")]
    AlternateFrequency,
    /// Frequency of the minor allele, after minor allele conversion
    #[serde(rename = "maf")]
    MinorFrequency,
}

impl FrequencyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyLabel::AlternateFrequency => "aaf",
            FrequencyLabel::MinorFrequency => "maf",
        }
    }
}

/// Reference and alternate allele sequences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alleles {
    pub reference: String,
    pub alternate: String,
}

/// One row of variant metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Variant identifier (e.g., "rs12345")
    pub id: String,

    /// Contig name, exactly as written in the source
    pub chrom: String,

    /// 1-based position
    pub pos: u32,

    /// Allele frequency; see [`VariantTable::label`] for which allele
    pub freq: f64,

    /// REF/ALT sequences, when the source provides them
    pub alleles: Option<Alleles>,
}

impl Variant {
    pub fn new(id: impl Into<String>, chrom: impl Into<String>, pos: u32, freq: f64) -> Self {
        Self {
            id: id.into(),
            chrom: chrom.into(),
            pos,
            freq,
            alleles: None,
        }
    }

    pub fn with_alleles(mut self, reference: impl Into<String>, alternate: impl Into<String>) -> Self {
        self.alleles = Some(Alleles {
            reference: reference.into(),
            alternate: alternate.into(),
        });
        self
    }
}

/// Ordered variant metadata; row j describes column j of the genotype tensor
#[derive(Debug, Clone, PartialEq)]
pub struct VariantTable {
    label: FrequencyLabel,
    rows: Vec<Variant>,
}

impl Default for VariantTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl VariantTable {
    /// Wrap freshly loaded rows; frequencies describe the ALT allele
    pub fn new(rows: Vec<Variant>) -> Self {
        Self {
            label: FrequencyLabel::AlternateFrequency,
            rows,
        }
    }

    pub fn label(&self) -> FrequencyLabel {
        self.label
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Variant] {
        &self.rows
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(|v| v.id.as_str())
    }

    /// Rows at the given positions, in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            label: self.label,
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Variant] {
        &mut self.rows
    }

    /// Irreversible relabeling after minor allele conversion
    pub(crate) fn relabel_minor(&mut self) {
        self.label = FrequencyLabel::MinorFrequency;
    }
}

/// Genomic interval used to restrict which variants are read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub contig: String,
    pub start: u64,
    pub end: Option<u64>,
}

impl Region {
    /// Inclusive on both ends
    pub fn contains(&self, chrom: &str, pos: u64) -> bool {
        chrom == self.contig && pos >= self.start && self.end.map_or(true, |end| pos <= end)
    }
}

impl FromStr for Region {
    type Err = GenotypeError;

    /// Accepts `chr7`, `chr1:1234-34566`, `chr1:1234-` and `chr1:1234`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GenotypeError::InvalidRegion(s.to_string());

        let (contig, range) = match s.split_once(':') {
            Some((contig, range)) => (contig, Some(range)),
            None => (s, None),
        };
        if contig.is_empty() {
            return Err(invalid());
        }

        let parse = |bound: &str| bound.trim().replace(',', "").parse::<u64>().map_err(|_| invalid());
        let (start, end) = match range {
            None => (0, None),
            Some(range) => match range.split_once('-') {
                Some((start, "")) => (parse(start)?, None),
                Some((start, end)) => (parse(start)?, Some(parse(end)?)),
                None => (parse(range)?, None),
            },
        };
        if end.is_some_and(|end| end < start) {
            return Err(invalid());
        }

        Ok(Region {
            contig: contig.to_string(),
            start,
            end,
        })
    }
}

/// One decoded variant: its metadata and a samples x channels block of calls
///
/// Channels are (allele on strand one, allele on strand two[, phased flag]).
#[derive(Debug, Clone)]
pub struct GenotypeRecord {
    pub variant: Variant,
    pub calls: Array2<u8>,
}

/// Caller-facing load configuration
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Only read variants inside this region
    pub region: Option<Region>,

    /// Only read these samples (source order is kept)
    pub samples: Option<Vec<String>>,

    /// Only read these variant IDs; reading stops once all were found
    pub variant_ids: Option<HashSet<String>>,

    /// Upper bound on the number of variants to read; enables preallocation
    pub max_variants: Option<usize>,

    /// Number of variants decoded at once from a binary trio
    pub chunk_size: Option<usize>,

    /// Genotypes are known to be phased; no phase channel is stored
    pub prephased: bool,

    /// Drop samples with missing calls instead of failing
    pub discard_missing: bool,

    /// Drop multiallelic variants instead of failing
    pub discard_multiallelic: bool,

    /// Convert ALT counts to minor allele counts after validation
    pub minor_allele_counts: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_samples<S: Into<String>>(mut self, samples: impl IntoIterator<Item = S>) -> Self {
        self.samples = Some(samples.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_variant_ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.variant_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_variants(mut self, max: usize) -> Self {
        self.max_variants = Some(max);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn prephased(mut self, prephased: bool) -> Self {
        self.prephased = prephased;
        self
    }

    pub fn discard_missing(mut self, discard: bool) -> Self {
        self.discard_missing = discard;
        self
    }

    pub fn discard_multiallelic(mut self, discard: bool) -> Self {
        self.discard_multiallelic = discard;
        self
    }

    pub fn minor_allele_counts(mut self, convert: bool) -> Self {
        self.minor_allele_counts = convert;
        self
    }

    /// Channels per call: two alleles, plus the phase flag unless prephased
    pub fn channels(&self) -> usize {
        if self.prephased {
            2
        } else {
            3
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parsing() {
        let region: Region = "chr7".parse().unwrap();
        assert_eq!(region.contig, "chr7");
        assert_eq!(region.start, 0);
        assert_eq!(region.end, None);

        let region: Region = "chr1:1234-34566".parse().unwrap();
        assert_eq!(region.start, 1234);
        assert_eq!(region.end, Some(34566));

        let region: Region = "1:500-".parse().unwrap();
        assert_eq!(region.start, 500);
        assert_eq!(region.end, None);

        assert!("".parse::<Region>().is_err());
        assert!("chr1:abc-10".parse::<Region>().is_err());
        assert!("chr1:20-10".parse::<Region>().is_err());
    }

    #[test]
    fn test_region_contains_is_inclusive() {
        let region: Region = "chr1:100-200".parse().unwrap();
        assert!(region.contains("chr1", 100));
        assert!(region.contains("chr1", 200));
        assert!(!region.contains("chr1", 201));
        assert!(!region.contains("1", 150)); // contig names must match exactly
    }

    #[test]
    fn test_variant_table_select_keeps_label() {
        let mut table = VariantTable::new(vec![
            Variant::new("rs1", "1", 10, 0.1),
            Variant::new("rs2", "1", 20, 0.2),
            Variant::new("rs3", "1", 30, 0.3),
        ]);

        let picked = table.select(&[2, 0]);
        assert_eq!(picked.ids().collect::<Vec<_>>(), vec!["rs3", "rs1"]);
        assert_eq!(picked.label(), FrequencyLabel::AlternateFrequency);

        table.relabel_minor();
        assert_eq!(table.select(&[1]).label(), FrequencyLabel::MinorFrequency);
    }

    #[test]
    fn test_frequency_label_serde() {
        let json = serde_json::to_string(&FrequencyLabel::MinorFrequency).unwrap();
        assert_eq!(json, "\"maf\"");
        assert_eq!(FrequencyLabel::AlternateFrequency.as_str(), "aaf");
    }

    #[test]
    fn test_load_options_channels() {
        assert_eq!(LoadOptions::new().channels(), 3);
        assert_eq!(LoadOptions::new().prephased(true).channels(), 2);
    }
}
