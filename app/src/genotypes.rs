// ==============================================================================
// genotypes.rs - Genotype Tensor
// ==============================================================================
// Description: Samples x variants x channels genotype array with its metadata
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Layout:
//   data[sample][variant][channel]
//   channel 0: allele on strand one
//   channel 1: allele on strand two
//   channel 2: phased flag (dropped by the phase check, absent when prephased)
// ==============================================================================

use ndarray::{Array3, Axis};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{GenotypeError, Result};
use crate::index::IdIndex;
use crate::models::VariantTable;

/// Genotype values before and after the biallelic check
#[derive(Debug, Clone, PartialEq)]
pub enum GenotypeData {
    /// Allele indices as read, with `MISSING` for uncalled strands
    Counts(Array3<u8>),
    /// ALT presence per strand; only biallelic, fully called data gets here
    Presence(Array3<bool>),
}

impl Default for GenotypeData {
    fn default() -> Self {
        GenotypeData::Counts(Array3::zeros((0, 0, 0)))
    }
}

impl GenotypeData {
    /// (samples, variants, channels)
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            GenotypeData::Counts(data) => data.dim(),
            GenotypeData::Presence(data) => data.dim(),
        }
    }

    pub fn channels(&self) -> usize {
        self.dim().2
    }

    pub fn is_presence(&self) -> bool {
        matches!(self, GenotypeData::Presence(_))
    }

    /// Element kind for reports
    pub fn kind(&self) -> &'static str {
        match self {
            GenotypeData::Counts(_) => "u8",
            GenotypeData::Presence(_) => "bool",
        }
    }

    /// Copy out the given positions along `axis`, in the given order
    pub(crate) fn select(&self, axis: Axis, indices: &[usize]) -> Self {
        match self {
            GenotypeData::Counts(data) => GenotypeData::Counts(data.select(axis, indices)),
            GenotypeData::Presence(data) => GenotypeData::Presence(data.select(axis, indices)),
        }
    }
}

/// A loaded set of genotypes
///
/// Row `i` of the tensor is `samples[i]`; column `j` is `variants.rows()[j]`.
/// The id lookups are built on first use and cleared by every operation that
/// changes the matching axis.
#[derive(Debug, Clone, Default)]
pub struct Genotypes {
    pub(crate) path: PathBuf,
    pub(crate) samples: Vec<String>,
    pub(crate) variants: VariantTable,
    pub(crate) data: GenotypeData,
    pub(crate) prephased: bool,
    pub(crate) sample_index: IdIndex,
    pub(crate) variant_index: IdIndex,
}

impl Genotypes {
    /// An empty instance tied to the file it will be loaded from
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Assemble an instance from parts whose axes must agree
    pub fn from_parts(
        path: impl Into<PathBuf>,
        samples: Vec<String>,
        variants: VariantTable,
        data: GenotypeData,
        prephased: bool,
    ) -> Result<Self> {
        let (n_samples, n_variants, channels) = data.dim();
        if n_samples != samples.len() {
            return Err(GenotypeError::DimensionMismatch(format!(
                "{} samples but {} tensor rows",
                samples.len(),
                n_samples
            )));
        }
        if n_variants != variants.len() {
            return Err(GenotypeError::DimensionMismatch(format!(
                "{} variants but {} tensor columns",
                variants.len(),
                n_variants
            )));
        }
        if !(2..=3).contains(&channels) && n_samples * n_variants > 0 {
            return Err(GenotypeError::DimensionMismatch(format!(
                "expected 2 or 3 channels, found {}",
                channels
            )));
        }

        Ok(Self {
            path: path.into(),
            samples,
            variants,
            data,
            prephased,
            sample_index: IdIndex::new(),
            variant_index: IdIndex::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn variants(&self) -> &VariantTable {
        &self.variants
    }

    pub fn data(&self) -> &GenotypeData {
        &self.data
    }

    pub fn prephased(&self) -> bool {
        self.prephased
    }

    /// (samples, variants, channels)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// True when any axis has length zero
    pub fn is_empty(&self) -> bool {
        let (n, m, c) = self.shape();
        n == 0 || m == 0 || c == 0
    }

    /// Sample id → row
    pub fn sample_index(&self) -> &HashMap<String, usize> {
        self.sample_index
            .get_or_build(self.samples.iter().map(String::as_str))
    }

    /// Variant id → column
    pub fn variant_index(&self) -> &HashMap<String, usize> {
        self.variant_index.get_or_build(self.variants.ids())
    }

    /// Keep only the given sample rows, in the given order
    pub(crate) fn project_samples(&mut self, keep: &[usize]) {
        self.samples = keep.iter().map(|&i| self.samples[i].clone()).collect();
        self.data = self.data.select(Axis(0), keep);
        self.sample_index.invalidate();
    }

    /// Keep only the given variant columns, in the given order
    pub(crate) fn project_variants(&mut self, keep: &[usize]) {
        self.variants = self.variants.select(keep);
        self.data = self.data.select(Axis(1), keep);
        self.variant_index.invalidate();
    }
}
