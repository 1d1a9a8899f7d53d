// ==============================================================================
// source.rs - Record Source Adapter
// ==============================================================================
// Description: One producer contract over the VCF and PLINK2 record streams
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use std::path::Path;

use crate::error::Result;
use crate::models::{GenotypeRecord, LoadOptions};
use crate::parsers::plink::{PgenDecoder, PlinkRecords};
use crate::parsers::vcf::VcfRecords;

/// Lazy, finite, non-restartable stream of genotype records
///
/// Samples are resolved when the source is opened and stay fixed for its
/// lifetime. Dropping the source releases the underlying reader or decoder;
/// call [`RecordSource::finish`] to observe close failures.
pub enum RecordSource {
    Vcf(VcfRecords),
    Plink(PlinkRecords),
}

impl RecordSource {
    pub fn open_vcf(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self> {
        Ok(RecordSource::Vcf(VcfRecords::open(path, options)?))
    }

    /// Open a PLINK2 trio; `path` is the `.pgen` file
    pub fn open_plink(path: impl AsRef<Path>, decoder: Box<dyn PgenDecoder>, options: &LoadOptions) -> Result<Self> {
        Ok(RecordSource::Plink(PlinkRecords::open(path.as_ref(), decoder, options)?))
    }

    pub fn samples(&self) -> &[String] {
        match self {
            RecordSource::Vcf(records) => records.samples(),
            RecordSource::Plink(records) => records.samples(),
        }
    }

    /// Upper bound on the records this source can emit, when it is known
    pub fn bound(&self) -> Option<usize> {
        match self {
            RecordSource::Vcf(_) => None,
            RecordSource::Plink(records) => Some(records.variant_count()),
        }
    }

    pub fn finish(self) -> Result<()> {
        match self {
            RecordSource::Vcf(records) => records.finish(),
            RecordSource::Plink(records) => records.finish(),
        }
    }
}

impl Iterator for RecordSource {
    type Item = Result<GenotypeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RecordSource::Vcf(records) => records.next(),
            RecordSource::Plink(records) => records.next(),
        }
    }
}
