// ==============================================================================
// processor.rs - Genotype Loading Pipeline
// ==============================================================================
// Description: Read → missingness → biallelic → phase (→ minor allele counts)
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

use crate::assembler;
use crate::genotypes::Genotypes;
use crate::models::{FrequencyLabel, LoadOptions};
use crate::output::PlinkConverter;
use crate::parsers::plink::PgenDecoder;
use crate::source::RecordSource;

/// What a load produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub path: PathBuf,
    pub samples: usize,
    pub variants: usize,
    pub channels: usize,
    pub element: &'static str,
    pub frequency: FrequencyLabel,
    pub discarded_samples: usize,
    pub discarded_variants: usize,
}

impl LoadSummary {
    fn new(genotypes: &Genotypes, discarded_samples: usize, discarded_variants: usize) -> Self {
        let (samples, variants, channels) = genotypes.shape();
        Self {
            path: genotypes.path().to_path_buf(),
            samples,
            variants,
            channels,
            element: genotypes.data().kind(),
            frequency: genotypes.variants().label(),
            discarded_samples,
            discarded_variants,
        }
    }
}

/// Load and validate genotypes from a VCF
pub fn load_vcf(path: impl AsRef<Path>, options: &LoadOptions) -> Result<(Genotypes, LoadSummary)> {
    let path = path.as_ref();
    info!("Loading genotypes from VCF: {:?}", path);

    let source = RecordSource::open_vcf(path, options)
        .with_context(|| format!("Failed to open VCF {:?}", path))?;
    let genotypes = assembler::read(path, source, options)
        .with_context(|| format!("Failed to read genotypes from {:?}", path))?;

    validate(genotypes, options)
}

/// Load and validate genotypes from a PLINK2 trio through `decoder`
///
/// `path` is the `.pgen` file. Variants are decoded in chunks of
/// `options.chunk_size`.
pub fn load_plink(
    path: impl AsRef<Path>,
    decoder: Box<dyn PgenDecoder>,
    options: &LoadOptions,
) -> Result<(Genotypes, LoadSummary)> {
    let path = path.as_ref();
    info!("Loading genotypes from PGEN: {:?}", path);

    let genotypes = assembler::read_plink(path, decoder, options)
        .with_context(|| format!("Failed to read genotypes from {:?}", path))?;

    validate(genotypes, options)
}

/// Load and validate a PLINK2 trio by exporting it to VCF with `converter`
///
/// The intermediate VCF lives in a temporary directory removed on return.
pub fn load_plink_with_converter(
    path: impl AsRef<Path>,
    converter: &PlinkConverter,
    options: &LoadOptions,
) -> Result<(Genotypes, LoadSummary)> {
    let path = path.as_ref();
    let scratch = TempDir::new().context("Failed to create a temporary directory")?;

    info!("Exporting {:?} to VCF with {:?}", path, converter.program());
    let vcf = converter
        .export_vcf(&path.with_extension(""), &scratch.path().join("genotypes"))
        .with_context(|| format!("Failed to export {:?} to VCF", path))?;

    let (mut genotypes, mut summary) = load_vcf(&vcf, options)?;
    genotypes.path = path.to_path_buf();
    summary.path = path.to_path_buf();
    Ok((genotypes, summary))
}

/// Run the validation stages in order
fn validate(mut genotypes: Genotypes, options: &LoadOptions) -> Result<(Genotypes, LoadSummary)> {
    let discarded_samples = genotypes
        .check_missing(options.discard_missing)
        .context("Missing genotype check failed")?;
    let discarded_variants = genotypes
        .check_biallelic(options.discard_multiallelic)
        .context("Biallelic check failed")?;
    genotypes.check_phase().context("Phase check failed")?;
    if options.minor_allele_counts {
        genotypes.to_mac().context("Minor allele conversion failed")?;
    }

    let summary = LoadSummary::new(&genotypes, discarded_samples, discarded_variants);
    info!(
        "Loaded {} samples x {} variants ({} channels)",
        summary.samples, summary.variants, summary.channels
    );
    Ok((genotypes, summary))
}
