// ==============================================================================
// error.rs - Genotype Loading Errors
// ==============================================================================
// Description: Error taxonomy shared by sources, assembler, checks and sinks
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating or writing genotypes
#[derive(Error, Debug)]
pub enum GenotypeError {
    #[error("{file}: {details}")]
    MalformedHeader { file: PathBuf, details: String },

    #[error("Genotype with ID {id} at POS {chrom}:{pos} is missing for sample {sample}")]
    MissingGenotype {
        id: String,
        chrom: String,
        pos: u32,
        sample: String,
    },

    #[error("Variant with ID {id} at POS {chrom}:{pos} is multiallelic for sample {sample}")]
    MultiallelicGenotype {
        id: String,
        chrom: String,
        pos: u32,
        sample: String,
    },

    #[error("Variant with ID {id} at POS {chrom}:{pos} is unphased for sample {sample}")]
    UnphasedHeterozygous {
        id: String,
        chrom: String,
        pos: u32,
        sample: String,
    },

    #[error(
        "Not enough memory to allocate {elements} genotype values for {what}. \
         Try loading with a smaller chunk size."
    )]
    ResourceExhausted { what: &'static str, elements: usize },

    #[error("Provide either a set of variant IDs or a maximum number of variants")]
    MissingVariantBound,

    #[error("Invalid region '{0}' (expected 'contig' or 'contig:start-end')")]
    InvalidRegion(String),

    #[error("Invalid genotype '{0}'")]
    InvalidGenotype(String),

    #[error("Record {id} has shape {found:?} but the tensor expects {expected:?}")]
    RecordShape {
        id: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Minor allele conversion requires biallelic presence calls; run the biallelic check first")]
    NotBiallelic,

    #[error("Variant {0} has no REF/ALT alleles and cannot be written")]
    MissingAlleles(String),

    /// Raised by [`crate::parsers::plink::PgenDecoder`] implementations
    #[error("Binary genotype decoder failed: {0}")]
    Decoder(String),

    #[error("Genotype converter failed: {0}")]
    Converter(String),

    #[error("Failed to parse VCF record: {0}")]
    Vcf(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, GenotypeError>;
