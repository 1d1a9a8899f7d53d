// ==============================================================================
// lib.rs - Genotype Tensor Library
// ==============================================================================
// Description: Load VCF and PLINK2 genotypes into a samples x variants x
//              channels tensor, validate, subset and write them back out
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================

pub mod assembler;
pub mod error;
pub mod genotype_converter;
pub mod genotypes;
pub mod index;
pub mod models;
pub mod output;
pub mod parsers;
pub mod processor;
pub mod source;
pub mod subset;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use error::{GenotypeError, Result};
pub use genotypes::{GenotypeData, Genotypes};
pub use models::{FrequencyLabel, LoadOptions, Region, Variant, VariantTable, MISSING};
pub use source::RecordSource;
