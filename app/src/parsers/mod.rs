// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Record sources for VCF files and PLINK2 trios
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================

pub mod plink;
pub mod vcf;

pub use plink::{PgenDecoder, PlinkRecords, PvarRecords};
pub use vcf::VcfRecords;
