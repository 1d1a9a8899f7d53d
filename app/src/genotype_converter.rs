// ==============================================================================
// genotype_converter.rs - GT Field to Allele-Presence Conversion
// ==============================================================================
// Description: Converts VCF GT strings into per-strand allele codes and back
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Algorithm:
//   A GT value is one or two allele indices joined by '|' (phased) or '/'
//   (unphased). Each index becomes one strand channel:
//   - 0|0 → [0, 0, phased]
//   - 0/1 → [0, 1, unphased]
//   - 2|1 → [2, 1, phased] (rejected later by the biallelic check)
//   - .|. → [MISSING, MISSING] (rejected later by the missingness check)
// ==============================================================================

use ndarray::ArrayView2;

use crate::error::GenotypeError;
use crate::models::MISSING;

/// Largest allele index that still fits beside the missing sentinel
const MAX_ALLELE: u16 = MISSING as u16 - 1;

/// A single decoded genotype call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenotypeCall {
    pub alleles: [u8; 2],
    pub phased: bool,
}

impl GenotypeCall {
    pub const MISSING: GenotypeCall = GenotypeCall {
        alleles: [MISSING, MISSING],
        phased: false,
    };
}

/// Parse a GT value such as `0|1`, `1/1`, `./.` or `.`
///
/// Haploid calls keep their single allele on strand one and leave strand two
/// missing.
///
/// # Examples
/// ```
/// use genotype_tensor::genotype_converter::parse_genotype;
///
/// let call = parse_genotype("0|1").unwrap();
/// assert_eq!(call.alleles, [0, 1]);
/// assert!(call.phased);
///
/// let call = parse_genotype("1/1").unwrap();
/// assert!(!call.phased);
/// ```
pub fn parse_genotype(gt: &str) -> Result<GenotypeCall, GenotypeError> {
    let gt = gt.trim();
    if gt.is_empty() || gt == "." {
        return Ok(GenotypeCall::MISSING);
    }

    match gt.find(['|', '/']) {
        None => Ok(GenotypeCall {
            alleles: [parse_allele(gt, gt)?, MISSING],
            phased: false,
        }),
        Some(split) => {
            let (first, rest) = gt.split_at(split);
            let phased = rest.starts_with('|');
            let second = &rest[1..];
            if second.contains(['|', '/']) {
                // Polyploid calls have no place in a two-strand tensor
                return Err(GenotypeError::InvalidGenotype(gt.to_string()));
            }
            Ok(GenotypeCall {
                alleles: [parse_allele(first, gt)?, parse_allele(second, gt)?],
                phased,
            })
        }
    }
}

fn parse_allele(token: &str, gt: &str) -> Result<u8, GenotypeError> {
    if token == "." {
        return Ok(MISSING);
    }
    token
        .parse::<u16>()
        .map(|idx| idx.min(MAX_ALLELE) as u8)
        .map_err(|_| GenotypeError::InvalidGenotype(gt.to_string()))
}

/// Render one allele channel pair as a phased GT value
pub fn format_phased(first: u8, second: u8) -> String {
    format!("{}|{}", allele_token(first), allele_token(second))
}

fn allele_token(allele: u8) -> String {
    if allele == MISSING {
        ".".to_string()
    } else {
        allele.to_string()
    }
}

/// Fraction of called alleles that are not REF
///
/// `calls` is samples x channels; only the two allele channels are counted and
/// missing values are skipped. Returns 0.0 when nothing was called.
pub fn alt_allele_frequency(calls: ArrayView2<'_, u8>) -> f64 {
    let mut called = 0usize;
    let mut alt = 0usize;
    for row in calls.rows() {
        for &allele in row.iter().take(2) {
            if allele == MISSING {
                continue;
            }
            called += 1;
            if allele != 0 {
                alt += 1;
            }
        }
    }
    if called == 0 {
        0.0
    } else {
        alt as f64 / called as f64
    }
}
