// ==============================================================================
// validator.rs - Genotype Validation Pipeline
// ==============================================================================
// Description: Missingness, biallelic and phase checks plus minor allele
//              conversion, applied in place to loaded genotypes
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Stages (run in this order):
//   1. check_missing   - no MISSING in either allele channel
//   2. check_biallelic - no allele index above 1; narrows u8 → bool
//   3. check_phase     - heterozygous calls must be phased; drops channel 2
//   4. to_mac          - flip alleles of variants whose ALT is the major allele
// Every stage looks at the current element kind, channel count or frequency
// label first, so a repeated or out-of-order call is a logged no-op.
// ==============================================================================

use ndarray::{s, Array2, Array3, ArrayView1, Axis};
use tracing::{debug, info, warn};

use crate::error::{GenotypeError, Result};
use crate::genotypes::{GenotypeData, Genotypes};
use crate::models::{FrequencyLabel, MISSING};

/// Offending (sample, variant) positions of a failed check
type Call = (usize, usize);

impl Genotypes {
    /// Fail on any missing allele, or drop every sample that has one
    ///
    /// Returns the number of samples discarded.
    pub fn check_missing(&mut self, discard: bool) -> Result<usize> {
        let GenotypeData::Counts(data) = &self.data else {
            debug!("Presence data cannot hold missing calls; skipping missingness check");
            return Ok(0);
        };

        let missing = flag_calls(data, |call| call[0] == MISSING || call[1] == MISSING);

        if !discard {
            if let Some((i, j)) = first_flagged(&missing) {
                return Err(self.call_error(i, j, CallProblem::Missing));
            }
            return Ok(0);
        }

        let keep: Vec<usize> = missing
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| !row.iter().any(|&flag| flag))
            .map(|(i, _)| i)
            .collect();
        let discarded = self.samples.len() - keep.len();
        if discarded > 0 {
            info!("Discarding {} samples with missing genotypes", discarded);
            self.project_samples(&keep);
        }
        if self.samples.is_empty() {
            warn!("All samples were discarded! Check that your genotypes have no missing calls.");
        }
        Ok(discarded)
    }

    /// Fail on any allele index above 1, or drop the variants that have one
    ///
    /// MISSING is above 1 as well, so run [`Genotypes::check_missing`] first.
    /// On success the tensor is narrowed to ALT presence flags. Returns the
    /// number of variants discarded.
    pub fn check_biallelic(&mut self, discard: bool) -> Result<usize> {
        let GenotypeData::Counts(data) = &self.data else {
            warn!("All genotypes are already biallelic");
            return Ok(0);
        };

        let multiallelic = flag_calls(data, |call| call[0] > 1 || call[1] > 1);

        let mut discarded = 0;
        if discard {
            let keep: Vec<usize> = multiallelic
                .axis_iter(Axis(1))
                .enumerate()
                .filter(|(_, column)| !column.iter().any(|&flag| flag))
                .map(|(j, _)| j)
                .collect();
            discarded = self.variants.len() - keep.len();
            if discarded > 0 {
                info!("Discarding {} multiallelic variants", discarded);
                self.project_variants(&keep);
            }
        } else if let Some((i, j)) = first_flagged(&multiallelic) {
            return Err(self.call_error(i, j, CallProblem::Multiallelic));
        }

        if let GenotypeData::Counts(data) = &self.data {
            self.data = GenotypeData::Presence(data.mapv(|value| value != 0));
        }
        Ok(discarded)
    }

    /// Fail on any unphased heterozygous call, then drop the phase channel
    pub fn check_phase(&mut self) -> Result<()> {
        if self.prephased || self.data.channels() < 3 {
            warn!("Phase information has already been removed from the data");
            return Ok(());
        }

        let unphased = match &self.data {
            GenotypeData::Counts(data) => first_flagged(&flag_calls(data, |c| c[0] != c[1] && c[2] == 0)),
            GenotypeData::Presence(data) => first_flagged(&flag_calls(data, |c| c[0] != c[1] && !c[2])),
        };
        if let Some((i, j)) = unphased {
            return Err(self.call_error(i, j, CallProblem::Unphased));
        }

        // Remove the phase information
        self.data = match &self.data {
            GenotypeData::Counts(data) => GenotypeData::Counts(data.slice(s![.., .., ..2]).to_owned()),
            GenotypeData::Presence(data) => GenotypeData::Presence(data.slice(s![.., .., ..2]).to_owned()),
        };
        Ok(())
    }

    /// Recode alleles so that 1 always marks the minor allele
    ///
    /// Variants whose ALT frequency is above 0.5 have both allele channels
    /// flipped and their frequency replaced by its complement. The frequency
    /// label then reads `maf` for good.
    pub fn to_mac(&mut self) -> Result<()> {
        if self.variants.label() == FrequencyLabel::MinorFrequency {
            warn!("The genotypes are already in minor allele counts");
            return Ok(());
        }
        let GenotypeData::Presence(data) = &mut self.data else {
            return Err(GenotypeError::NotBiallelic);
        };

        let mut flipped = 0;
        for (j, variant) in self.variants.rows_mut().iter_mut().enumerate() {
            if variant.freq > 0.5 {
                data.slice_mut(s![.., j, ..2]).mapv_inplace(|present| !present);
                variant.freq = 1.0 - variant.freq;
                flipped += 1;
            }
        }
        self.variants.relabel_minor();
        debug!("Flipped alleles of {} variants to minor allele counts", flipped);
        Ok(())
    }

    fn call_error(&self, sample: usize, variant: usize, problem: CallProblem) -> GenotypeError {
        let row = &self.variants.rows()[variant];
        let (id, chrom, pos, sample) = (
            row.id.clone(),
            row.chrom.clone(),
            row.pos,
            self.samples[sample].clone(),
        );
        match problem {
            CallProblem::Missing => GenotypeError::MissingGenotype { id, chrom, pos, sample },
            CallProblem::Multiallelic => GenotypeError::MultiallelicGenotype { id, chrom, pos, sample },
            CallProblem::Unphased => GenotypeError::UnphasedHeterozygous { id, chrom, pos, sample },
        }
    }
}

enum CallProblem {
    Missing,
    Multiallelic,
    Unphased,
}

/// Samples x variants mask of the calls matching `test`
fn flag_calls<A, F>(data: &Array3<A>, test: F) -> Array2<bool>
where
    F: Fn(ArrayView1<'_, A>) -> bool,
{
    let (n, m, _) = data.dim();
    Array2::from_shape_fn((n, m), |(i, j)| test(data.slice(s![i, j, ..])))
}

/// First flagged call, scanning samples before variants
fn first_flagged(mask: &Array2<bool>) -> Option<Call> {
    mask.indexed_iter()
        .find(|(_, flag)| **flag)
        .map(|(pos, _)| pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Variant, VariantTable};

    /// Three samples, two variants; `calls[s][j]` is `[a1, a2, phased]`
    fn genotypes(calls: [[[u8; 3]; 2]; 3], prephased: bool) -> Genotypes {
        let data = Array3::from_shape_fn((3, 2, 3), |(s, j, c)| calls[s][j][c]);
        Genotypes::from_parts(
            "test.vcf",
            vec!["HG1".into(), "HG2".into(), "HG3".into()],
            VariantTable::new(vec![
                Variant::new("rs1", "1", 10114, 0.5),
                Variant::new("rs2", "1", 10116, 0.5),
            ]),
            GenotypeData::Counts(data),
            prephased,
        )
        .unwrap()
    }

    const CLEAN: [[[u8; 3]; 2]; 3] = [
        [[0, 1, 1], [0, 0, 1]],
        [[1, 1, 1], [1, 0, 1]],
        [[0, 0, 0], [1, 1, 0]],
    ];

    #[test]
    fn test_check_missing_reports_first_call() {
        let mut calls = CLEAN;
        calls[2][1] = [MISSING, MISSING, 0];
        calls[1][1] = [0, MISSING, 1];
        let mut gts = genotypes(calls, false);

        match gts.check_missing(false) {
            Err(GenotypeError::MissingGenotype { id, sample, pos, .. }) => {
                assert_eq!(id, "rs2");
                assert_eq!(sample, "HG2");
                assert_eq!(pos, 10116);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(gts.shape(), (3, 2, 3));
    }

    #[test]
    fn test_check_missing_discards_samples() {
        let mut calls = CLEAN;
        calls[1][0] = [MISSING, 1, 1];
        let mut gts = genotypes(calls, false);
        assert_eq!(gts.sample_index().get("HG3"), Some(&2));

        assert_eq!(gts.check_missing(true).unwrap(), 1);
        assert_eq!(gts.samples(), ["HG1", "HG3"]);
        assert_eq!(gts.shape(), (2, 2, 3));
        assert_eq!(gts.sample_index().get("HG3"), Some(&1));
        assert_eq!(gts.sample_index().get("HG2"), None);
    }

    #[test]
    fn test_check_missing_may_discard_everything() {
        let mut gts = genotypes([[[MISSING, MISSING, 0]; 2]; 3], false);
        assert_eq!(gts.check_missing(true).unwrap(), 3);
        assert!(gts.is_empty());
    }

    #[test]
    fn test_check_biallelic_narrows_to_presence() {
        let mut gts = genotypes(CLEAN, false);
        assert_eq!(gts.check_biallelic(false).unwrap(), 0);

        let GenotypeData::Presence(data) = gts.data() else {
            panic!("expected presence data");
        };
        assert!(data[[1, 0, 0]]);
        assert!(!data[[0, 0, 0]]);
        assert!(!data[[2, 0, 2]]);

        // Second call is a no-op
        let before = gts.data().clone();
        assert_eq!(gts.check_biallelic(false).unwrap(), 0);
        assert_eq!(gts.data(), &before);
    }

    #[test]
    fn test_check_biallelic_fails_on_second_alt() {
        let mut calls = CLEAN;
        calls[0][1] = [2, 0, 1];
        let mut gts = genotypes(calls, false);
        match gts.check_biallelic(false) {
            Err(GenotypeError::MultiallelicGenotype { id, sample, .. }) => {
                assert_eq!(id, "rs2");
                assert_eq!(sample, "HG1");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!gts.data().is_presence());
    }

    #[test]
    fn test_check_biallelic_discards_variants() {
        let mut calls = CLEAN;
        calls[2][0] = [0, 3, 1];
        let mut gts = genotypes(calls, false);
        assert_eq!(gts.variant_index().get("rs2"), Some(&1));

        assert_eq!(gts.check_biallelic(true).unwrap(), 1);
        assert_eq!(gts.variants().ids().collect::<Vec<_>>(), vec!["rs2"]);
        assert_eq!(gts.shape(), (3, 1, 3));
        assert_eq!(gts.variant_index().get("rs2"), Some(&0));
        assert!(gts.data().is_presence());
    }

    #[test]
    fn test_check_phase_rejects_unphased_heterozygotes() {
        let mut calls = CLEAN;
        calls[2][0] = [1, 0, 0];
        let mut gts = genotypes(calls, false);
        gts.check_biallelic(false).unwrap();
        match gts.check_phase() {
            Err(GenotypeError::UnphasedHeterozygous { id, sample, .. }) => {
                assert_eq!(id, "rs1");
                assert_eq!(sample, "HG3");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(gts.shape().2, 3);
    }

    #[test]
    fn test_check_phase_drops_phase_channel() {
        // Unphased homozygous calls are fine
        let mut gts = genotypes(CLEAN, false);
        gts.check_phase().unwrap();
        assert_eq!(gts.shape(), (3, 2, 2));

        gts.check_phase().unwrap();
        assert_eq!(gts.shape(), (3, 2, 2));
    }

    #[test]
    fn test_check_phase_skipped_when_prephased() {
        let mut calls = CLEAN;
        calls[2][0] = [1, 0, 0];
        let mut gts = genotypes(calls, true);
        gts.check_phase().unwrap();
        assert_eq!(gts.shape().2, 3);
    }

    #[test]
    fn test_to_mac_flips_major_alt() {
        // Three samples, two variants; rs1 has ALT frequency 0.9 and is
        // homozygous ALT everywhere
        let mut data = Array3::from_elem((3, 2, 2), false);
        data.slice_mut(s![.., 0, ..]).fill(true);
        data[[0, 1, 0]] = true;
        let mut gts = Genotypes::from_parts(
            "mac.vcf",
            vec!["HG1".into(), "HG2".into(), "HG3".into()],
            VariantTable::new(vec![
                Variant::new("rs1", "1", 10114, 0.9),
                Variant::new("rs2", "1", 10116, 1.0 / 6.0),
            ]),
            GenotypeData::Presence(data),
            true,
        )
        .unwrap();

        gts.to_mac().unwrap();
        let rows = gts.variants().rows();
        assert!((rows[0].freq - 0.1).abs() < 1e-12);
        assert!((rows[1].freq - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(gts.variants().label(), FrequencyLabel::MinorFrequency);

        let GenotypeData::Presence(data) = gts.data() else {
            panic!("expected presence data");
        };
        assert!(data.slice(s![.., 0, ..]).iter().all(|&present| !present));
        assert!(data[[0, 1, 0]]);

        // Already converted: nothing changes
        gts.to_mac().unwrap();
        assert!((gts.variants().rows()[0].freq - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_to_mac_requires_presence_data() {
        let mut gts = genotypes(CLEAN, false);
        assert!(matches!(gts.to_mac(), Err(GenotypeError::NotBiallelic)));
        assert_eq!(gts.variants().label(), FrequencyLabel::AlternateFrequency);
    }
}
