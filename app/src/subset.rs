// ==============================================================================
// subset.rs - Sample / Variant Subsetting
// ==============================================================================
// Description: Projects genotypes onto requested sample and variant orderings
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use ndarray::Axis;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::genotypes::Genotypes;
use crate::index::IdIndex;

impl Genotypes {
    /// New genotypes restricted to the requested samples and/or variants
    ///
    /// Rows and columns come out in the requested order. Ids that are not
    /// present are skipped with a warning; a repeated id is kept once.
    pub fn subset_into_copy<S: AsRef<str>>(&self, samples: Option<&[S]>, variants: Option<&[S]>) -> Genotypes {
        let sample_idx = samples.map(|ids| resolve(self.sample_index(), ids, "samples"));
        let variant_idx = variants.map(|ids| resolve(self.variant_index(), ids, "variants"));

        let data = match (&sample_idx, &variant_idx) {
            (Some(rows), Some(cols)) => self.data.select(Axis(0), rows).select(Axis(1), cols),
            (Some(rows), None) => self.data.select(Axis(0), rows),
            (None, Some(cols)) => self.data.select(Axis(1), cols),
            (None, None) => self.data.clone(),
        };

        let (samples, sample_index) = match &sample_idx {
            Some(rows) => (rows.iter().map(|&i| self.samples[i].clone()).collect(), IdIndex::new()),
            None => (self.samples.clone(), self.sample_index.clone()),
        };
        let (variants, variant_index) = match &variant_idx {
            Some(cols) => (self.variants.select(cols), IdIndex::new()),
            None => (self.variants.clone(), self.variant_index.clone()),
        };

        Genotypes {
            path: self.path.clone(),
            samples,
            variants,
            data,
            prephased: self.prephased,
            sample_index,
            variant_index,
        }
    }

    /// Restrict these genotypes to the requested samples and/or variants
    ///
    /// Same selection rules as [`Genotypes::subset_into_copy`]; the id lookup
    /// of every axis that changed is cleared.
    pub fn subset_in_place<S: AsRef<str>>(&mut self, samples: Option<&[S]>, variants: Option<&[S]>) {
        if let Some(ids) = samples {
            let rows = resolve(self.sample_index(), ids, "samples");
            self.project_samples(&rows);
        }
        if let Some(ids) = variants {
            let cols = resolve(self.variant_index(), ids, "variants");
            self.project_variants(&cols);
        }
    }
}

/// Positions of the requested ids, in request order, skipping absent ones
fn resolve<S: AsRef<str>>(index: &HashMap<String, usize>, ids: &[S], what: &str) -> Vec<usize> {
    let ids: Vec<&str> = ids.iter().map(|id| id.as_ref()).collect();

    let mut seen = HashSet::with_capacity(ids.len());
    let positions: Vec<usize> = ids
        .iter()
        .filter_map(|&id| index.get(id).copied())
        .filter(|&pos| seen.insert(pos))
        .collect();

    let missing = ids.iter().filter(|&&id| !index.contains_key(id)).count();
    if missing > 0 {
        warn!(
            "Saw {} fewer {} than requested. Proceeding with {} {}.",
            missing,
            what,
            positions.len(),
            what
        );
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genotypes::GenotypeData;
    use crate::models::{Variant, VariantTable};
    use ndarray::{s, Array3};

    /// Each call encodes its own position: [sample, variant, 1]
    fn genotypes() -> Genotypes {
        let data = Array3::from_shape_fn((4, 3, 3), |(i, j, c)| match c {
            0 => i as u8,
            1 => j as u8,
            _ => 1,
        });
        Genotypes::from_parts(
            "subset.vcf",
            vec!["s1".into(), "s2".into(), "s3".into(), "s4".into()],
            VariantTable::new(vec![
                Variant::new("rs1", "1", 10, 0.1),
                Variant::new("rs2", "1", 20, 0.2),
                Variant::new("rs3", "2", 30, 0.3),
            ]),
            GenotypeData::Counts(data),
            false,
        )
        .unwrap()
    }

    fn counts(gts: &Genotypes) -> &Array3<u8> {
        match gts.data() {
            GenotypeData::Counts(data) => data,
            GenotypeData::Presence(_) => panic!("expected counts"),
        }
    }

    #[test]
    fn test_copy_keeps_requested_order() {
        let gts = genotypes();
        let sub = gts.subset_into_copy(Some(&["s3", "s1"][..]), Some(&["rs3", "rs1"][..]));

        assert_eq!(sub.samples(), ["s3", "s1"]);
        assert_eq!(sub.variants().ids().collect::<Vec<_>>(), vec!["rs3", "rs1"]);
        assert_eq!(sub.shape(), (2, 2, 3));
        assert_eq!(counts(&sub).slice(s![0, 0, ..2]).to_vec(), vec![2, 2]);
        assert_eq!(counts(&sub).slice(s![1, 1, ..2]).to_vec(), vec![0, 0]);
        assert_eq!(sub.sample_index().get("s1"), Some(&1));

        // The source is untouched
        assert_eq!(gts.shape(), (4, 3, 3));
        assert_eq!(gts.sample_index().get("s1"), Some(&0));
    }

    #[test]
    fn test_partial_match_skips_absent_ids() {
        let gts = genotypes();
        let sub = gts.subset_into_copy(Some(&["s4", "nobody", "s2"][..]), None);
        assert_eq!(sub.samples(), ["s4", "s2"]);
        assert_eq!(sub.shape(), (2, 3, 3));
        assert_eq!(sub.variants().len(), 3);
    }

    #[test]
    fn test_repeated_id_kept_once() {
        let gts = genotypes();
        let sub = gts.subset_into_copy(None, Some(&["rs2", "rs2"][..]));
        assert_eq!(sub.variants().ids().collect::<Vec<_>>(), vec!["rs2"]);
    }

    #[test]
    fn test_in_place_invalidates_indices() {
        let mut gts = genotypes();
        assert_eq!(gts.variant_index().get("rs3"), Some(&2));

        gts.subset_in_place(None, Some(&["rs3", "rs9"][..]));
        assert_eq!(gts.shape(), (4, 1, 3));
        assert_eq!(gts.variant_index().get("rs3"), Some(&0));
        assert_eq!(counts(&gts).slice(s![3, 0, ..2]).to_vec(), vec![3, 2]);

        gts.subset_in_place(Some(&["s2"][..]), None);
        assert_eq!(gts.samples(), ["s2"]);
        assert_eq!(gts.sample_index().len(), 1);
    }

    #[test]
    fn test_no_matches_gives_empty_axis() {
        let gts = genotypes();
        let sub = gts.subset_into_copy(Some(&["x", "y"][..]), None);
        assert!(sub.is_empty());
        assert_eq!(sub.shape(), (0, 3, 3));
    }
}
