// ==============================================================================
// test_support.rs - Shared Test Fixtures
// ==============================================================================
// Description: Temporary input files and an in-memory PGEN decoder for tests
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use ndarray::ArrayViewMut2;
use std::cell::Cell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::{NamedTempFile, TempDir};

use crate::error::Result;
use crate::parsers::plink::PgenDecoder;

pub const SIMPLE_PSAM: &str = "#IID\tSEX\nHG1\t1\nHG2\t2\nHG3\t1\n";

pub const SIMPLE_PVAR: &str = "\
##fileformat=PVARv1.0
#CHROM\tPOS\tID\tREF\tALT
1\t10114\trs1\tA\tT
1\t10116\trs2\tC\tG
1\t10117\trs3\tT\tC
2\t10122\trs4\tG\tA
";

/// Two samples, two variants; HG1 is an unphased heterozygote at rs1
pub const UNPHASED_VCF: &str = "\
##fileformat=VCFv4.3
##contig=<ID=1>
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tHG1\tHG2
1\t100\trs1\tA\tT\t.\t.\t.\tGT\t0/1\t0|0
1\t200\trs2\tC\tG\t.\t.\t.\tGT\t1|1\t0|1
";

/// Write `contents` to a fresh `.vcf` file that lives as long as the handle
pub fn write_vcf(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".vcf")
        .tempfile()
        .expect("create temp vcf");
    file.write_all(contents.as_bytes()).expect("write temp vcf");
    file.flush().expect("flush temp vcf");
    file
}

pub fn write_text(path: &Path, contents: &str) {
    std::fs::write(path, contents).expect("write fixture");
}

/// Write `<dir>/simple.psam` and `<dir>/simple.pvar`; returns the `.pgen` path
pub fn write_simple_trio(dir: &TempDir) -> PathBuf {
    write_text(&dir.path().join("simple.psam"), SIMPLE_PSAM);
    write_text(&dir.path().join("simple.pvar"), SIMPLE_PVAR);
    dir.path().join("simple.pgen")
}

/// PGEN decoder over calls held in memory
///
/// `calls[variant][sample]` is `[allele1, allele2, phase_present]` for every
/// PSAM sample; alleles use the decoder's `-9` for missing.
pub struct MemoryPgen {
    calls: Vec<Vec<[i32; 3]>>,
    subset: Vec<u32>,
    closed: Rc<Cell<bool>>,
    reads: Rc<Cell<usize>>,
}

impl MemoryPgen {
    pub fn from_calls<V: AsRef<[[i32; 3]]>>(calls: &[V]) -> Self {
        let calls: Vec<Vec<[i32; 3]>> = calls.iter().map(|v| v.as_ref().to_vec()).collect();
        let n_samples = calls.first().map_or(0, Vec::len);
        Self {
            calls,
            subset: (0..n_samples as u32).collect(),
            closed: Rc::new(Cell::new(false)),
            reads: Rc::new(Cell::new(0)),
        }
    }

    /// Calls matching [`SIMPLE_PVAR`] and [`SIMPLE_PSAM`]
    pub fn simple() -> Self {
        Self::from_calls(&[
            [[0, 1, 1], [1, 1, 1], [0, 0, 1]],
            [[0, 0, 1], [0, 1, 1], [1, 0, 1]],
            [[1, 0, 1], [0, 0, 1], [0, 0, 1]],
            [[1, 1, 1], [1, 1, 1], [1, 1, 1]],
        ])
    }

    /// Set once `close` has been called
    pub fn closed_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.closed)
    }

    /// Number of read calls made so far
    pub fn read_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.reads)
    }
}

impl PgenDecoder for MemoryPgen {
    fn set_sample_subset(&mut self, samples: &[u32]) -> Result<()> {
        self.subset = samples.to_vec();
        Ok(())
    }

    fn variant_count(&self) -> usize {
        self.calls.len()
    }

    fn read_alleles_and_phase(
        &mut self,
        variants: &[u32],
        mut alleles: ArrayViewMut2<'_, i32>,
        mut phase_present: ArrayViewMut2<'_, u8>,
    ) -> Result<()> {
        self.reads.set(self.reads.get() + 1);
        for (row, &variant) in variants.iter().enumerate() {
            for (s, &sample) in self.subset.iter().enumerate() {
                let call = self.calls[variant as usize][sample as usize];
                alleles[[row, 2 * s]] = call[0];
                alleles[[row, 2 * s + 1]] = call[1];
                phase_present[[row, s]] = call[2] as u8;
            }
        }
        Ok(())
    }

    fn read_alleles_hap_major(&mut self, variants: &[u32], mut alleles: ArrayViewMut2<'_, i32>) -> Result<()> {
        self.reads.set(self.reads.get() + 1);
        for (col, &variant) in variants.iter().enumerate() {
            for (s, &sample) in self.subset.iter().enumerate() {
                let call = self.calls[variant as usize][sample as usize];
                alleles[[2 * s, col]] = call[0];
                alleles[[2 * s + 1, col]] = call[1];
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed.set(true);
        Ok(())
    }
}
