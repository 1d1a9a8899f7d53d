// ==============================================================================
// parsers/plink.rs - PLINK2 trio reader (PSAM / PVAR / PGEN)
// ==============================================================================
// Description: Sample and variant metadata parsing plus the binary genotype
//              decoder contract for PLINK2 file trios
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited text with a '#'-prefixed header line
// Example PSAM:
//   #IID    SEX
//   HG00096    1
// Example PVAR:
//   ##fileformat=PVARv1.0
//   #CHROM    POS    ID    REF    ALT
//   1    10114    rs1    A    T
// ==============================================================================

use flate2::read::MultiGzDecoder;
use ndarray::{Array2, ArrayView2, ArrayViewMut2, ArrayViewMut3, Axis};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{GenotypeError, Result};
use crate::genotype_converter::alt_allele_frequency;
use crate::models::{GenotypeRecord, LoadOptions, Region, Variant, MISSING};

/// Allele value the binary decoder uses for a missing call
pub const PGEN_MISSING: i32 = -9;

/// External PGEN decoder
///
/// Buffers are caller-allocated, in the layouts pgenlib uses:
/// - sample-major: one row per variant, strands of sample `s` at columns
///   `2s` and `2s + 1`, plus a variants x samples phase-present matrix
/// - haplotype-major: rows `2s` and `2s + 1` hold the strands of sample `s`,
///   one column per variant
pub trait PgenDecoder {
    /// Restrict decoding to these PSAM rows, in this order
    fn set_sample_subset(&mut self, samples: &[u32]) -> Result<()>;

    /// Total number of variants in the PGEN file
    fn variant_count(&self) -> usize;

    fn read_alleles_and_phase(
        &mut self,
        variants: &[u32],
        alleles: ArrayViewMut2<'_, i32>,
        phase_present: ArrayViewMut2<'_, u8>,
    ) -> Result<()>;

    fn read_alleles_hap_major(&mut self, variants: &[u32], alleles: ArrayViewMut2<'_, i32>) -> Result<()>;

    /// Release the underlying file; called exactly once per load
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Map a decoder allele onto the tensor's encoding
pub(crate) fn native_allele(allele: i32) -> u8 {
    if allele < 0 {
        MISSING
    } else {
        allele.min(i32::from(MISSING) - 1) as u8
    }
}

/// Interleave a sample-major block into `out` (samples x variants x channels)
///
/// `alleles` is variants x (2 * samples), `phase` is variants x samples.
pub(crate) fn interleave_sample_major(
    alleles: ArrayView2<'_, i32>,
    phase: ArrayView2<'_, u8>,
    mut out: ArrayViewMut3<'_, u8>,
) {
    let (n_samples, n_variants, channels) = out.dim();
    for s in 0..n_samples {
        for j in 0..n_variants {
            out[[s, j, 0]] = native_allele(alleles[[j, 2 * s]]);
            out[[s, j, 1]] = native_allele(alleles[[j, 2 * s + 1]]);
            if channels > 2 {
                out[[s, j, 2]] = u8::from(phase[[j, s]] != 0);
            }
        }
    }
}

/// Interleave a haplotype-major block into `out` (samples x variants x 2)
pub(crate) fn interleave_hap_major(alleles: ArrayView2<'_, i32>, mut out: ArrayViewMut3<'_, u8>) {
    let (n_samples, n_variants, _) = out.dim();
    for s in 0..n_samples {
        for j in 0..n_variants {
            out[[s, j, 0]] = native_allele(alleles[[2 * s, j]]);
            out[[s, j, 1]] = native_allele(alleles[[2 * s + 1, j]]);
        }
    }
}

/// Locate a companion file, e.g. `data.pgen` → `data.pvar` or `data.pvar.gz`
pub fn companion_path(path: &Path, extension: &str) -> PathBuf {
    let plain = path.with_extension(extension);
    if plain.exists() {
        return plain;
    }
    let gzipped = path.with_extension(format!("{}.gz", extension));
    if gzipped.exists() {
        gzipped
    } else {
        plain
    }
}

fn open_text(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn tsv_reader(path: &Path) -> Result<csv::StringRecordsIntoIter<Box<dyn Read>>> {
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(open_text(path)?)
        .into_records())
}

fn malformed(path: &Path, details: impl Into<String>) -> GenotypeError {
    GenotypeError::MalformedHeader {
        file: path.to_path_buf(),
        details: details.into(),
    }
}

/// Read sample IDs from a PSAM file
///
/// Returns the kept IIDs in file order together with their PSAM row numbers,
/// which become the decoder's sample subset. A repeated IID keeps only its
/// first row.
pub fn read_samples(path: &Path, requested: Option<&[String]>) -> Result<(Vec<String>, Vec<u32>)> {
    let wanted: Option<HashSet<&str>> =
        requested.map(|names| names.iter().map(String::as_str).collect());

    let mut rows = tsv_reader(path)?;

    // Find the line that declares the header
    let iid_col = loop {
        let record = match rows.next() {
            Some(record) => record?,
            None => return Err(malformed(path, "Your PSAM file is missing a header!")),
        };
        let first = record.get(0).unwrap_or_default();
        if first.starts_with("#FID") || first.starts_with("#IID") {
            let col = record
                .iter()
                .map(|col| col.trim_start_matches('#'))
                .position(|col| col == "IID")
                .ok_or_else(|| malformed(path, "Your PSAM file must have an IID column."))?;
            break col;
        }
        if !first.starts_with('#') {
            return Err(malformed(path, "Your PSAM file is missing a header!"));
        }
    };

    let mut samples = Vec::new();
    let mut indices = Vec::new();
    let mut seen = HashSet::new();
    for (row, record) in rows.enumerate() {
        let record = record?;
        let Some(iid) = record.get(iid_col) else {
            return Err(malformed(path, format!("Sample row {} has no IID column", row + 1)));
        };
        if !seen.insert(iid.to_string()) {
            warn!("Sample {} appears more than once in {:?}; keeping the first", iid, path);
            continue;
        }
        if wanted.as_ref().map_or(true, |w| w.contains(iid)) {
            let idx = u32::try_from(row).map_err(|_| {
                GenotypeError::Decoder(format!("sample row {} of {:?} is past the decoder's range", row + 1, path))
            })?;
            samples.push(iid.to_string());
            indices.push(idx);
        }
    }

    if let Some(wanted) = &wanted {
        if samples.len() < wanted.len() {
            warn!(
                "Saw {} fewer samples than requested. Proceeding with {} samples.",
                wanted.len() - samples.len(),
                samples.len()
            );
        }
    }

    Ok((samples, indices))
}

/// Column offsets of the PVAR fields this crate reads
#[derive(Debug, Clone, Copy)]
struct PvarColumns {
    chrom: usize,
    pos: usize,
    id: usize,
    reference: usize,
    alternate: usize,
}

/// Lazy stream of `(PVAR row, variant)` pairs after region/ID filtering
pub struct PvarRecords {
    path: PathBuf,
    rows: csv::StringRecordsIntoIter<Box<dyn Read>>,
    columns: PvarColumns,
    region: Option<Region>,
    wanted: Option<HashSet<String>>,
    row: u32,
    found: usize,
    done: bool,
}

impl PvarRecords {
    pub fn open(path: &Path, region: Option<Region>, wanted: Option<HashSet<String>>) -> Result<Self> {
        let mut rows = tsv_reader(path)?;

        // Skip '##' meta lines; the next line is the header
        let header = loop {
            match rows.next() {
                Some(record) => {
                    let record = record?;
                    if !record.get(0).unwrap_or_default().starts_with("##") {
                        break record;
                    }
                }
                None => return Err(malformed(path, "Your PVAR file is missing a header!")),
            }
        };

        if header.len() < 5 {
            return Err(malformed(path, "Your PVAR file should have at least five columns."));
        }
        if !header.get(0).unwrap_or_default().starts_with('#') {
            return Err(malformed(path, "Your PVAR file is missing a header!"));
        }

        let names: Vec<&str> = header.iter().map(|col| col.trim_start_matches('#')).collect();
        let find = |name: &str| {
            names
                .iter()
                .position(|col| *col == name)
                .ok_or_else(|| malformed(path, format!("Your PVAR file must have a {} column.", name)))
        };
        let columns = PvarColumns {
            chrom: find("CHROM")?,
            pos: find("POS")?,
            id: find("ID")?,
            reference: find("REF")?,
            alternate: find("ALT")?,
        };

        Ok(Self {
            path: path.to_path_buf(),
            rows,
            columns,
            region,
            wanted,
            row: 0,
            found: 0,
            done: false,
        })
    }

    fn parse_row(&self, record: &csv::StringRecord) -> Result<Variant> {
        let field = |idx: usize| {
            record.get(idx).ok_or_else(|| {
                malformed(&self.path, format!("Variant row {} is missing column {}", self.row + 1, idx + 1))
            })
        };
        let pos = field(self.columns.pos)?;
        let pos = pos.parse::<u32>().map_err(|_| {
            malformed(&self.path, format!("Invalid position '{}' on variant row {}", pos, self.row + 1))
        })?;

        // The ALT frequency is filled in once genotypes are decoded
        Ok(Variant::new(field(self.columns.id)?, field(self.columns.chrom)?, pos, 0.0)
            .with_alleles(field(self.columns.reference)?, field(self.columns.alternate)?))
    }
}

impl Iterator for PvarRecords {
    type Item = Result<(u32, Variant)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.wanted.as_ref().is_some_and(|w| self.found >= w.len()) {
                // Exit early if we've already found all the variants
                self.done = true;
                break;
            }

            let record = match self.rows.next()? {
                Ok(record) => record,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            let row = self.row;
            let variant = match self.parse_row(&record) {
                Ok(variant) => variant,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            self.row += 1;

            if let Some(region) = &self.region {
                if !region.contains(&variant.chrom, u64::from(variant.pos)) {
                    continue;
                }
            }
            if let Some(wanted) = &self.wanted {
                if !wanted.contains(&variant.id) {
                    continue;
                }
            }

            self.found += 1;
            return Some(Ok((row, variant)));
        }
        None
    }
}

/// Read at most `max` variants from a PVAR file
///
/// With a variant-ID set the bound is the size of that set instead; one of the
/// two must be given. Returns the PVAR row numbers of the kept variants and
/// their metadata.
pub fn read_variants(
    path: &Path,
    region: Option<Region>,
    wanted: Option<HashSet<String>>,
    max: Option<usize>,
) -> Result<(Vec<u32>, Vec<Variant>)> {
    let max = match (&wanted, max) {
        (Some(wanted), _) => wanted.len(),
        (None, Some(max)) => max,
        (None, None) => return Err(GenotypeError::MissingVariantBound),
    };

    let mut indices = Vec::with_capacity(max);
    let mut variants = Vec::with_capacity(max);

    for item in PvarRecords::open(path, region, wanted)? {
        if variants.len() >= max {
            break;
        }
        let (row, variant) = item?;
        indices.push(row);
        variants.push(variant);
    }

    if max > variants.len() {
        info!(
            "Removing {} unneeded variant records that were preallocated b/c max_variants was specified.",
            max - variants.len()
        );
        indices.shrink_to_fit();
        variants.shrink_to_fit();
    }

    Ok((indices, variants))
}

/// Lazy stream of genotype records from a PLINK2 trio, one variant at a time
pub struct PlinkRecords {
    variants: PvarRecords,
    decoder: Box<dyn PgenDecoder>,
    samples: Vec<String>,
    channels: usize,
    closed: bool,
}

impl PlinkRecords {
    /// Resolve samples from the PSAM file and prepare the decoder
    ///
    /// `path` is the `.pgen` file; `.psam` and `.pvar` are found beside it.
    /// The decoder is closed if any part of the setup fails.
    pub fn open(path: &Path, mut decoder: Box<dyn PgenDecoder>, options: &LoadOptions) -> Result<Self> {
        let (samples, variants) = match Self::prepare(path, decoder.as_mut(), options) {
            Ok(prepared) => prepared,
            Err(e) => {
                let _ = decoder.close();
                return Err(e);
            }
        };
        info!("Loading genotypes from {} samples", samples.len());

        Ok(Self {
            variants,
            decoder,
            samples,
            channels: options.channels(),
            closed: false,
        })
    }

    fn prepare(
        path: &Path,
        decoder: &mut dyn PgenDecoder,
        options: &LoadOptions,
    ) -> Result<(Vec<String>, PvarRecords)> {
        let (samples, sample_idxs) = read_samples(&companion_path(path, "psam"), options.samples.as_deref())?;
        decoder.set_sample_subset(&sample_idxs)?;
        let variants = PvarRecords::open(
            &companion_path(path, "pvar"),
            options.region.clone(),
            options.variant_ids.clone(),
        )?;
        Ok((samples, variants))
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Number of variants in the PGEN file
    pub fn variant_count(&self) -> usize {
        self.decoder.variant_count()
    }

    /// Close the decoder now and report any failure to do so
    pub fn finish(mut self) -> Result<()> {
        self.close()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("Closing PGEN decoder");
        self.decoder.close()
    }

    fn decode(&mut self, row: u32, mut variant: Variant) -> Result<GenotypeRecord> {
        let n = self.samples.len();
        let mut block = ndarray::Array3::<u8>::zeros((n, 1, self.channels));

        if self.channels > 2 {
            let mut alleles = Array2::<i32>::zeros((1, 2 * n));
            let mut phase = Array2::<u8>::zeros((1, n));
            self.decoder
                .read_alleles_and_phase(&[row], alleles.view_mut(), phase.view_mut())?;
            interleave_sample_major(alleles.view(), phase.view(), block.view_mut());
        } else {
            let mut alleles = Array2::<i32>::zeros((2 * n, 1));
            self.decoder.read_alleles_hap_major(&[row], alleles.view_mut())?;
            interleave_hap_major(alleles.view(), block.view_mut());
        }

        let calls = block.index_axis_move(Axis(1), 0);
        variant.freq = alt_allele_frequency(calls.view());
        Ok(GenotypeRecord { variant, calls })
    }
}

impl Iterator for PlinkRecords {
    type Item = Result<GenotypeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        let next = match self.variants.next() {
            Some(Ok((row, variant))) => self.decode(row, variant),
            Some(Err(e)) => Err(e),
            None => return self.close().err().map(Err),
        };
        if next.is_err() {
            let _ = self.close();
        }
        Some(next)
    }
}

impl Drop for PlinkRecords {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close PGEN decoder: {}", e);
        }
    }
}
