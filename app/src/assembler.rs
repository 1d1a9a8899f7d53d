// ==============================================================================
// assembler.rs - Tensor Assembler
// ==============================================================================
// Description: Builds the samples x variants x channels tensor from a record
//              stream or, chunk by chunk, straight from a PLINK2 trio
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Modes:
//   - unbounded: record count unknown, append then reshape
//   - bounded:   preallocate to a known maximum, fill, truncate
//   - chunked:   binary trio, decode a fixed number of variants at a time
// Sources emit variant-major records; every mode ends sample-major, and every
// full-size buffer is allocated fallibly.
// ==============================================================================

use ndarray::{s, Array2, Array3};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{GenotypeError, Result};
use crate::genotype_converter::alt_allele_frequency;
use crate::genotypes::{GenotypeData, Genotypes};
use crate::models::{GenotypeRecord, LoadOptions, Variant, VariantTable};
use crate::parsers::plink::{self, companion_path, PgenDecoder};
use crate::source::RecordSource;

/// Read every record of `source` into a new [`Genotypes`]
///
/// The variant-ID set, `max_variants` or the source's own record count bound
/// the read, in that order; with none of them the tensor grows as records
/// arrive. The source is closed before returning, on error paths too.
pub fn read(path: impl AsRef<Path>, source: RecordSource, options: &LoadOptions) -> Result<Genotypes> {
    let bound = match (&options.variant_ids, options.max_variants, source.bound()) {
        (Some(ids), _, _) => Some(ids.len()),
        (None, Some(max), Some(total)) => Some(max.min(total)),
        (None, Some(max), None) => Some(max),
        (None, None, total) => total,
    };
    match bound {
        Some(max) => read_bounded(path, source, max, options),
        None => read_unbounded(path, source, options),
    }
}

/// Append records to growable buffers, then reshape once at the end
pub fn read_unbounded(path: impl AsRef<Path>, mut source: RecordSource, options: &LoadOptions) -> Result<Genotypes> {
    warn!(
        "The max_variants parameter was not specified. We have no choice but to append to an \
         ever-growing array, which can lead to memory overuse!"
    );

    let samples = source.samples().to_vec();
    let channels = options.channels();

    let mut variants = Vec::new();
    let mut values: Vec<u8> = Vec::new();
    let filled = source.by_ref().try_for_each(|record| {
        let record = record?;
        check_shape(&record, samples.len(), channels)?;
        values.extend(record.calls.iter().copied());
        variants.push(record.variant);
        Ok::<_, GenotypeError>(())
    });
    let closed = source.finish();
    filled?;
    closed?;

    let by_variant = Array3::from_shape_vec((variants.len(), samples.len(), channels), values)
        .map_err(|e| GenotypeError::DimensionMismatch(e.to_string()))?;

    // Transpose so that samples are rows and variants are columns
    let mut data = try_zeros((samples.len(), variants.len(), channels), "the genotype matrix")?;
    data.assign(&by_variant.permuted_axes([1, 0, 2]));

    finish(path.as_ref(), samples, variants, data, options)
}

/// Preallocate room for `max` records, fill in source order, then truncate
///
/// Records past the first `max` are never pulled from the source.
pub fn read_bounded(
    path: impl AsRef<Path>,
    mut source: RecordSource,
    max: usize,
    options: &LoadOptions,
) -> Result<Genotypes> {
    let samples = source.samples().to_vec();
    let channels = options.channels();

    let filled = fill_bounded(&mut source, max, samples.len(), channels);
    let closed = source.finish();
    let (mut variants, data) = filled?;
    closed?;

    let data = if variants.len() < max {
        info!(
            "Removing {} unneeded variant records that were preallocated b/c max_variants was specified.",
            max - variants.len()
        );
        variants.shrink_to_fit();
        data.slice_move(s![.., ..variants.len(), ..])
    } else {
        data
    };

    finish(path.as_ref(), samples, variants, data, options)
}

fn fill_bounded(
    source: &mut RecordSource,
    max: usize,
    n_samples: usize,
    channels: usize,
) -> Result<(Vec<Variant>, Array3<u8>)> {
    let mut variants = try_vec(max, "the variant table")?;
    let mut data = try_zeros((n_samples, max, channels), "the genotype matrix")?;

    // Each record becomes one variant column of the sample-major tensor
    for record in source.take(max) {
        let record = record?;
        check_shape(&record, n_samples, channels)?;
        data.slice_mut(s![.., variants.len(), ..]).assign(&record.calls);
        variants.push(record.variant);
    }

    Ok((variants, data))
}

/// Read a PLINK2 trio in chunks of `options.chunk_size` variants
///
/// Peak extra memory is one chunk's decode buffer. The decoder is closed
/// before returning, whether or not the read succeeded.
pub fn read_plink(path: impl AsRef<Path>, mut decoder: Box<dyn PgenDecoder>, options: &LoadOptions) -> Result<Genotypes> {
    let path = path.as_ref();
    let loaded = read_plink_chunks(path, decoder.as_mut(), options);
    debug!("Closing PGEN decoder");
    let closed = decoder.close();
    let genotypes = loaded?;
    closed?;
    Ok(genotypes)
}

fn read_plink_chunks(path: &Path, decoder: &mut dyn PgenDecoder, options: &LoadOptions) -> Result<Genotypes> {
    let (samples, sample_idxs) =
        plink::read_samples(&companion_path(path, "psam"), options.samples.as_deref())?;
    decoder.set_sample_subset(&sample_idxs)?;

    // How many variants to load?
    let total = decoder.variant_count();
    let max = options.max_variants.map_or(total, |max| max.min(total));
    let (indices, mut variants) = plink::read_variants(
        &companion_path(path, "pvar"),
        options.region.clone(),
        options.variant_ids.clone(),
        Some(max),
    )?;

    let n = samples.len();
    let channels = options.channels();
    let chunk = options
        .chunk_size
        .map_or(indices.len(), |size| size.min(indices.len()))
        .max(1);

    let mut data = try_zeros((n, indices.len(), channels), "the genotype matrix")?;
    info!(
        "Reading genotypes from {} samples and {} variants in chunks of size {} variants",
        n,
        indices.len(),
        chunk
    );

    for (i, rows) in indices.chunks(chunk).enumerate() {
        let start = i * chunk;
        let end = start + rows.len();
        debug!("Decoding variants {}..{}", start, end);

        let out = data.slice_mut(s![.., start..end, ..]);
        if channels > 2 {
            let mut alleles = try_zeros2::<i32>((rows.len(), 2 * n), "a chunk of alleles")?;
            let mut phase = try_zeros2::<u8>((rows.len(), n), "a chunk of phase flags")?;
            decoder.read_alleles_and_phase(rows, alleles.view_mut(), phase.view_mut())?;
            plink::interleave_sample_major(alleles.view(), phase.view(), out);
        } else {
            let mut alleles = try_zeros2::<i32>((2 * n, rows.len()), "a chunk of alleles")?;
            decoder.read_alleles_hap_major(rows, alleles.view_mut())?;
            plink::interleave_hap_major(alleles.view(), out);
        }
    }

    for (j, variant) in variants.iter_mut().enumerate() {
        variant.freq = alt_allele_frequency(data.slice(s![.., j, ..]));
    }

    finish(path, samples, variants, data, options)
}

fn finish(
    path: &Path,
    samples: Vec<String>,
    variants: Vec<Variant>,
    data: Array3<u8>,
    options: &LoadOptions,
) -> Result<Genotypes> {
    warn_if_empty(data.dim());
    Genotypes::from_parts(
        path,
        samples,
        VariantTable::new(variants),
        GenotypeData::Counts(data),
        options.prephased,
    )
}

fn warn_if_empty(shape: (usize, usize, usize)) {
    if shape.0 == 0 || shape.1 == 0 || shape.2 == 0 {
        warn!(
            "Failed to load genotypes. If you specified a region, check that the contig name \
             matches! For example, double-check the 'chr' prefix."
        );
    }
}

fn check_shape(record: &GenotypeRecord, n_samples: usize, channels: usize) -> Result<()> {
    let found = record.calls.dim();
    if found != (n_samples, channels) {
        return Err(GenotypeError::RecordShape {
            id: record.variant.id.clone(),
            expected: (n_samples, channels),
            found,
        });
    }
    Ok(())
}

fn elements(shape: &[usize], what: &'static str) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &len| acc.checked_mul(len))
        .ok_or(GenotypeError::ResourceExhausted {
            what,
            elements: usize::MAX,
        })
}

/// Allocate a zeroed buffer, reporting failure instead of aborting
fn try_buffer<T: Clone + Default>(len: usize, what: &'static str) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| GenotypeError::ResourceExhausted { what, elements: len })?;
    buffer.resize(len, T::default());
    Ok(buffer)
}

fn try_vec<T>(capacity: usize, what: &'static str) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(capacity)
        .map_err(|_| GenotypeError::ResourceExhausted {
            what,
            elements: capacity,
        })?;
    Ok(buffer)
}

fn try_zeros(shape: (usize, usize, usize), what: &'static str) -> Result<Array3<u8>> {
    let len = elements(&[shape.0, shape.1, shape.2], what)?;
    Array3::from_shape_vec(shape, try_buffer(len, what)?)
        .map_err(|e| GenotypeError::DimensionMismatch(e.to_string()))
}

fn try_zeros2<T: Clone + Default>(shape: (usize, usize), what: &'static str) -> Result<Array2<T>> {
    let len = elements(&[shape.0, shape.1], what)?;
    Array2::from_shape_vec(shape, try_buffer(len, what)?)
        .map_err(|e| GenotypeError::DimensionMismatch(e.to_string()))
}
