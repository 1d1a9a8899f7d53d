// ==============================================================================
// parsers/vcf.rs - VCF record source
// ==============================================================================
// Description: Lazy per-variant genotype records from a VCF using noodles-vcf
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// References:
// - VCF 4.3 Spec: https://samtools.github.io/hts-specs/VCFv4.3.pdf
// - noodles-vcf: https://docs.rs/noodles-vcf/0.81.0/noodles_vcf/
// ==============================================================================

use ndarray::Array2;
use noodles_vcf as vcf;
use noodles_vcf::variant::record::{AlternateBases, Ids};
use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{GenotypeError, Result};
use crate::genotype_converter::{alt_allele_frequency, parse_genotype, GenotypeCall};
use crate::models::{GenotypeRecord, LoadOptions, Region, Variant};

/// Non-restartable stream of genotype records from one VCF
///
/// The file is opened eagerly so that [`VcfRecords::samples`] is known before
/// the first record is pulled. The reader is dropped as soon as the stream
/// ends, whether by exhaustion, early exit on the variant-ID set, or an error.
pub struct VcfRecords {
    path: PathBuf,
    reader: Option<vcf::io::Reader<Box<dyn BufRead>>>,
    record: vcf::Record,

    /// Names of the selected samples, in file order
    samples: Vec<String>,

    /// Sample-column offsets of the selected samples
    columns: Vec<usize>,

    region: Option<Region>,
    wanted: Option<HashSet<String>>,
    channels: usize,

    /// Records emitted so far (after filtering)
    emitted: usize,
}

impl VcfRecords {
    /// Open a VCF (plain or BGZF-compressed) and resolve its samples
    pub fn open(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self> {
        let path = path.as_ref();

        let mut reader = vcf::io::reader::Builder::default()
            .build_from_path(path)
            .map_err(|e| GenotypeError::Vcf(format!("{}: {}", path.display(), e)))?;

        let header = reader
            .read_header()
            .map_err(|e| GenotypeError::Vcf(format!("{}: header: {}", path.display(), e)))?;

        let (samples, columns) = select_samples(
            header.sample_names().iter().map(String::as_str),
            options.samples.as_deref(),
        );
        info!("Loading genotypes from {} samples", samples.len());

        Ok(Self {
            path: path.to_path_buf(),
            reader: Some(reader),
            record: vcf::Record::default(),
            samples,
            columns,
            region: options.region.clone(),
            wanted: options.variant_ids.clone(),
            channels: options.channels(),
            emitted: 0,
        })
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Release the reader before the end of the stream
    pub fn finish(mut self) -> Result<()> {
        self.close();
        Ok(())
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Closed {:?} after {} records", self.path, self.emitted);
        }
    }

    fn found_all_wanted(&self) -> bool {
        self.wanted
            .as_ref()
            .is_some_and(|wanted| self.emitted >= wanted.len())
    }

    /// Read the next raw record; `Ok(false)` at end of file
    fn advance(&mut self) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        let n = reader
            .read_record(&mut self.record)
            .map_err(|e| GenotypeError::Vcf(format!("{}: {}", self.path.display(), e)))?;
        Ok(n > 0)
    }

    /// Metadata and calls of the current record, or `None` if filtered out
    fn decode_current(&self) -> Result<Option<GenotypeRecord>> {
        let record = &self.record;
        let chrom = record.reference_sequence_name();

        let pos = match record.variant_start() {
            Some(Ok(pos)) => pos.get(),
            Some(Err(e)) => return Err(GenotypeError::Vcf(format!("Failed to get position: {}", e))),
            None => return Err(GenotypeError::Vcf("Missing position".to_string())),
        };

        if let Some(region) = &self.region {
            if !region.contains(chrom, pos as u64) {
                return Ok(None);
            }
        }

        let id_field = record.ids();
        let ids: Vec<&str> = id_field.iter().collect();
        if let Some(wanted) = &self.wanted {
            if !ids.iter().any(|id| wanted.contains(*id)) {
                return Ok(None);
            }
        }

        let ref_allele = record.reference_bases().to_string();
        let alt_field = record.alternate_bases();
        let alt_allele = match alt_field.iter().next() {
            Some(alt) => alt
                .map_err(|e| GenotypeError::Vcf(format!("Failed to get ALT allele: {}", e)))?
                .to_string(),
            None => ".".to_string(),
        };

        let id = if ids.is_empty() {
            // Generate pseudo-ID for unnamed variants: {CHROM}:{POS}:{REF}:{ALT}
            format!("{}:{}:{}:{}", chrom, pos, ref_allele, alt_allele)
        } else {
            ids.join(";")
        };

        let pos = u32::try_from(pos)
            .map_err(|_| GenotypeError::Vcf(format!("Position {} of {} out of range", pos, id)))?;

        let calls = self.decode_calls(record.samples().as_ref())?;
        let freq = alt_allele_frequency(calls.view());

        Ok(Some(GenotypeRecord {
            variant: Variant::new(id, chrom, pos, freq).with_alleles(ref_allele, alt_allele),
            calls,
        }))
    }

    /// Decode the FORMAT + sample columns into a samples x channels block
    fn decode_calls(&self, raw: &str) -> Result<Array2<u8>> {
        let mut calls = Array2::<u8>::zeros((self.columns.len(), self.channels));
        if self.columns.is_empty() {
            return Ok(calls);
        }

        let mut fields = raw.split('\t');
        let gt_position = fields
            .next()
            .and_then(|format| format.split(':').position(|key| key == "GT"));
        let fields: Vec<&str> = fields.collect();

        for (row, &column) in self.columns.iter().enumerate() {
            let call = match (gt_position, fields.get(column)) {
                (Some(gt), Some(sample)) => match sample.split(':').nth(gt) {
                    Some(value) => parse_genotype(value)?,
                    None => GenotypeCall::MISSING,
                },
                _ => GenotypeCall::MISSING,
            };
            calls[[row, 0]] = call.alleles[0];
            calls[[row, 1]] = call.alleles[1];
            if self.channels > 2 {
                calls[[row, 2]] = u8::from(call.phased);
            }
        }

        Ok(calls)
    }
}

impl Iterator for VcfRecords {
    type Item = Result<GenotypeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Exit early once every requested variant has been emitted
            if self.found_all_wanted() {
                self.close();
                return None;
            }

            match self.advance() {
                Ok(true) => {}
                Ok(false) => {
                    self.close();
                    return None;
                }
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            }

            match self.decode_current() {
                Ok(Some(record)) => {
                    self.emitted += 1;
                    return Some(Ok(record));
                }
                Ok(None) => continue,
                Err(e) => {
                    self.close();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Pick the requested samples out of the header, keeping file order
///
/// Returns the selected names and their column offsets. Requested names that
/// are absent from the file are reported and skipped.
pub(crate) fn select_samples<'a>(
    available: impl Iterator<Item = &'a str>,
    requested: Option<&[String]>,
) -> (Vec<String>, Vec<usize>) {
    let wanted: Option<HashSet<&str>> =
        requested.map(|names| names.iter().map(String::as_str).collect());

    let (samples, columns): (Vec<String>, Vec<usize>) = available
        .enumerate()
        .filter(|(_, name)| wanted.as_ref().map_or(true, |w| w.contains(name)))
        .map(|(idx, name)| (name.to_string(), idx))
        .unzip();

    if let Some(wanted) = &wanted {
        if samples.len() < wanted.len() {
            warn!(
                "Saw {} fewer samples than requested. Proceeding with {} samples.",
                wanted.len() - samples.len(),
                samples.len()
            );
        }
    }

    (samples, columns)
}
