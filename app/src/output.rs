// ==============================================================================
// output.rs - Genotype Output
// ==============================================================================
// Description: Write genotypes as VCF, or as a PLINK2 trio via plink2
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================
// Formats:
//   - VCF 4.3 (plain, or BGZF when the path ends in .gz), one phased GT per sample
//   - PGEN/PVAR/PSAM, converted from an intermediate VCF by an external plink2
// ==============================================================================

use noodles_bgzf as bgzf;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::error::{GenotypeError, Result};
use crate::genotype_converter::format_phased;
use crate::genotypes::{GenotypeData, Genotypes};
use crate::models::FrequencyLabel;

/// Write `genotypes` as a VCF at `path`
///
/// Every call is written phased. Output whose name ends in `.gz` is BGZF
/// compressed. Every variant must carry REF/ALT alleles.
pub fn write_vcf(genotypes: &Genotypes, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    if let Some(variant) = genotypes.variants().rows().iter().find(|v| v.alleles.is_none()) {
        return Err(GenotypeError::MissingAlleles(variant.id.clone()));
    }
    if genotypes.variants().label() == FrequencyLabel::MinorFrequency {
        warn!("Writing minor allele counts; GT values refer to the minor allele, not ALT");
    }

    info!(
        "Writing {} variants for {} samples to {:?}",
        genotypes.variants().len(),
        genotypes.samples().len(),
        path
    );

    let file = File::create(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut writer = bgzf::io::Writer::new(file);
        write_records(&mut writer, genotypes)?;
        writer.finish()?;
    } else {
        let mut writer = BufWriter::new(file);
        write_records(&mut writer, genotypes)?;
        writer.flush()?;
    }
    Ok(())
}

fn write_records<W: Write>(writer: &mut W, genotypes: &Genotypes) -> io::Result<()> {
    let rows = genotypes.variants().rows();

    // Write VCF header manually
    writeln!(writer, "##fileformat=VCFv4.3")?;
    writeln!(writer, "##fileDate={}", chrono::Utc::now().format("%Y%m%d"))?;
    writeln!(writer, "##source=genotype-tensor-v{}", env!("CARGO_PKG_VERSION"))?;

    let mut seen = HashSet::new();
    for variant in rows {
        if seen.insert(variant.chrom.as_str()) {
            writeln!(writer, "##contig=<ID={}>", variant.chrom)?;
        }
    }
    writeln!(writer, "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">")?;

    write!(writer, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT")?;
    for sample in genotypes.samples() {
        write!(writer, "\t{}", sample)?;
    }
    writeln!(writer)?;

    for (j, variant) in rows.iter().enumerate() {
        let (reference, alternate) = match &variant.alleles {
            Some(alleles) => (alleles.reference.as_str(), alleles.alternate.as_str()),
            None => continue,
        };
        write!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t.\t.\t.\tGT",
            variant.chrom, variant.pos, variant.id, reference, alternate
        )?;
        for i in 0..genotypes.samples().len() {
            let (first, second) = allele_pair(genotypes.data(), i, j);
            write!(writer, "\t{}", format_phased(first, second))?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn allele_pair(data: &GenotypeData, sample: usize, variant: usize) -> (u8, u8) {
    match data {
        GenotypeData::Counts(data) => (data[[sample, variant, 0]], data[[sample, variant, 1]]),
        GenotypeData::Presence(data) => (
            u8::from(data[[sample, variant, 0]]),
            u8::from(data[[sample, variant, 1]]),
        ),
    }
}

/// `prefix` with `.extension` appended, keeping any dots already in it
pub fn with_suffix(prefix: &Path, extension: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_owned();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// Handle on the external `plink2` executable
#[derive(Debug, Clone)]
pub struct PlinkConverter {
    program: PathBuf,
}

impl Default for PlinkConverter {
    fn default() -> Self {
        Self::new("plink2")
    }
}

impl PlinkConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Convert `vcf` into `<prefix>.pgen`, `.pvar` and `.psam`
    pub fn make_pgen(&self, vcf: &Path, prefix: &Path) -> Result<()> {
        self.run(&[
            OsStr::new("--vcf"),
            vcf.as_os_str(),
            OsStr::new("--make-pgen"),
            OsStr::new("--out"),
            prefix.as_os_str(),
        ])
    }

    /// Export the trio at `prefix` as `<out>.vcf` and return that path
    pub fn export_vcf(&self, prefix: &Path, out: &Path) -> Result<PathBuf> {
        self.run(&[
            OsStr::new("--pfile"),
            prefix.as_os_str(),
            OsStr::new("--export"),
            OsStr::new("vcf"),
            OsStr::new("id-paste=iid"),
            OsStr::new("--out"),
            out.as_os_str(),
        ])?;
        Ok(with_suffix(out, "vcf"))
    }

    fn run(&self, args: &[&OsStr]) -> Result<()> {
        debug!("Running {:?} {:?}", self.program, args);
        let status = Command::new(&self.program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| GenotypeError::Converter(format!("failed to run {}: {}", self.program.display(), e)))?;

        if !status.success() {
            return Err(GenotypeError::Converter(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )));
        }
        Ok(())
    }
}

/// Write `genotypes` as a PLINK2 trio at `prefix`
///
/// An intermediate `<prefix>.vcf` is converted by `converter`. With
/// `clean_up`, that VCF and plink2's `<prefix>.log` are removed afterwards.
pub fn write_plink(genotypes: &Genotypes, prefix: impl AsRef<Path>, converter: &PlinkConverter, clean_up: bool) -> Result<()> {
    let prefix = prefix.as_ref();
    let vcf = with_suffix(prefix, "vcf");

    write_vcf(genotypes, &vcf)?;
    converter.make_pgen(&vcf, prefix)?;

    if clean_up {
        std::fs::remove_file(&vcf)?;
        match std::fs::remove_file(with_suffix(prefix, "log")) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
    }
    info!("Wrote PLINK2 files with prefix {:?}", prefix);
    Ok(())
}
