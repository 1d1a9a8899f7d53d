// ==============================================================================
// main.rs - Genotype Tensor Entry Point
// ==============================================================================
// Description: Load, validate and convert genotypes from the command line
// Created: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genotype_tensor::models::{LoadOptions, Region};
use genotype_tensor::output::{self, PlinkConverter};
use genotype_tensor::processor;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input genotypes (.vcf, .vcf.gz or .pgen with .pvar/.psam beside it)
    input: PathBuf,

    /// Write the validated genotypes here (.vcf, .vcf.gz or .pgen)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only load variants in this region (contig or contig:start-end)
    #[arg(short, long)]
    region: Option<Region>,

    /// Only load these samples, and write them in this order (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    samples: Option<Vec<String>>,

    /// Only load these variant IDs, and write them in this order (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    variants: Option<Vec<String>>,

    /// Upper bound on the number of variants to load
    #[arg(long)]
    max_variants: Option<usize>,

    /// Variants decoded per chunk from a PGEN file
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Treat all genotypes as phased and skip the phase check
    #[arg(long)]
    prephased: bool,

    /// Drop samples with missing genotypes instead of failing
    #[arg(long)]
    discard_missing: bool,

    /// Drop multiallelic variants instead of failing
    #[arg(long)]
    discard_multiallelic: bool,

    /// Convert to minor allele counts after validation
    #[arg(long)]
    maf: bool,

    /// Print a JSON summary of the load to stdout
    #[arg(long)]
    summary: bool,

    /// plink2 executable used for PGEN input and output
    #[arg(long, env = "PLINK2_PATH", default_value = "plink2")]
    plink2: PathBuf,

    /// Keep plink2's intermediate VCF and log when writing PGEN
    #[arg(long)]
    keep_intermediate: bool,
}

impl Args {
    fn load_options(&self) -> LoadOptions {
        let mut options = LoadOptions::new()
            .prephased(self.prephased)
            .discard_missing(self.discard_missing)
            .discard_multiallelic(self.discard_multiallelic)
            .minor_allele_counts(self.maf);
        if let Some(region) = &self.region {
            options = options.with_region(region.clone());
        }
        if let Some(samples) = &self.samples {
            options = options.with_samples(samples.iter().cloned());
        }
        if let Some(variants) = &self.variants {
            options = options.with_variant_ids(variants.iter().cloned());
        }
        if let Some(max) = self.max_variants {
            options = options.with_max_variants(max);
        }
        if let Some(chunk_size) = self.chunk_size {
            options = options.with_chunk_size(chunk_size);
        }
        options
    }
}

fn is_pgen(path: &std::path::Path) -> bool {
    path.extension().is_some_and(|ext| ext == "pgen")
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genotype_tensor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let options = args.load_options();
    let converter = PlinkConverter::new(args.plink2.clone());

    let (mut genotypes, summary) = if is_pgen(&args.input) {
        processor::load_plink_with_converter(&args.input, &converter, &options)?
    } else {
        processor::load_vcf(&args.input, &options)?
    };

    // Loading keeps file order; put rows and columns in the requested order
    if args.samples.is_some() || args.variants.is_some() {
        genotypes.subset_in_place(args.samples.as_deref(), args.variants.as_deref());
    }

    if let Some(path) = &args.output {
        if is_pgen(path) {
            output::write_plink(&genotypes, path.with_extension(""), &converter, !args.keep_intermediate)
                .with_context(|| format!("Failed to write PLINK2 files for {:?}", path))?;
        } else {
            output::write_vcf(&genotypes, path).with_context(|| format!("Failed to write {:?}", path))?;
        }
        info!("Wrote genotypes to {:?}", path);
    }

    if args.summary {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}
