// ==============================================================================
// examples/vcf_test.rs - VCF Loading Test
// ==============================================================================
// Description: Stream, load and subset genotypes from a VCF
// Created: 2026-10-19
// ==============================================================================
// Usage:
//   cargo run --example vcf_test -- /path/to/file.vcf.gz [region]
// ==============================================================================

use genotype_tensor::processor;
use genotype_tensor::{GenotypeData, LoadOptions, RecordSource};
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Get file path from command line
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <vcf_file> [region]", args[0]);
        eprintln!("\nExample:");
        eprintln!("  cargo run --example vcf_test -- /path/to/chr22.vcf.gz chr22:16050000-16060000");
        std::process::exit(1);
    }

    let vcf_path = &args[1];
    let mut options = LoadOptions::new()
        .discard_missing(true)
        .discard_multiallelic(true)
        .with_max_variants(1000);
    if let Some(region) = args.get(2) {
        options = options.with_region(region.parse()?);
    }

    println!("{}", "=".repeat(80));
    println!("VCF Loading Test");
    println!("{}", "=".repeat(80));
    println!("File: {}", vcf_path);
    println!();

    // Stream the first few records without building a tensor
    let source = RecordSource::open_vcf(vcf_path, &options)?;
    println!("Samples: {}", source.samples().len());
    println!("\nFirst 10 records:");
    println!("{:-<80}", "");
    for record in source.take(10) {
        let record = record?;
        println!(
            "  {}:{}  {:<20}  aaf={:.4}",
            record.variant.chrom, record.variant.pos, record.variant.id, record.variant.freq
        );
    }

    // Full load through the validation pipeline
    println!("\nLoading (max 1000 variants)...");
    let (genotypes, summary) = processor::load_vcf(vcf_path, &options)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    // Reverse the first five samples into a copy
    let wanted: Vec<String> = genotypes.samples().iter().take(5).rev().cloned().collect();
    let subset = genotypes.subset_into_copy(Some(wanted.as_slice()), None);
    println!("\nSubset samples (requested order): {:?}", subset.samples());

    if let GenotypeData::Presence(data) = subset.data() {
        let alt = data.iter().filter(|&&present| present).count();
        println!("ALT alleles in subset: {} of {}", alt, data.len());
    }

    println!("\n{}", "=".repeat(80));
    println!("Done");
    Ok(())
}
