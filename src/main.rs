//! A4 Image Splitter CLI
//!
//! Command-line interface for splitting a tall image into A4 pages.

mod logger;

use a4_split::{file_ops::split_image_file, SplitOptions};
use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use logger::StderrLogger;
use std::path::PathBuf;

/// Split a tall image into A4-proportioned pages
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input image file path (PNG, JPEG or WebP)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory the PDF or ZIP is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Output format: pdf, jpeg or png (MIME types work too)
    #[arg(short, long, default_value = "pdf")]
    format: String,

    /// JPEG quality (1-100, only affects JPEG pages)
    #[arg(short, long, default_value = "100")]
    quality: u8,

    /// Compress PDF streams (reduces file size)
    #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
    compress_streams: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    StderrLogger::new(level).init()?;

    let options = SplitOptions {
        quality: args.quality,
        compress_streams: args.compress_streams,
        ..SplitOptions::default()
    };

    println!("A4 Image Splitter");
    println!("=================");

    let report = split_image_file(&args.input, &args.output_dir, &args.format, &options)
        .with_context(|| format!("failed to split {:?}", args.input))?;

    println!("\nDone! Split into {} pages", report.page_count);
    println!("Output saved to: {:?}", args.output_dir.join(&report.file_name));

    Ok(())
}
