//! Tachograph File Reader CLI
//!
//! Command-line front end for the tacho-decoder library: decodes a `.ddd`
//! download file, prints a driver/vehicle/week summary with the EU
//! 561/2006 findings, and optionally writes the full result as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tacho_decoder::{compliance, DecoderConfig, TachoDecoder};

mod report;

/// Tachograph Reader - decode .ddd files and check EU 561/2006 compliance
#[derive(Parser, Debug)]
#[command(name = "tacho-cli")]
#[command(about = "Decode tachograph .ddd files and evaluate driving/rest rules", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the .ddd file to decode
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Write the full decoded result as JSON to this file ("-" for stdout)
    #[arg(short, long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Strict mode: no layout guessing for undocumented G2.2 fields
    #[arg(long)]
    strict: bool,

    /// Skip the compliance evaluation
    #[arg(long)]
    no_compliance: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("Tachograph Reader CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", tacho_decoder::VERSION);

    let mut config = DecoderConfig::new();
    if args.strict {
        config = config.strict();
    }

    let decoder = TachoDecoder::new();
    let file = decoder
        .decode_file(&args.input, &config)
        .with_context(|| format!("Failed to decode {:?}", args.input))?;

    let analysis = (!args.no_compliance).then(|| compliance::analyze(&file));

    if !args.quiet {
        report::print_summary(&args.input, &file);
        if let Some(ref analysis) = analysis {
            report::print_compliance(analysis);
        }
    }

    if let Some(json_path) = &args.json {
        report::write_json(json_path, &file, analysis.as_ref())?;
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
