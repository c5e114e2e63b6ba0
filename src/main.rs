use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use vendor_pricing::{log_summary, run, Config};

/// Merge vendor used-phone price lists into best-price JSON files
#[derive(Parser, Debug)]
#[command(name = "vendor-pricing")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML file listing sources and outputs
    #[arg(short, long, default_value = "pricing.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("📥 Vendor price import v{}", vendor_pricing::VERSION);
    info!("Config: {}", args.config.display());

    let config = Config::from_file(&args.config)?;
    let report = run(&config)?;

    log_summary(&report, &config);

    info!(
        "✅ Import complete: {} offers from {} sources, {} files written",
        report.total_offers(),
        report.sources.len(),
        report.outputs.len()
    );

    Ok(())
}
