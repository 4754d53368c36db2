//! Bills one month from a saved JSON dump of the project-view listing.
//!
//! ```text
//! cargo run --example snapshot_billing -- --snapshot assets.json --month 04 --year 2025
//! cargo run --example snapshot_billing -- \
//!     --snapshot assets.json --month 04 --year 2025 --config config/config.yaml
//! ```

use clap::Parser;
use kobo_billing::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapshot_billing")]
#[command(about = "Bill one month from a saved Kobo asset listing", long_about = None)]
struct Cli {
    /// JSON array of assets, or a listing page with a `results` array
    #[arg(long)]
    snapshot: PathBuf,

    /// Billing month, 1-12 (e.g. 04)
    #[arg(long)]
    month: String,

    /// Four digit billing year (e.g. 2025)
    #[arg(long)]
    year: String,

    /// YAML configuration; without it no masks apply and output goes to ./output
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let period = BillingPeriod::parse(&cli.month, &cli.year)?;
    let (masks, output_root) = match &cli.config {
        Some(path) => {
            let config = load_config(path)?;
            (config.masks, config.output_path)
        }
        None => (FilterMasks::default(), PathBuf::from("output")),
    };

    let records = SnapshotSource::new(&cli.snapshot).load_records()?;
    let observer = RecordingObserver::new();
    let run = BillingProcessor::process(&records, period, &masks, &observer)?;

    let folder = create_billing_month_folder(&output_root, &period)?;
    let today = chrono::Local::now().date_naive();
    let archive = ReportAssembler::new(folder, period).assemble(&run, today, &observer.transcript())?;

    println!(
        "{} forms billed across {} countries, archive at {}",
        run.dataset.len(),
        run.country_count(),
        archive.display()
    );
    Ok(())
}
