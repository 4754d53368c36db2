//! Fetches the project view from Kobo, bills one month and writes the archive.
//!
//! ```text
//! cargo run --example monthly_billing --features kobo -- --month 04 --year 2025
//! cargo run --example monthly_billing --features kobo -- \
//!     --month 04 --year 2025 --config config/config.yaml \
//!     --credentials credentials/api_token.json --render-html
//! ```

use anyhow::Context;
use clap::Parser;
use kobo_billing::kobo::KoboClient;
use kobo_billing::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "monthly_billing")]
#[command(about = "Bill one month of KoboToolbox forms per country", long_about = None)]
struct Cli {
    /// Billing month, 1-12 (e.g. 04)
    #[arg(long)]
    month: String,

    /// Four digit billing year (e.g. 2025)
    #[arg(long)]
    year: String,

    /// YAML configuration with the server, project view and masks
    #[arg(long, default_value = "config/config.yaml")]
    config: PathBuf,

    /// JSON file of the form {"token": "..."}
    #[arg(long, default_value = "credentials/api_token.json")]
    credentials: PathBuf,

    /// Also render the finance report to HTML with quarto
    #[arg(long)]
    render_html: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let period = BillingPeriod::parse(&cli.month, &cli.year)?;

    let observer = RecordingObserver::new();
    observer.note("Starting Kobo data processing...");

    let config = load_config(&cli.config).context("loading configuration")?;
    let token = load_api_token(&cli.credentials).context("loading API token")?;
    let save_path = create_billing_month_folder(&config.output_path, &period)?;
    observer.note(format!("Output folder created: {}", save_path.display()));

    let client = KoboClient::from_settings(&config.kobo, token);
    let records = client.fetch_records(&config.kobo.project_view_id).await?;
    observer.note(format!("Data fetched successfully with {} records.", records.len()));

    let run = BillingProcessor::process(&records, period, &config.masks, &observer)?;

    let mut assembler = ReportAssembler::new(&save_path, period);
    if cli.render_html {
        assembler = assembler.with_quarto_render("quarto");
    }
    let today = chrono::Local::now().date_naive();
    let archive = assembler.assemble(&run, today, &observer.transcript())?;

    println!("Billing archive for {}: {}", period, archive.display());
    for row in &run.summaries {
        println!(
            "{:<20} {:>5} projects {:>10} submissions {:>7.2}%",
            row.country, row.project_count, row.submission_total, row.submission_share_percent
        );
    }
    Ok(())
}
