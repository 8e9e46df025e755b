use std::path::PathBuf;

use clap::Parser;
use dotenv::dotenv;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zwrot_core::config::AppConfig;
use zwrot_core::format::{format_date, format_pln, summary_tsv};
use zwrot_core::loader::{FileSource, InvoiceSource};
use zwrot_core::stats;

/// Offline report over the invoice data file.
///
/// Prints the dashboard statistics, or with `--tsv` the claim summary
/// rows ready to paste into the claims spreadsheet.
#[derive(Parser, Debug)]
#[command(name = "zwrot-stats")]
#[command(version, about, long_about = None)]
struct Args {
    /// Print the tab-separated claim summary instead of statistics
    #[arg(long, default_value_t = false)]
    tsv: bool,

    /// Invoice data file (defaults to INVOICE_DATA_PATH or faktury_dane.json)
    path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenv().ok();

    // Logs go to stderr so the report can be piped
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(LevelFilter::WARN.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let path = match args.path {
        Some(path) => path,
        None => AppConfig::from_env()?.invoice_data_path,
    };

    info!("Reading invoices from {}", path.display());
    let invoices = FileSource::new(path.clone())
        .fetch()
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;

    if args.tsv {
        println!("{}", summary_tsv(&invoices));
        return Ok(());
    }

    let stats = stats::compute(&invoices);

    println!("Faktury:        {}", stats.invoice_count);
    println!("Suma:           {}", format_pln(stats.total_amount));
    println!("Średnia:        {}", format_pln(stats.average_amount));
    if let (Some(first), Some(last)) = (
        invoices.iter().map(|i| i.data_wykonania_uslugi).min(),
        invoices.iter().map(|i| i.data_wykonania_uslugi).max(),
    ) {
        println!("Okres:          {} - {}", format_date(first), format_date(last));
    }

    if !stats.monthly_breakdown.is_empty() {
        println!();
        for month in &stats.monthly_breakdown {
            println!(
                "{:<22} {:>3} szt. {:>16}",
                month.key.to_string(),
                month.count,
                format_pln(month.total)
            );
        }
    }

    Ok(())
}
