use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use placefinder::chrome::ChromeFactory;
use placefinder::config::EnrichOptions;
use placefinder::enrich::{enrich_table, needs_phone, EnrichTUI};
use placefinder::logging;
use placefinder::session::SessionManager;
use placefinder::utils::load_table;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Backfill phone numbers by revisiting each place's profile")]
struct Args {
    /// Cleaned CSV to read
    #[clap(long = "in")]
    input: String,

    /// Enriched CSV to write (checkpointed while running)
    #[clap(long = "out")]
    output: String,

    /// Only look at the first N rows
    #[clap(long)]
    limit: Option<usize>,

    /// Show the browser window
    #[clap(long)]
    no_headless: bool,

    /// Logging level: DEBUG|INFO|WARNING|ERROR
    #[clap(long, default_value = "INFO")]
    log: String,

    /// File that receives a copy of every log line
    #[clap(long, default_value = "phone_enricher.log")]
    log_file: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = logging::init(module_path!(), &args.log, Some(&args.log_file))?;
    info!(
        "CLI args: in={} out={} limit={:?} no_headless={}",
        args.input,
        args.output,
        args.limit,
        args.no_headless
    );

    let mut options = EnrichOptions {
        limit: args.limit,
        ..Default::default()
    };
    options.session.headless = !args.no_headless;

    let mut table = load_table(&args.input)?;
    let pending = table.rows.iter().filter(|r| needs_phone(r)).count();
    let mut tui = EnrichTUI::new(pending, level <= LevelFilter::Warn);
    let mut sessions = SessionManager::new(ChromeFactory, options.session.clone());

    let report = enrich_table(&mut table, &args.output, &mut sessions, &options, &mut tui)?;
    println!(
        "Phones updated: {} ({} without phone, {} failed) -> {}",
        report.updated, report.without_phone, report.failed, args.output
    );
    Ok(())
}
