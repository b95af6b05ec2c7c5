use anyhow::Result;
use clap::Parser;
use placefinder::config::StoreConfig;
use placefinder::logging;
use placefinder::upsert::UpsertClient;
use placefinder::utils::load_table;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Upsert a cleaned places CSV into the remote store (SUPABASE_URL, SUPABASE_KEY, SUPABASE_TABLE, UPSERT_BATCH)"
)]
struct Args {
    /// Cleaned CSV to send
    #[clap(long = "in", env = "CLEAN_CSV", default_value = "places_clean.csv")]
    input: String,

    /// Logging level: DEBUG|INFO|WARNING|ERROR
    #[clap(long, default_value = "INFO")]
    log: String,

    /// Also append log lines to this file
    #[clap(long)]
    log_file: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(module_path!(), &args.log, args.log_file.as_deref())?;

    let config = StoreConfig::from_env()?;
    let table = load_table(&args.input)?;
    let client = UpsertClient::new(config)?;
    let report = client.upsert_table(&table)?;
    println!(
        "Upserted {} rows in {} batches ({} skipped without profile_url)",
        report.rows_sent, report.batches, report.skipped_without_url
    );
    Ok(())
}
