use anyhow::Result;
use clap::Parser;
use placefinder::config::NormalizeOptions;
use placefinder::logging;
use placefinder::normalize::normalize_file;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Clean and de-duplicate a harvested places CSV")]
struct Args {
    /// Harvested CSV to read
    #[clap(long = "in")]
    input: String,

    /// Cleaned CSV to write
    #[clap(long = "out")]
    output: String,

    /// Drop rows whose resolved name is empty
    #[clap(long)]
    drop_empty_name: bool,

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

    let options = NormalizeOptions {
        drop_empty_name: args.drop_empty_name,
        ..Default::default()
    };
    let report = normalize_file(&args.input, &args.output, &options)?;
    println!(
        "Cleaned: {} rows in -> {} rows out ({} duplicates, {} without name)",
        report.input_rows, report.written, report.duplicates_dropped, report.empty_name_dropped
    );
    Ok(())
}
