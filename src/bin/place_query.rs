use anyhow::Result;
use clap::Parser;
use placefinder::logging;
use placefinder::query::{facets, search, SearchQuery, DEFAULT_PER_PAGE};
use placefinder::utils::load_table;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Filter and page through a cleaned places CSV, printing JSON")]
struct Args {
    /// Cleaned CSV to read
    #[clap(long = "in")]
    input: String,

    /// Exact category (case-insensitive)
    #[clap(long)]
    category: Option<String>,

    /// Location prefix (case-insensitive)
    #[clap(long)]
    location: Option<String>,

    #[clap(long, default_value = "1")]
    page: usize,

    #[clap(long, default_value_t = DEFAULT_PER_PAGE)]
    per_page: usize,

    /// Print the distinct categories and locations instead of a page
    #[clap(long)]
    distinct: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(module_path!(), "error", None)?;

    let table = load_table(&args.input)?;
    let json = if args.distinct {
        serde_json::to_string_pretty(&facets(&table))?
    } else {
        let query = SearchQuery {
            category: args.category,
            location: args.location,
            page: args.page,
            per_page: args.per_page,
        };
        serde_json::to_string_pretty(&search(&table, &query))?
    };
    println!("{}", json);
    Ok(())
}
