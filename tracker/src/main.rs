use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use results_sqlite::{latest_result_date, Db, DirIngester};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracker_core::{DataResponse, RecordStore, ResultDate, Tracker};

mod config;

const DEFAULT_LOG_FILTER: &str = "tracker=info,tracker_core=info,results_sqlite=info";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Json, Csv }

#[derive(Debug, Parser)]
#[command(name = "tracker", version, about = "Reports over daily QUIC deployment scans")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./tracker.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database (overrides config)
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,
    /// Directory of YYYYMMDD.json scan files (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    results_dir: Option<PathBuf>,
    /// Debug logging on stderr (RUST_LOG is honoured otherwise)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Print the most recent date with a scan file
    Latest,
    /// Load the scan file for a date unless it is already stored
    Ingest {
        /// Date as YYYYMMDD
        date: ResultDate,
    },
    /// Record count and statistics for a date, as JSON
    Page {
        /// Date as YYYYMMDD. Defaults to the latest scan file.
        date: Option<ResultDate>,
    },
    /// One grid page for a date, from a DataTables query string
    Data {
        /// Date as YYYYMMDD
        date: ResultDate,
        /// Urlencoded query, e.g. "draw=1&start=0&length=10&order[0][column]=1&order[0][dir]=asc"
        #[arg(long)]
        query: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn write_csv(resp: &DataResponse, out: impl Write) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(["id", "url", "ipv4", "header_v4", "ipv6", "header_v6"])?;
    for row in &resp.data {
        w.serialize(row)?;
    }
    w.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Commands::Version = cli.command {
        println!("tracker {} (core {})", env!("CARGO_PKG_VERSION"), tracker_core::version());
        return Ok(());
    }

    let cfg = config::load_config(cli.config.as_deref())?;
    let results_dir = cli.results_dir.unwrap_or_else(|| cfg.results_dir());
    let db_path = cli.db.unwrap_or_else(|| cfg.database());
    let db = Db::open_or_create(&db_path)?;
    let tracker = Tracker::new(&db, DirIngester::new(&db, &results_dir));

    match cli.command {
        Commands::Version => {}
        Commands::Latest => match latest_result_date(&results_dir)? {
            Some(date) => println!("{date}"),
            None => return Err(anyhow!("no scan files in {}", results_dir.display())),
        },
        Commands::Ingest { date } => {
            let rs = tracker.resolve(date)?;
            let records = tracker.store().count_records(Some(rs.id))?;
            let obj = serde_json::json!({ "id": rs.id, "date": rs.date, "records": records });
            println!("{}", serde_json::to_string(&obj)?);
        }
        Commands::Page { date } => {
            let date = match date {
                Some(d) => d,
                None => latest_result_date(&results_dir)?
                    .with_context(|| format!("no scan files in {}", results_dir.display()))?,
            };
            let ctx = tracker.page(date)?;
            println!("{}", serde_json::to_string_pretty(&ctx)?);
        }
        Commands::Data { date, query, format } => {
            let resp = tracker.data_from_query(date, &query)?;
            info!(draw = resp.draw, total = resp.records_total, filtered = resp.records_filtered, rows = resp.data.len(), "served grid page");
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&resp)?),
                OutputFormat::Csv => write_csv(&resp, std::io::stdout().lock())?,
            }
        }
    }
    Ok(())
}
