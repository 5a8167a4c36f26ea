use anyhow::Context;
use billbot::prelude::*;
use billbot::{observe, reconcile, types::format_timestamp};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Illinois bill status tracker
#[derive(Parser, Debug)]
#[command(name = "billbot")]
#[command(about = "Refresh bill stages from ILGA status XML")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every tracked bill and rewrite bills.json and user-bills.json
    Update {
        /// Directory holding bills.yml, bills.json and user-bills.json (default: ./data, or BILLBOT_DATA_DIR env var)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,

        /// Catalog of tracked bills (default: <data-dir>/bills.yml)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Status XML URL prefix
        #[arg(long = "base-url")]
        base_url: Option<String>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Only refresh catalog bills
        #[arg(long = "skip-user-bills")]
        skip_user_bills: bool,
    },

    /// Classify a local status XML file and print the inferred fields
    Inspect {
        /// Path to a status XML file
        file: PathBuf,

        /// Bill number (default: derived from the file name, e.g. 10400HB3466.xml)
        #[arg(long)]
        bill: Option<String>,
    },

    /// Print the status XML URL for each bill number
    Url {
        #[arg(num_args = 1..)]
        bills: Vec<String>,

        /// Status XML URL prefix
        #[arg(long = "base-url")]
        base_url: Option<String>,
    },
}

fn print_available_commands() {
    println!("Available commands:");
    println!("  update   Fetch every tracked bill and rewrite bills.json");
    println!("  inspect  Classify a local status XML file");
    println!("  url      Print status XML URLs");
}

fn get_data_dir(data_dir: Option<String>) -> PathBuf {
    data_dir
        .or_else(|| std::env::var("BILLBOT_DATA_DIR").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

async fn run_update_command(
    data_dir: Option<String>,
    catalog: Option<PathBuf>,
    base_url: Option<String>,
    timeout: Option<u64>,
    skip_user_bills: bool,
) -> anyhow::Result<()> {
    let mut builder = ConfigBuilder::new(get_data_dir(data_dir)).skip_user_bills(skip_user_bills);
    if let Some(catalog) = catalog {
        builder = builder.catalog_path(catalog);
    }
    if let Some(base_url) = base_url {
        builder = builder.base_url(base_url);
    }
    if let Some(timeout) = timeout {
        builder = builder.timeout_secs(timeout);
    }
    let config = builder.build()?;

    let fetcher = HttpFetcher::new(&config)?;
    let processor = BillProcessor::new(config, fetcher);
    let report = processor.run().await?;

    let bills = report.bills;
    println!(
        "Done. {} bill(s) changed, {} updated, {} kept after failures, {} rejected. Written to {}",
        bills.changed,
        bills.updated,
        bills.fetch_failed + bills.parse_failed,
        bills.rejected,
        processor.config().output_path.display()
    );
    match report.user_bills {
        Some(user) => println!(
            "Refreshed {} user-added bill(s) ({} updated). Written to {}",
            user.total,
            user.updated,
            processor.config().user_bills_path.display()
        ),
        None => println!("No user-added bills refreshed."),
    }
    Ok(())
}

/// `10400HB3466.xml` -> `HB3466`
fn bill_from_file_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    Some(stem.trim_start_matches(|c: char| c.is_ascii_digit()).to_string())
}

fn run_inspect_command(file: PathBuf, bill: Option<String>) -> anyhow::Result<()> {
    let code = bill
        .or_else(|| bill_from_file_name(&file))
        .unwrap_or_default();
    let bill = BillNumber::parse(&code)?;
    let bytes = std::fs::read(&file)
        .with_context(|| format!("Failed to read status file: {}", file.display()))?;

    let observation = observe(&bytes, &bill)?;
    let history = observation.fields.action_history.clone();
    let now = format_timestamp(chrono::Utc::now());
    let inferred = reconcile(None, Some(observation), &now);

    let mut output = json!({ "billNumber": bill.to_string() });
    if let (Value::Object(out), Value::Object(fields)) = (&mut output, serde_json::to_value(&inferred)?) {
        out.extend(fields);
        out.insert("actionHistory".to_string(), json!(history));
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_url_command(bills: Vec<String>, base_url: Option<String>) -> anyhow::Result<()> {
    let base_url = base_url.unwrap_or_else(|| billbot::config::DEFAULT_BASE_URL.to_string());
    let mut malformed = Vec::new();
    for code in bills {
        match BillNumber::parse(code.trim()) {
            Ok(bill) => println!("{}", bill.locator(&base_url)),
            Err(e) => {
                eprintln!("  Error: {}", e);
                malformed.push(code);
            }
        }
    }
    if !malformed.is_empty() {
        anyhow::bail!("Malformed bill numbers: {}", malformed.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("billbot=info".parse()?))
        .init();

    let args = Args::parse();

    match args.command {
        Some(Command::Update {
            data_dir,
            catalog,
            base_url,
            timeout,
            skip_user_bills,
        }) => {
            info!("billbot update starting");
            run_update_command(data_dir, catalog, base_url, timeout, skip_user_bills).await
        }
        Some(Command::Inspect { file, bill }) => run_inspect_command(file, bill),
        Some(Command::Url { bills, base_url }) => run_url_command(bills, base_url),
        None => {
            print_available_commands();
            Ok(())
        }
    }
}
