// outpost-history
//
// Inspect and maintain the local telemetry history store.

use clap::{Parser, Subcommand};
use outpost::history::{self, Store};
use outpost_tools::{init_logging, SiteOpts};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "outpost-history",
    version,
    about = "Inspect and maintain the local Outpost telemetry history"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print stored records, oldest first
    Dump {
        #[command(flatten)]
        site: SiteOpts,

        /// Only the newest N records
        #[arg(long, value_name = "N")]
        tail: Option<usize>,

        /// One JSON object per line instead of columns
        #[arg(long)]
        json: bool,
    },
    /// Drop records beyond the retention cap
    Prune {
        #[command(flatten)]
        site: SiteOpts,
    },
}

fn dump(site: &SiteOpts, tail: Option<usize>, json: bool) -> Result<(), ()> {
    let site = site.resolve().map_err(|err| eprintln!("{}", err))?;
    let records = history::read_records(&site.history_file).map_err(|err| {
        eprintln!("cannot read {}: {}", site.history_file.display(), err);
    })?;
    let skip = tail.map_or(0, |n| records.len().saturating_sub(n));
    for record in &records[skip..] {
        if json {
            println!("{}", serde_json::to_string(record).unwrap());
        } else {
            println!(
                "{:>8}  {:<10}  {:<14}  {}",
                record.id,
                record.time,
                record.field.name(),
                record.value
            );
        }
    }
    Ok(())
}

fn prune(site: &SiteOpts) -> Result<(), ()> {
    let site = site.resolve().map_err(|err| eprintln!("{}", err))?;
    let mut store = Store::open(&site.history_file, site.retention).map_err(|err| {
        eprintln!("cannot open {}: {}", site.history_file.display(), err);
    })?;
    let removed = store.prune().map_err(|err| eprintln!("prune failed: {}", err))?;
    println!(
        "{} records removed, {} kept (cap {})",
        removed,
        store.len(),
        store.retention()
    );
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Dump { site, tail, json } => dump(&site, tail, json),
        Commands::Prune { site } => prune(&site),
    };

    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
