// outpost-tap
//
// Connects to the hub and prints every feed event as one line. Useful
// for checking what a site is actually sending without the dashboard.

use clap::Parser;
use outpost::feed::{Feed, FeedEvent};
use outpost_tools::{init_logging, SiteOpts};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "outpost-tap",
    version,
    about = "Print raw feed events from an Outpost hub"
)]
struct Cli {
    #[command(flatten)]
    site: SiteOpts,

    /// Exit after this many telemetry readings
    #[arg(short = 'n', long, value_name = "N")]
    count: Option<usize>,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    let site = match cli.site.resolve() {
        Ok(site) => site,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let feed = match Feed::connect(site.feed_config()) {
        Ok(feed) => feed,
        Err(err) => {
            eprintln!("cannot reach hub: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut seen = 0usize;
    loop {
        let event = match feed.next() {
            Ok(event) => event,
            Err(_) => break,
        };
        match event {
            FeedEvent::Connected => println!("# connected"),
            FeedEvent::Disconnected => println!("# disconnected"),
            FeedEvent::Subscribed(room) => println!("# subscribed {}", room.as_str()),
            FeedEvent::RoleResolved(role) => println!("# role {}", role.name()),
            FeedEvent::Telemetry(sample) => {
                println!(
                    "{} {} {}",
                    sample.room.as_str(),
                    sample.field.name(),
                    sample.value
                );
                seen += 1;
                if let Some(count) = cli.count {
                    if seen >= count {
                        break;
                    }
                }
            }
            FeedEvent::Alert(message) => println!("! {}", message),
        }
    }
    ExitCode::SUCCESS
}
