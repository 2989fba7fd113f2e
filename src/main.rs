use std::path::PathBuf;

use talkshow_tracker::app::App;
use talkshow_tracker::config::Config;
use talkshow_tracker::error::Result;
use talkshow_tracker::models::ShowSelection;

const USAGE: &str = "Usage: talkshow-crawler [--crawl <show-id|all> | --schedule | --import-reference <file> | --re-resolve | --pending | --stats]";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (info and above unless RUST_LOG says otherwise)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("--crawl");
    let value = args.get(2).map(String::as_str);

    // Load configuration
    let config = Config::load()?;
    let app = App::new(&config).await?;

    match command {
        "--crawl" => {
            let selection = ShowSelection::parse(value.unwrap_or("all"));
            let response = app.crawl(&selection).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.is_success() {
                std::process::exit(1);
            }
        }
        "--schedule" => {
            let every = config.schedule_interval();
            println!("Crawling all shows every {} minutes, Ctrl-C to stop", every.as_secs() / 60);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                }
            };
            let runs = app.trigger().run_scheduled(every, shutdown).await;
            println!("Stopped after {} runs", runs);
        }
        "--import-reference" => {
            let Some(path) = value.map(PathBuf::from) else {
                eprintln!("{}", USAGE);
                std::process::exit(2);
            };
            let count = app.import_reference(&path).await?;
            println!("Imported {} politicians from {:?}", count, path);
        }
        "--re-resolve" => {
            let summary = app.re_resolve_pending().await?;
            println!(
                "Linked {}, merged {}, still pending {}",
                summary.linked, summary.merged, summary.still_pending
            );
        }
        "--pending" => {
            let pending = app.pending_reviews().await?;
            for review in &pending {
                println!(
                    "{}\t{}\t{}",
                    review.show_id, review.air_date, review.raw_name
                );
            }
            println!("{} guests awaiting review", pending.len());
        }
        "--stats" => {
            for stats in app.stats().await? {
                println!(
                    "{:<16} {:>5} episodes {:>6} appearances {:>4} pending",
                    stats.show_id, stats.episodes, stats.appearances, stats.pending_review
                );
            }
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}
