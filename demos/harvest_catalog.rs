//! Harvest a whole catalog and report progress per accepted price range.
//!
//! Run with: `CATALOG_URL=https://... cargo run --example harvest_catalog`
//!
//! Optional: `MIN_PRICE`, `MAX_PRICE`, `MAX_ITERATIONS`.

use catalog_harvester::{HarvestOptions, Harvester, DEFAULT_CATALOG_URL};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), catalog_harvester::Error> {
    let url = std::env::var("CATALOG_URL").unwrap_or_else(|_| DEFAULT_CATALOG_URL.into());
    let mut options =
        HarvestOptions::new(env_or("MIN_PRICE", 0.0), env_or("MAX_PRICE", 100_000.0)).url(&url);
    if let Ok(limit) = std::env::var("MAX_ITERATIONS") {
        if let Ok(limit) = limit.parse() {
            options = options.max_iterations(limit);
        }
    }

    println!("{} {}", "▸".blue().bold(), format!("Harvesting {}", url).bold());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb.set_message("Counting products");

    let mut rx = Harvester::from_options(options)?.stream();
    let mut fetched = 0usize;

    while let Some(batch) = rx.recv().await {
        match batch {
            Ok(batch) => {
                fetched += batch.products.len();
                pb.set_message(format!(
                    "pass {} accepted {} ({} products, {} so far)",
                    batch.pass, batch.range, batch.total, fetched
                ));
            }
            Err(e) => {
                pb.finish_and_clear();
                println!("{} {}", "✖".red(), e);
                return Err(e);
            }
        }
    }

    pb.finish_and_clear();
    println!("{} Fetched {} products", "✔".green(), fetched);
    Ok(())
}
