//! Batch mode: score Keepa CSV exports and print the ranked pairs as JSON.
//!
//! ```text
//! BUY_COUNTRIES=DE,FR SELL_COUNTRIES=IT rank export_de.csv export_it.csv
//! ```

use std::io::Write;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use resale_scanner::config::{country_list, Config};
use resale_scanner::error::{AppError, Result};
use resale_scanner::loader::load_many;
use resale_scanner::pairing::{countries, default_selection};
use resale_scanner::pipeline::{self, RunInput};
use resale_scanner::types::{NettingConfig, ScoreWeights};

fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stderr)
        .init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&cfg, &paths) {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

fn run(cfg: &Config, paths: &[String]) -> Result<()> {
    if paths.is_empty() {
        return Err(AppError::Config("usage: rank <file.csv>...".to_string()));
    }

    let table = load_many(paths)?;
    let records = table.records;
    let (default_buy, default_sell) = default_selection(&countries(&records));
    let buy_countries = env_countries("BUY_COUNTRIES").unwrap_or(default_buy);
    let sell_countries = env_countries("SELL_COUNTRIES").unwrap_or(default_sell);
    info!(
        "[RANK] {} records | buy: {} | sell: {}",
        records.len(),
        buy_countries.join(","),
        sell_countries.join(","),
    );

    let netting = NettingConfig::default().with_ship_mode(cfg.ship_mode);
    let weights = ScoreWeights::default();
    let mut scored = pipeline::run(RunInput {
        records: &records,
        columns: &table.columns,
        buy_countries: &buy_countries,
        sell_countries: &sell_countries,
        netting: &netting,
        weights: &weights,
    })?;
    scored.pairs.truncate(cfg.top_n);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &scored)?;
    writeln!(out)?;
    Ok(())
}

fn env_countries(key: &str) -> Option<Vec<String>> {
    std::env::var(key)
        .ok()
        .map(|raw| country_list(&raw))
        .filter(|list| !list.is_empty())
}
