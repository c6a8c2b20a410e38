//! Writes `forecast_expression_comparisons/{chamber}.csv` for every seat
//! chamber, comparing the deluxe / classic / lite odds.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use forecast_alerts::compare::{compare_expressions, write_csv};
use forecast_alerts::config::{self, Chamber};
use forecast_alerts::source::{Fetcher, HttpFetcher};
use forecast_alerts::table::Table;

const OUT_DIR: &str = "forecast_expression_comparisons";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = config::load_default()?;
    let fetcher = HttpFetcher::new().with_timeout(cfg.run.http_timeout_secs);

    for (i, chamber) in Chamber::SEATS.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        let url = cfg.sources.forecast_url(chamber.seats_file());
        let raw = fetcher
            .fetch(&url)
            .await
            .with_context(|| format!("downloading {chamber} seat toplines"))?;
        let rows = compare_expressions(&Table::parse(&raw), chamber)
            .with_context(|| format!("comparing {chamber} expressions"))?;

        let path = PathBuf::from(OUT_DIR).join(format!("{chamber}.csv"));
        write_csv(&path, &rows)?;
        tracing::info!(%chamber, seats = rows.len(), path = %path.display(), "comparison written");
    }

    println!("compare_expressions done");
    Ok(())
}
