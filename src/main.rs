use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use nordpool_dayahead::{chart, extract, fetch, DayAheadTable, FetchConfig};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch day-ahead electricity prices and render a chart", long_about = None)]
struct Cli {
    /// Page URL to scrape; overrides --delivery-date when set
    #[arg(long)]
    url: Option<String>,

    /// Delivery day to request instead of the latest published one
    #[arg(long, value_name = "YYYY-MM-DD")]
    delivery_date: Option<NaiveDate>,

    /// WebDriver endpoint
    #[arg(long, default_value = "http://localhost:9515")]
    webdriver_url: String,

    /// Chromedriver binary to spawn for this run
    #[arg(long)]
    chromedriver: Option<PathBuf>,

    /// Seconds to wait for the price grid to render
    #[arg(long, default_value_t = 10)]
    wait: u64,

    /// Where to write the chart
    #[arg(long, default_value = "prices.png")]
    out: PathBuf,

    /// Parse a saved HTML document instead of driving a browser
    #[arg(long, value_name = "FILE")]
    from_file: Option<PathBuf>,

    /// Print the extracted table as JSON instead of the plain summary
    #[arg(long)]
    json: bool,
}

fn page_url(delivery_date: Option<NaiveDate>) -> String {
    let date = delivery_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "latest".to_owned());
    format!(
        "https://data.nordpoolgroup.com/auction/day-ahead/prices\
         ?deliveryDate={date}&currency=EUR&aggregation=DeliveryPeriod&deliveryAreas=EE"
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let html = match &cli.from_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading saved page {}", path.display()))?,
        None => {
            let config = FetchConfig {
                webdriver_url: cli.webdriver_url.clone(),
                chromedriver: cli.chromedriver.clone(),
                wait: Duration::from_secs(cli.wait),
            };
            let url = cli.url.clone().unwrap_or_else(|| page_url(cli.delivery_date));
            fetch::fetch_rendered_html(&config, &url)
                .await
                .context("loading the price page failed")?
        }
    };

    let table = extract::parse_document(&html).context("extracting the price table failed")?;
    let avg = table
        .average_price_eur_mwh()
        .context("no valid prices in table")?;

    if cli.json {
        println!("{}", to_json(&table, avg)?);
    } else {
        print_summary(&table, avg);
    }

    chart::render_price_chart(&table, avg, &cli.out).context("rendering the chart failed")?;

    Ok(())
}

fn print_summary(table: &DayAheadTable, avg: f64) {
    for row in &table.rows {
        let start = row
            .delivery_start()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| format!("hour {:02}", row.hour));

        match row.price_eur_per_mwh() {
            Some(price) => println!("{start}  {price:>8.2} €/MWh"),
            None => println!("{start}  {:>8} €/MWh", "-"),
        }
    }

    println!(
        "Average price for {}: {avg:.2} €/MWh",
        table.delivery_date
    );
}

fn to_json(table: &DayAheadTable, avg: f64) -> Result<String> {
    let rows: Vec<serde_json::Value> = table
        .rows
        .iter()
        .map(|row| {
            json!({
                "delivery_start": row.delivery_start().map(|dt| dt.to_rfc3339()),
                "hour": row.hour,
                "price_eur_mwh": row.price_eur_per_mwh(),
            })
        })
        .collect();

    let doc = json!({
        "delivery_date": table.delivery_date,
        "average_eur_mwh": avg,
        "rows": rows,
    });

    Ok(serde_json::to_string_pretty(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_latest() {
        let url = page_url(None);
        assert!(url.contains("deliveryDate=latest"));
        assert!(url.contains("deliveryAreas=EE"));
    }

    #[test]
    fn test_page_url_explicit_date() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 26).unwrap();
        assert!(page_url(Some(date)).contains("deliveryDate=2025-08-26"));
    }
}
