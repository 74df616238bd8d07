//! Day-ahead electricity prices for the EE delivery area, scraped from the
//! Nord Pool data portal.
//!
//! The portal renders its price grid client-side, so the pipeline drives a
//! headless Chrome over WebDriver ([`fetch`]), parses the rendered document
//! ([`extract`]) into a typed hourly table ([`prices`]), and draws the day
//! as a PNG chart ([`chart`]).

use std::time::Duration;

use thiserror::Error;

pub mod chart;
pub mod extract;
pub mod fetch;
pub mod prices;

pub use extract::parse_document;
pub use fetch::{fetch_rendered_html, FetchConfig};
pub use prices::{DayAheadTable, HourlyPrice};

#[derive(Error, Debug)]
pub enum DayAheadError {
    #[error("webdriver session could not be established")]
    Session(#[from] fantoccini::error::NewSessionError),
    #[error("webdriver command failed")]
    Webdriver(#[from] fantoccini::error::CmdError),
    #[error("price grid did not render within {0:?}")]
    RenderTimeout(Duration),
    #[error("chromedriver error: {0}")]
    Chromedriver(String),
    #[error("invalid selector: {0}")]
    Selector(String),
    #[error("delivery date not found in page")]
    MissingDeliveryDate,
    #[error("page structure not understood: {0}")]
    MalformedDocument(String),
    #[error("no price rows found in page")]
    NoDataRows,
    #[error("chart rendering failed: {0}")]
    Chart(String),
}
