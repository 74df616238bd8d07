use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::extract::DATA_ROW_SELECTOR;
use crate::DayAheadError;

const CONNECT_ATTEMPTS: u32 = 20;
const CONNECT_BACKOFF: Duration = Duration::from_millis(250);

/// How to reach the rendered page.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// WebDriver endpoint to connect to.
    pub webdriver_url: String,
    /// When set, a chromedriver binary to spawn for the duration of the run.
    pub chromedriver: Option<PathBuf>,
    /// How long to wait for the price grid to render.
    pub wait: Duration,
}

/// Loads `url` in a headless Chrome session and returns the page source once
/// the price grid has rendered. The WebDriver session is always torn down,
/// also when the wait times out.
pub async fn fetch_rendered_html(config: &FetchConfig, url: &str) -> Result<String, DayAheadError> {
    let driver = match &config.chromedriver {
        Some(path) => Some(spawn_chromedriver(path, &config.webdriver_url)?),
        None => None,
    };

    let mut client = connect(config, driver.is_some()).await?;
    let result = load_page(&mut client, url, config.wait).await;

    if let Err(e) = client.close().await {
        debug!("closing webdriver session failed: {e}");
    }

    // dropping the child kills a spawned chromedriver
    drop(driver);

    result
}

async fn load_page(
    client: &mut Client,
    url: &str,
    wait: Duration,
) -> Result<String, DayAheadError> {
    info!(url, "loading price page");
    client.goto(url).await?;

    client
        .wait()
        .at_most(wait)
        .for_element(Locator::Css(DATA_ROW_SELECTOR))
        .await
        .map_err(|e| match e {
            CmdError::WaitTimeout => DayAheadError::RenderTimeout(wait),
            other => other.into(),
        })?;

    Ok(client.source().await?)
}

async fn connect(config: &FetchConfig, spawned_driver: bool) -> Result<Client, DayAheadError> {
    // A freshly spawned chromedriver needs a moment before it accepts
    // sessions; an external endpoint gets a single attempt.
    let attempts = if spawned_driver { CONNECT_ATTEMPTS } else { 1 };

    let mut attempt = 0;
    loop {
        attempt += 1;
        match ClientBuilder::native()
            .capabilities(chrome_capabilities())
            .connect(&config.webdriver_url)
            .await
        {
            Ok(client) => return Ok(client),
            Err(e) if attempt < attempts => {
                debug!(attempt, "webdriver not ready yet: {e}");
                tokio::time::sleep(CONNECT_BACKOFF).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn spawn_chromedriver(path: &std::path::Path, webdriver_url: &str) -> Result<Child, DayAheadError> {
    let port = driver_port(webdriver_url);
    info!(port, "spawning chromedriver at {}", path.display());

    Command::new(path)
        .arg(format!("--port={port}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            DayAheadError::Chromedriver(format!("failed to launch {}: {e}", path.display()))
        })
}

fn driver_port(webdriver_url: &str) -> u16 {
    webdriver_url
        .rsplit_once(':')
        .and_then(|(_, port)| port.trim_end_matches('/').parse().ok())
        .unwrap_or(9515)
}

fn chrome_capabilities() -> serde_json::Map<String, serde_json::Value> {
    let mut caps = serde_json::Map::new();
    caps.insert(
        "goog:chromeOptions".to_owned(),
        json!({ "args": ["--headless", "--disable-gpu"] }),
    );
    caps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_capabilities_are_headless() {
        let caps = chrome_capabilities();
        let args = &caps["goog:chromeOptions"]["args"];
        assert_eq!(args[0], "--headless");
        assert_eq!(args[1], "--disable-gpu");
    }

    #[test]
    fn test_driver_port() {
        assert_eq!(driver_port("http://localhost:9515"), 9515);
        assert_eq!(driver_port("http://127.0.0.1:4444/"), 4444);
        assert_eq!(driver_port("http://localhost"), 9515);
    }
}
