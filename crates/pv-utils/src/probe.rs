use std::time::Duration;
use tracing::debug;

/// Checks if an HTTP URL is reachable and returns a success status code.
pub async fn check_http(url: &str) -> bool {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build();

    match client {
        Ok(client) => match client.get(url).send().await {
            Ok(res) => res.status().is_success(),
            Err(e) => {
                debug!("HTTP probe failed for {}: {}", url, e);
                false
            }
        },
        Err(e) => {
            debug!("Failed to build HTTP client: {}", e);
            false
        }
    }
}
