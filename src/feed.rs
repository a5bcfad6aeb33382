//! CSV feed acquisition.
//!
//! A feed source is either an `http(s)://` URL or a local file path, so the
//! integration tests (and offline imports) can point at files while
//! production pulls the DataSF endpoints.

use std::time::Duration;

use crate::error::FetchError;

pub async fn fetch(feed: &str, source: &str, timeout_secs: u64) -> Result<String, FetchError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_url(feed, source, timeout_secs).await
    } else {
        std::fs::read_to_string(source).map_err(|e| FetchError {
            feed: feed.to_string(),
            source: source.to_string(),
            reason: e.to_string(),
        })
    }
}

async fn fetch_url(feed: &str, url: &str, timeout_secs: u64) -> Result<String, FetchError> {
    let err = |reason: String| FetchError {
        feed: feed.to_string(),
        source: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| err(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| err(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(err(format!("HTTP {}", status)));
    }

    response.text().await.map_err(|e| err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_fetch_local_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"locationid,Applicant\n1,Truck A\n").unwrap();

        let body = fetch("trucks", f.path().to_str().unwrap(), 5).await.unwrap();
        assert!(body.contains("Truck A"));
    }

    #[tokio::test]
    async fn test_fetch_missing_file_names_feed() {
        let err = fetch("schedules", "/nonexistent/feed.csv", 5)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("schedules"));
        assert!(msg.contains("/nonexistent/feed.csv"));
    }
}
