//! Loading source files from local paths or HTTP(S) URIs.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use tracing::debug;

/// Downloads `url` and returns the response body.
///
/// # Errors
///
/// Returns an error if the URL is invalid, the request fails, or the server
/// answers with a non-success status.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Reads a source given as a local path or an `http(s)://` URI.
#[tracing::instrument(skip(client))]
pub async fn read_source<C: HttpClient>(client: &C, source: &str) -> Result<Vec<u8>> {
    let bytes = if is_remote(source) {
        fetch_bytes(client, source)
            .await
            .with_context(|| format!("failed to fetch {source}"))?
    } else {
        tokio::fs::read(source)
            .await
            .with_context(|| format!("failed to read {source}"))?
    };
    debug!(bytes = bytes.len(), "Source loaded");
    Ok(bytes)
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.org/volume.csv"));
        assert!(is_remote("http://localhost:8080/p.csv"));
        assert!(!is_remote("data/http_export.csv"));
        assert!(!is_remote("C:/exports/Volume.csv"));
    }

    #[tokio::test]
    async fn test_read_source_local_file() {
        let path = env::temp_dir().join("turnaround_test_read_source.csv");
        fs::write(&path, "Accession\nA1\n").unwrap();

        let bytes = read_source(&BasicClient::new(), path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(bytes, b"Accession\nA1\n");

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_read_source_missing_file() {
        let result = read_source(&BasicClient::new(), "/nonexistent/Volume.csv").await;
        assert!(result.is_err());
    }
}
