//! Loading export data from a local path or an HTTP(S) URL.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::store::CsvStore;
use anyhow::Result;
use tracing::info;

/// Returns `true` when `source` should be fetched over HTTP rather than read
/// from disk.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Opens a [`CsvStore`] from a file, a directory of exports, or a URL.
#[tracing::instrument(skip(client), fields(source = %source))]
pub async fn open_store<C: HttpClient>(client: &C, source: &str) -> Result<CsvStore> {
    if is_remote(source) {
        let bytes = fetch_bytes(client, source).await?;
        info!(bytes = bytes.len(), "Export downloaded");
        CsvStore::from_bytes(&bytes)
    } else {
        CsvStore::open(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/VSDATA_202107.csv"));
        assert!(is_remote("http://localhost:8000/export.csv.gz"));
        assert!(!is_remote("data/VSDATA_202107.csv"));
        assert!(!is_remote("/tmp/httpdump.csv"));
    }

    #[tokio::test]
    async fn test_open_store_missing_path_fails() {
        let client = BasicClient::new().unwrap();
        let result = open_store(&client, "/nonexistent/scats/export.csv").await;
        assert!(result.is_err());
    }
}
