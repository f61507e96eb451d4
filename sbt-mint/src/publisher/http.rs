//! Object storage over plain HTTP `PUT` / `GET`.
//!
//! Targets a bucket endpoint that accepts anonymous or pre-authorized
//! writes; objects live at `<base_url>/<key>`. Buckets commonly answer
//! `403` rather than `404` for a missing object, so any non-success read
//! counts as "not recorded yet".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{RecordStore, StoreError};

pub struct HttpRecordStore {
    base_url: String,
    client: Client,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let url = self.object_url(key);
        let resp = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("PUT {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let url = self.object_url(key);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("GET {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "no readable object");
            return Ok(None);
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(format!("reading {url} failed: {e}")))?;
        Ok(Some(body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `403` for keys containing `missing` and a small JSON body
    /// otherwise, one connection per request.
    async fn spawn_bucket() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut tcp, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = tcp.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let request = String::from_utf8_lossy(&request);
                let response = if request.contains("missing") {
                    "HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                } else {
                    "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}"
                };
                tcp.write_all(response.as_bytes()).await.unwrap();
                let _ = tcp.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn forbidden_object_reads_as_absent() {
        let store = HttpRecordStore::new(spawn_bucket().await, Duration::from_secs(5)).unwrap();
        assert_eq!(store.get("kyc/missing").await.unwrap(), None);
        assert_eq!(store.get("kyc/present").await.unwrap(), Some(b"{}".to_vec()));
    }

    #[test]
    fn object_url_joins_without_double_slashes() {
        let store = HttpRecordStore::new("https://bucket.example/", Duration::from_secs(1)).unwrap();
        assert_eq!(store.object_url("kyc/0xabc"), "https://bucket.example/kyc/0xabc");
        assert_eq!(store.object_url("/kyc/0xabc"), "https://bucket.example/kyc/0xabc");
    }
}
