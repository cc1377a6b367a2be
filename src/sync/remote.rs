//! Remote snapshot stores
//!
//! The reconciler talks to the remote through the [`RemoteStore`] trait:
//! fetch the account snapshot, store a replacement. [`HttpRemoteStore`]
//! targets a plain document endpoint (`GET`/`PUT <base>/<user>.json`);
//! tests use an in-memory double.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use super::models::SnapshotDoc;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),
    #[error("Access blocked by the server")]
    Blocked,
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
    #[error("Malformed snapshot: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the account snapshot; None when the account has none yet
    async fn fetch(&self, user_id: &str) -> Result<Option<SnapshotDoc>, RemoteError>;

    /// Replace the account snapshot
    async fn store(&self, user_id: &str, doc: &SnapshotDoc) -> Result<(), RemoteError>;
}

/// Snapshot store over a plain HTTP document endpoint
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(RemoteError::InvalidUrl(format!(
                "'{}' must start with http:// or https://",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { client, base_url })
    }

    fn url(&self, user_id: &str) -> String {
        format!("{}/{}.json", self.base_url, urlencoding::encode(user_id))
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<SnapshotDoc>, RemoteError> {
        let response = self.client.get(self.url(user_id)).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Blocked),
            status if !status.is_success() => Err(RemoteError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
            _ => {
                let body = response.text().await?;
                Ok(Some(serde_json::from_str(&body)?))
            }
        }
    }

    async fn store(&self, user_id: &str, doc: &SnapshotDoc) -> Result<(), RemoteError> {
        let response = self.client.put(self.url(user_id)).json(doc).send().await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Blocked),
            status if !status.is_success() => Err(RemoteError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
            _ => Ok(()),
        }
    }
}

/// In-memory remote for reconciler and engine tests
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct MemoryRemoteStore {
    docs: std::sync::Arc<std::sync::Mutex<std::collections::HashMap<String, SnapshotDoc>>>,
    fetches: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    stores: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn stores(&self) -> usize {
        self.stores.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn seed(&self, user_id: &str, doc: SnapshotDoc) {
        self.docs.lock().unwrap().insert(user_id.to_string(), doc);
    }

    pub fn snapshot(&self, user_id: &str) -> Option<SnapshotDoc> {
        self.docs.lock().unwrap().get(user_id).cloned()
    }
}

#[cfg(test)]
#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<SnapshotDoc>, RemoteError> {
        self.fetches.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.docs.lock().unwrap().get(user_id).cloned())
    }

    async fn store(&self, user_id: &str, doc: &SnapshotDoc) -> Result<(), RemoteError> {
        self.stores.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.docs
            .lock()
            .unwrap()
            .insert(user_id.to_string(), doc.clone());
        Ok(())
    }
}
