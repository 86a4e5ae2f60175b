//! Document store client for the shop backend's collection API.
//!
//! Documents live under `{base}/v1/collections/{name}/documents[/{id}]` and are
//! exchanged as JSON. Live feeds are served by polling while online.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use super::{require_record_id, RemoteCollectionStore, RemoteError, RemoteFeed, RemoteResult};
use crate::config::RemoteConfig;
use crate::connectivity::OnlineStatus;
use crate::models::Record;
use crate::util::compact_text;

const FEED_CAPACITY: usize = 4;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// HTTP client for remote document collections
#[derive(Clone)]
pub struct HttpDocumentStore {
    base_url: String,
    api_token: Option<String>,
    client: Client,
    poll_interval: Duration,
    online: Option<OnlineStatus>,
}

impl HttpDocumentStore {
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RemoteError::InvalidConfiguration(
                "base URL must not be empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|error| {
                RemoteError::InvalidConfiguration(format!(
                    "Failed to construct HTTP client: {error}"
                ))
            })?;

        Ok(Self {
            base_url,
            api_token: config.api_token.clone(),
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            online: None,
        })
    }

    /// Interval between polls of a live feed
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(100));
        self
    }

    /// Pause live feed polling whenever `online` reports offline.
    #[must_use]
    pub fn with_online_status(mut self, online: OnlineStatus) -> Self {
        self.online = Some(online);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/v1/collections/{}/documents",
            self.base_url,
            urlencoding::encode(collection)
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            urlencoding::encode(id)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn is_paused(&self) -> bool {
        self.online
            .as_ref()
            .is_some_and(|online| !online.is_online())
    }
}

impl RemoteCollectionStore for HttpDocumentStore {
    async fn list_all(&self, collection: &str) -> RemoteResult<Vec<Record>> {
        let response = self
            .authorize(self.client.get(self.collection_url(collection)))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let payload = response.json::<ListResponse>().await?;
        Ok(payload.into_records(collection))
    }

    async fn get_one(&self, collection: &str, id: &str) -> RemoteResult<Option<Record>> {
        let response = self
            .authorize(self.client.get(self.document_url(collection, id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        Ok(Some(response.json::<Record>().await?))
    }

    async fn put_one(&self, collection: &str, record: &Record) -> RemoteResult<()> {
        require_record_id(record)?;
        let response = self
            .authorize(self.client.put(self.document_url(collection, &record.id)))
            .json(record)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_one(&self, collection: &str, id: &str) -> RemoteResult<()> {
        let response = self
            .authorize(self.client.delete(self.document_url(collection, id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    fn subscribe(&self, collection: &str) -> RemoteResult<RemoteFeed> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|error| {
            RemoteError::SubscriptionUnavailable(format!("no async runtime: {error}"))
        })?;
        let (sender, receiver) = broadcast::channel(FEED_CAPACITY);
        let store = self.clone();
        let name = collection.to_string();
        let worker = runtime.spawn(async move { store.poll_collection(&name, sender).await });
        Ok(RemoteFeed::new(collection, receiver, Some(worker)))
    }
}

impl HttpDocumentStore {
    async fn poll_collection(self, collection: &str, sender: broadcast::Sender<Vec<Record>>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_published: Option<Vec<Record>> = None;

        loop {
            ticker.tick().await;
            if sender.receiver_count() == 0 {
                break;
            }
            if self.is_paused() {
                continue;
            }
            match self.list_all(collection).await {
                Ok(snapshot) => {
                    if last_published.as_ref() == Some(&snapshot) {
                        continue;
                    }
                    last_published = Some(snapshot.clone());
                    if sender.send(snapshot).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    tracing::debug!("Polling remote '{}' failed: {}", collection, error);
                }
            }
        }
        tracing::debug!("Remote feed for '{}' stopped", collection);
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<Value>),
    Wrapped { documents: Vec<Value> },
}

impl ListResponse {
    /// Decode each document on its own; undecodable ones are skipped.
    fn into_records(self, collection: &str) -> Vec<Record> {
        let (Self::Bare(documents) | Self::Wrapped { documents }) = self;
        documents
            .into_iter()
            .enumerate()
            .filter_map(|(index, document)| {
                serde_json::from_value::<Record>(document)
                    .map_err(|error| {
                        tracing::warn!(
                            "Skipping undecodable remote '{}' document #{}: {}",
                            collection,
                            index,
                            error
                        );
                    })
                    .ok()
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<String>,
    message: Option<String>,
}

async fn ensure_success(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(status, &body))
}

fn error_for_status(status: StatusCode, body: &str) -> RemoteError {
    let message = parse_api_error(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Permission(message),
        _ => RemoteError::Api(message),
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let compact = compact_text(body);
    if compact.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact, status.as_u16())
    }
}
