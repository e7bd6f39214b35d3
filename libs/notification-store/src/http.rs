//! REST implementation of [`NotificationApi`]

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use sync_events::Notification;
use tracing::{debug, warn};

use crate::api::{NotificationApi, NotificationFilter};
use crate::error::ApiError;

#[derive(Deserialize)]
struct NotificationList {
    notifications: Vec<Notification>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
}

/// Notification backend over the platform REST surface
#[derive(Debug, Clone)]
pub struct HttpNotificationApi {
    client: Client,
    base_url: String,
}

impl HttpNotificationApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Share a preconfigured client (timeouts, auth headers)
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resource URL under `/api/notifications`. Each segment is pushed as
    /// one path segment, so opaque ids are percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::Unavailable(format!("invalid base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Unavailable(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "notifications"])
            .extend(segments);
        Ok(url)
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    warn!(status = status.as_u16(), body = %body, "Notification API returned error");
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, ApiError> {
        let response = self.client.get(self.url(&[])?).query(filter).send().await?;
        let list: NotificationList = check(response).await?.json().await?;
        debug!(count = list.notifications.len(), "Fetched notifications");
        Ok(list.notifications)
    }

    async fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .patch(self.url(&[id, "read"])?)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        let response = self.client.patch(self.url(&["read-all"])?).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&[])?)
            .json(&DeleteRequest { ids })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
