//! Pull-channel client: the catch-up and polling half of the sync engine.
//!
//! Wraps the `/api/v1` surface. Used on every fresh connect for the
//! authoritative resync and as the sole channel once the engine has
//! degraded to poll-only mode.

use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use uuid::Uuid;

use crate::api::handlers::{ApiResponse, ListData, SummaryData};
use crate::models::notification::{Notification, NotificationFilter};
use crate::models::preferences::Preferences;

#[derive(Clone)]
pub struct PullClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl PullClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Pulse-Sync/1.0")
            .build()
            .context("failed to build pull client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// One page plus the server's unread count.
    pub async fn list(
        &self,
        filter: &NotificationFilter,
    ) -> anyhow::Result<(Vec<Notification>, i64)> {
        let mut query: Vec<(&str, String)> = vec![
            ("page", filter.page.to_string()),
            ("limit", filter.limit.to_string()),
            ("unread_only", filter.unread_only.to_string()),
        ];
        if let Some(kind) = filter.kind {
            query.push(("kind", kind.as_str().to_string()));
        }
        if let Some(priority) = filter.priority {
            query.push(("priority", priority.as_str().to_string()));
        }

        let resp = self
            .http
            .get(self.url("/notifications"))
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse<ListData> = resp.json().await?;
        let data = body.data.context("list response missing data")?;
        Ok((data.notifications, data.unread_count))
    }

    pub async fn summary(&self) -> anyhow::Result<(i64, Vec<Notification>)> {
        let resp = self
            .http
            .get(self.url("/notifications/summary"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse<SummaryData> = resp.json().await?;
        let data = body.data.context("summary response missing data")?;
        Ok((data.unread_count, data.recent_notifications))
    }

    /// Returns false when the record is gone or foreign (404); callers
    /// treat that as already reconciled, not as an error.
    pub async fn mark_read(&self, id: Uuid) -> anyhow::Result<bool> {
        let resp = self
            .http
            .post(self.url(&format!("/notifications/{}/read", id)))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        resp.error_for_status()?;
        Ok(true)
    }

    pub async fn mark_all_read(&self) -> anyhow::Result<()> {
        self.http
            .post(self.url("/notifications/read-all"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let resp = self
            .http
            .delete(self.url(&format!("/notifications/{}", id)))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        resp.error_for_status()?;
        Ok(true)
    }

    pub async fn update_preferences(&self, prefs: &Preferences) -> anyhow::Result<()> {
        self.http
            .put(self.url("/preferences"))
            .bearer_auth(&self.token)
            .json(prefs)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn get_preferences(&self) -> anyhow::Result<Preferences> {
        let resp = self
            .http
            .get(self.url("/preferences"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse<Preferences> = resp.json().await?;
        body.data.context("preferences response missing data")
    }
}
