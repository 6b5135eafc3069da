//! Alert service client.
//!
//! Follow events can raise an on-screen alert through a third-party alert
//! service. The trait keeps the session independent of the concrete HTTP
//! client so tests can substitute a recording implementation.

use async_trait::async_trait;
use reqwest;
use serde::Serialize;
use tracing::debug;

use crate::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertService: Send + Sync {
    async fn add_alert(&self, token: &str, alert: &Alert) -> Result<(), Error>;
}

#[derive(Serialize)]
struct AlertRequest<'a> {
    access_token: &'a str,
    #[serde(flatten)]
    alert: &'a Alert,
}

/// Posts alerts to `{base_url}/api/v1.0/alerts`.
#[derive(Clone)]
pub struct HttpAlertService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAlertService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AlertService for HttpAlertService {
    async fn add_alert(&self, token: &str, alert: &Alert) -> Result<(), Error> {
        let url = format!("{}/api/v1.0/alerts", self.base_url);
        let body = AlertRequest { access_token: token, alert };
        let response = self.client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        debug!("[Alerts] alert accepted with status {}", response.status());
        Ok(())
    }
}

/// Alert sink for sessions that have no alert service configured.
#[derive(Debug, Clone, Default)]
pub struct NoopAlertService;

#[async_trait]
impl AlertService for NoopAlertService {
    async fn add_alert(&self, _token: &str, alert: &Alert) -> Result<(), Error> {
        debug!("[Alerts] alert service disabled, dropping {:?}", alert);
        Ok(())
    }
}
