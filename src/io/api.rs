//! Backend REST client
//!
//! Every request carries `Authorization: Bearer <token>` when a token is
//! configured. Responses may arrive bare or wrapped as `{"data": ...}`;
//! list endpoints may additionally nest under a named key (`{"jobs": [...]}`).
//! Failures are returned to the caller, never retried here.

use crate::domain::pricing::PricingQuote;
use crate::domain::types::{AdminAnalytics, AdminUser, Job, JobStatus, Transaction};
use crate::error::ApiError;
use crate::infra::config::Config;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

/// Pull `key` out of an object body, leaving anything else untouched
fn take_field(body: Value, key: &str) -> Value {
    match body {
        Value::Object(mut map) => match map.remove(key) {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    }
}

fn decode<T: DeserializeOwned>(body: Value, key: Option<&str>) -> Result<T, ApiError> {
    let mut body = take_field(body, "data");
    if let Some(key) = key {
        body = take_field(body, key);
    }
    Ok(serde_json::from_value(body)?)
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, token: Option<String>) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url, token })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            config.api_base_url(),
            config.api_timeout(),
            config.api_token().map(str::to_string),
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(segments)?;
        debug!(method = %method, url = %url, auth = self.token.is_some(), "api_request");

        let mut builder = self.http.request(method.clone(), url.clone());
        if let Some(token) = self.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(method = %method, url = %url, status = status.as_u16(), "api_error_response");
            return Err(ApiError::Status { status: status.as_u16(), body: text });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn fetch_admin_analytics(&self) -> Result<AdminAnalytics, ApiError> {
        let body = self.request(Method::GET, &["admin", "stats"], None).await?;
        decode(body, Some("stats"))
    }

    pub async fn fetch_transactions(&self) -> Result<Vec<Transaction>, ApiError> {
        let body = self.request(Method::GET, &["admin", "transactions"], None).await?;
        decode(body, Some("transactions"))
    }

    pub async fn fetch_admin_jobs(&self) -> Result<Vec<Job>, ApiError> {
        let body = self.request(Method::GET, &["admin", "jobs"], None).await?;
        decode(body, Some("jobs"))
    }

    pub async fn fetch_admin_users(&self) -> Result<Vec<AdminUser>, ApiError> {
        let body = self.request(Method::GET, &["admin", "users"], None).await?;
        decode(body, Some("users"))
    }

    pub async fn fetch_worker_jobs(&self) -> Result<Vec<Job>, ApiError> {
        let body = self.request(Method::GET, &["jobs"], None).await?;
        decode(body, Some("jobs"))
    }

    pub async fn accept_job(&self, job_id: &str) -> Result<Job, ApiError> {
        let body = self.request(Method::PUT, &["jobs", job_id, "accept"], None).await?;
        decode(body, Some("job"))
    }

    pub async fn start_job(&self, job_id: &str) -> Result<Job, ApiError> {
        self.update_job_status(job_id, JobStatus::InProgress).await
    }

    pub async fn complete_job(&self, job_id: &str) -> Result<Job, ApiError> {
        self.update_job_status(job_id, JobStatus::Completed).await
    }

    async fn update_job_status(&self, job_id: &str, status: JobStatus) -> Result<Job, ApiError> {
        let payload = json!({ "status": status.as_str() });
        let body = self.request(Method::PUT, &["jobs", job_id, "status"], Some(&payload)).await?;
        decode(body, Some("job"))
    }

    /// Quote for a prospective booking; the request shape is owned by the backend
    pub async fn calculate_price(&self, request: &Value) -> Result<PricingQuote, ApiError> {
        let body = self.request(Method::POST, &["pricing", "calculate"], Some(request)).await?;
        decode(body, Some("breakdown"))
    }
}
