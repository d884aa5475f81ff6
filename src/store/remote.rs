//! Remote drift API client.
//!
//! Reads plans from the hosted drift API over HTTP.

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{ApiError, ConfigError, DriftError, Result};
use crate::plan::Plan;

use super::source::{PlanFilter, PlanSource};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Plan source backed by the remote drift API.
#[derive(Debug, Clone)]
pub struct RemotePlanSource {
    /// HTTP client.
    client: Client,
    /// API base URL.
    base_url: Url,
    /// Bearer token, if the API requires one.
    token: Option<String>,
    /// Base delay between retries.
    retry_delay: Duration,
}

impl RemotePlanSource {
    /// Creates a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// created.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// created.
    pub fn with_timeout(base_url: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let url = Url::parse(base_url)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| {
                ConfigError::validation(format!("Invalid API url: {base_url}"), "store.url")
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: url,
            token,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Sets the base delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Endpoint URL; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let base = &self.base_url;
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::network(format!("API url {base} cannot take a path")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a request, retrying transient failures with a linear back-off.
    async fn execute(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES}");
                tokio::time::sleep(self.retry_delay * attempt).await;
            }

            match self.execute_once(method.clone(), segments, query).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DriftError::Api(ApiError::NetworkError {
                message: String::from("Max retries exceeded"),
            })
        }))
    }

    async fn execute_once(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<String> {
        let url = self.endpoint(segments)?;
        trace!("{method} {url}");

        let mut request = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json")
            .query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(ApiError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::AuthenticationFailed {
                message: String::from("Invalid or missing API token"),
            }
            .into());
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                resource: segments.join("/"),
            }
            .into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::request_failed(status.as_u16(), body).into());
        }

        response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response: {e}")).into())
    }

    fn parse<T: DeserializeOwned>(body: &str) -> Result<T> {
        serde_json::from_str(body).map_err(|e| {
            DriftError::Api(ApiError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            })
        })
    }
}

#[async_trait]
impl PlanSource for RemotePlanSource {
    async fn list(&self, filter: &PlanFilter) -> Result<Vec<Plan>> {
        let query: Vec<(&str, &str)> = [
            ("project_id", filter.project_id.as_deref()),
            ("component_id", filter.component_id.as_deref()),
            ("environment", filter.environment.as_deref()),
            ("branch", filter.branch.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();

        let body = self.execute(Method::GET, &["list_plans"], &query).await?;
        let mut plans: Vec<Plan> = Self::parse(&body)?;
        plans.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));

        debug!("Fetched {} plan(s) from {}", plans.len(), self.base_url);
        Ok(plans)
    }

    async fn get(&self, id: &str) -> Result<Plan> {
        let body = self
            .execute(Method::GET, &["get_plan"], &[("plan_id", id)])
            .await?;
        Self::parse(&body)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.execute(Method::DELETE, &["delete_plan", id], &[]).await?;
        debug!("Deleted remote plan {id}");
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> RemotePlanSource {
        RemotePlanSource::new(&server.uri(), Some(String::from("secret")))
            .expect("client builds")
            .with_retry_delay(Duration::ZERO)
    }

    fn plan_json(id: &str, timestamp: &str) -> serde_json::Value {
        json!({
            "id": id,
            "project_id": "platform",
            "component_id": "app",
            "environment": "dev",
            "timestamp": timestamp,
            "cloud_platform": "Azure",
            "terraform_plan": {
                "resource_changes": [
                    { "address": "azurerm_resource_group.main", "type": "azurerm_resource_group",
                      "change": { "actions": ["update"] } }
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_list_sends_filter_and_sorts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list_plans"))
            .and(query_param("component_id", "app"))
            .and(query_param("environment", "dev"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                plan_json("older", "2024-01-01T10:00:00"),
                plan_json("newer", "2024-01-02T10:00:00Z"),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let plans = source(&server)
            .list(&PlanFilter::all().component("app").environment("dev"))
            .await
            .expect("list succeeds");

        let ids: Vec<&str> = plans.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["newer", "older"]);
        assert!(plans[0].has_drift());
    }

    #[tokio::test]
    async fn test_get_plan_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get_plan"))
            .and(query_param("plan_id", "missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Plan not found"))
            .mount(&server)
            .await;

        let result = source(&server).get("missing").await;
        assert!(matches!(result, Err(DriftError::Api(ApiError::NotFound { .. }))));
    }

    #[tokio::test]
    async fn test_authentication_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list_plans"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let result = source(&server).list(&PlanFilter::all()).await;
        assert!(matches!(
            result,
            Err(DriftError::Api(ApiError::AuthenticationFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get_plan"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get_plan"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(plan_json("p1", "2024-01-01T10:00:00Z")),
            )
            .mount(&server)
            .await;

        let plan = source(&server).get("p1").await.expect("retry succeeds");
        assert_eq!(plan.id, "p1");
    }

    #[tokio::test]
    async fn test_delete_and_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/delete_plan/p1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/list_plans"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = source(&server);
        client.delete("p1").await.expect("delete succeeds");

        let result = client.list(&PlanFilter::all()).await;
        assert!(matches!(
            result,
            Err(DriftError::Api(ApiError::InvalidResponse { .. }))
        ));
    }

    #[tokio::test]
    async fn test_delete_encodes_plan_id() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/delete_plan/a%2Fb%3Fc"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = RemotePlanSource::new(&format!("{}/api/", server.uri()), None)
            .expect("client builds");
        client.delete("a/b?c").await.expect("delete succeeds");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = RemotePlanSource::new("not a url", None);
        assert!(matches!(result, Err(DriftError::Config(_))));

        let result = RemotePlanSource::new("mailto:ops@example.com", None);
        assert!(matches!(result, Err(DriftError::Config(_))));
    }
}
