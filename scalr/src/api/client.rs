use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tfplug::Context;

use super::common::{ApiErrorDetails, ApiErrorResponse, ApiQueryParams};
use super::error::ApiError;

const JSON_API: &str = "application/vnd.api+json";
const API_PATH: &str = "/api/iacp/v3";

/// Scalr API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    retry_config: RetryConfig,
}

#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based): doubles from
    /// `initial_backoff_ms` and saturates at `max_backoff_ms`
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 2_u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

impl Client {
    /// Create a new API client with default configuration.
    /// `address` is the scheme and host, e.g. `https://example.scalr.io`.
    pub fn new(address: &str, token: &str) -> Result<Self, ApiError> {
        Self::with_config(address, token, RetryConfig::default())
    }

    /// Create a new API client with custom retry configuration
    pub fn with_config(
        address: &str,
        token: &str,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(retry_config.timeout_seconds))
            .user_agent(concat!("terraform-provider-scalr/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base_url = format!("{}{}", address.trim_end_matches('/'), API_PATH);
        let auth_header = format!("Bearer {}", token);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                auth_header,
                retry_config,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: DeserializeOwned>(&self, ctx: &Context, path: &str) -> Result<T, ApiError> {
        self.execute(ctx, Method::GET, path, None).await
    }

    /// Execute a GET request with query parameters
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        path: &str,
        params: &ApiQueryParams,
    ) -> Result<T, ApiError> {
        let full_path = format!("{}{}", path, params.to_query_string());
        self.get(ctx, &full_path).await
    }

    /// Execute a POST request with retry logic
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        ctx: &Context,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = encode_body(body)?;
        self.execute(ctx, Method::POST, path, Some(body)).await
    }

    /// Execute a PATCH request with retry logic
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        ctx: &Context,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = encode_body(body)?;
        self.execute(ctx, Method::PATCH, path, Some(body)).await
    }

    /// Execute a DELETE request with retry logic
    pub async fn delete(&self, ctx: &Context, path: &str) -> Result<(), ApiError> {
        self.execute(ctx, Method::DELETE, path, None).await
    }

    /// DELETE with a body, used by `relationships/*` removals
    pub async fn delete_with_body<B: Serialize>(
        &self,
        ctx: &Context,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let body = encode_body(body)?;
        self.execute(ctx, Method::DELETE, path, Some(body)).await
    }

    pub fn tags(&self) -> crate::api::tags::TagsApi<'_> {
        crate::api::tags::TagsApi::new(self)
    }

    pub fn environments(&self) -> crate::api::environments::EnvironmentsApi<'_> {
        crate::api::environments::EnvironmentsApi::new(self)
    }

    pub fn agent_pools(&self) -> crate::api::agent_pools::AgentPoolsApi<'_> {
        crate::api::agent_pools::AgentPoolsApi::new(self)
    }

    pub fn policy_groups(&self) -> crate::api::policy_groups::PolicyGroupsApi<'_> {
        crate::api::policy_groups::PolicyGroupsApi::new(self)
    }

    pub fn provider_configurations(
        &self,
    ) -> crate::api::provider_configurations::ProviderConfigurationsApi<'_> {
        crate::api::provider_configurations::ProviderConfigurationsApi::new(self)
    }

    pub fn roles(&self) -> crate::api::roles::RolesApi<'_> {
        crate::api::roles::RolesApi::new(self)
    }

    pub fn variables(&self) -> crate::api::variables::VariablesApi<'_> {
        crate::api::variables::VariablesApi::new(self)
    }

    pub fn infracost(&self) -> crate::api::infracost::InfracostApi<'_> {
        crate::api::infracost::InfracostApi::new(self)
    }

    pub fn runs(&self) -> crate::api::runs::RunsApi<'_> {
        crate::api::runs::RunsApi::new(self)
    }

    pub fn workspaces(&self) -> crate::api::workspaces::WorkspacesApi<'_> {
        crate::api::workspaces::WorkspacesApi::new(self)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'));
        self.execute_with_retry(
            ctx,
            || {
                tracing::debug!("{} request to: {}", method, url);

                let mut request = self
                    .inner
                    .http_client
                    .request(method.clone(), &url)
                    .header(AUTHORIZATION, &self.inner.auth_header)
                    .header(ACCEPT, JSON_API);
                if let Some(body) = &body {
                    request = request.header(CONTENT_TYPE, JSON_API).body(body.clone());
                }
                request.send()
            },
            path,
        )
        .await
    }

    /// Execute request with retry logic. Every attempt is bounded by the
    /// context deadline and aborted when the context is cancelled.
    async fn execute_with_retry<F, Fut, T>(
        &self,
        ctx: &Context,
        request_fn: F,
        path: &str,
    ) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: DeserializeOwned,
    {
        let mut attempt = 0;
        let mut last_error = None;

        loop {
            if attempt > 0 {
                let backoff = self.inner.retry_config.backoff_ms(attempt);
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::select! {
                    _ = ctx.cancelled() => return Err(ApiError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(backoff)) => {}
                }
            }

            if ctx.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let outcome = match ctx.remaining() {
                Some(remaining) => tokio::select! {
                    _ = ctx.cancelled() => return Err(ApiError::Cancelled),
                    result = tokio::time::timeout(remaining, request_fn()) => match result {
                        Ok(outcome) => outcome,
                        Err(_) => return Err(ApiError::Timeout(remaining.as_secs())),
                    },
                },
                None => tokio::select! {
                    _ = ctx.cancelled() => return Err(ApiError::Cancelled),
                    outcome = request_fn() => outcome,
                },
            };

            match outcome {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return self.parse_success_response(response).await;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(ApiError::AuthError);
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(ApiError::NotFound(path.to_string()));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return self.handle_error_response(response).await;
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error =
                            Some(ApiError::Timeout(self.inner.retry_config.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            if attempt >= self.inner.retry_config.max_retries {
                break;
            }
            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response. An empty body (204) decodes as `null`.
    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!("API response: HTTP {} ({} bytes)", status.as_u16(), text.len());

        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str::<T>(body).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}", e);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    /// Handle error response
    async fn handle_error_response<T>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let details = serde_json::from_str::<ApiErrorResponse>(&text)
            .ok()
            .filter(|resp| !resp.errors.is_empty())
            .map(|resp| {
                Box::new(ApiErrorDetails {
                    errors: resp.errors,
                })
            });

        let message = match &details {
            Some(details) => details.summary(),
            None => text,
        };

        Err(ApiError::ApiError {
            status,
            message,
            details,
        })
    }
}

fn encode_body<B: Serialize>(body: &B) -> Result<Vec<u8>, ApiError> {
    serde_json::to_vec(body)
        .map_err(|e| ApiError::ParseError(format!("Failed to encode request body: {}", e)))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use mockito::Server;

    fn fast_retries() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            timeout_seconds: 5,
        }
    }

    #[test]
    fn retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 100);
        assert_eq!(config.max_backoff_ms, 10000);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff_ms(1), 100);
        assert_eq!(config.backoff_ms(2), 200);
        assert_eq!(config.backoff_ms(3), 400);
        assert_eq!(config.backoff_ms(8), 10000);
    }

    #[test]
    fn backoff_saturates_for_large_attempts() {
        let config = RetryConfig {
            max_retries: u32::MAX,
            ..RetryConfig::default()
        };
        assert_eq!(config.backoff_ms(64), 10000);
        assert_eq!(config.backoff_ms(u32::MAX), 10000);

        let uncapped = RetryConfig {
            max_backoff_ms: u64::MAX,
            ..RetryConfig::default()
        };
        assert_eq!(uncapped.backoff_ms(70), u64::MAX);
    }

    #[test]
    fn base_url_appends_api_prefix() {
        let client = Client::new("https://example.scalr.io/", "t").unwrap();
        assert_eq!(client.base_url(), "https://example.scalr.io/api/iacp/v3");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sends_bearer_token_and_json_api_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/iacp/v3/tags/tag-1")
            .match_header("authorization", "Bearer secret")
            .match_header("accept", JSON_API)
            .with_body(r#"{"data":{"id":"tag-1"}}"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "secret").unwrap();
        let value: serde_json::Value = client.get(&Context::new(), "tags/tag-1").await.unwrap();

        assert_eq!(value["data"]["id"], "tag-1");
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn not_found_maps_to_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/iacp/v3/tags/tag-404")
            .with_status(404)
            .with_body(r#"{"errors":[{"status":"404","title":"Not Found"}]}"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "secret").unwrap();
        let err = client
            .get::<serde_json::Value>(&Context::new(), "tags/tag-404")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unprocessable_entity_carries_error_details() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/iacp/v3/tags")
            .with_status(422)
            .with_body(r#"{"errors":[{"status":"422","title":"Invalid Attribute","detail":"Name is already taken"}]}"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "secret").unwrap();
        let err = client
            .post::<serde_json::Value, _>(&Context::new(), "tags", &serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            ApiError::ApiError {
                status, message, ..
            } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Invalid Attribute: Name is already taken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_errors_are_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/iacp/v3/roles/role-1")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "secret", fast_retries()).unwrap();
        let err = client
            .get::<serde_json::Value>(&Context::new(), "roles/role-1")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ServiceUnavailable));
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unauthorized_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/iacp/v3/roles/role-1")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let client = Client::with_config(&server.url(), "secret", fast_retries()).unwrap();
        let err = client
            .get::<serde_json::Value>(&Context::new(), "roles/role-1")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::AuthError));
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_success_body_decodes_as_unit() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/api/iacp/v3/tags/tag-1")
            .with_status(204)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "secret").unwrap();
        client.delete(&Context::new(), "tags/tag-1").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelled_context_aborts_before_sending() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/iacp/v3/tags/tag-1")
            .expect(0)
            .create_async()
            .await;

        let ctx = Context::new();
        ctx.cancel();

        let client = Client::new(&server.url(), "secret").unwrap();
        let err = client
            .get::<serde_json::Value>(&ctx, "tags/tag-1")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Cancelled));
        mock.assert_async().await;
    }
}
