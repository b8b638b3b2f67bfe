//! Authenticated HTTP client for the exam server.
//!
//! Every request carries the current access token as a bearer credential.
//! A `401` triggers one session renewal through the `TokenManager` and one
//! retry of the identical request; a second `401` is terminal.

use std::time::Duration;

use reqwest::{header, Client, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::TokenManager;

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow document downloads while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Join the server base URL and an endpoint path.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Build the shared reqwest client. Clone is cheap - it uses Arc internally
/// for connection pooling.
pub fn build_http_client(timeout_secs: u64) -> Result<Client, ApiError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Where the access token goes on an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPlacement {
    /// `Authorization: Bearer <token>`
    Header,
    /// Bearer header plus a `token` query parameter, for endpoints that read
    /// the credential from the URL (document downloads).
    HeaderAndQuery,
}

/// A downloaded binary body.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Clone)]
pub struct AuthenticatedClient {
    http: Client,
    base_url: String,
    tokens: TokenManager,
}

impl AuthenticatedClient {
    pub fn new(http: Client, base_url: impl Into<String>, tokens: TokenManager) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue an authenticated request with the token in the header.
    pub async fn request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.request_with(method, path, body, TokenPlacement::Header)
            .await
    }

    /// Issue an authenticated request, renewing the session and retrying once
    /// if the server answers `401`.
    pub async fn request_with<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        placement: TokenPlacement,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let token = self.tokens.access_token()?;

        let response = self
            .send_once(method.clone(), path, body, placement, &token)
            .await?;
        match Self::check_response(response).await {
            Err(ApiError::Unauthorized) => {}
            other => return other,
        }

        debug!(method = %method, path = path, "Access token rejected, renewing session");
        let token = match self.tokens.refresh_after_rejection(&token).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, path = path, "Could not renew session");
                return Err(ApiError::AuthFailure);
            }
        };

        let response = self.send_once(method, path, body, placement, &token).await?;
        match Self::check_response(response).await {
            Err(ApiError::Unauthorized) => {
                warn!(path = path, "Request rejected again after session renewal");
                Err(ApiError::AuthFailure)
            }
            other => other,
        }
    }

    async fn send_once<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        placement: TokenPlacement,
        token: &str,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = endpoint(&self.base_url, path);
        let mut builder = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json");

        if placement == TokenPlacement::HeaderAndQuery {
            builder = builder.query(&[("token", token)]);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path, None::<&()>).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(Method::POST, path, Some(body)).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    pub async fn get_bytes(&self, path: &str, placement: TokenPlacement) -> Result<Download, ApiError> {
        let response = self
            .request_with(Method::GET, path, None::<&()>, placement)
            .await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(Download {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("http://localhost:8000/", "/papers/1"),
            "http://localhost:8000/papers/1"
        );
        assert_eq!(
            endpoint("http://localhost:8000", "/auth/refresh"),
            "http://localhost:8000/auth/refresh"
        );
        assert_eq!(
            endpoint("https://exams.example.com/api", "/papers/"),
            "https://exams.example.com/api/papers/"
        );
    }
}
