//! Access-token lifecycle: login, logout, and single-flight renewal.
//!
//! At most one `POST /auth/refresh` is outstanding at any time. Callers that
//! need a renewal while one is running join the pending future instead of
//! starting their own, and all of them observe the same outcome.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::api::client::endpoint;
use crate::api::ApiError;

use super::{CredentialStore, SessionData};

/// Login endpoint (form-encoded username/password)
pub const LOGIN_PATH: &str = "/token";

/// Renewal endpoint
pub const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "access_token")]
    access_token: String,
    #[serde(rename = "refreshToken", alias = "refresh_token", default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    is_admin: bool,
    #[serde(default)]
    username: Option<String>,
}

/// Why a renewal failed. Cloneable so every joined caller gets a copy.
#[derive(Debug, Clone)]
struct RenewalFailure(String);

type RenewalOutcome = Result<String, RenewalFailure>;
type PendingRenewal = Shared<BoxFuture<'static, RenewalOutcome>>;

struct TokenInner {
    http: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    in_flight: Mutex<Option<PendingRenewal>>,
}

/// Owns the credential store on behalf of everything else in the process.
/// Clone is cheap and every clone shares the same in-flight renewal.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<TokenInner>,
}

impl TokenManager {
    pub fn new(http: Client, base_url: impl Into<String>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                http,
                base_url: base_url.into(),
                store,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Current access token, or `NoCredential` when nobody is signed in.
    pub fn access_token(&self) -> Result<String, ApiError> {
        self.inner
            .store
            .get()?
            .map(|session| session.access_token)
            .ok_or(ApiError::NoCredential)
    }

    /// Snapshot of the stored session, if any.
    pub fn session(&self) -> Result<Option<SessionData>, ApiError> {
        Ok(self.inner.store.get()?)
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self.inner.store.get(), Ok(Some(_)))
    }

    /// Authenticate with username and password and store the issued session.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionData, ApiError> {
        let url = endpoint(&self.inner.base_url, LOGIN_PATH);

        let response = self
            .inner
            .http
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::InvalidCredentials);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let auth: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("login response: {}", e)))?;

        let session = SessionData::new(
            auth.access_token,
            auth.refresh_token,
            Some(auth.username.unwrap_or_else(|| username.to_string())),
            auth.is_admin,
        );
        self.inner.store.set(&session)?;
        info!(username = %username, can_renew = session.can_renew(), "Login successful");
        Ok(session)
    }

    /// Forget every stored credential.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.inner.store.clear()?;
        info!("Signed out");
        Ok(())
    }

    /// Obtain a fresh access token from the renewal token.
    ///
    /// Joins the in-flight renewal if there is one. On failure the store is
    /// cleared and every waiter receives `RefreshFailed`.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        self.join_or_start(None).await
    }

    /// Renewal triggered by a request that was rejected with `rejected_token`.
    ///
    /// If another caller already replaced that token, the stored one is
    /// returned without a network call.
    pub async fn refresh_after_rejection(&self, rejected_token: &str) -> Result<String, ApiError> {
        self.join_or_start(Some(rejected_token)).await
    }

    async fn join_or_start(&self, rejected_token: Option<&str>) -> Result<String, ApiError> {
        let pending = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight session renewal");
                    pending.clone()
                }
                None => {
                    if let Some(rejected) = rejected_token {
                        if let Some(current) = self.inner.store.get()? {
                            if current.access_token != rejected {
                                debug!("Access token already renewed by another request");
                                return Ok(current.access_token);
                            }
                        }
                    }

                    let inner = Arc::clone(&self.inner);
                    let pending = async move {
                        let outcome = inner.renew().await;
                        inner
                            .in_flight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        pending
            .await
            .map_err(|RenewalFailure(reason)| ApiError::RefreshFailed(reason))
    }
}

impl TokenInner {
    async fn renew(&self) -> RenewalOutcome {
        match self.request_renewal().await {
            Ok(access_token) => Ok(access_token),
            Err(reason) => {
                warn!(reason = %reason, "Session renewal failed, clearing credentials");
                if let Err(e) = self.store.clear() {
                    error!(error = %e, "Failed to clear credentials after renewal failure");
                }
                Err(RenewalFailure(reason))
            }
        }
    }

    async fn request_renewal(&self) -> Result<String, String> {
        let current = self
            .store
            .get()
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "no session to renew".to_string())?;

        let refresh_token = match current.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => return Err("no renewal token stored".to_string()),
        };

        let url = endpoint(&self.base_url, REFRESH_PATH);
        debug!("Requesting session renewal");

        let response = self
            .http
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| format!("network error: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("server rejected renewal token ({})", status));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid renewal response: {}", e))?;

        // Stored before any waiter sees the token, so a retried request never
        // races a stale credential.
        let renewed = current.renewed(body.access_token, body.refresh_token);
        self.store.set(&renewed).map_err(|e| e.to_string())?;
        info!("Session renewed");
        Ok(renewed.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn manager_with(server_url: &str, session: Option<SessionData>) -> (TokenManager, Arc<MemoryCredentialStore>) {
        let store = Arc::new(match session {
            Some(s) => MemoryCredentialStore::with_session(s),
            None => MemoryCredentialStore::new(),
        });
        let manager = TokenManager::new(Client::new(), server_url, store.clone());
        (manager, store)
    }

    fn session(access: &str, refresh: Option<&str>) -> SessionData {
        SessionData::new(
            access.to_string(),
            refresh.map(str::to_string),
            Some("candidate".to_string()),
            false,
        )
    }

    #[test]
    fn test_access_token_without_session_is_no_credential() {
        let (manager, _) = manager_with("http://unused", None);
        assert!(matches!(manager.access_token(), Err(ApiError::NoCredential)));
        assert!(!manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_refresh_stores_new_pair() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .match_body(Matcher::Json(json!({ "refreshToken": "refresh-1" })))
            .with_status(200)
            .with_body(json!({ "accessToken": "access-2", "refreshToken": "refresh-2" }).to_string())
            .expect(1)
            .create_async()
            .await;

        let (manager, store) = manager_with(&server.url(), Some(session("access-1", Some("refresh-1"))));
        let token = manager.refresh().await.expect("refresh ok");

        assert_eq!(token, "access-2");
        let stored = store.get().unwrap().expect("session kept");
        assert_eq!(stored.access_token, "access-2");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-2"));
        assert_eq!(stored.username.as_deref(), Some("candidate"));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_request() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .with_status(200)
            .with_body(json!({ "accessToken": "access-2", "refreshToken": "refresh-2" }).to_string())
            .expect(1)
            .create_async()
            .await;

        let (manager, _) = manager_with(&server.url(), Some(session("access-1", Some("refresh-1"))));
        let other = manager.clone();

        let (a, b, c) = tokio::join!(manager.refresh(), other.refresh(), manager.refresh());

        assert_eq!(a.expect("first"), "access-2");
        assert_eq!(b.expect("second"), "access-2");
        assert_eq!(c.expect("third"), "access-2");
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_renewal_clears_store() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .with_status(401)
            .with_body(json!({ "detail": "Invalid refresh token" }).to_string())
            .expect(1)
            .create_async()
            .await;

        let (manager, store) = manager_with(&server.url(), Some(session("access-1", Some("bad"))));

        let (a, b) = tokio::join!(manager.refresh(), manager.refresh());
        assert!(matches!(a, Err(ApiError::RefreshFailed(_))));
        assert!(matches!(b, Err(ApiError::RefreshFailed(_))));

        assert!(store.get().unwrap().is_none());
        assert!(matches!(manager.access_token(), Err(ApiError::NoCredential)));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_renewal_token_fails_without_network() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .expect(0)
            .create_async()
            .await;

        let (manager, store) = manager_with(&server.url(), Some(session("access-1", None)));
        let result = manager.refresh().await;

        assert!(matches!(result, Err(ApiError::RefreshFailed(_))));
        assert!(store.get().unwrap().is_none());
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_after_rejection_reuses_newer_token() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .expect(0)
            .create_async()
            .await;

        let (manager, _) = manager_with(&server.url(), Some(session("access-2", Some("refresh-2"))));
        let token = manager
            .refresh_after_rejection("access-1")
            .await
            .expect("newer token");

        assert_eq!(token, "access-2");
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_manager_is_idle_again_after_a_renewal() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .with_status(200)
            .with_body(json!({ "accessToken": "access-n", "refreshToken": "refresh-n" }).to_string())
            .expect(2)
            .create_async()
            .await;

        let (manager, _) = manager_with(&server.url(), Some(session("access-1", Some("refresh-1"))));
        manager.refresh().await.expect("first renewal");
        manager.refresh().await.expect("second renewal");
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_stores_session() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", LOGIN_PATH)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "alice".into()),
                Matcher::UrlEncoded("password".into(), "s3cret".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "access_token": "access-1",
                    "token_type": "bearer",
                    "is_admin": true,
                    "username": "alice"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let (manager, store) = manager_with(&server.url(), None);
        let session = manager.login("alice", "s3cret").await.expect("login ok");

        assert_eq!(session.access_token, "access-1");
        assert!(session.is_admin);
        assert!(!session.can_renew());
        assert_eq!(store.get().unwrap(), Some(session));
        assert_eq!(manager.access_token().unwrap(), "access-1");
        login.assert_async().await;

        manager.logout().unwrap();
        assert!(!manager.is_signed_in());
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_is_invalid_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", LOGIN_PATH)
            .with_status(401)
            .with_body(json!({ "detail": "Incorrect username or password" }).to_string())
            .create_async()
            .await;

        let (manager, store) = manager_with(&server.url(), None);
        let result = manager.login("alice", "wrong").await;

        assert!(matches!(result, Err(ApiError::InvalidCredentials)));
        assert!(store.get().unwrap().is_none());
    }
}
