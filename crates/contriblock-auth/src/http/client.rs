/*
[INPUT]:  HTTP configuration (base URL, timeouts) and the session store
[OUTPUT]: Configured reqwest client ready for API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::auth::SessionStore;
use crate::http::{AuthError, Result};

/// Default API base URL (local FastAPI backend)
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Called after a 401 response has cleared the session store
pub type UnauthorizedHook = Arc<dyn Fn(&AuthError) + Send + Sync>;

/// HTTP client for the ContriBlock API
///
/// Every request reads the bearer token from the shared session store, and
/// every 401 response clears it and fires the unauthorized hook. Clones
/// share the hook.
#[derive(Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: Url,
    session_store: Arc<dyn SessionStore>,
    on_unauthorized: Arc<RwLock<Option<UnauthorizedHook>>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("session_store", &self.session_store)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new(base_url: &str, session_store: Arc<dyn SessionStore>) -> Result<Self> {
        Self::with_config(ClientConfig::default(), base_url, session_store)
    }

    /// Create a new client with custom configuration
    pub fn with_config(
        config: ClientConfig,
        base_url: &str,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: parse_base_url(base_url)?,
            session_store,
            on_unauthorized: Arc::new(RwLock::new(None)),
        })
    }

    /// Register the callback run after any 401, replacing the previous one
    pub fn set_unauthorized_hook(&self, hook: UnauthorizedHook) {
        *self
            .on_unauthorized
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.session_store
    }

    /// Build full URL for an API endpoint relative to the base path
    fn url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(endpoint)?)
    }

    /// Build a request carrying the stored bearer token, if any
    pub(crate) fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let builder = self.http_client.request(method, self.url(endpoint)?);
        Ok(match self.session_store.load_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Build a request carrying an explicit bearer token
    pub(crate) fn request_with_token(
        &self,
        method: Method,
        endpoint: &str,
        token: &str,
    ) -> Result<RequestBuilder> {
        Ok(self
            .http_client
            .request(method, self.url(endpoint)?)
            .bearer_auth(token))
    }

    /// Send a request and decode a JSON body, mapping error statuses
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_detail(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

            return Err(match status {
                StatusCode::UNAUTHORIZED => {
                    warn!(%status, detail = %message, "request unauthorized, clearing session");
                    if let Err(err) = self.session_store.clear() {
                        warn!(error = %err, "failed to clear session after 401");
                    }
                    let err = AuthError::AuthRejected(message);
                    self.notify_unauthorized(&err);
                    err
                }
                StatusCode::BAD_REQUEST => AuthError::InvalidInput(message),
                _ => AuthError::api_error(status, message),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }

    fn notify_unauthorized(&self, err: &AuthError) {
        let hook = self
            .on_unauthorized
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook(err);
        }
    }
}

/// Parse the base URL so relative endpoints extend its path
fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Pull the FastAPI `detail` message out of an error body
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        // Validation errors carry a list of {loc, msg, type}
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|msg| msg.as_str()))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        other => Some(other.to_string()),
    }
}
