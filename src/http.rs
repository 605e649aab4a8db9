//! The shared HTTP pipeline every request to the backend goes through.

use crate::{store::CredentialStore, utils::redact, Config};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client, Method, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_derive::Deserialize;
use std::{
    fmt::Debug,
    sync::{Arc, RwLock, Weak},
};
use url::Url;

/// Told when the backend rejects our credentials.
///
/// The HTTP layer only reports the event. Deciding what "logged out" means
/// (state, navigation, notifications) is up to whoever listens.
pub trait AuthListener: Send + Sync {
    fn authentication_lost(&self);
}

/// A configured client for the backend's REST API.
///
/// Cloning is cheap and every clone shares the same default headers and
/// [`CredentialStore`].
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    base_url: Url,
    store: Arc<dyn CredentialStore>,
    defaults: RwLock<HeaderMap>,
    listener: RwLock<Option<Weak<dyn AuthListener>>>,
}

impl ApiClient {
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(ApiError::Client)?;

        Ok(ApiClient {
            inner: Arc::new(Inner {
                client,
                base_url: config.base_url.clone(),
                store,
                defaults: RwLock::new(HeaderMap::new()),
                listener: RwLock::new(None),
            }),
        })
    }

    pub fn base_url(&self) -> &Url { &self.inner.base_url }

    pub fn store(&self) -> &Arc<dyn CredentialStore> { &self.inner.store }

    /// Attach `Authorization: Bearer <token>` to every future request.
    ///
    /// A token which can't be sent in a header is rejected and the default
    /// header is removed, so no stale bearer outlives it.
    pub fn set_bearer(&self, token: &str) -> Result<(), ApiError> {
        let value = format!("Bearer {}", token);

        match HeaderValue::from_str(&value) {
            Ok(value) => {
                self.defaults_mut().insert(header::AUTHORIZATION, value);
                Ok(())
            },
            Err(e) => {
                log::warn!(
                    "The token {} can't be used in a header",
                    redact(token)
                );
                self.clear_bearer();
                Err(ApiError::BadToken(e))
            },
        }
    }

    pub fn clear_bearer(&self) {
        self.defaults_mut().remove(header::AUTHORIZATION);
    }

    /// The token currently sent by default, if any.
    pub fn bearer(&self) -> Option<String> {
        let defaults =
            self.inner.defaults.read().unwrap_or_else(|e| e.into_inner());

        defaults
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(String::from)
    }

    /// Register the one party told about authentication failures.
    ///
    /// Only a weak reference is kept so the listener may own this client.
    pub fn set_listener(&self, listener: Weak<dyn AuthListener>) {
        *self
            .inner
            .listener
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(listener);
    }

    pub async fn get<T>(&self, path: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let response = self.send::<()>(Method::GET, path, None).await?;
        decode(response).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Debug + Serialize,
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, path, Some(body)).await?;
        decode(response).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Debug + Serialize,
        T: DeserializeOwned,
    {
        let response = self.send(Method::PUT, path, Some(body)).await?;
        decode(response).await
    }

    /// Send a `DELETE`, ignoring whatever the body contains (usually nothing,
    /// with a `204`).
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Debug + Serialize,
    {
        let url = self.url(path)?;

        log::debug!("Sending a {} request to {}", method, url);
        let mut request = self
            .inner
            .client
            .request(method, url)
            .headers(self.outbound_headers());

        if let Some(body) = body {
            log::trace!("Payload: {:#?}", body);
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            log::error!("Network error: {}", e);
            ApiError::Network(e)
        })?;

        log::trace!("Headers: {:#?}", response.headers());

        self.inspect(response).await
    }

    /// The headers for a single request: the defaults, plus whatever token is
    /// in the store right now.
    fn outbound_headers(&self) -> HeaderMap {
        let mut headers = self
            .inner
            .defaults
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        match self.inner.store.get() {
            Ok(Some(token)) => {
                if let Ok(value) =
                    HeaderValue::from_str(&format!("Bearer {}", token))
                {
                    headers.insert(header::AUTHORIZATION, value);
                }
            },
            Ok(None) => {},
            Err(e) => log::warn!("Unable to read the stored token: {}", e),
        }

        headers
    }

    async fn inspect(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = ErrorBody::read(response).await;

        if status == StatusCode::UNAUTHORIZED {
            self.authentication_lost();
            return Err(ApiError::Unauthorized { body });
        }

        if status.is_server_error() {
            log::error!("Server error ({}): {:?}", status, body);
            return Err(ApiError::Server { status, body });
        }

        log::debug!("Request rejected with {}: {:?}", status, body);
        Err(ApiError::Rejected { status, body })
    }

    fn authentication_lost(&self) {
        log::warn!("The backend rejected our credentials, dropping the token");

        if let Err(e) = self.inner.store.clear() {
            log::warn!("Unable to remove the stored token: {}", e);
        }
        self.clear_bearer();

        let listener = self
            .inner
            .listener
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(|listener| listener.upgrade());

        if let Some(listener) = listener {
            listener.authentication_lost();
        }
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        let raw = format!(
            "{}/{}",
            self.inner.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        Url::parse(&raw).map_err(|e| ApiError::BadUrl {
            url: raw,
            source: e,
        })
    }

    fn defaults_mut(&self) -> std::sync::RwLockWriteGuard<'_, HeaderMap> {
        self.inner.defaults.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url().as_str())
            .field("authenticated", &self.bearer().is_some())
            .finish()
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.bytes().await.map_err(ApiError::Network)?;
    log::trace!("Response: {}", String::from_utf8_lossy(&body));

    serde_json::from_slice(&body).map_err(ApiError::Decode)
}

/// The structured payload the backend attaches to failed requests.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    async fn read(response: Response) -> ErrorBody {
        match response.bytes().await {
            Ok(bytes) => ErrorBody::parse(&bytes),
            Err(_) => ErrorBody::default(),
        }
    }

    fn parse(raw: &[u8]) -> ErrorBody {
        serde_json::from_slice(raw).unwrap_or_default()
    }

    /// The most specific message in the payload.
    pub fn message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|msg| !msg.is_empty())
    }
}

/// A failed request, already normalised by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unable to initialise the HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("\"{}\" is not a valid endpoint", url)]
    BadUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// No response was received at all.
    #[error("Network error. Please check your connection.")]
    Network(#[source] reqwest::Error),
    #[error("Server error. Please try again later.")]
    Server { status: StatusCode, body: ErrorBody },
    /// The backend returned a `401`. By the time the caller sees this the
    /// stored token is already gone.
    #[error("Authentication required")]
    Unauthorized { body: ErrorBody },
    #[error("The request was rejected with {}", status)]
    Rejected { status: StatusCode, body: ErrorBody },
    #[error("Unable to parse the response")]
    Decode(#[source] serde_json::Error),
    #[error("The token can't be sent in a header")]
    BadToken(#[source] header::InvalidHeaderValue),
}

impl ApiError {
    /// The message the backend gave us, if any.
    ///
    /// Server errors are deliberately opaque, their payload is never shown.
    pub fn payload_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { body }
            | ApiError::Rejected { body, .. } => body.message(),
            _ => None,
        }
    }

    /// Something fit to show a user.
    pub fn describe(&self) -> String {
        match self.payload_message() {
            Some(msg) => msg.to_string(),
            None => self.to_string(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Server { status, .. }
            | ApiError::Rejected { status, .. } => Some(*status),
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn client() -> ApiClient {
        ApiClient::new(&Config::default(), Arc::new(MemoryStore::new()))
            .unwrap()
    }

    #[test]
    fn error_payload_prefers_the_error_field() {
        let body = ErrorBody::parse(
            br#"{"error": "Invalid credentials", "message": "nope"}"#,
        );

        assert_eq!(body.message(), Some("Invalid credentials"));
    }

    #[test]
    fn error_payload_falls_back_to_message() {
        let body = ErrorBody::parse(br#"{"message": "Title is required"}"#);

        assert_eq!(body.message(), Some("Title is required"));
    }

    #[test]
    fn unparseable_error_payloads_are_empty() {
        assert_eq!(ErrorBody::parse(b"<html>oops</html>"), ErrorBody::default());
    }

    #[test]
    fn server_errors_hide_their_payload() {
        let err = ApiError::Server {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                error: Some(String::from("stack trace here")),
                message: None,
            },
        };

        assert_eq!(err.payload_message(), None);
        assert_eq!(err.describe(), "Server error. Please try again later.");
    }

    #[test]
    fn rejected_requests_describe_themselves_with_the_payload() {
        let err = ApiError::Rejected {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: None,
                message: Some(String::from("Value must be a number")),
            },
        };

        assert_eq!(err.describe(), "Value must be a number");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn bearer_header_follows_set_and_clear() {
        let client = client();
        assert_eq!(client.bearer(), None);

        client.set_bearer("abc").unwrap();
        assert_eq!(client.bearer(), Some(String::from("abc")));

        client.clear_bearer();
        assert_eq!(client.bearer(), None);
    }

    #[test]
    fn invalid_tokens_never_reach_the_headers() {
        let client = client();
        client.set_bearer("abc").unwrap();

        let err = client.set_bearer("tok\u{e9}n").unwrap_err();

        assert!(matches!(err, ApiError::BadToken(_)));
        assert_eq!(client.bearer(), None);
        assert!(client.set_bearer("line\nbreak").is_err());
    }

    #[test]
    fn debug_output_shows_the_base_url_but_not_the_token() {
        let client = client();
        client.set_bearer("super-secret-token").unwrap();

        let got = format!("{:?}", client);

        assert_eq!(client.base_url().as_str(), "http://localhost:5000/");
        assert!(got.contains("http://localhost:5000/"));
        assert!(!got.contains("super-secret-token"));
    }

    #[test]
    fn paths_are_joined_onto_the_base_url() {
        let cfg = Config::default()
            .with_base_url("http://example.com/backend/")
            .unwrap();
        let client = ApiClient::new(&cfg, Arc::new(MemoryStore::new())).unwrap();

        let got = client.url("/api/user/profile").unwrap();

        assert_eq!(got.as_str(), "http://example.com/backend/api/user/profile");
    }
}
