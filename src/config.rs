use std::time::Duration;
use url::Url;

/// The environment variable holding the backend's base URL.
pub const API_URL_VAR: &str = "API_URL";
/// Where the backend lives when nobody says otherwise.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// How long to wait after a successful login before letting verification run
/// again.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Settings shared by the [`ApiClient`](crate::ApiClient) and
/// [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: Url,
    pub timeout: Duration,
    pub settle_delay: Duration,
    pub user_agent: String,
}

impl Config {
    /// Read the configuration from the environment, falling back to
    /// [`Config::default()`] for anything that isn't set.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(API_URL_VAR) {
            Ok(url) if !url.trim().is_empty() => {
                Config::default().with_base_url(url.trim())
            },
            _ => Ok(Config::default()),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.base_url = Url::parse(url).map_err(|e| ConfigError::BadUrl {
            url: url.to_string(),
            source: e,
        })?;

        if self.base_url.cannot_be_a_base() {
            return Err(ConfigError::NotABase(url.to_string()));
        }

        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: Url::parse(DEFAULT_BASE_URL)
                .expect("The default base URL is always valid"),
            timeout: DEFAULT_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            user_agent: String::from(crate::DEFAULT_USER_AGENT),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("\"{}\" is not a valid URL", url)]
    BadUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("\"{}\" can't be used as a base URL", .0)]
    NotABase(String),
}
