//! The client-side session and the operations which drive it.

use crate::{
    endpoints::{self, Credentials, ProfileUpdate, Registration},
    http::AuthListener,
    nav::{Navigator, Route},
    notify::Toasts,
    utils::redact,
    ApiClient, ApiError, Config, User,
};
use std::{
    fmt::{self, Debug, Display, Formatter},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
    time::Duration,
};

/// A snapshot of the session.
#[derive(Clone, PartialEq)]
pub struct SessionState {
    pub token: Option<String>,
    pub user: Option<User>,
    pub is_authenticated: bool,
    /// Only `true` until the first verification finishes.
    pub is_loading: bool,
    /// Set while a login or registration is in flight, and for a short
    /// settling period afterwards. Verification is skipped while it's set.
    pub is_logging_in: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            token: None,
            user: None,
            is_authenticated: false,
            is_loading: true,
            is_logging_in: false,
        }
    }
}

impl Debug for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("token", &self.token.as_deref().map(redact))
            .field("user", &self.user)
            .field("is_authenticated", &self.is_authenticated)
            .field("is_loading", &self.is_loading)
            .field("is_logging_in", &self.is_logging_in)
            .finish()
    }
}

/// The user's session.
///
/// This is the only thing allowed to change [`SessionState`]. Handles are
/// cheap to clone and all refer to the same session, so the application shell
/// creates one and hands clones to whatever needs it.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    api: ApiClient,
    navigator: Arc<dyn Navigator>,
    toasts: Toasts,
    settle_delay: Duration,
    /// Bumped by every login or registration attempt, so a settling period
    /// only ends the attempt that started it.
    attempt: AtomicU64,
    state: Mutex<SessionState>,
}

impl Session {
    /// Create a session, picking up whatever token was left in the
    /// [`ApiClient`]'s credential store.
    ///
    /// Nothing is verified until [`Session::verify()`] is called.
    pub fn new(
        api: ApiClient,
        navigator: Arc<dyn Navigator>,
        config: &Config,
    ) -> Self {
        let token = match api.store().get() {
            Ok(token) => token,
            Err(e) => {
                log::warn!("Unable to read the stored token: {}", e);
                None
            },
        };

        let token = match token {
            Some(token) => usable_token(&api, token),
            None => {
                api.clear_bearer();
                None
            },
        };

        let inner = Arc::new(Inner {
            api,
            navigator,
            toasts: Toasts::new(),
            settle_delay: config.settle_delay,
            attempt: AtomicU64::new(0),
            state: Mutex::new(SessionState {
                token,
                ..SessionState::default()
            }),
        });

        let weak = Arc::downgrade(&inner);
        let listener: Weak<dyn AuthListener> = weak;
        inner.api.set_listener(listener);

        Session { inner }
    }

    pub fn state(&self) -> SessionState { self.inner.lock().clone() }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().is_authenticated
    }

    pub fn user(&self) -> Option<User> { self.inner.lock().user.clone() }

    /// The client every other request should go through.
    pub fn api(&self) -> &ApiClient { &self.inner.api }

    pub fn toasts(&self) -> &Toasts { &self.inner.toasts }

    /// Check the stored token against the backend.
    ///
    /// Run this once when the application starts and whenever the token or
    /// the logging-in flag changes. It does nothing at all while a login is
    /// in progress. A failed check never logs the user out, the current state
    /// is kept instead.
    pub async fn verify(&self) {
        let token = {
            let state = self.inner.lock();

            if state.is_logging_in {
                log::debug!("Skipping verification, a login is in progress");
                return;
            }

            state.token.clone()
        };

        match token {
            Some(token) => {
                log::debug!("Verifying the session for {}", redact(&token));

                if usable_token(&self.inner.api, token.clone()).is_some() {
                    let outcome = endpoints::profile(&self.inner.api).await;
                    self.inner.apply_verification(&token, outcome);
                } else {
                    self.inner.reset();
                }
            },
            None => log::debug!("No token found, nothing to verify"),
        }

        self.inner.lock().is_loading = false;
    }

    /// Log in with an email and password.
    ///
    /// On success the user is sent to the dashboard.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        log::info!("Attempting login for {}", email);

        let credentials = Credentials::new(email, password);
        let (attempt, outcome) = self
            .guarded(endpoints::login(&self.inner.api, &credentials))
            .await;

        self.finish_authentication(
            attempt,
            outcome,
            "Login failed",
            "Invalid login response",
        )
    }

    /// Create an account and log straight into it.
    ///
    /// Like [`Session::login()`], verification is held off while this is in
    /// flight.
    pub async fn register(
        &self,
        registration: &Registration,
    ) -> Result<(), SessionError> {
        log::info!("Registering {}", registration.email);

        let (attempt, outcome) = self
            .guarded(endpoints::register(&self.inner.api, registration))
            .await;

        self.finish_authentication(
            attempt,
            outcome,
            "Registration failed",
            "Invalid registration response",
        )
    }

    /// Forget everything about the current user. No request is sent.
    pub fn logout(&self) {
        log::info!("Logging out");

        self.inner.reset();
        if let Err(e) = self.inner.api.store().clear() {
            log::warn!("Unable to remove the stored token: {}", e);
        }
        self.inner.api.clear_bearer();

        self.inner.toasts.success("Logged out successfully");
        self.inner.navigator.navigate(Route::Login);
    }

    /// Save changes to the user's profile, returning the updated user.
    ///
    /// Failures are shown to the user and leave the current profile alone.
    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> Result<User, SessionError> {
        const FALLBACK: &str = "Failed to update profile";

        let response =
            match endpoints::update_profile(&self.inner.api, update).await {
                Ok(response) => response,
                Err(e) => return Err(self.inner.surface_failure(&e, FALLBACK)),
            };

        match response.verified_user() {
            Some(user) => {
                self.inner.lock().user = Some(user.clone());
                self.inner.toasts.success("Profile updated successfully");
                Ok(user)
            },
            None => {
                self.inner.toasts.error(FALLBACK);
                Err(SessionError::new(FALLBACK))
            },
        }
    }

    /// Re-fetch the user's profile. This is best-effort, failures are
    /// ignored.
    pub async fn refresh_user(&self) {
        match endpoints::profile(&self.inner.api).await {
            Ok(response) => {
                if let Some(user) = response.user {
                    self.inner.lock().user = Some(user);
                }
            },
            Err(e) => ignore_failure("refresh the user", &e),
        }
    }

    /// Run an authentication request with the logging-in flag raised,
    /// returning the number of the attempt it belongs to.
    async fn guarded<F, T>(&self, request: F) -> (u64, T)
    where
        F: std::future::Future<Output = T>,
    {
        let attempt = self.inner.attempt.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.lock().is_logging_in = true;
        (attempt, request.await)
    }

    fn finish_authentication(
        &self,
        attempt: u64,
        outcome: Result<endpoints::AuthResponse, ApiError>,
        fallback: &str,
        incomplete: &str,
    ) -> Result<(), SessionError> {
        let parts = match outcome {
            Ok(response) => response.into_parts(),
            Err(e) => {
                let err = self.inner.surface_failure(&e, fallback);
                self.inner.end_attempt(attempt);
                return Err(err);
            },
        };

        let (token, user) = match parts {
            Some(parts) => parts,
            None => {
                log::warn!("The response was missing the token or the user");
                self.inner.end_attempt(attempt);
                return Err(SessionError::new(incomplete));
            },
        };

        if let Err(e) = self.inner.api.set_bearer(&token) {
            log::warn!("Rejecting the authentication response: {}", e);

            let previous = self.inner.lock().token.clone();
            if let Some(previous) = previous {
                // already accepted once, so this can't fail
                let _ = self.inner.api.set_bearer(&previous);
            }

            self.inner.end_attempt(attempt);
            return Err(SessionError::new(incomplete));
        }

        self.authenticated(attempt, token, user);
        Ok(())
    }

    /// The transition shared by login and registration. The bearer header
    /// must already carry `token`.
    fn authenticated(&self, attempt: u64, token: String, user: User) {
        log::info!("Authenticated as {}", user.email);

        if let Err(e) = self.inner.api.store().set(&token) {
            log::warn!("Unable to save the token: {}", e);
        }

        let greeting = format!("Welcome back, {}!", user.display_name());
        {
            let mut state = self.inner.lock();
            state.user = Some(user);
            state.is_authenticated = true;
            state.token = Some(token);
        }

        self.inner.toasts.success(greeting);
        self.inner.navigator.navigate(Route::Dashboard);

        // only start settling once the navigation has been issued
        let session = self.clone();
        let delay = self.inner.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.settled(attempt).await;
        });
    }

    async fn settled(&self, attempt: u64) {
        if !self.inner.end_attempt(attempt) {
            log::debug!("A newer login is in progress, not settling");
            return;
        }
        log::debug!("Login settled");

        // the flag changing is what re-triggers verification
        self.verify().await;
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("api", &self.inner.api)
            .field("state", &*self.inner.lock())
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lower the logging-in flag, unless a newer attempt has raised it since.
    fn end_attempt(&self, attempt: u64) -> bool {
        let mut state = self.lock();

        if self.attempt.load(Ordering::SeqCst) != attempt {
            return false;
        }

        state.is_logging_in = false;
        true
    }

    fn reset(&self) {
        let mut state = self.lock();
        state.token = None;
        state.user = None;
        state.is_authenticated = false;
    }

    fn apply_verification(
        &self,
        token: &str,
        outcome: Result<endpoints::ProfileResponse, ApiError>,
    ) {
        let mut state = self.lock();

        if state.is_logging_in || state.token.as_deref() != Some(token) {
            log::debug!("The session changed mid-verification, ignoring it");
            return;
        }

        match outcome.map(|response| response.verified_user()) {
            Ok(Some(user)) => {
                log::info!("Verified the session for {}", user.email);
                state.user = Some(user);
                state.is_authenticated = true;
            },
            Ok(None) => preserve_state(&"the profile response was malformed"),
            Err(e) => preserve_state(&e),
        }
    }

    /// Turn a failed request into a message and show it to the user.
    fn surface_failure(&self, err: &ApiError, fallback: &str) -> SessionError {
        log::warn!("Request failed: {}", err);

        let message = match err {
            ApiError::Network(_) | ApiError::Server { .. } => err.to_string(),
            _ => err
                .payload_message()
                .map(String::from)
                .unwrap_or_else(|| fallback.to_string()),
        };

        self.toasts.error(message.clone());
        SessionError::new(message)
    }
}

impl AuthListener for Inner {
    fn authentication_lost(&self) {
        log::info!("Authentication lost, resetting the session");

        self.reset();
        self.navigator.navigate(Route::Login);
    }
}

/// Put `token` in the bearer header, or forget it entirely if it can never
/// be sent.
fn usable_token(api: &ApiClient, token: String) -> Option<String> {
    if api.set_bearer(&token).is_ok() {
        return Some(token);
    }

    if let Err(e) = api.store().clear() {
        log::warn!("Unable to remove the stored token: {}", e);
    }
    None
}

/// A failed verification keeps whatever state the session already had.
fn preserve_state(reason: &dyn Display) {
    log::warn!(
        "Unable to verify the session ({}), keeping the current state",
        reason
    );
}

fn ignore_failure(operation: &str, err: &ApiError) {
    log::debug!("Unable to {}: {}", operation, err);
}

/// A session operation failed. The message is fit to show a user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", message)]
pub struct SessionError {
    message: String,
}

impl SessionError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        SessionError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str { &self.message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{nav::History, store::MemoryStore};

    fn session_with(store: MemoryStore) -> (Session, Arc<History>) {
        // nothing listens here, any request that escapes fails fast
        let config = Config::default()
            .with_base_url("http://127.0.0.1:9")
            .unwrap()
            .with_timeout(Duration::from_millis(500));
        let api = ApiClient::new(&config, Arc::new(store)).unwrap();
        let history = Arc::new(History::default());
        let session = Session::new(api, history.clone(), &config);

        (session, history)
    }

    #[test]
    fn a_fresh_session_is_loading() {
        let (session, _) = session_with(MemoryStore::new());

        assert_eq!(session.state(), SessionState::default());
        assert_eq!(session.api().bearer(), None);
    }

    #[test]
    fn the_stored_token_is_picked_up_immediately() {
        let (session, _) = session_with(MemoryStore::with_token("abc"));

        assert_eq!(session.state().token, Some(String::from("abc")));
        assert_eq!(session.api().bearer(), Some(String::from("abc")));
    }

    #[tokio::test]
    async fn verifying_without_a_token_just_finishes_loading() {
        let (session, history) = session_with(MemoryStore::new());

        session.verify().await;

        let state = session.state();
        assert!(!state.is_loading);
        assert!(!state.is_authenticated);
        assert_eq!(history.entries(), vec![Route::Root]);
    }

    #[tokio::test]
    async fn verification_is_a_no_op_while_logging_in() {
        let (session, _) = session_with(MemoryStore::with_token("abc"));
        session.inner.lock().is_logging_in = true;
        let before = session.state();

        session.verify().await;

        assert_eq!(session.state(), before);
    }

    #[test]
    fn unusable_stored_tokens_are_forgotten() {
        let (session, _) = session_with(MemoryStore::with_token("tok\u{e9}n"));

        assert_eq!(session.state().token, None);
        assert_eq!(session.api().bearer(), None);
        assert_eq!(session.api().store().get().unwrap(), None);
    }

    #[tokio::test]
    async fn an_older_attempt_never_ends_a_newer_one() {
        let (session, _) = session_with(MemoryStore::new());
        let (first, _) = session.guarded(async {}).await;
        let (second, _) = session.guarded(async {}).await;
        let response = endpoints::AuthResponse {
            token: Some(String::from("abc")),
            user: Some(User::new("A", "a@b.c")),
        };

        session
            .finish_authentication(
                first,
                Ok(response),
                "Login failed",
                "Invalid login response",
            )
            .unwrap();
        session.settled(first).await;
        assert!(session.state().is_logging_in);

        session.settled(second).await;
        assert!(!session.state().is_logging_in);
    }

    #[tokio::test]
    async fn an_older_failure_leaves_a_newer_attempt_running() {
        let (session, _) = session_with(MemoryStore::new());
        let (first, _) = session.guarded(async {}).await;
        let (_second, _) = session.guarded(async {}).await;
        let response = endpoints::AuthResponse {
            token: None,
            user: None,
        };

        let got = session.finish_authentication(
            first,
            Ok(response),
            "Login failed",
            "Invalid login response",
        );

        assert!(got.is_err());
        assert!(session.state().is_logging_in);
    }

    #[test]
    fn logout_is_idempotent() {
        let store = MemoryStore::with_token("abc");
        let (session, history) = session_with(store);

        session.logout();
        let first = session.state();
        session.logout();

        assert_eq!(session.state(), first);
        assert_eq!(first.token, None);
        assert_eq!(first.user, None);
        assert!(!first.is_authenticated);
        assert_eq!(session.api().store().get().unwrap(), None);
        assert_eq!(session.api().bearer(), None);
        assert_eq!(history.current(), Route::Login);
    }

    #[test]
    fn losing_authentication_resets_the_session() {
        let (session, history) = session_with(MemoryStore::with_token("abc"));
        {
            let mut state = session.inner.lock();
            state.user = Some(User::new("A", "a@b.c"));
            state.is_authenticated = true;
        }

        session.inner.authentication_lost();

        let state = session.state();
        assert_eq!(state.token, None);
        assert_eq!(state.user, None);
        assert!(!state.is_authenticated);
        assert_eq!(history.current(), Route::Login);
    }
}
