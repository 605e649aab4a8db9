//! A session-aware client for the dashboard REST backend.
//!
//! The [`ApiClient`] is the single pipeline every request goes through. It
//! attaches the bearer token, normalises failures, and reports rejected
//! credentials to whoever is listening. The [`Session`] owns the
//! authentication state built on top of it.

#![forbid(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

mod config;
pub mod endpoints;
pub mod guard;
mod http;
mod id;
pub mod nav;
pub mod notify;
mod session;
pub mod store;
mod user;
mod utils;

pub use config::{Config, ConfigError, API_URL_VAR, DEFAULT_BASE_URL};
pub use http::{ApiClient, ApiError, AuthListener, ErrorBody};
pub use id::Id;
pub use session::{Session, SessionError, SessionState};
pub use store::{CredentialStore, FileStore, MemoryStore, StoreError};
pub use user::{Preferences, Theme, User};

/// The default user agent to use when communicating with the backend.
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));
