//! The backend's REST endpoints.
//!
//! Every function here goes through the shared [`ApiClient`] pipeline, so
//! authentication headers and error normalisation are applied uniformly.
//!
//! [`ApiClient`]: crate::ApiClient

pub mod auth;
pub mod data;
pub mod user;

pub use auth::{login, register, AuthResponse, Credentials, Registration};
pub use data::{DataQuery, Page, Pagination, Record, RecordInput};
pub use user::{profile, update_profile, ProfileResponse, ProfileUpdate};

pub(crate) const LOGIN: &str = "/api/auth/login";
pub(crate) const REGISTER: &str = "/api/auth/register";
pub(crate) const PROFILE: &str = "/api/user/profile";
pub(crate) const USER_STATS: &str = "/api/user/stats";
pub(crate) const DATA: &str = "/api/data";
pub(crate) const DATA_SUMMARY: &str = "/api/data/stats/summary";

pub(crate) fn data_record(id: &str) -> String { format!("{}/{}", DATA, id) }
