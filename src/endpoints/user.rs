use crate::{user::Preferences, ApiClient, ApiError, User};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

/// Fetch the profile belonging to the current bearer token.
pub async fn profile(client: &ApiClient) -> Result<ProfileResponse, ApiError> {
    client.get(super::PROFILE).await
}

pub async fn update_profile(
    client: &ApiClient,
    update: &ProfileUpdate,
) -> Result<ProfileResponse, ApiError> {
    client.put(super::PROFILE, update).await
}

/// Usage statistics for the current user. The shape is up to the backend.
pub async fn stats(client: &ApiClient) -> Result<Value, ApiError> {
    let response: StatsResponse = client.get(super::USER_STATS).await?;
    Ok(response.stats)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user: Option<User>,
}

impl ProfileResponse {
    /// The user, but only when the backend also said it succeeded.
    pub fn verified_user(self) -> Option<User> {
        if self.success {
            self.user
        } else {
            None
        }
    }
}

/// A partial update to the user's profile. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(default)]
    stats: Value,
}
