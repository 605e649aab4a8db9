use crate::{ApiClient, ApiError, User};
use serde_derive::{Deserialize, Serialize};
use std::fmt::{self, Debug, Formatter};

/// Exchange an email and password for a bearer token.
pub async fn login(
    client: &ApiClient,
    credentials: &Credentials,
) -> Result<AuthResponse, ApiError> {
    let response: AuthResponse =
        client.post(super::LOGIN, credentials).await?;
    log::trace!("Login response for {}: {:?}", credentials.email, response);

    Ok(response)
}

/// Create a new account, receiving a bearer token for it.
pub async fn register(
    client: &ApiClient,
    registration: &Registration,
) -> Result<AuthResponse, ApiError> {
    client.post(super::REGISTER, registration).await
}

#[derive(Clone, PartialEq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new<E, P>(email: E, password: P) -> Self
    where
        E: Into<String>,
        P: Into<String>,
    {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

/// The fields needed to create an account.
#[derive(Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"********")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// What the login and registration endpoints send back.
///
/// Both fields are optional on the wire. A response is only usable when
/// both are present, see [`AuthResponse::into_parts()`].
#[derive(Clone, PartialEq, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl AuthResponse {
    pub fn into_parts(self) -> Option<(String, User)> {
        match (self.token, self.user) {
            (Some(token), Some(user)) if !token.is_empty() => {
                Some((token, user))
            },
            _ => None,
        }
    }
}

impl Debug for AuthResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse")
            .field(
                "token",
                &self.token.as_deref().map(crate::utils::redact),
            )
            .field("user", &self.user)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_never_show_up_in_logs() {
        let creds = Credentials::new("a@b.c", "hunter2");

        let got = format!("{:?}", creds);

        assert!(!got.contains("hunter2"));
        assert!(got.contains("a@b.c"));
    }

    #[test]
    fn registration_uses_camel_case() {
        let registration = Registration {
            name: String::from("Ada Lovelace"),
            email: String::from("ada@example.com"),
            password: String::from("pw"),
            first_name: Some(String::from("Ada")),
            last_name: None,
        };

        let got = serde_json::to_value(&registration).unwrap();

        assert_eq!(
            got,
            serde_json::json!({
                "name": "Ada Lovelace",
                "email": "ada@example.com",
                "password": "pw",
                "firstName": "Ada",
            })
        );
    }

    #[test]
    fn auth_responses_need_both_halves() {
        let full: AuthResponse = serde_json::from_str(
            r#"{"token": "abc", "user": {"name": "A", "email": "a@b.c"}}"#,
        )
        .unwrap();
        let no_user: AuthResponse =
            serde_json::from_str(r#"{"token": "abc"}"#).unwrap();
        let empty_token: AuthResponse = serde_json::from_str(
            r#"{"token": "", "user": {"name": "A", "email": "a@b.c"}}"#,
        )
        .unwrap();

        let (token, user) = full.into_parts().unwrap();
        assert_eq!(token, "abc");
        assert_eq!(user.name, "A");
        assert!(no_user.into_parts().is_none());
        assert!(empty_token.into_parts().is_none());
    }
}
