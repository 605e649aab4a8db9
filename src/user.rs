use crate::Id;
use serde_derive::{Deserialize, Serialize};

/// A user's profile, as returned by the profile and auth endpoints.
///
/// The session replaces this wholesale every time a fresh copy is fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct User {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl User {
    pub fn new<N, E>(name: N, email: E) -> Self
    where
        N: Into<String>,
        E: Into<String>,
    {
        User {
            id: None,
            name: name.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            avatar: None,
            role: default_role(),
            is_active: true,
            created_at: None,
            last_login: None,
            preferences: Preferences::default(),
        }
    }

    /// The name to greet the user with, falling back to their first name and
    /// then their email address.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }

        match self.first_name {
            Some(ref first) if !first.is_empty() => first,
            _ => &self.email,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
    pub notifications: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            theme: Theme::Light,
            notifications: true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self { Theme::Light }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Theme, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("Unknown theme \"{}\"", other)),
        }
    }
}

fn default_role() -> String { String::from("user") }

fn default_true() -> bool { true }
