//! Action authorization table
//!
//! Every operation the server exposes is a variant of [`Action`], and its
//! authorization class is a `const` match. Adding an action without deciding
//! its class does not compile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How an action authenticates its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthClass {
    /// No identity required
    NoAuth,
    /// A live session is required; its address replaces any client-supplied one
    SessionAuth,
    /// The request itself carries a signature that is verified inline
    SignatureAuth,
}

/// Operations reachable through the action endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    ConnectWallet,
    VerifySignature,
    Logout,
    HealthCheck,
    GetUserInfo,
    GetUserProfile,
    UpdateUserProfile,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::ConnectWallet,
        Action::VerifySignature,
        Action::Logout,
        Action::HealthCheck,
        Action::GetUserInfo,
        Action::GetUserProfile,
        Action::UpdateUserProfile,
    ];

    pub const fn auth_class(self) -> AuthClass {
        match self {
            Action::ConnectWallet | Action::Logout | Action::HealthCheck => AuthClass::NoAuth,
            Action::VerifySignature => AuthClass::SignatureAuth,
            Action::GetUserInfo | Action::GetUserProfile | Action::UpdateUserProfile => {
                AuthClass::SessionAuth
            }
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Action::ConnectWallet => "ConnectWallet",
            Action::VerifySignature => "VerifySignature",
            Action::Logout => "Logout",
            Action::HealthCheck => "HealthCheck",
            Action::GetUserInfo => "GetUserInfo",
            Action::GetUserProfile => "GetUserProfile",
            Action::UpdateUserProfile => "UpdateUserProfile",
        }
    }

    /// Name used in the response envelope's `Action` field.
    pub fn response_name(self) -> String {
        format!("{}Response", self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown action: {}", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
