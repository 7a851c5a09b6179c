//! User and profile DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::profile::UserProfile;

/// Session actions carry the caller's address, always the session's own
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    #[serde(rename = "Address")]
    pub address: String,
}

/// `GetUserInfo` data. `nonce` reads `"No active nonce"` when none is live.
#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    pub address: String,
    pub username: String,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub address: String,
    pub username: String,
    pub bio: String,
    pub avatar_url: String,
    pub discord_url: String,
    pub discord_username: String,
    pub x_url: String,
    pub x_username: String,
    pub points: i64,
    pub tokens: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_username_update: Option<DateTime<Utc>>,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            address: profile.address,
            username: profile.username,
            bio: profile.bio,
            avatar_url: profile.avatar_url,
            discord_url: profile.discord_url,
            discord_username: profile.discord_username,
            x_url: profile.x_url,
            x_username: profile.x_username,
            points: profile.points,
            tokens: profile.tokens,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
            last_username_update: profile.last_username_update,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    #[serde(flatten)]
    pub profile: ProfileResponse,
    pub username_updated: bool,
}
