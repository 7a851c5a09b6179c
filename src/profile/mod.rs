//! User profiles
//!
//! Authentication only needs [`ProfileRepository::ensure_exists`]; the rest of
//! this module backs the session-authenticated profile actions.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use validator::Validate;

pub use memory::MemoryProfileRepository;
pub use postgres::PgProfileRepository;

/// Starting token balance for new profiles.
pub const INITIAL_TOKENS: i64 = 1000;

/// Minimum time between two username changes.
pub fn username_cooldown() -> Duration {
    Duration::hours(24)
}

/// Profile errors
#[derive(Error, Debug, Clone)]
pub enum ProfileError {
    #[error("Profile not found")]
    NotFound,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for ProfileError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ProfileError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => ProfileError::UsernameTaken,
            _ => ProfileError::DatabaseError(e.to_string()),
        }
    }
}

/// Profile record keyed by lower-case wallet address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
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

impl UserProfile {
    /// Basic profile created on first login. The username starts as the
    /// address, which is unique by construction.
    pub fn basic(address: &str) -> Self {
        let now = Utc::now();
        Self {
            address: address.to_string(),
            username: address.to_string(),
            bio: String::new(),
            avatar_url: String::new(),
            discord_url: String::new(),
            discord_username: String::new(),
            x_url: String::new(),
            x_username: String::new(),
            points: 0,
            tokens: INITIAL_TOKENS,
            created_at: now,
            updated_at: now,
            last_username_update: None,
        }
    }
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, address: &str) -> Result<Option<UserProfile>, ProfileError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>, ProfileError>;

    /// Create a basic profile unless one exists. Returns the stored profile.
    async fn ensure_exists(&self, address: &str) -> Result<UserProfile, ProfileError>;

    /// Persist an existing profile. Fails with `UsernameTaken` on collision.
    async fn save(&self, profile: &UserProfile) -> Result<UserProfile, ProfileError>;
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Requested profile changes. Absent or empty fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileChanges {
    #[serde(rename = "Username", alias = "username", default, deserialize_with = "empty_as_none")]
    #[validate(length(min = 3, max = 20))]
    pub username: Option<String>,

    #[serde(rename = "Bio", alias = "bio", default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 500))]
    pub bio: Option<String>,

    #[serde(rename = "AvatarURL", alias = "avatar_url", default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 50))]
    pub avatar_url: Option<String>,

    #[serde(rename = "DiscordURL", alias = "discord_url", default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 100))]
    pub discord_url: Option<String>,

    #[serde(
        rename = "DiscordUsername",
        alias = "discord_username",
        default,
        deserialize_with = "empty_as_none"
    )]
    #[validate(length(max = 50))]
    pub discord_username: Option<String>,

    #[serde(rename = "XURL", alias = "x_url", default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 100))]
    pub x_url: Option<String>,

    #[serde(rename = "XUsername", alias = "x_username", default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 50))]
    pub x_username: Option<String>,
}

/// Outcome of a profile update
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub profile: UserProfile,
    /// The username changed in this update
    pub username_updated: bool,
    /// A username change was requested but the cooldown has not elapsed
    pub username_deferred: bool,
}

/// Profile business rules on top of a repository
#[derive(Clone)]
pub struct ProfileService {
    repo: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    pub fn new(repo: Arc<dyn ProfileRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> Arc<dyn ProfileRepository> {
        self.repo.clone()
    }

    pub async fn get_or_create(&self, address: &str) -> Result<UserProfile, ProfileError> {
        match self.repo.get(address).await? {
            Some(profile) => Ok(profile),
            None => self.repo.ensure_exists(address).await,
        }
    }

    pub async fn get(&self, address: &str) -> Result<UserProfile, ProfileError> {
        self.repo.get(address).await?.ok_or(ProfileError::NotFound)
    }

    /// Apply `changes` to the profile of `address`.
    ///
    /// A username already held by another profile rejects the whole update.
    /// A username change inside the cooldown is skipped while the other
    /// fields are still applied; the outcome reports it as deferred.
    pub async fn update(
        &self,
        address: &str,
        changes: ProfileChanges,
    ) -> Result<ProfileUpdate, ProfileError> {
        let mut profile = self.get(address).await?;
        let now = Utc::now();

        let mut username_updated = false;
        let mut username_deferred = false;

        if let Some(username) = changes.username.filter(|u| *u != profile.username) {
            if let Some(holder) = self.repo.find_by_username(&username).await? {
                if holder.address != profile.address {
                    return Err(ProfileError::UsernameTaken);
                }
            }

            let cooling_down = profile
                .last_username_update
                .is_some_and(|last| now - last < username_cooldown());

            if cooling_down {
                tracing::info!(address = %address, "Username change within cooldown, skipping");
                username_deferred = true;
            } else {
                profile.username = username;
                profile.last_username_update = Some(now);
                username_updated = true;
            }
        }

        if let Some(bio) = changes.bio {
            profile.bio = bio;
        }
        if let Some(avatar_url) = changes.avatar_url {
            profile.avatar_url = avatar_url;
        }
        if let Some(discord_url) = changes.discord_url {
            profile.discord_url = discord_url;
        }
        if let Some(discord_username) = changes.discord_username {
            profile.discord_username = discord_username;
        }
        if let Some(x_url) = changes.x_url {
            profile.x_url = x_url;
        }
        if let Some(x_username) = changes.x_username {
            profile.x_username = x_username;
        }
        profile.updated_at = now;

        let profile = self.repo.save(&profile).await?;

        Ok(ProfileUpdate {
            profile,
            username_updated,
            username_deferred,
        })
    }
}
