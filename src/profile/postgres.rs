//! PostgreSQL profile repository

use async_trait::async_trait;
use sqlx::PgPool;

use super::{ProfileError, ProfileRepository, UserProfile};

const PROFILE_COLUMNS: &str = "address, username, bio, avatar_url, discord_url, discord_username, \
     x_url, x_username, points, tokens, created_at, updated_at, last_username_update";

#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn get(&self, address: &str) -> Result<Option<UserProfile>, ProfileError> {
        let query = format!("SELECT {} FROM user_profile WHERE address = $1", PROFILE_COLUMNS);
        let profile = sqlx::query_as::<_, UserProfile>(&query)
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>, ProfileError> {
        let query = format!("SELECT {} FROM user_profile WHERE username = $1", PROFILE_COLUMNS);
        let profile = sqlx::query_as::<_, UserProfile>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn ensure_exists(&self, address: &str) -> Result<UserProfile, ProfileError> {
        let basic = UserProfile::basic(address);

        sqlx::query(
            r#"
            INSERT INTO user_profile (address, username, points, tokens, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (address) DO NOTHING
            "#,
        )
        .bind(&basic.address)
        .bind(&basic.username)
        .bind(basic.points)
        .bind(basic.tokens)
        .bind(basic.created_at)
        .bind(basic.updated_at)
        .execute(&self.pool)
        .await?;

        self.get(address).await?.ok_or(ProfileError::NotFound)
    }

    async fn save(&self, profile: &UserProfile) -> Result<UserProfile, ProfileError> {
        let query = format!(
            r#"
            UPDATE user_profile
            SET username = $2, bio = $3, avatar_url = $4, discord_url = $5,
                discord_username = $6, x_url = $7, x_username = $8,
                updated_at = $9, last_username_update = $10
            WHERE address = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );

        let saved = sqlx::query_as::<_, UserProfile>(&query)
            .bind(&profile.address)
            .bind(&profile.username)
            .bind(&profile.bio)
            .bind(&profile.avatar_url)
            .bind(&profile.discord_url)
            .bind(&profile.discord_username)
            .bind(&profile.x_url)
            .bind(&profile.x_username)
            .bind(profile.updated_at)
            .bind(profile.last_username_update)
            .fetch_optional(&self.pool)
            .await?;

        saved.ok_or(ProfileError::NotFound)
    }
}
