//! In-process profile repository

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ProfileError, ProfileRepository, UserProfile};

#[derive(Clone, Default)]
pub struct MemoryProfileRepository {
    profiles: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl MemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for MemoryProfileRepository {
    async fn get(&self, address: &str) -> Result<Option<UserProfile>, ProfileError> {
        Ok(self.profiles.read().await.get(address).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserProfile>, ProfileError> {
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .find(|p| p.username == username)
            .cloned())
    }

    async fn ensure_exists(&self, address: &str) -> Result<UserProfile, ProfileError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(address.to_string())
            .or_insert_with(|| UserProfile::basic(address));
        Ok(profile.clone())
    }

    async fn save(&self, profile: &UserProfile) -> Result<UserProfile, ProfileError> {
        let mut profiles = self.profiles.write().await;

        if !profiles.contains_key(&profile.address) {
            return Err(ProfileError::NotFound);
        }

        let collision = profiles
            .values()
            .any(|p| p.username == profile.username && p.address != profile.address);
        if collision {
            return Err(ProfileError::UsernameTaken);
        }

        profiles.insert(profile.address.clone(), profile.clone());
        Ok(profile.clone())
    }
}
