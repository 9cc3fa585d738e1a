use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Holding, UserProfile};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("user not found: {0}")]
    NotFound(Uuid),

    #[error("profile storage error: {0}")]
    Storage(String),
}

/// Profile boundary: resolves an authenticated user id to a display name and
/// portfolio at connect time. The real store (and the authentication in
/// front of it) is an external service.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    async fn load(&self, user_id: Uuid) -> Result<UserProfile, ProfileError>;
}

/// In-memory profile store for tests and single-binary wiring.
#[derive(Default)]
pub struct InMemoryProfileStore {
    users: RwLock<HashMap<Uuid, UserProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: UserProfile) {
        self.users.write().insert(profile.user_id, profile);
    }

    /// Seed a demo user from `DEMO_USER_ID` / `DEMO_USER_NAME` /
    /// `DEMO_USER_COINS` (format: `btcusdt=0.5,ethusdt=2`). Returns the
    /// seeded id, if any.
    pub fn seed_from_env(&self) -> Option<Uuid> {
        let user_id = std::env::var("DEMO_USER_ID")
            .ok()
            .and_then(|v| Uuid::parse_str(&v).ok())?;
        let name = std::env::var("DEMO_USER_NAME").unwrap_or_else(|_| "demo".to_string());
        let coins = std::env::var("DEMO_USER_COINS")
            .unwrap_or_else(|_| "btcusdt=0.5,ethusdt=2".to_string());

        let holdings: Vec<Holding> = coins
            .split(',')
            .filter_map(|pair| {
                let (symbol, quantity) = pair.split_once('=')?;
                Some(Holding {
                    symbol: symbol.trim().to_lowercase(),
                    quantity: quantity.trim().parse::<Decimal>().ok()?,
                })
            })
            .collect();

        tracing::info!(%user_id, name = %name, holdings = holdings.len(), "seeded demo profile");
        self.insert(UserProfile {
            user_id,
            name,
            holdings,
        });
        Some(user_id)
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(&self, user_id: Uuid) -> Result<UserProfile, ProfileError> {
        self.users
            .read()
            .get(&user_id)
            .cloned()
            .ok_or(ProfileError::NotFound(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_load_returns_inserted_profile() {
        let store = InMemoryProfileStore::new();
        let user_id = Uuid::new_v4();
        store.insert(UserProfile {
            user_id,
            name: "alice".to_string(),
            holdings: vec![Holding {
                symbol: "btcusdt".to_string(),
                quantity: dec!(2),
            }],
        });

        let profile = store.load(user_id).await.unwrap();
        assert_eq!(profile.name, "alice");
        assert_eq!(profile.holdings.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let store = InMemoryProfileStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.load(missing).await,
            Err(ProfileError::NotFound(id)) if id == missing
        ));
    }
}
