//! Mock token provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::desk::{DeskError, IssuedToken, TokenProvider};
use crate::profile::Profile;

/// Mock implementation of the TokenProvider trait.
///
/// Issues tokens named `token-{profile}-{n}`, where `n` counts every
/// refresh attempt made against this provider.
///
/// # Example
///
/// ```rust,ignore
/// use deskrelay_core::testing::MockTokenProvider;
///
/// let provider = Arc::new(MockTokenProvider::new(3600));
/// let cache = TokenCache::new(provider.clone(), Duration::from_secs(60));
///
/// cache.get_valid_token(&profile).await?;
/// assert_eq!(provider.refresh_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockTokenProvider {
    /// Lifetime reported for issued tokens.
    expires_in_secs: u64,
    /// Refresh attempts so far.
    refreshes: Arc<RwLock<u64>>,
    /// Profiles refreshed, in order.
    refreshed_profiles: Arc<RwLock<Vec<String>>>,
    /// If set, the next refresh will fail with this error.
    next_error: Arc<RwLock<Option<DeskError>>>,
    /// Simulated refresh latency.
    refresh_delay: Arc<RwLock<Duration>>,
}

impl Default for MockTokenProvider {
    fn default() -> Self {
        Self::new(3600)
    }
}

impl MockTokenProvider {
    pub fn new(expires_in_secs: u64) -> Self {
        Self {
            expires_in_secs,
            refreshes: Arc::new(RwLock::new(0)),
            refreshed_profiles: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            refresh_delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Number of refresh attempts, failed ones included.
    pub async fn refresh_count(&self) -> u64 {
        *self.refreshes.read().await
    }

    /// Profiles refreshed, in order.
    pub async fn refreshed_profiles(&self) -> Vec<String> {
        self.refreshed_profiles.read().await.clone()
    }

    /// Configure the next refresh to fail with the given error.
    pub async fn set_next_error(&self, error: DeskError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated refresh latency.
    pub async fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.write().await = delay;
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn refresh(&self, profile: &Profile) -> Result<IssuedToken, DeskError> {
        let n = {
            let mut count = self.refreshes.write().await;
            *count += 1;
            *count
        };
        self.refreshed_profiles
            .write()
            .await
            .push(profile.name.clone());

        let delay = *self.refresh_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        Ok(IssuedToken {
            access_token: format!("token-{}-{}", profile.name, n),
            expires_in_secs: self.expires_in_secs,
        })
    }
}
