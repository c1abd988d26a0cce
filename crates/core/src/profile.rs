//! Named credential profiles.
//!
//! A profile binds a helpdesk organization and department to the OAuth
//! credentials used to act on them. Profiles are read-only to the engine;
//! where they come from is behind [`ProfileSource`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// OAuth client credentials plus a long-lived refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl ProfileCredentials {
    /// True when every credential field is non-empty.
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty() && !self.refresh_token.is_empty()
    }
}

/// A named helpdesk profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Unique key.
    pub name: String,
    /// Organization id sent with every API call.
    pub org_id: String,
    /// Department new tickets are filed under.
    pub department_id: String,
    /// From-address for direct replies. Required when a job asks to send replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_address: Option<String>,
    pub credentials: ProfileCredentials,
}

/// Lookup of profiles by name.
pub trait ProfileSource: Send + Sync {
    /// Get a profile by name.
    fn get(&self, name: &str) -> Option<Arc<Profile>>;

    /// All profile names, sorted.
    fn names(&self) -> Vec<String>;
}

/// Profiles fixed at startup (usually the `[[profiles]]` config section).
#[derive(Debug, Default)]
pub struct StaticProfiles {
    profiles: HashMap<String, Arc<Profile>>,
}

impl StaticProfiles {
    pub fn new(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.name.clone(), Arc::new(p)))
                .collect(),
        }
    }
}

impl ProfileSource for StaticProfiles {
    fn get(&self, name: &str) -> Option<Arc<Profile>> {
        self.profiles.get(name).cloned()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_static_profiles_lookup() {
        let profiles = StaticProfiles::new(vec![
            fixtures::profile("support"),
            fixtures::profile("billing"),
        ]);

        assert_eq!(profiles.get("support").unwrap().name, "support");
        assert!(profiles.get("missing").is_none());
        assert_eq!(profiles.names(), vec!["billing", "support"]);
    }

    #[test]
    fn test_credentials_completeness() {
        let mut creds = fixtures::profile("support").credentials;
        assert!(creds.is_complete());
        creds.client_secret.clear();
        assert!(!creds.is_complete());
    }
}
