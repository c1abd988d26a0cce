use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Verification pool has at least one slot
/// - Profile names are non-empty and unique
/// - Every profile carries org/department ids and complete credentials
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.jobs.max_concurrent_verifications == 0 {
        return Err(ConfigError::ValidationError(
            "jobs.max_concurrent_verifications must be at least 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for profile in &config.profiles {
        if profile.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "profile name cannot be empty".to_string(),
            ));
        }
        if !seen.insert(profile.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate profile name: {}",
                profile.name
            )));
        }
        if profile.org_id.is_empty() || profile.department_id.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "profile {} must set org_id and department_id",
                profile.name
            )));
        }
        if !profile.credentials.is_complete() {
            return Err(ConfigError::ValidationError(format!(
                "profile {} has incomplete credentials",
                profile.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HistoryConfig, ServerConfig, TokenConfig};
    use crate::desk::DeskConfig;
    use crate::jobs::JobsConfig;
    use crate::testing::fixtures;

    fn base_config() -> Config {
        Config {
            server: ServerConfig::default(),
            desk: DeskConfig::default(),
            token: TokenConfig::default(),
            jobs: JobsConfig::default(),
            history: HistoryConfig::default(),
            profiles: vec![fixtures::profile("support")],
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base_config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_duplicate_profiles_fails() {
        let mut config = base_config();
        config.profiles.push(fixtures::profile("support"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate profile name"));
    }

    #[test]
    fn test_validate_incomplete_credentials_fails() {
        let mut config = base_config();
        config.profiles[0].credentials.refresh_token.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("incomplete credentials"));
    }

    #[test]
    fn test_validate_zero_verification_slots_fails() {
        let mut config = base_config();
        config.jobs.max_concurrent_verifications = 0;
        assert!(validate_config(&config).is_err());
    }
}
