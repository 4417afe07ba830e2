//! Single-user password check for the chat surfaces.
//!
//! The expected password is read from the env var named by
//! `auth.password_env` **once at construction** and only its SHA-256 digest
//! is kept. Comparison hashes the candidate and compares digests in
//! constant time so the password length does not leak.

use ar_domain::config::AuthConfig;
use serde::Serialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub role: String,
}

pub struct Authenticator {
    enabled: bool,
    username: String,
    role: String,
    password_hash: Option<[u8; 32]>,
}

impl Authenticator {
    pub fn from_config(cfg: &AuthConfig) -> Self {
        let password = std::env::var(&cfg.password_env)
            .ok()
            .filter(|p| !p.is_empty());
        Self::new(cfg, password.as_deref())
    }

    pub fn new(cfg: &AuthConfig, password: Option<&str>) -> Self {
        if cfg.enabled && password.is_none() {
            tracing::warn!(
                env_var = %cfg.password_env,
                "auth is enabled but no password is set, every login will be rejected"
            );
        }
        Self {
            enabled: cfg.enabled,
            username: cfg.username.clone(),
            role: cfg.role.clone(),
            password_hash: password.map(|p| Sha256::digest(p.as_bytes()).into()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The configured user, admitted without a check when auth is off.
    pub fn anonymous(&self) -> Option<Identity> {
        (!self.enabled).then(|| self.identity())
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<Identity> {
        if !self.enabled {
            return Some(self.identity());
        }
        let expected = self.password_hash.as_ref()?;
        let provided = Sha256::digest(password.as_bytes());
        let user_ok = username == self.username;
        let pass_ok = bool::from(provided.as_slice().ct_eq(expected.as_slice()));
        if user_ok && pass_ok {
            Some(self.identity())
        } else {
            tracing::info!(username, "login rejected");
            None
        }
    }

    fn identity(&self) -> Identity {
        Identity {
            username: self.username.clone(),
            role: self.role.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(enabled: bool) -> AuthConfig {
        AuthConfig {
            enabled,
            ..AuthConfig::default()
        }
    }

    #[test]
    fn correct_credentials_yield_identity() {
        let auth = Authenticator::new(&cfg(true), Some("hunter2"));
        let id = auth.authenticate("sales@contoso.com", "hunter2").unwrap();
        assert_eq!(id.username, "sales@contoso.com");
        assert_eq!(id.role, "sales");
    }

    #[test]
    fn wrong_password_or_user_is_rejected() {
        let auth = Authenticator::new(&cfg(true), Some("hunter2"));
        assert!(auth.authenticate("sales@contoso.com", "hunter3").is_none());
        assert!(auth.authenticate("someone@else.com", "hunter2").is_none());
    }

    #[test]
    fn missing_password_rejects_everything() {
        let auth = Authenticator::new(&cfg(true), None);
        assert!(auth.authenticate("sales@contoso.com", "").is_none());
        assert!(auth.anonymous().is_none());
    }

    #[test]
    fn disabled_auth_admits_configured_user() {
        let auth = Authenticator::new(&cfg(false), None);
        assert_eq!(
            auth.authenticate("anyone", "anything").map(|i| i.username),
            Some("sales@contoso.com".to_string())
        );
        assert!(auth.anonymous().is_some());
    }
}
