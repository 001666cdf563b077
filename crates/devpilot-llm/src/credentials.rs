//! Credentials supplied by the login collaborator.

use devpilot_core::Locale;
use parking_lot::RwLock;

/// Login state read at the start of every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub user_id: String,
    /// Login channel tag (for example `za` or `wx`).
    pub auth_type: String,
    pub locale: Locale,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }
}

/// Source of the current credentials.
///
/// Expiry is never checked here; it surfaces as a 401 from the backend.
pub trait CredentialsSource: Send + Sync {
    fn credentials(&self) -> Credentials;
}

/// Credentials held in memory and replaceable after a login.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    inner: RwLock<Credentials>,
}

impl StaticCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(credentials),
        }
    }

    /// Replace the stored credentials.
    pub fn set(&self, credentials: Credentials) {
        *self.inner.write() = credentials;
    }
}

impl CredentialsSource for StaticCredentials {
    fn credentials(&self) -> Credentials {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_replaced() {
        let source = StaticCredentials::default();
        assert!(source.credentials().is_empty());

        source.set(Credentials {
            token: "t0k3n".to_string(),
            user_id: "42".to_string(),
            auth_type: "za".to_string(),
            locale: Locale::Chinese,
        });
        assert_eq!(source.credentials().user_id, "42");
    }
}
