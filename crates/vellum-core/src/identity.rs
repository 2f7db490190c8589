//! Caller identity attached to an exchange by the authentication stage.

use serde::{Deserialize, Serialize};

/// The authenticated caller of an exchange.
///
/// Authentication mechanisms live outside the core; they only produce one of
/// these values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// No credentials were presented or required.
    Anonymous,
    /// An authenticated user.
    User {
        /// The user identifier.
        id: String,
        /// Roles granted to the user.
        roles: Vec<String>,
    },
}

impl Identity {
    /// Creates a user identity.
    #[must_use]
    pub fn user(id: impl Into<String>, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::User {
            id: id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a string identifier suitable for logging.
    #[must_use]
    pub fn log_id(&self) -> String {
        match self {
            Self::Anonymous => "anonymous".to_string(),
            Self::User { id, .. } => format!("user:{id}"),
        }
    }

    /// Returns the roles of this identity.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        match self {
            Self::Anonymous => &[],
            Self::User { roles, .. } => roles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_id() {
        assert_eq!(Identity::Anonymous.log_id(), "anonymous");
        assert_eq!(Identity::user("u123", ["admin"]).log_id(), "user:u123");
    }

    #[test]
    fn test_roles() {
        assert!(Identity::Anonymous.roles().is_empty());
        let user = Identity::user("u1", ["admin", "reader"]);
        assert_eq!(user.roles(), ["admin".to_string(), "reader".to_string()]);
    }
}
