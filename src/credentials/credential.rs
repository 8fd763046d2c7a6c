//! credentials::credential
//!
//! The credential value type.
//!
//! # Security
//!
//! `Debug` output redacts every secret; secrets never appear in logs or
//! error messages.
//!
//! # Wire form
//!
//! ```json
//! {"id":"work","kind":"password","targetURL":"https://git.example.com/","userName":"me","password":"..."}
//! {"id":"deploy","kind":"ssh","targetURL":"git@example.com:","publicKey":"...","privateKey":"..."}
//! ```

use serde::{Deserialize, Serialize};

/// Authentication method of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    Ssh,
    Password,
}

impl CredentialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Password => "password",
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific secret material. Exactly one pair exists per credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Secret {
    Password {
        #[serde(rename = "userName")]
        username: String,
        password: String,
    },
    Ssh {
        #[serde(rename = "publicKey")]
        public_key: String,
        #[serde(rename = "privateKey")]
        private_key: String,
    },
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Ssh { .. } => f
                .debug_struct("Ssh")
                .field("public_key", &"<redacted>")
                .field("private_key", &"<redacted>")
                .finish(),
        }
    }
}

/// A stored credential for remotes whose URL starts with `target_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique, non-empty identifier
    pub id: String,
    /// URL prefix this credential applies to
    #[serde(rename = "targetURL")]
    pub target_url: String,
    #[serde(flatten)]
    pub secret: Secret,
}

impl Credential {
    /// Username/password credential.
    pub fn password(
        id: impl Into<String>,
        target_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            target_url: target_url.into(),
            secret: Secret::Password {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    /// SSH key pair credential.
    pub fn ssh(
        id: impl Into<String>,
        target_url: impl Into<String>,
        public_key: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            target_url: target_url.into(),
            secret: Secret::Ssh {
                public_key: public_key.into(),
                private_key: private_key.into(),
            },
        }
    }

    pub fn kind(&self) -> CredentialKind {
        match self.secret {
            Secret::Password { .. } => CredentialKind::Password,
            Secret::Ssh { .. } => CredentialKind::Ssh,
        }
    }

    pub fn is_password(&self) -> bool {
        self.kind() == CredentialKind::Password
    }

    /// Whether this credential applies to `url`.
    pub fn matches(&self, url: &str) -> bool {
        url.starts_with(&self.target_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_json_shape() {
        let cred = Credential::password("work", "https://git.example.com/", "me", "hunter2");
        let value = serde_json::to_value(&cred).unwrap();

        assert_eq!(value["id"], "work");
        assert_eq!(value["kind"], "password");
        assert_eq!(value["targetURL"], "https://git.example.com/");
        assert_eq!(value["userName"], "me");
        assert_eq!(value["password"], "hunter2");
        assert!(value.get("publicKey").is_none());
    }

    #[test]
    fn ssh_parses_from_json() {
        let json = r#"{"id":"deploy","kind":"ssh","targetURL":"git@example.com:",
                       "publicKey":"ssh-ed25519 AAA","privateKey":"-----BEGIN"}"#;
        let cred: Credential = serde_json::from_str(json).unwrap();

        assert_eq!(cred.kind(), CredentialKind::Ssh);
        assert_eq!(cred.target_url, "git@example.com:");
        assert!(!cred.is_password());
    }

    #[test]
    fn unknown_kind_rejected() {
        let json = r#"{"id":"x","kind":"token","targetURL":"https://"}"#;
        assert!(serde_json::from_str::<Credential>(json).is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let cred = Credential::password("a", "https://h/", "user", "s3cret");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("user"));

        let ssh = Credential::ssh("b", "git@h:", "pub-material", "priv-material");
        let debug = format!("{:?}", ssh);
        assert!(!debug.contains("priv-material"));
        assert!(!debug.contains("pub-material"));
    }

    #[test]
    fn matches_prefix() {
        let cred = Credential::password("a", "https://github.com/org/", "u", "p");
        assert!(cred.matches("https://github.com/org/repo.git"));
        assert!(!cred.matches("https://github.com/other/repo.git"));
    }
}
