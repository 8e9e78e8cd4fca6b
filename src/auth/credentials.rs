use crate::config::AuthConfig;

/// The single configured login. The password is only ever held as a bcrypt hash.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    password_hash: String,
}

impl Credentials {
    pub fn from_config(auth: &AuthConfig) -> anyhow::Result<Self> {
        let password_hash = match auth.password_hash {
            Some(ref hash) => hash.clone(),
            None => {
                if auth.password == "admin" {
                    tracing::warn!("Using the default admin password; set [auth] password_hash");
                }
                bcrypt::hash(&auth.password, auth.bcrypt_cost)?
            }
        };

        Ok(Self {
            username: auth.username.clone(),
            password_hash,
        })
    }

    /// Constant-time via bcrypt; a malformed stored hash never matches.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let password_ok = bcrypt::verify(password, &self.password_hash).unwrap_or(false);
        password_ok && username == self.username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            username: "editor".into(),
            password: "s3cret".into(),
            bcrypt_cost: 4,
            ..AuthConfig::default()
        }
    }

    #[test]
    fn verifies_configured_plaintext_password() {
        let creds = Credentials::from_config(&auth_config()).unwrap();
        assert!(creds.verify("editor", "s3cret"));
        assert!(!creds.verify("editor", "wrong"));
        assert!(!creds.verify("admin", "s3cret"));
    }

    #[test]
    fn prefers_precomputed_hash() {
        let hash = bcrypt::hash("from-hash", 4).unwrap();
        let creds = Credentials::from_config(&AuthConfig {
            password_hash: Some(hash),
            ..auth_config()
        })
        .unwrap();
        assert!(creds.verify("editor", "from-hash"));
        assert!(!creds.verify("editor", "s3cret"));
    }

    #[test]
    fn malformed_hash_never_matches() {
        let creds = Credentials::from_config(&AuthConfig {
            password_hash: Some("not-a-bcrypt-hash".into()),
            ..auth_config()
        })
        .unwrap();
        assert!(!creds.verify("editor", ""));
    }

    #[test]
    fn out_of_range_cost_is_an_error() {
        let result = Credentials::from_config(&AuthConfig {
            bcrypt_cost: 99,
            ..auth_config()
        });
        assert!(result.is_err());
    }
}
