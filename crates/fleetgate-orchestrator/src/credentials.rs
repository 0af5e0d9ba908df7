//! Credential validator — user passwords and cluster join tokens.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::{debug, error, warn};

use fleetgate_cluster::MembershipGateway;
use fleetgate_registry::NodeRegistry;

use crate::error::{AuthFailure, CoordinatorError, CoordinatorResult};

/// Hash a password into a PHC string suitable for the `users.password` column.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Check `password` against a stored PHC hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!(error = %e, "stored password hash is not a valid PHC string");
            false
        }
    }
}

/// Validates usernames/passwords against the registry and join tokens
/// against the cluster's live token list.
#[derive(Clone)]
pub struct CredentialValidator {
    registry: Arc<dyn NodeRegistry>,
    gateway: Arc<dyn MembershipGateway>,
}

impl CredentialValidator {
    pub fn new(registry: Arc<dyn NodeRegistry>, gateway: Arc<dyn MembershipGateway>) -> Self {
        Self { registry, gateway }
    }

    /// Whether `password` is correct for `username`. Unknown users, wrong
    /// passwords and registry errors all read as `false`.
    pub async fn validate_user(&self, username: &str, password: &str) -> bool {
        self.authenticate(username, password).await.is_ok()
    }

    /// Like [`validate_user`](Self::validate_user) but keeps a registry
    /// outage distinguishable from bad credentials.
    pub async fn authenticate(&self, username: &str, password: &str) -> CoordinatorResult<()> {
        let stored = match self.registry.find_password_hash(username).await {
            Ok(Some(hash)) => hash,
            Ok(None) => {
                warn!(%username, "authentication failed: unknown user");
                return Err(CoordinatorError::Auth(AuthFailure::InvalidCredentials));
            }
            Err(e) => {
                error!(%username, error = %e, "authentication failed: registry unavailable");
                return Err(CoordinatorError::Storage(e));
            }
        };

        // argon2 is CPU-bound.
        let password = password.to_string();
        let matched = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .unwrap_or(false);

        if matched {
            debug!(%username, "password verified");
            Ok(())
        } else {
            warn!(%username, "authentication failed: wrong password");
            Err(CoordinatorError::Auth(AuthFailure::InvalidCredentials))
        }
    }

    /// Whether `token` is in the cluster's current token list. Fails closed
    /// when the list cannot be enumerated.
    pub async fn validate_token(&self, token: &str) -> bool {
        match self.gateway.list_tokens().await {
            Ok(tokens) => {
                let valid = tokens.contains(token);
                if !valid {
                    warn!("join token not in the cluster's token list");
                }
                valid
            }
            Err(e) => {
                error!(error = %e, "token validation failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use fleetgate_cluster::{GatewayError, GatewayFuture, Removal};
    use fleetgate_registry::MemoryRegistry;

    struct TokenGateway(Option<Vec<&'static str>>);

    impl MembershipGateway for TokenGateway {
        fn list_tokens(&self) -> GatewayFuture<'_, HashSet<String>> {
            let result = match &self.0 {
                Some(tokens) => Ok(tokens.iter().map(|t| t.to_string()).collect()),
                None => Err(GatewayError::Enumeration("kubeadm not found".to_string())),
            };
            Box::pin(async move { result })
        }

        fn join_membership<'a>(&'a self, _: &'a str, _: &'a str, _: &'a str) -> GatewayFuture<'a, String> {
            unreachable!("credential checks never join")
        }

        fn remove_membership<'a>(&'a self, _: &'a str) -> GatewayFuture<'a, Removal> {
            unreachable!("credential checks never remove")
        }

        fn reset_local_agent(&self) -> GatewayFuture<'_, String> {
            unreachable!("credential checks never reset")
        }
    }

    fn validator(tokens: Option<Vec<&'static str>>) -> (CredentialValidator, Arc<MemoryRegistry>) {
        let registry = Arc::new(MemoryRegistry::new());
        registry.add_user("alice", &hash_password("s3cret-pass").unwrap());
        let validator = CredentialValidator::new(registry.clone(), Arc::new(TokenGateway(tokens)));
        (validator, registry)
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "plaintext-not-a-hash"));
    }

    #[tokio::test]
    async fn valid_user_accepted() {
        let (validator, _) = validator(None);
        assert!(validator.validate_user("alice", "s3cret-pass").await);
    }

    #[tokio::test]
    async fn any_single_character_mutation_rejected() {
        let (validator, _) = validator(None);
        let password = "s3cret-pass";
        for i in 0..password.len() {
            let mut mutated: Vec<char> = password.chars().collect();
            mutated[i] = if mutated[i] == 'x' { 'y' } else { 'x' };
            let mutated: String = mutated.into_iter().collect();
            assert!(!validator.validate_user("alice", &mutated).await, "{mutated} accepted");
        }
    }

    #[tokio::test]
    async fn unknown_user_rejected() {
        let (validator, _) = validator(None);
        assert!(!validator.validate_user("mallory", "s3cret-pass").await);
        assert!(matches!(
            validator.authenticate("mallory", "s3cret-pass").await,
            Err(CoordinatorError::Auth(AuthFailure::InvalidCredentials))
        ));
    }

    #[tokio::test]
    async fn registry_outage_is_storage_error() {
        let (validator, registry) = validator(None);
        registry.set_unavailable(true);
        assert!(!validator.validate_user("alice", "s3cret-pass").await);
        assert!(matches!(
            validator.authenticate("alice", "s3cret-pass").await,
            Err(CoordinatorError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn token_must_match_exactly() {
        let (validator, _) = validator(Some(vec!["abc123", "def456.0123456789abcdef"]));
        assert!(validator.validate_token("abc123").await);
        assert!(!validator.validate_token("abc12").await);
        assert!(!validator.validate_token("ABC123").await);
        assert!(!validator.validate_token("").await);
    }

    #[tokio::test]
    async fn token_enumeration_failure_fails_closed() {
        let (validator, _) = validator(None);
        assert!(!validator.validate_token("abc123").await);
    }
}
