use crate::errors::StoreError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hashes with argon2id and a fresh random salt, returning a PHC string.
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| StoreError::PasswordHash(err.to_string()))
}

/// Constant-time comparison through argon2; malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Well-formed argon2id hash with default parameters that no password
/// matches. Unknown emails verify against it so both login paths cost the same.
const UNKNOWN_USER_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dW5rbm93bnVzZXJzYWx0$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Runs [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, StoreError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| StoreError::PasswordHash(err.to_string()))?
}

/// Runs [`verify_password`] on the blocking pool. `None` stands for an
/// unknown account and always fails after a full verification.
pub async fn verify_password_blocking(password: String, hash: Option<String>) -> bool {
    let known = hash.is_some();
    let hash = hash.unwrap_or_else(|| UNKNOWN_USER_HASH.to_string());
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false);
    known && verified
}

/// Normalized form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Bearer tokens issued at login, held in memory only.
#[derive(Clone, Default)]
pub struct Sessions {
    tokens: Arc<Mutex<HashMap<String, Uuid>>>,
}

impl Sessions {
    pub async fn issue(&self, user_id: Uuid) -> String {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        self.tokens.lock().await.insert(token.clone(), user_id);
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<Uuid> {
        self.tokens.lock().await.get(token).copied()
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.tokens.lock().await.remove(token).is_some()
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("correct horsf", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("password123").unwrap();
        let b = hash_password("password123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn plaintext_stored_value_never_verifies() {
        assert!(!verify_password("password123", "password123"));
    }

    #[test]
    fn unknown_user_hash_costs_a_default_verification() {
        let parsed = PasswordHash::new(UNKNOWN_USER_HASH).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert_eq!(parsed.params.get_decimal("m"), Some(argon2::Params::DEFAULT_M_COST));
        assert_eq!(parsed.params.get_decimal("t"), Some(argon2::Params::DEFAULT_T_COST));
        assert_eq!(parsed.params.get_decimal("p"), Some(argon2::Params::DEFAULT_P_COST));
        assert_eq!(parsed.hash.map(|hash| hash.len()), Some(argon2::Params::DEFAULT_OUTPUT_LEN));
        assert!(!verify_password("password123", UNKNOWN_USER_HASH));
    }

    #[tokio::test]
    async fn blocking_helpers_match_the_sync_ones() {
        let hash = hash_password_blocking("password123".into()).await.unwrap();
        assert!(verify_password_blocking("password123".into(), Some(hash.clone())).await);
        assert!(!verify_password_blocking("password124".into(), Some(hash)).await);
        assert!(!verify_password_blocking("password123".into(), None).await);
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[tokio::test]
    async fn sessions_issue_resolve_revoke() {
        let sessions = Sessions::default();
        let user = Uuid::new_v4();
        let token = sessions.issue(user).await;
        assert_eq!(sessions.resolve(&token).await, Some(user));
        assert!(sessions.revoke(&token).await);
        assert_eq!(sessions.resolve(&token).await, None);
        assert!(!sessions.revoke(&token).await);
    }
}
