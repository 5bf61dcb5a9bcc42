//! Resolve an authenticated principal from a presented API key, and validate
//! MFA tokens for restore-class operations (spec.md §4.3 step 1, §2
//! "Principal & MFA validator").

use sha2::{Digest, Sha512};

use crate::domain::Principal;
use crate::error::AppError;
use crate::stores::ApiKeysRepository;

pub struct AuthService {
    api_keys: std::sync::Arc<dyn ApiKeysRepository>,
}

impl AuthService {
    pub fn new(api_keys: std::sync::Arc<dyn ApiKeysRepository>) -> Self {
        Self { api_keys }
    }

    /// Resolve the raw key presented in `X-API-Key` into a `Principal`.
    /// Missing header, unknown hash, or a revoked key all collapse to the
    /// same `AUTH_INVALID_KEY` — callers must not learn which.
    pub async fn resolve_principal(
        &self,
        raw_key: Option<&str>,
        client_ip: Option<&str>,
    ) -> Result<Principal, AppError> {
        let raw_key = raw_key.ok_or_else(|| AppError::Authentication {
            message: "Missing API key".into(),
            reason_category: "missing_key".into(),
        })?;

        let key_hash = hex::encode(Sha512::digest(raw_key.as_bytes()));
        let stored = self.api_keys.get_by_hash(&key_hash).await?;

        let key = match stored {
            Some(k) if k.is_active() => k,
            _ => {
                return Err(AppError::Authentication {
                    message: "invalid API key".into(),
                    reason_category: "invalid_key".into(),
                })
            }
        };

        if let (Some(allowed), Some(ip)) = (&key.allowed_ips, client_ip) {
            if !allowed.iter().any(|a| a == ip) {
                return Err(AppError::Authentication {
                    message: "client IP not allowed for this key".into(),
                    reason_category: "ip_not_allowed".into(),
                });
            }
        }

        Ok(Principal::from(&key))
    }

    /// Validate an MFA token for a restore-class operation. This is called
    /// *after* the principal is already resolved by the API-key layer —
    /// MFA gates the operation, not identity, so a missing/invalid token
    /// never leaks whether the target backup exists.
    ///
    /// Test-double scheme: the token must be `"mfa:" + principal.key_id`.
    /// A real deployment would forward to a TOTP/WebAuthn verifier here.
    pub async fn validate_mfa_token(
        &self,
        principal: &Principal,
        mfa_token: Option<&str>,
        _client_ip: Option<&str>,
    ) -> Result<(), AppError> {
        let token = mfa_token.ok_or_else(|| AppError::Mfa {
            message: "MFA token is required".into(),
            reason_category: "mfa_required".into(),
        })?;

        let expected = format!("mfa:{}", principal.key_id);
        if token != expected {
            return Err(AppError::Mfa {
                message: "MFA token is invalid".into(),
                reason_category: "mfa_invalid".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApiKey, Role};
    use crate::stores::InMemoryApiKeysRepository;
    use chrono::Utc;

    async fn seeded_service(raw_key: &str, role: Role) -> AuthService {
        let repo = std::sync::Arc::new(InMemoryApiKeysRepository::new());
        let key_hash = hex::encode(Sha512::digest(raw_key.as_bytes()));
        repo.insert(ApiKey {
            key_id: "key-1".into(),
            key_hash,
            key_prefix: raw_key[..raw_key.len().min(8)].to_string(),
            role,
            department: Some("IT".into()),
            created_at: Utc::now(),
            revoked_at: None,
            allowed_ips: None,
        })
        .await
        .unwrap();
        AuthService::new(repo)
    }

    #[tokio::test]
    async fn missing_key_is_rejected() {
        let service = seeded_service("raw-key-value", Role::Operator).await;
        let err = service.resolve_principal(None, None).await.unwrap_err();
        assert_eq!(err.reason_category(), "missing_key");
    }

    #[tokio::test]
    async fn valid_key_resolves_principal() {
        let service = seeded_service("raw-key-value", Role::Operator).await;
        let principal = service
            .resolve_principal(Some("raw-key-value"), None)
            .await
            .unwrap();
        assert_eq!(principal.key_id, "key-1");
        assert_eq!(principal.role, Role::Operator);
    }

    #[tokio::test]
    async fn unknown_key_is_rejected() {
        let service = seeded_service("raw-key-value", Role::Operator).await;
        let err = service
            .resolve_principal(Some("wrong-key"), None)
            .await
            .unwrap_err();
        assert_eq!(err.reason_category(), "invalid_key");
    }

    #[tokio::test]
    async fn mfa_token_must_match_expected_scheme() {
        let service = seeded_service("raw-key-value", Role::Admin).await;
        let principal = service
            .resolve_principal(Some("raw-key-value"), None)
            .await
            .unwrap();

        assert!(service
            .validate_mfa_token(&principal, Some("mfa:key-1"), None)
            .await
            .is_ok());

        let err = service
            .validate_mfa_token(&principal, Some("mfa:wrong"), None)
            .await
            .unwrap_err();
        assert_eq!(err.reason_category(), "mfa_invalid");

        let err = service.validate_mfa_token(&principal, None, None).await.unwrap_err();
        assert_eq!(err.reason_category(), "mfa_required");
    }
}
