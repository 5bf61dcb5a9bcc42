//! Short-TTL, principal-bound restore-access tokens (spec.md §4.5). Held in
//! a single process-wide mutex-guarded map per the composition root's
//! documented lifetime — not persisted across restarts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::domain::RestoreAccessTokenRecord;
use crate::error::AppError;

const TOKEN_BYTES: usize = 24;

fn new_opaque_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub struct RestoreAccessTokenService {
    clock: Arc<dyn Clock>,
    tokens: Mutex<HashMap<String, RestoreAccessTokenRecord>>,
}

impl RestoreAccessTokenService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a new token, purging expired records first. TTL is clamped to
    /// at least one second.
    pub async fn issue(
        &self,
        backup_id: String,
        actor_key_id: Option<String>,
        ttl_seconds: i64,
    ) -> RestoreAccessTokenRecord {
        let ttl_seconds = ttl_seconds.max(1);
        let now = self.clock.now();
        let mut guard = self.tokens.lock().await;
        guard.retain(|_, record| record.expires_at > now);

        let record = RestoreAccessTokenRecord {
            token: new_opaque_token(),
            backup_id,
            actor_key_id,
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_seconds),
        };
        guard.insert(record.token.clone(), record.clone());
        record
    }

    /// Redeem a token, returning `(backup_id, expires_at)` on success.
    pub async fn redeem(
        &self,
        token: &str,
        caller_key_id: Option<&str>,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let now = self.clock.now();
        let mut guard = self.tokens.lock().await;

        let record = match guard.get(token) {
            Some(r) => r.clone(),
            None => {
                return Err(AppError::RestoreToken {
                    message: "unknown restore token".into(),
                    reason_category: "token_invalid".into(),
                })
            }
        };

        if now >= record.expires_at {
            guard.remove(token);
            return Err(AppError::RestoreToken {
                message: "restore token expired".into(),
                reason_category: "token_expired".into(),
            });
        }

        if let Some(owner) = &record.actor_key_id {
            if caller_key_id != Some(owner.as_str()) {
                return Err(AppError::RestoreToken {
                    message: "restore token does not belong to this caller".into(),
                    reason_category: "token_forbidden".into(),
                });
            }
        }

        Ok((record.backup_id, record.expires_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;

    #[tokio::test]
    async fn owner_can_redeem_within_ttl() {
        let service = RestoreAccessTokenService::new(Arc::new(FixedClock::new(Utc::now())));
        let record = service.issue("backup-1".into(), Some("key-1".into()), 300).await;
        let (backup_id, _) = service.redeem(&record.token, Some("key-1")).await.unwrap();
        assert_eq!(backup_id, "backup-1");
    }

    #[tokio::test]
    async fn other_principal_is_forbidden() {
        let service = RestoreAccessTokenService::new(Arc::new(FixedClock::new(Utc::now())));
        let record = service.issue("backup-1".into(), Some("key-1".into()), 300).await;
        let err = service.redeem(&record.token, Some("attacker-key")).await.unwrap_err();
        assert_eq!(err.reason_category(), "token_forbidden");
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let service = RestoreAccessTokenService::new(Arc::new(FixedClock::new(Utc::now())));
        let err = service.redeem("nonexistent", None).await.unwrap_err();
        assert_eq!(err.reason_category(), "token_invalid");
    }

    #[tokio::test]
    async fn expired_token_is_removed_and_rejected() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let service = RestoreAccessTokenService::new(clock.clone());
        let record = service.issue("backup-1".into(), None, 1).await;

        // Advance the fixed clock well past expiry by issuing enough calls.
        for _ in 0..2000 {
            clock.now();
        }

        let err = service.redeem(&record.token, None).await.unwrap_err();
        assert_eq!(err.reason_category(), "token_expired");
    }
}
