//! Global incident-level gate consulted by the restore pipeline and forced
//! into LOCKDOWN by crypto-shred (spec.md §4.6).

use crate::clock::Clock;
use crate::domain::{IncidentLevel, IncidentState};
use crate::error::AppError;
use crate::stores::IncidentRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Transitioned,
    NoStateChange,
    AlreadyLockdown,
    Denied,
}

impl TransitionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionOutcome::Transitioned => "escalated_to_lockdown",
            TransitionOutcome::NoStateChange => "no_state_change",
            TransitionOutcome::AlreadyLockdown => "already_lockdown",
            TransitionOutcome::Denied => "transition_denied",
        }
    }
}

fn transition_allowed(from: IncidentLevel, to: IncidentLevel) -> bool {
    use IncidentLevel::*;
    matches!(
        (from, to),
        (Normal, Quarantine)
            | (Normal, Lockdown)
            | (Quarantine, Normal)
            | (Quarantine, Lockdown)
            | (Lockdown, Quarantine)
    )
}

pub struct IncidentService {
    repo: std::sync::Arc<dyn IncidentRepository>,
    clock: std::sync::Arc<dyn Clock>,
}

impl IncidentService {
    pub fn new(repo: std::sync::Arc<dyn IncidentRepository>, clock: std::sync::Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn current_level(&self) -> Result<IncidentLevel, AppError> {
        Ok(self.repo.current().await?.map(|s| s.level).unwrap_or_default())
    }

    pub async fn current_state(&self) -> Result<Option<IncidentState>, AppError> {
        self.repo.current().await
    }

    /// Administered transition (`PUT /admin/incident`). Same-level target is
    /// `no_state_change`; a transition outside §4.6's allowed set is
    /// rejected with `StateError{reason_category: "invalid_transition"}`.
    pub async fn transition(
        &self,
        target: IncidentLevel,
        actor_key_id: Option<String>,
        reason: Option<String>,
    ) -> Result<TransitionOutcome, AppError> {
        let current = self.current_level().await?;
        if current == target {
            return Ok(TransitionOutcome::NoStateChange);
        }
        if !transition_allowed(current, target) {
            return Err(AppError::StateError {
                message: format!("transition {current} -> {target} is not permitted"),
                reason_category: "invalid_transition".into(),
            });
        }
        self.repo
            .append(IncidentState {
                level: target,
                changed_by_key_id: actor_key_id,
                reason,
                changed_at: self.clock.now(),
            })
            .await?;
        Ok(TransitionOutcome::Transitioned)
    }

    /// Forced escalation applied after a crypto-shred. Never rejected by
    /// the caller's intent — the outcome just records what actually
    /// happened, including `transition_denied` when the state machine
    /// itself blocks it (spec.md §9 open-question resolution: the shred
    /// still commits in that case).
    pub async fn force_lockdown(&self, actor_key_id: Option<String>, reason: &str) -> Result<TransitionOutcome, AppError> {
        let current = self.current_level().await?;
        if current == IncidentLevel::Lockdown {
            return Ok(TransitionOutcome::AlreadyLockdown);
        }
        if !transition_allowed(current, IncidentLevel::Lockdown) {
            return Ok(TransitionOutcome::Denied);
        }
        self.repo
            .append(IncidentState {
                level: IncidentLevel::Lockdown,
                changed_by_key_id: actor_key_id,
                reason: Some(reason.to_string()),
                changed_at: self.clock.now(),
            })
            .await?;
        Ok(TransitionOutcome::Transitioned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::stores::InMemoryIncidentRepository;
    use chrono::Utc;

    fn service() -> IncidentService {
        IncidentService::new(
            std::sync::Arc::new(InMemoryIncidentRepository::new()),
            std::sync::Arc::new(FixedClock::new(Utc::now())),
        )
    }

    #[tokio::test]
    async fn defaults_to_normal() {
        let service = service();
        assert_eq!(service.current_level().await.unwrap(), IncidentLevel::Normal);
    }

    #[tokio::test]
    async fn lockdown_to_normal_must_go_through_quarantine() {
        let service = service();
        service.transition(IncidentLevel::Lockdown, None, None).await.unwrap();
        let err = service.transition(IncidentLevel::Normal, None, None).await.unwrap_err();
        assert_eq!(err.reason_category(), "invalid_transition");

        service.transition(IncidentLevel::Quarantine, None, None).await.unwrap();
        let outcome = service.transition(IncidentLevel::Normal, None, None).await.unwrap();
        assert_eq!(outcome, TransitionOutcome::Transitioned);
    }

    #[tokio::test]
    async fn same_level_is_no_state_change() {
        let service = service();
        let outcome = service.transition(IncidentLevel::Normal, None, None).await.unwrap();
        assert_eq!(outcome, TransitionOutcome::NoStateChange);
    }

    #[tokio::test]
    async fn force_lockdown_is_idempotent() {
        let service = service();
        assert_eq!(
            service.force_lockdown(None, "crypto_shred_executed").await.unwrap(),
            TransitionOutcome::Transitioned
        );
        assert_eq!(
            service.force_lockdown(None, "crypto_shred_executed").await.unwrap(),
            TransitionOutcome::AlreadyLockdown
        );
    }
}
