//! Sliding-window threshold rules producing deduplicated alerts (spec.md
//! §4.8).

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::info;

use crate::audit::{AuditChainEngine, NewEvent};
use crate::clock::Clock;
use crate::domain::{Alert, AlertSeverity, AlertStatus};
use crate::error::AppError;
use crate::stores::AlertsRepository;

#[derive(Debug, Clone)]
pub struct MonitoringRule {
    pub rule_id: &'static str,
    pub source_event: &'static str,
    pub threshold: u32,
    pub window_minutes: i64,
    pub severity: AlertSeverity,
    pub reason: &'static str,
}

fn default_rules() -> Vec<MonitoringRule> {
    vec![
        MonitoringRule {
            rule_id: "RESTORE_RESTRICTED_SPIKE",
            source_event: "restore_restricted",
            threshold: 3,
            window_minutes: 10,
            severity: AlertSeverity::High,
            reason: "repeated restore restrictions for the same actor",
        },
        MonitoringRule {
            rule_id: "RESTORE_FAILURE_SPIKE",
            source_event: "restore_failed",
            threshold: 3,
            window_minutes: 10,
            severity: AlertSeverity::Medium,
            reason: "repeated restore failures for the same actor",
        },
    ]
}

pub struct MonitoringService {
    rules: Vec<MonitoringRule>,
    alerts: Arc<dyn AlertsRepository>,
    audit: Arc<AuditChainEngine>,
    clock: Arc<dyn Clock>,
    // local fallback sliding window per (rule_id, actor) when the audit
    // store doesn't support counting (spec.md §4.8, §5)
    local_window: Mutex<HashMap<(String, String), Vec<chrono::DateTime<chrono::Utc>>>>,
}

impl MonitoringService {
    pub fn new(alerts: Arc<dyn AlertsRepository>, audit: Arc<AuditChainEngine>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rules: default_rules(),
            alerts,
            audit,
            clock,
            local_window: Mutex::new(HashMap::new()),
        }
    }

    async fn count_in_window(&self, rule: &MonitoringRule, actor_key_id: Option<&str>, now: chrono::DateTime<chrono::Utc>) -> Result<u32, AppError> {
        let since = now - chrono::Duration::minutes(rule.window_minutes);
        match self.audit.count_since(rule.source_event, actor_key_id, since).await {
            Ok(n) => Ok(n as u32),
            Err(_) => {
                let key = (rule.rule_id.to_string(), actor_key_id.unwrap_or("anonymous").to_string());
                let mut window = self.local_window.lock().await;
                let entry = window.entry(key).or_default();
                entry.retain(|t| *t >= since);
                Ok(entry.len() as u32)
            }
        }
    }

    /// Process one security event, creating (or returning an existing)
    /// deduplicated alert once the matching rule's threshold is crossed.
    pub async fn process_security_event(
        &self,
        source_event: &str,
        actor_key_id: Option<&str>,
        backup_id: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Result<Option<Alert>, AppError> {
        let rule = match self.rules.iter().find(|r| r.source_event == source_event) {
            Some(r) => r,
            None => return Ok(None),
        };

        let now = self.clock.now();
        {
            let key = (rule.rule_id.to_string(), actor_key_id.unwrap_or("anonymous").to_string());
            let mut window = self.local_window.lock().await;
            window.entry(key).or_default().push(now);
        }

        let count = self.count_in_window(rule, actor_key_id, now).await?;
        if count < rule.threshold {
            return Ok(None);
        }

        let window_bucket = (now.timestamp() / 60 / rule.window_minutes) * rule.window_minutes;
        let actor_label = actor_key_id.unwrap_or("anonymous");
        let dedupe_key = hex::encode(Sha256::digest(
            format!("{}:{}:{}", rule.rule_id, actor_label, window_bucket).as_bytes(),
        ));

        if let Some(existing) = self.alerts.get_by_dedupe_key(&dedupe_key).await? {
            return Ok(Some(existing));
        }

        let alert = Alert {
            alert_id: self.clock.new_id(),
            rule_id: rule.rule_id.to_string(),
            severity: rule.severity,
            status: AlertStatus::Open,
            source_event: source_event.to_string(),
            actor_key_id: actor_key_id.map(|s| s.to_string()),
            related_backup_id: backup_id.map(|s| s.to_string()),
            reason: rule.reason.to_string(),
            metadata_json: metadata,
            dedupe_key,
            created_at: now,
            updated_at: None,
        };
        self.alerts.insert(alert.clone()).await?;

        self.audit
            .append(
                NewEvent::new("alert_created", "alert")
                    .resource_id(alert.alert_id.clone())
                    .actor(actor_key_id.map(|s| s.to_string()), None)
                    .status("open")
                    .reason(rule.rule_id),
            )
            .await?;

        info!(rule_id = rule.rule_id, alert_id = %alert.alert_id, "threshold crossed, alert created");
        Ok(Some(alert))
    }

    pub async fn list_alerts(
        &self,
        status: Option<AlertStatus>,
        severity: Option<AlertSeverity>,
    ) -> Result<Vec<Alert>, AppError> {
        self.alerts.list(status, severity).await
    }

    pub async fn set_alert_status(&self, alert_id: &str, target: AlertStatus) -> Result<Alert, AppError> {
        let mut alert = self
            .alerts
            .get(alert_id)
            .await?
            .ok_or_else(|| AppError::NotFound {
                message: format!("alert {alert_id} not found"),
                code: "ALERT_NOT_FOUND",
            })?;

        if !alert.status.can_transition_to(target) {
            return Err(AppError::StateError {
                message: format!("alert transition {:?} -> {:?} is not allowed", alert.status, target),
                reason_category: "alert_status_invalid".into(),
            });
        }

        alert.status = target;
        alert.updated_at = Some(self.clock.now());
        self.alerts.update(alert.clone()).await?;
        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::stores::{InMemoryAlertsRepository, InMemoryAuditRepository};
    use chrono::Utc;

    fn service() -> MonitoringService {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let audit = Arc::new(AuditChainEngine::new(Arc::new(InMemoryAuditRepository::new()), clock.clone(), 10));
        MonitoringService::new(Arc::new(InMemoryAlertsRepository::new()), audit, clock)
    }

    #[tokio::test]
    async fn below_threshold_creates_no_alert() {
        let service = service();
        for _ in 0..2 {
            let result = service
                .process_security_event("restore_restricted", Some("key-1"), None, None)
                .await
                .unwrap();
            assert!(result.is_none());
        }
    }

    #[tokio::test]
    async fn threshold_crossing_creates_alert_and_dedupes() {
        let service = service();
        let mut last = None;
        for _ in 0..4 {
            last = service
                .process_security_event("restore_restricted", Some("key-1"), None, None)
                .await
                .unwrap();
        }
        let alert = last.expect("threshold should have been crossed");
        assert_eq!(alert.status, AlertStatus::Open);

        let again = service
            .process_security_event("restore_restricted", Some("key-1"), None, None)
            .await
            .unwrap()
            .expect("repeated crossing returns the same alert");
        assert_eq!(again.alert_id, alert.alert_id);
    }

    #[tokio::test]
    async fn alert_status_transitions_follow_allowed_set() {
        let service = service();
        for _ in 0..4 {
            service
                .process_security_event("restore_failed", Some("key-2"), None, None)
                .await
                .unwrap();
        }
        let alerts = service.list_alerts(Some(AlertStatus::Open), None).await.unwrap();
        let alert_id = alerts[0].alert_id.clone();

        let acked = service.set_alert_status(&alert_id, AlertStatus::Acknowledged).await.unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);

        let err = service.set_alert_status(&alert_id, AlertStatus::Open).await.unwrap_err();
        assert_eq!(err.reason_category(), "alert_status_invalid");
    }
}
