use async_trait::async_trait;
use serde::Serialize;

use crate::db::PermissionLevel;

/// Something that happened to a user's access on a pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SharingEvent {
    Invited {
        pet_id: String,
        level: PermissionLevel,
        by: String,
    },
    LevelChanged {
        pet_id: String,
        level: PermissionLevel,
        by: String,
    },
    Revoked {
        pet_id: String,
        by: String,
    },
}

impl SharingEvent {
    pub fn message_key(&self) -> &'static str {
        match self {
            SharingEvent::Invited { .. } => "notifications.invited",
            SharingEvent::LevelChanged { .. } => "notifications.level_changed",
            SharingEvent::Revoked { .. } => "notifications.revoked",
        }
    }

    pub fn pet_id(&self) -> &str {
        match self {
            SharingEvent::Invited { pet_id, .. }
            | SharingEvent::LevelChanged { pet_id, .. }
            | SharingEvent::Revoked { pet_id, .. } => pet_id,
        }
    }
}

/// Delivery channel for sharing notifications (push, email, ...).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, user_id: &str, event: &SharingEvent) -> anyhow::Result<()>;
}

/// Sink that only writes the rendered notification to the log.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, user_id: &str, event: &SharingEvent) -> anyhow::Result<()> {
        let level = match event {
            SharingEvent::Invited { level, .. } | SharingEvent::LevelChanged { level, .. } => {
                level.as_str()
            }
            SharingEvent::Revoked { .. } => "",
        };
        let text = crate::i18n::t_with(
            event.message_key(),
            &[("pet", event.pet_id()), ("level", level)],
        );
        tracing::info!("Notify user {}: {}", user_id, text);
        Ok(())
    }
}

/// Deliver a notification without letting a delivery failure escape.
pub async fn notify_best_effort(sink: &dyn NotificationSink, user_id: &str, event: &SharingEvent) {
    if let Err(e) = sink.notify(user_id, event).await {
        tracing::warn!(
            "Failed to deliver {} notification to user {}: {:?}",
            event.message_key(),
            user_id,
            e
        );
    }
}

/// Attachment point for an audit trail of sharing changes.
pub trait AuditHook: Send + Sync {
    fn record(&self, actor_id: &str, target_user_id: &str, event: &SharingEvent);
}

/// Audit hook that records nothing.
pub struct NoAudit;

impl AuditHook for NoAudit {
    fn record(&self, _actor_id: &str, _target_user_id: &str, _event: &SharingEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn notify(&self, _user_id: &str, _event: &SharingEvent) -> anyhow::Result<()> {
            anyhow::bail!("push gateway down")
        }
    }

    #[tokio::test]
    async fn best_effort_swallows_failures() {
        let event = SharingEvent::Revoked {
            pet_id: "p1".to_string(),
            by: "u1".to_string(),
        };
        notify_best_effort(&FailingSink, "u2", &event).await;
        notify_best_effort(&LogNotificationSink, "u2", &event).await;
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = SharingEvent::Invited {
            pet_id: "p1".to_string(),
            level: PermissionLevel::Editor,
            by: "u1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "invited");
        assert_eq!(json["level"], "editor");
    }
}
