// crates/deployflow/src/schedules/manager.rs
//
// Every schedule mutation goes through here. The stored state is the primary
// result; notification delivery is reported separately on the delivery channel
// and only fails the call on the manual notify path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{Result, ScheduleError};
use crate::schedules::model::{
    normalize_developers, NewSchedule, Schedule, ScheduleFields, ScheduleStatus,
};
use crate::schedules::notify::{NotificationError, Notifier};
use crate::schedules::store::ScheduleStore;

const DELIVERY_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyPolicy {
    /// Re-send the current status when an update changes the developer list
    /// but not the status.
    pub notify_on_developers_change: bool,
}

impl Default for NotifyPolicy {
    fn default() -> Self {
        Self {
            notify_on_developers_change: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyTrigger {
    Create,
    StatusChange,
    DevelopersChange,
    Manual,
}

impl NotifyTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyTrigger::Create => "create",
            NotifyTrigger::StatusChange => "status_change",
            NotifyTrigger::DevelopersChange => "developers_change",
            NotifyTrigger::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed(String),
}

/// One notification attempt, as seen on the delivery channel.
#[derive(Debug, Clone)]
pub struct DeliveryEvent {
    pub schedule_id: Uuid,
    pub trigger: NotifyTrigger,
    pub status: ScheduleStatus,
    pub recipients: Vec<String>,
    pub outcome: DeliveryOutcome,
    pub at: DateTime<Utc>,
}

impl DeliveryEvent {
    pub fn is_sent(&self) -> bool {
        self.outcome == DeliveryOutcome::Sent
    }
}

#[derive(Clone)]
pub struct ScheduleManager {
    store: Arc<dyn ScheduleStore>,
    notifier: Notifier,
    policy: NotifyPolicy,
    deliveries: broadcast::Sender<DeliveryEvent>,
}

impl ScheduleManager {
    pub fn new(store: Arc<dyn ScheduleStore>, notifier: Notifier) -> Self {
        let (deliveries, _) = broadcast::channel(DELIVERY_CHANNEL_CAPACITY);
        Self {
            store,
            notifier,
            policy: NotifyPolicy::default(),
            deliveries,
        }
    }

    pub fn with_policy(mut self, policy: NotifyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> NotifyPolicy {
        self.policy
    }

    /// Stream of delivery attempts made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.deliveries.subscribe()
    }

    pub async fn list(&self) -> Result<Vec<Schedule>> {
        self.store.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Schedule> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(ScheduleError::NotFound)
    }

    /// Inserts a new schedule as `Scheduled` (any caller status is ignored)
    /// and sends the initial notification. A failed send is logged only.
    pub async fn create(&self, fields: ScheduleFields) -> Result<Schedule> {
        let new = NewSchedule::try_from(fields)?;
        let mut schedule = self.store.create(new).await?;

        tracing::info!(schedule_id = %schedule.id, app = %schedule.app_name, "schedule created");

        if let Ok(recipients) = self
            .attempt(&schedule, ScheduleStatus::Scheduled, NotifyTrigger::Create)
            .await
        {
            schedule.mark_notified(recipients, ScheduleStatus::Scheduled, Utc::now());
            schedule = self.store.save(&schedule).await?;
        }

        Ok(schedule)
    }

    /// Applies a partial update. A status change notifies at the new status;
    /// with an unchanged status, a changed developer list notifies at the
    /// current status when the policy allows it. A failed send is logged only.
    pub async fn update(&self, id: Uuid, fields: ScheduleFields) -> Result<Schedule> {
        fields.validate_present()?;

        let mut schedule = self.get(id).await?;

        // captured before any field is applied
        let original_status = schedule.status;
        let original_developers = schedule.developers.clone();

        let ScheduleFields {
            app_name,
            deployment_date,
            time_slot,
            status,
            notes,
            developers,
            failure_reason,
        } = fields;

        if let Some(app_name) = app_name {
            schedule.app_name = app_name.trim().to_string();
        }
        if let Some(deployment_date) = deployment_date {
            schedule.deployment_date = deployment_date;
        }
        if let Some(time_slot) = time_slot {
            schedule.time_slot = time_slot.trim().to_string();
        }
        if let Some(notes) = notes {
            schedule.notes = Some(notes);
        }
        if let Some(developers) = developers {
            schedule.developers = normalize_developers(&developers)?;
        }

        let status_change = status.filter(|s| *s != original_status);
        if let Some(new_status) = status_change {
            schedule.status = new_status;
            if new_status == ScheduleStatus::Failed {
                schedule.failure_reason = failure_reason;
            }
        }

        let mut schedule = self.store.save(&schedule).await?;

        if let Some(new_status) = status_change {
            tracing::info!(
                schedule_id = %schedule.id,
                from = %original_status,
                to = %new_status,
                "schedule status changed"
            );
        }

        let pending = match status_change {
            Some(new_status) => Some((new_status, NotifyTrigger::StatusChange)),
            None if self.policy.notify_on_developers_change
                && schedule.developers != original_developers =>
            {
                Some((schedule.status, NotifyTrigger::DevelopersChange))
            }
            None => None,
        };

        if let Some((target, trigger)) = pending {
            if let Ok(recipients) = self.attempt(&schedule, target, trigger).await {
                schedule.mark_notified(recipients, target, Utc::now());
                schedule = self.store.save(&schedule).await?;
            }
        }

        Ok(schedule)
    }

    /// Re-sends the current status. Unlike create/update, a failed send is
    /// the result of this call.
    pub async fn notify(&self, id: Uuid) -> Result<Schedule> {
        let mut schedule = self.get(id).await?;
        let target = schedule.status;

        let recipients = self.attempt(&schedule, target, NotifyTrigger::Manual).await?;

        schedule.mark_notified(recipients, target, Utc::now());
        self.store.save(&schedule).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.get(id).await?;
        self.store.delete_by_id(id).await?;
        tracing::info!(schedule_id = %id, "schedule deleted");
        Ok(())
    }

    async fn attempt(
        &self,
        schedule: &Schedule,
        target: ScheduleStatus,
        trigger: NotifyTrigger,
    ) -> std::result::Result<Vec<String>, NotificationError> {
        let result = self.notifier.notify(schedule, target).await;

        let outcome = match &result {
            Ok(recipients) => {
                tracing::info!(
                    schedule_id = %schedule.id,
                    status = %target,
                    trigger = trigger.as_str(),
                    recipients = recipients.len(),
                    "deployment notification sent"
                );
                DeliveryOutcome::Sent
            }
            Err(e) => {
                tracing::warn!(
                    schedule_id = %schedule.id,
                    status = %target,
                    trigger = trigger.as_str(),
                    error = %e,
                    "deployment notification failed"
                );
                DeliveryOutcome::Failed(e.to_string())
            }
        };

        // no subscribers is fine
        let _ = self.deliveries.send(DeliveryEvent {
            schedule_id: schedule.id,
            trigger,
            status: target,
            recipients: schedule.developers.clone(),
            outcome,
            at: Utc::now(),
        });

        result
    }
}
