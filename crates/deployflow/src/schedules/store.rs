use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, ScheduleError};
use crate::schedules::model::{NewSchedule, Schedule, ScheduleStatus};

/// Persistence contract the manager depends on.
///
/// `find_by_id` reports a missing record as `Ok(None)`; `save` and
/// `delete_by_id` report it as `ScheduleError::NotFound`. Everything else the
/// backend fails with is a `ScheduleError::Persistence`.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// All schedules, latest deployment first.
    async fn list(&self) -> Result<Vec<Schedule>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Schedule>>;

    /// Inserts with status `Scheduled` and no notification audit.
    async fn create(&self, new: NewSchedule) -> Result<Schedule>;

    /// Writes every mutable column and bumps `updated_at`.
    async fn save(&self, schedule: &Schedule) -> Result<Schedule>;

    async fn delete_by_id(&self, id: Uuid) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct MemoryScheduleStore {
    rows: Arc<RwLock<HashMap<Uuid, Schedule>>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn list(&self) -> Result<Vec<Schedule>> {
        let mut all: Vec<Schedule> = self.rows.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            b.deployment_date
                .cmp(&a.deployment_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(all)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Schedule>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn create(&self, new: NewSchedule) -> Result<Schedule> {
        let now = Utc::now();
        let schedule = Schedule {
            id: Uuid::new_v4(),
            app_name: new.app_name,
            deployment_date: new.deployment_date,
            time_slot: new.time_slot,
            status: ScheduleStatus::Scheduled,
            developers: new.developers,
            notes: new.notes,
            failure_reason: None,
            developers_notified: false,
            notification_details: None,
            created_at: now,
            updated_at: now,
        };

        self.rows
            .write()
            .await
            .insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn save(&self, schedule: &Schedule) -> Result<Schedule> {
        let mut rows = self.rows.write().await;
        let stored = rows.get_mut(&schedule.id).ok_or(ScheduleError::NotFound)?;

        let created_at = stored.created_at;
        *stored = schedule.clone();
        stored.created_at = created_at;
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        match self.rows.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(ScheduleError::NotFound),
        }
    }
}
