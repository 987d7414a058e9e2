// crates/deployflow/src/schedules/repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Result, ScheduleError};
use crate::schedules::model::{NewSchedule, NotificationDetails, Schedule, ScheduleStatus};
use crate::schedules::store::ScheduleStore;

const SCHEDULE_COLUMNS: &str = r#"
    id, app_name, deployment_date, time_slot, status, developers,
    notes, failure_reason,
    developers_notified,
    notification_sent_at, notification_recipients, notification_status,
    created_at, updated_at
"#;

#[derive(Debug, Clone, sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    app_name: String,
    deployment_date: DateTime<Utc>,
    time_slot: String,
    status: String,
    developers: Vec<String>,
    notes: Option<String>,
    failure_reason: Option<String>,
    developers_notified: bool,
    notification_sent_at: Option<DateTime<Utc>>,
    notification_recipients: Option<Vec<String>>,
    notification_status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ScheduleRow> for Schedule {
    type Error = sqlx::Error;

    fn try_from(row: ScheduleRow) -> std::result::Result<Self, Self::Error> {
        let status: ScheduleStatus = row
            .status
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        // all three audit columns are written together
        let notification_details = match (
            row.notification_sent_at,
            row.notification_recipients,
            row.notification_status,
        ) {
            (Some(sent_at), Some(recipients), Some(st)) => Some(NotificationDetails {
                sent_at,
                recipients,
                status: st.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            }),
            _ => None,
        };

        Ok(Schedule {
            id: row.id,
            app_name: row.app_name,
            deployment_date: row.deployment_date,
            time_slot: row.time_slot,
            status,
            developers: row.developers,
            notes: row.notes,
            failure_reason: row.failure_reason,
            developers_notified: row.developers_notified,
            notification_details,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct SchedulesRepo {
    pool: PgPool,
}

impl SchedulesRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schedules")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Removes every schedule. Operator and test helper.
    pub async fn truncate(&self) -> Result<()> {
        sqlx::query("TRUNCATE TABLE schedules")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for SchedulesRepo {
    async fn list(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, ScheduleRow>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules ORDER BY deployment_date DESC, created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| Schedule::try_from(r).map_err(ScheduleError::from))
            .collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Schedule>> {
        let row = sqlx::query_as::<_, ScheduleRow>(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Schedule::try_from).transpose()?)
    }

    async fn create(&self, new: NewSchedule) -> Result<Schedule> {
        let row = sqlx::query_as::<_, ScheduleRow>(&format!(
            r#"
            INSERT INTO schedules (app_name, deployment_date, time_slot, status, developers, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SCHEDULE_COLUMNS}
            "#
        ))
        .bind(&new.app_name)
        .bind(new.deployment_date)
        .bind(&new.time_slot)
        .bind(ScheduleStatus::Scheduled.as_str())
        .bind(&new.developers)
        .bind(&new.notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(Schedule::try_from(row)?)
    }

    async fn save(&self, schedule: &Schedule) -> Result<Schedule> {
        let details = schedule.notification_details.as_ref();

        let row = sqlx::query_as::<_, ScheduleRow>(&format!(
            r#"
            UPDATE schedules
            SET app_name = $2,
                deployment_date = $3,
                time_slot = $4,
                status = $5,
                developers = $6,
                notes = $7,
                failure_reason = $8,
                developers_notified = $9,
                notification_sent_at = $10,
                notification_recipients = $11,
                notification_status = $12,
                updated_at = now()
            WHERE id = $1
            RETURNING {SCHEDULE_COLUMNS}
            "#
        ))
        .bind(schedule.id)
        .bind(&schedule.app_name)
        .bind(schedule.deployment_date)
        .bind(&schedule.time_slot)
        .bind(schedule.status.as_str())
        .bind(&schedule.developers)
        .bind(&schedule.notes)
        .bind(&schedule.failure_reason)
        .bind(schedule.developers_notified)
        .bind(details.map(|d| d.sent_at))
        .bind(details.map(|d| d.recipients.clone()))
        .bind(details.map(|d| d.status.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Schedule::try_from(row)?),
            None => Err(ScheduleError::NotFound),
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        let res = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 0 {
            return Err(ScheduleError::NotFound);
        }
        Ok(())
    }
}
