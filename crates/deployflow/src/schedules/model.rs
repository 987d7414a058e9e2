use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{Result, ScheduleError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleStatus {
    #[default]
    Scheduled,
    #[serde(alias = "In Progress")]
    InProgress,
    Completed,
    Failed,
}

impl ScheduleStatus {
    pub const ALL: [ScheduleStatus; 4] = [
        ScheduleStatus::Scheduled,
        ScheduleStatus::InProgress,
        ScheduleStatus::Completed,
        ScheduleStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "Scheduled",
            ScheduleStatus::InProgress => "InProgress",
            ScheduleStatus::Completed => "Completed",
            ScheduleStatus::Failed => "Failed",
        }
    }

    /// Human label used in notification text.
    pub fn label(&self) -> &'static str {
        match self {
            ScheduleStatus::InProgress => "In Progress",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown schedule status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ScheduleStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "Scheduled" => Ok(ScheduleStatus::Scheduled),
            "InProgress" | "In Progress" => Ok(ScheduleStatus::InProgress),
            "Completed" => Ok(ScheduleStatus::Completed),
            "Failed" => Ok(ScheduleStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Audit record of the most recent successful notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDetails {
    pub sent_at: DateTime<Utc>,
    pub recipients: Vec<String>,
    pub status: ScheduleStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: Uuid,
    pub app_name: String,
    pub deployment_date: DateTime<Utc>,
    pub time_slot: String,
    pub status: ScheduleStatus,
    pub developers: Vec<String>,
    pub notes: Option<String>,
    pub failure_reason: Option<String>,
    pub developers_notified: bool,
    pub notification_details: Option<NotificationDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Records a successful notification. `developers_notified` only ever moves to true.
    pub fn mark_notified(
        &mut self,
        recipients: Vec<String>,
        status: ScheduleStatus,
        at: DateTime<Utc>,
    ) {
        self.developers_notified = true;
        self.notification_details = Some(NotificationDetails {
            sent_at: at,
            recipients,
            status,
        });
    }
}

/// Validated input for inserting a schedule. Status is always `Scheduled` on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
    pub app_name: String,
    pub deployment_date: DateTime<Utc>,
    pub time_slot: String,
    pub developers: Vec<String>,
    pub notes: Option<String>,
}

/// The fields a caller is allowed to set. Any other request key is dropped on
/// deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFields {
    pub app_name: Option<String>,
    pub deployment_date: Option<DateTime<Utc>>,
    #[serde(alias = "timings")]
    pub time_slot: Option<String>,
    pub status: Option<ScheduleStatus>,
    pub notes: Option<String>,
    pub developers: Option<Vec<String>>,
    pub failure_reason: Option<String>,
}

impl ScheduleFields {
    /// Checks the fields that are present. Used for partial updates.
    pub fn validate_present(&self) -> Result<()> {
        if let Some(app_name) = &self.app_name {
            require_text("appName", app_name)?;
        }
        if let Some(time_slot) = &self.time_slot {
            require_text("timeSlot", time_slot)?;
        }
        if let Some(developers) = &self.developers {
            normalize_developers(developers)?;
        }
        Ok(())
    }
}

impl TryFrom<ScheduleFields> for NewSchedule {
    type Error = ScheduleError;

    // `status` and `failureReason` are not accepted on create.
    fn try_from(fields: ScheduleFields) -> Result<Self> {
        let app_name = fields
            .app_name
            .ok_or_else(|| ScheduleError::validation("appName is required"))?;
        let deployment_date = fields
            .deployment_date
            .ok_or_else(|| ScheduleError::validation("deploymentDate is required"))?;
        let time_slot = fields
            .time_slot
            .ok_or_else(|| ScheduleError::validation("timeSlot is required"))?;
        let developers = fields
            .developers
            .ok_or_else(|| ScheduleError::validation("developers is required"))?;

        Ok(NewSchedule {
            app_name: require_text("appName", &app_name)?,
            deployment_date,
            time_slot: require_text("timeSlot", &time_slot)?,
            developers: normalize_developers(&developers)?,
            notes: fields.notes,
        })
    }
}

fn require_text(field: &str, value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ScheduleError::validation(format!("{field} must not be empty")));
    }
    Ok(v.to_string())
}

pub(crate) fn normalize_developers(developers: &[String]) -> Result<Vec<String>> {
    if developers.is_empty() {
        return Err(ScheduleError::validation(
            "developers must contain at least one entry",
        ));
    }
    developers
        .iter()
        .map(|d| require_text("developers entry", d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_accepts_spaced_in_progress() {
        let s: ScheduleStatus = serde_json::from_value(json!("In Progress")).unwrap();
        assert_eq!(s, ScheduleStatus::InProgress);
        assert_eq!("In Progress".parse::<ScheduleStatus>().unwrap(), s);
        assert_eq!(serde_json::to_value(s).unwrap(), json!("InProgress"));
        assert!("Done".parse::<ScheduleStatus>().is_err());
    }

    #[test]
    fn fields_ignore_unknown_keys_and_accept_timings() {
        let fields: ScheduleFields = serde_json::from_value(json!({
            "appName": "Billing",
            "timings": "10:00-11:00",
            "developersNotified": true,
            "id": "not-allowed"
        }))
        .unwrap();

        assert_eq!(fields.app_name.as_deref(), Some("Billing"));
        assert_eq!(fields.time_slot.as_deref(), Some("10:00-11:00"));
        assert!(fields.status.is_none());
    }

    #[test]
    fn new_schedule_requires_developers() {
        let fields = ScheduleFields {
            app_name: Some("Billing".into()),
            deployment_date: Some(Utc::now()),
            time_slot: Some("10:00-11:00".into()),
            developers: Some(vec![]),
            ..Default::default()
        };

        let err = NewSchedule::try_from(fields).unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(_)));
    }

    #[test]
    fn new_schedule_trims_and_drops_status() {
        let fields = ScheduleFields {
            app_name: Some("  Billing ".into()),
            deployment_date: Some(Utc::now()),
            time_slot: Some("10:00-11:00".into()),
            developers: Some(vec![" alice".into(), "bob".into()]),
            status: Some(ScheduleStatus::Failed),
            ..Default::default()
        };

        let new = NewSchedule::try_from(fields).unwrap();
        assert_eq!(new.app_name, "Billing");
        assert_eq!(new.developers, vec!["alice", "bob"]);
    }

    #[test]
    fn partial_fields_reject_blank_app_name() {
        let fields = ScheduleFields {
            app_name: Some("   ".into()),
            ..Default::default()
        };
        assert!(fields.validate_present().is_err());
        assert!(ScheduleFields::default().validate_present().is_ok());
    }
}
