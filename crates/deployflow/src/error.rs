use thiserror::Error;

use crate::schedules::notify::NotificationError;

pub type Result<T, E = ScheduleError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid schedule id: {0}")]
    InvalidId(String),

    #[error("schedule not found")]
    NotFound,

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl ScheduleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable code for logs and API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::InvalidId(_) => "INVALID_ID",
            Self::NotFound => "NOT_FOUND",
            Self::Notification(_) => "NOTIFICATION_FAILED",
            Self::Persistence(_) => "PERSISTENCE",
        }
    }
}
