pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod schedules;

pub use error::{Result, ScheduleError};
