pub mod manager;
pub mod model;
pub mod notify;
pub mod repo;
pub mod store;

pub use manager::{DeliveryEvent, DeliveryOutcome, NotifyPolicy, NotifyTrigger, ScheduleManager};
pub use model::{NewSchedule, NotificationDetails, Schedule, ScheduleFields, ScheduleStatus};
pub use notify::{Mailer, NotificationError, Notifier, OutgoingMail, TransportError};
pub use repo::SchedulesRepo;
pub use store::{MemoryScheduleStore, ScheduleStore};
