#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use deployflow::schedules::{
    Mailer, MemoryScheduleStore, Notifier, NotifyPolicy, OutgoingMail, ScheduleFields,
    ScheduleManager, TransportError,
};
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Mailer double: records every mail, fails on demand.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(&self, mail: OutgoingMail) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Smtp("connection refused".into()));
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub struct Harness {
    pub manager: ScheduleManager,
    pub mailer: Arc<RecordingMailer>,
    pub store: MemoryScheduleStore,
}

pub fn harness() -> Harness {
    harness_with_policy(NotifyPolicy::default())
}

pub fn harness_with_policy(policy: NotifyPolicy) -> Harness {
    let mailer = Arc::new(RecordingMailer::default());
    let store = MemoryScheduleStore::new();
    let notifier = Notifier::new(mailer.clone(), "Deployment Manager <ops@example.com>");
    let manager = ScheduleManager::new(Arc::new(store.clone()), notifier).with_policy(policy);

    Harness {
        manager,
        mailer,
        store,
    }
}

pub fn deployment_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
}

pub fn billing_fields() -> ScheduleFields {
    ScheduleFields {
        app_name: Some("Billing".into()),
        deployment_date: Some(deployment_date()),
        time_slot: Some("10:00-11:00".into()),
        developers: Some(vec!["alice".into(), "bob".into()]),
        ..Default::default()
    }
}

/// Connects to TEST_DATABASE_URL, migrates and truncates. None when unset, so
/// the Postgres tests are skipped on machines without a database.
pub async fn setup_db() -> Option<PgPool> {
    let _ = dotenvy::dotenv();

    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            eprintln!("TEST_DATABASE_URL not set; skipping postgres test");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    sqlx::query("TRUNCATE TABLE schedules")
        .execute(&pool)
        .await
        .expect("truncate failed");

    Some(pool)
}
