mod common;

use common::{billing_fields, harness, harness_with_policy};
use deployflow::schedules::{
    DeliveryOutcome, NotifyPolicy, NotifyTrigger, ScheduleFields, ScheduleStatus, ScheduleStore,
};
use deployflow::ScheduleError;
use uuid::Uuid;

#[tokio::test]
async fn create_forces_scheduled_and_notifies_developers() {
    let h = harness();
    let mut deliveries = h.manager.subscribe();

    let mut fields = billing_fields();
    fields.status = Some(ScheduleStatus::Completed);

    let created = h.manager.create(fields).await.unwrap();

    assert_eq!(created.status, ScheduleStatus::Scheduled);
    assert!(created.developers_notified);
    let details = created.notification_details.as_ref().unwrap();
    assert_eq!(details.status, ScheduleStatus::Scheduled);
    assert_eq!(details.recipients, vec!["alice", "bob"]);

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["alice", "bob"]);
    assert!(sent[0].subject.contains("Deployment Scheduled: Billing"));

    let event = deliveries.try_recv().unwrap();
    assert_eq!(event.trigger, NotifyTrigger::Create);
    assert_eq!(event.outcome, DeliveryOutcome::Sent);

    let stored = h.store.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored, created);
}

#[tokio::test]
async fn create_succeeds_when_mail_transport_fails() {
    let h = harness();
    h.mailer.set_failing(true);
    let mut deliveries = h.manager.subscribe();

    let created = h.manager.create(billing_fields()).await.unwrap();

    assert_eq!(created.status, ScheduleStatus::Scheduled);
    assert!(!created.developers_notified);
    assert!(created.notification_details.is_none());
    assert_eq!(h.store.len().await, 1);

    let event = deliveries.try_recv().unwrap();
    assert!(matches!(event.outcome, DeliveryOutcome::Failed(_)));
}

#[tokio::test]
async fn create_rejects_missing_required_fields() {
    let h = harness();

    let mut fields = billing_fields();
    fields.time_slot = None;
    let err = h.manager.create(fields).await.unwrap_err();

    assert!(matches!(err, ScheduleError::Validation(_)));
    assert!(h.store.is_empty().await);
    assert_eq!(h.mailer.count(), 0);
}

#[tokio::test]
async fn status_change_to_failed_stores_reason_and_notifies() {
    let h = harness();
    let created = h.manager.create(billing_fields()).await.unwrap();
    let mut deliveries = h.manager.subscribe();

    let updated = h
        .manager
        .update(
            created.id,
            ScheduleFields {
                status: Some(ScheduleStatus::Failed),
                failure_reason: Some("build broke".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, ScheduleStatus::Failed);
    assert_eq!(updated.failure_reason.as_deref(), Some("build broke"));
    let details = updated.notification_details.as_ref().unwrap();
    assert_eq!(details.status, ScheduleStatus::Failed);

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].subject.starts_with("[Failed] Deployment Failed"));
    assert!(sent[1].html_body.contains("build broke"));

    let event = deliveries.try_recv().unwrap();
    assert_eq!(event.trigger, NotifyTrigger::StatusChange);
    assert_eq!(event.status, ScheduleStatus::Failed);
}

#[tokio::test]
async fn failure_reason_ignored_unless_moving_to_failed() {
    let h = harness();
    let created = h.manager.create(billing_fields()).await.unwrap();

    let updated = h
        .manager
        .update(
            created.id,
            ScheduleFields {
                status: Some(ScheduleStatus::InProgress),
                failure_reason: Some("not a failure".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, ScheduleStatus::InProgress);
    assert!(updated.failure_reason.is_none());
}

#[tokio::test]
async fn same_status_and_developers_leaves_notification_details_alone() {
    let h = harness();
    let created = h.manager.create(billing_fields()).await.unwrap();
    let before = created.notification_details.clone();

    let updated = h
        .manager
        .update(
            created.id,
            ScheduleFields {
                status: Some(ScheduleStatus::Scheduled),
                developers: Some(vec!["alice".into(), "bob".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.notification_details, before);
    assert_eq!(h.mailer.count(), 1);
}

#[tokio::test]
async fn notes_only_update_sends_nothing() {
    let h = harness();
    let created = h.manager.create(billing_fields()).await.unwrap();
    let mut deliveries = h.manager.subscribe();

    let updated = h
        .manager
        .update(
            created.id,
            ScheduleFields {
                notes: Some("re-run at noon".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.notes.as_deref(), Some("re-run at noon"));
    assert_eq!(updated.notification_details, created.notification_details);
    assert_eq!(h.mailer.count(), 1);
    assert!(deliveries.try_recv().is_err());
}

#[tokio::test]
async fn status_persists_when_notification_fails() {
    let h = harness();
    let created = h.manager.create(billing_fields()).await.unwrap();
    h.mailer.set_failing(true);

    let updated = h
        .manager
        .update(
            created.id,
            ScheduleFields {
                status: Some(ScheduleStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, ScheduleStatus::Completed);

    let stored = h.store.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScheduleStatus::Completed);
    // flag never reverts, details still describe the last successful send
    assert!(stored.developers_notified);
    assert_eq!(
        stored.notification_details.unwrap().status,
        ScheduleStatus::Scheduled
    );
}

#[tokio::test]
async fn developers_change_notifies_at_current_status() {
    let h = harness();
    let created = h.manager.create(billing_fields()).await.unwrap();
    let mut deliveries = h.manager.subscribe();

    let updated = h
        .manager
        .update(
            created.id,
            ScheduleFields {
                developers: Some(vec!["alice".into(), "carol".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let details = updated.notification_details.unwrap();
    assert_eq!(details.status, ScheduleStatus::Scheduled);
    assert_eq!(details.recipients, vec!["alice", "carol"]);
    assert_eq!(h.mailer.count(), 2);

    let event = deliveries.try_recv().unwrap();
    assert_eq!(event.trigger, NotifyTrigger::DevelopersChange);
}

#[tokio::test]
async fn developers_change_is_silent_when_policy_disabled() {
    let h = harness_with_policy(NotifyPolicy {
        notify_on_developers_change: false,
    });
    let created = h.manager.create(billing_fields()).await.unwrap();

    let updated = h
        .manager
        .update(
            created.id,
            ScheduleFields {
                developers: Some(vec!["carol".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.developers, vec!["carol"]);
    assert_eq!(updated.notification_details, created.notification_details);
    assert_eq!(h.mailer.count(), 1);
}

#[tokio::test]
async fn status_and_developers_change_together_send_once() {
    let h = harness();
    let created = h.manager.create(billing_fields()).await.unwrap();

    let updated = h
        .manager
        .update(
            created.id,
            ScheduleFields {
                status: Some(ScheduleStatus::InProgress),
                developers: Some(vec!["dave".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(h.mailer.count(), 2);
    let details = updated.notification_details.unwrap();
    assert_eq!(details.status, ScheduleStatus::InProgress);
    assert_eq!(details.recipients, vec!["dave"]);
    assert_eq!(h.mailer.sent()[1].to, vec!["dave"]);
}

#[tokio::test]
async fn update_unknown_id_is_not_found() {
    let h = harness();

    let err = h
        .manager
        .update(Uuid::new_v4(), ScheduleFields::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ScheduleError::NotFound));
}

#[tokio::test]
async fn update_rejects_empty_developers() {
    let h = harness();
    let created = h.manager.create(billing_fields()).await.unwrap();

    let err = h
        .manager
        .update(
            created.id,
            ScheduleFields {
                developers: Some(vec![]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ScheduleError::Validation(_)));
    let stored = h.store.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(stored.developers, vec!["alice", "bob"]);
}

#[tokio::test]
async fn every_status_transition_is_allowed() {
    let h = harness();
    let created = h.manager.create(billing_fields()).await.unwrap();

    let path = [
        ScheduleStatus::Completed,
        ScheduleStatus::Scheduled,
        ScheduleStatus::Failed,
        ScheduleStatus::InProgress,
    ];
    for status in path {
        let updated = h
            .manager
            .update(
                created.id,
                ScheduleFields {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, status);
        assert_eq!(updated.notification_details.unwrap().status, status);
    }

    assert_eq!(h.mailer.count(), 1 + path.len());
}
