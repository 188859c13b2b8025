//! Member, application and payment flows against the in-memory store

mod common;

use chrono::Duration;
use common::{TestApp, cash, fixture_member, new_application, new_member, utc};
use kb_server::db::{MemberRepository, RepoError};
use rust_decimal::Decimal;
use shared::error::ErrorCode;
use shared::models::{
    MemberStatus, MemberUpdate, MembershipRenewal, MembershipType, NewNotification,
    NotificationTarget, NotificationType, PaymentMethod, PaymentStatus, PaymentType,
};

#[tokio::test]
async fn test_create_member_starts_pending_with_computed_end_date() {
    let app = TestApp::new(utc(2026, 1, 31));
    let member = app
        .state
        .services
        .members
        .create_member(new_member("Dana Reyes", "  Dana@Example.COM", Some(MembershipType::Gold), None))
        .await
        .unwrap();

    assert_eq!(member.member_id, "KB-M01");
    assert_eq!(member.email, "dana@example.com");
    assert_eq!(member.member_status, MemberStatus::Pending);
    assert_eq!(member.membership_duration, 3);
    assert_eq!(member.start_date, utc(2026, 1, 31));
    // Month arithmetic clamps to the last day of April
    assert_eq!(member.end_date, utc(2026, 4, 30));

    let welcome = app.mailer.sent_to("dana@example.com");
    assert_eq!(welcome.len(), 1);
    assert!(welcome[0].html.contains("KB-M01"));

    let second = app.member("Eli Moss", "eli@example.com", MembershipType::Silver).await;
    assert_eq!(second.member_id, "KB-M02");
}

#[tokio::test]
async fn test_membership_type_inferred_from_duration() {
    let app = TestApp::new(utc(2026, 2, 1));
    let member = app
        .state
        .services
        .members
        .create_member(new_member("Ivy Chen", "ivy@example.com", None, Some(12)))
        .await
        .unwrap();
    assert_eq!(member.membership_type, MembershipType::Platinum);
    assert_eq!(member.end_date, utc(2027, 2, 1));

    let err = app
        .state
        .services
        .members
        .create_member(new_member("Bo Lind", "bo@example.com", Some(MembershipType::Gold), Some(6)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidMembershipType);

    let err = app
        .state
        .services
        .members
        .create_member(new_member("Bo Lind", "bo@example.com", None, None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidMembershipType);
}

#[tokio::test]
async fn test_duplicate_email_rejected_against_members_and_pending_applications() {
    let app = TestApp::new(utc(2026, 3, 1));
    app.member("Dana Reyes", "dana@example.com", MembershipType::Gold).await;

    let err = app
        .state
        .services
        .members
        .create_member(new_member("Dana R", "DANA@example.com", Some(MembershipType::Silver), None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemberEmailExists);
    assert_eq!(err.to_string(), "A member with this email already exists");

    app.state
        .services
        .applications
        .submit(new_application("Kai Ono", "kai@example.com", MembershipType::Diamond))
        .await
        .unwrap();
    let err = app
        .state
        .services
        .members
        .create_member(new_member("Kai Ono", "kai@example.com", Some(MembershipType::Gold), None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ApplicationPending);

    let err = app
        .state
        .services
        .applications
        .submit(new_application("Kai Ono", "Kai@Example.com", MembershipType::Gold))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ApplicationPending);

    let err = app
        .state
        .services
        .applications
        .submit(new_application("Dana", "dana@example.com", MembershipType::Gold))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemberEmailExists);
}

#[tokio::test]
async fn test_invalid_payload_fails_validation() {
    let app = TestApp::new(utc(2026, 3, 1));
    let err = app
        .state
        .services
        .members
        .create_member(new_member("", "not-an-email", Some(MembershipType::Gold), None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationFailed);
    assert_eq!(app.store.member_count(), 0);
}

#[tokio::test]
async fn test_accepting_application_converts_to_pending_member() {
    let app = TestApp::new(utc(2026, 4, 10));
    let applications = &app.state.services.applications;

    let application = applications
        .submit(new_application("Noor Haddad", "Noor@Example.com", MembershipType::Diamond))
        .await
        .unwrap();
    assert_eq!(application.application_id, "KB-APP01");
    assert_eq!(application.email, "noor@example.com");

    let member = applications.accept(&application.application_id).await.unwrap();
    assert_eq!(member.member_id, "KB-M01");
    assert_eq!(member.email, "noor@example.com");
    assert_eq!(member.member_status, MemberStatus::Pending);
    assert_eq!(member.end_date, utc(2026, 10, 10));

    // The application row is gone; exactly one member holds the email
    assert_eq!(app.store.application_count(), 0);
    assert_eq!(app.store.member_count(), 1);
    let err = applications.get(&application.application_id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ApplicationNotFound);

    // The audit copy survives
    let history = applications.history("NOOR@example.com").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].application_id, "KB-APP01");

    let accepted: Vec<_> = app
        .store
        .notifications()
        .into_iter()
        .filter(|n| n.notification_type == NotificationType::ApplicationAccepted)
        .collect();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].target, NotificationTarget::Member("KB-M01".to_string()));
    assert_eq!(accepted[0].additional_context["application_id"], "KB-APP01");

    let subjects: Vec<String> = app
        .mailer
        .sent_to("noor@example.com")
        .into_iter()
        .map(|e| e.subject)
        .collect();
    assert_eq!(
        subjects,
        vec![
            "We received your membership application".to_string(),
            "Your membership application was accepted".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_rejected_application_cannot_be_processed_again() {
    let app = TestApp::new(utc(2026, 4, 10));
    let applications = &app.state.services.applications;
    let application = applications
        .submit(new_application("Omar Said", "omar@example.com", MembershipType::Silver))
        .await
        .unwrap();

    let rejected = applications
        .reject(&application.application_id, Some("Incomplete details".to_string()))
        .await
        .unwrap();
    assert_eq!(
        rejected.application_status,
        shared::models::ApplicationStatus::Rejected
    );
    assert!(
        app.mailer.sent_to("omar@example.com")[1]
            .html
            .contains("Incomplete details")
    );

    let err = applications.accept(&application.application_id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ApplicationAlreadyProcessed);
    let err = applications
        .reject(&application.application_id, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ApplicationAlreadyProcessed);

    // A rejected application no longer blocks a fresh one
    applications
        .submit(new_application("Omar Said", "omar@example.com", MembershipType::Gold))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_payment_activates_member_and_mirrors_entry() {
    let app = TestApp::new(utc(2026, 5, 1));
    let member = app.member("Ada Park", "ada@example.com", MembershipType::Gold).await;
    let payments = &app.state.services.payments;

    let payment = payments.record(&member.member_id, cash(120)).await.unwrap();
    assert_eq!(payment.payment_id, "KBP0001");

    let stored = app.store.member(&member.member_id).unwrap();
    assert_eq!(stored.member_status, MemberStatus::Active);
    assert_eq!(stored.payments.len(), 1);
    assert_eq!(stored.payments[0].payment_id, "KBP0001");
    assert_eq!(stored.last_payment_date, Some(utc(2026, 5, 1)));

    let received = app
        .store
        .notifications()
        .into_iter()
        .filter(|n| n.notification_type == NotificationType::PaymentReceived)
        .count();
    assert_eq!(received, 1);
    assert!(
        app.mailer
            .sent_to("ada@example.com")
            .iter()
            .any(|e| e.subject == "Payment received")
    );
}

#[tokio::test]
async fn test_payment_reapplied_when_member_changes_underneath() {
    let app = TestApp::new(utc(2026, 5, 1));
    let member = app.member("Noor Aziz", "noor@example.com", MembershipType::Gold).await;
    app.store.interleave_write(&member.member_id, |m| {
        m.phone = Some("+1 555 0199".to_string());
        m.payment_reminder_count = 1;
    });

    let payment = app
        .state
        .services
        .payments
        .record(&member.member_id, cash(120))
        .await
        .unwrap();

    let stored = app.store.member(&member.member_id).unwrap();
    assert_eq!(stored.member_status, MemberStatus::Active);
    assert_eq!(stored.payments.len(), 1);
    assert_eq!(stored.payments[0].payment_id, payment.payment_id);
    // The other writer's changes survive
    assert_eq!(stored.phone.as_deref(), Some("+1 555 0199"));
    assert_eq!(stored.payment_reminder_count, 1);
    assert_eq!(stored.version, 2);
    assert_eq!(app.store.payments_of(&member.member_id).len(), 1);
}

#[tokio::test]
async fn test_stale_member_write_is_rejected() {
    let app = TestApp::new(utc(2026, 5, 1));
    let member = app.member("Lea Voss", "lea@example.com", MembershipType::Silver).await;
    let mut stale = app.store.member(&member.member_id).unwrap();

    app.state
        .services
        .payments
        .record(&member.member_id, cash(40))
        .await
        .unwrap();

    stale.name = "Lea Voss-Hart".to_string();
    let err = app.store.update_member(&mut stale).await.unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
    assert_eq!(stale.version, 0);

    let stored = app.store.member(&member.member_id).unwrap();
    assert_eq!(stored.name, "Lea Voss");
    assert_eq!(stored.member_status, MemberStatus::Active);

    // Admin edits racing a write surface as a retryable error
    app.store
        .interleave_write(&member.member_id, |m| m.phone = None);
    let err = app
        .state
        .services
        .members
        .update(
            &member.member_id,
            MemberUpdate {
                name: Some("Lea Hart".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemberModified);
    assert_eq!(app.store.member(&member.member_id).unwrap().name, "Lea Voss");
}

#[tokio::test]
async fn test_payment_amount_required() {
    let app = TestApp::new(utc(2026, 5, 1));
    let member = app.member("Ada Park", "ada@example.com", MembershipType::Gold).await;
    let payments = &app.state.services.payments;

    let mut missing = cash(0);
    missing.amount = None;
    for payload in [missing, cash(0), cash(-5)] {
        let err = payments.record(&member.member_id, payload).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentAmountRequired);
        assert_eq!(err.to_string(), "Payment amount is required");
    }

    let err = payments.record("KB-M99", cash(10)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemberNotFound);
}

#[tokio::test]
async fn test_duplicate_payment_window_is_sixty_seconds_inclusive() {
    let app = TestApp::new(utc(2026, 5, 1));
    let member = app.member("Ada Park", "ada@example.com", MembershipType::Gold).await;
    let payments = &app.state.services.payments;

    payments.record(&member.member_id, cash(50)).await.unwrap();

    app.clock.advance(Duration::seconds(60));
    let err = payments.record(&member.member_id, cash(50)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicatePayment);
    assert_eq!(err.to_string(), "Duplicate payment detected");

    // Different amount or type is not a duplicate
    payments.record(&member.member_id, cash(51)).await.unwrap();
    let mut product = cash(50);
    product.payment_type = PaymentType::Product;
    payments.record(&member.member_id, product).await.unwrap();

    app.clock.advance(Duration::seconds(1));
    let err = payments.record(&member.member_id, cash(51)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicatePayment);

    app.clock.advance(Duration::seconds(60));
    payments.record(&member.member_id, cash(50)).await.unwrap();
    assert_eq!(app.store.payments_of(&member.member_id).len(), 4);
}

#[tokio::test]
async fn test_payment_status_and_delete_keep_member_in_sync() {
    let app = TestApp::new(utc(2026, 5, 1));
    let member = app.member("Ada Park", "ada@example.com", MembershipType::Gold).await;
    let payments = &app.state.services.payments;

    let first = payments.record(&member.member_id, cash(30)).await.unwrap();
    app.clock.advance(Duration::days(2));
    let second = payments.record(&member.member_id, cash(45)).await.unwrap();

    let updated = payments
        .update_status(&second.payment_id, PaymentStatus::Refunded)
        .await
        .unwrap();
    assert_eq!(updated.status, PaymentStatus::Refunded);
    let stored = app.store.member(&member.member_id).unwrap();
    let entry = stored
        .payments
        .iter()
        .find(|e| e.payment_id == second.payment_id)
        .unwrap();
    assert_eq!(entry.status, PaymentStatus::Refunded);

    payments.delete(&second.payment_id).await.unwrap();
    let stored = app.store.member(&member.member_id).unwrap();
    assert_eq!(stored.payments.len(), 1);
    assert_eq!(stored.last_payment_date, Some(first.payment_date));

    let err = payments.get(&second.payment_id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PaymentNotFound);
    let err = payments.delete(&second.payment_id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PaymentNotFound);

    assert_eq!(
        payments
            .list_for_member(&member.member_id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_renewal_extends_previous_end_date_even_when_expired() {
    let app = TestApp::new(utc(2026, 6, 15));
    let mut expired = fixture_member("KB-M05", "lapsed@example.com", utc(2026, 5, 1));
    expired.member_status = MemberStatus::Expired;
    expired.expiry_reminder_count = 4;
    app.store.put_member(expired);

    let renewed = app
        .state
        .services
        .members
        .renew(
            "KB-M05",
            MembershipRenewal {
                membership_type: Some(MembershipType::Gold),
                membership_duration: None,
                amount: Decimal::new(9900, 2),
                payment_method: PaymentMethod::Card,
                notes: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(renewed.member_status, MemberStatus::Active);
    assert_eq!(renewed.start_date, utc(2026, 5, 1));
    assert_eq!(renewed.end_date, utc(2026, 8, 1));
    assert_eq!(renewed.expiry_reminder_count, 0);
    assert_eq!(renewed.renewal_history.len(), 1);
    assert_eq!(renewed.renewal_history[0].previous.end_date, utc(2026, 5, 1));
    assert_eq!(
        renewed.renewal_history[0].payment_id.as_deref(),
        Some("KBP0001")
    );

    let stored = app.store.member("KB-M05").unwrap();
    assert_eq!(stored.end_date, utc(2026, 8, 1));
    assert_eq!(stored.payments.len(), 1);
    assert_eq!(app.store.payments_of("KB-M05").len(), 1);
    assert!(
        app.store
            .notifications()
            .iter()
            .any(|n| n.notification_type == NotificationType::MembershipRenewed)
    );
    assert!(
        app.mailer
            .sent_to("lapsed@example.com")
            .iter()
            .any(|e| e.subject == "Your membership was renewed")
    );

    let err = app
        .state
        .services
        .members
        .renew(
            "KB-M05",
            MembershipRenewal {
                membership_type: None,
                membership_duration: None,
                amount: Decimal::ZERO,
                payment_method: PaymentMethod::Cash,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PaymentAmountRequired);
}

#[tokio::test]
async fn test_cancel_twice_fails_without_mutation() {
    let app = TestApp::new(utc(2026, 7, 1));
    let member = app.member("Rui Costa", "rui@example.com", MembershipType::Silver).await;
    let members = &app.state.services.members;

    let cancelled = members
        .cancel(&member.member_id, Some("Moving away".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.member_status, MemberStatus::Cancelled);
    assert_eq!(cancelled.cancellation_date, Some(utc(2026, 7, 1)));

    app.clock.advance(Duration::days(1));
    let err = members.cancel(&member.member_id, None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::MembershipAlreadyCancelled);
    assert_eq!(err.to_string(), "Membership is already cancelled");

    let stored = app.store.member(&member.member_id).unwrap();
    assert_eq!(stored.cancellation_reason.as_deref(), Some("Moving away"));
    assert_eq!(stored.cancellation_date, Some(utc(2026, 7, 1)));
    let cancellations = app
        .store
        .notifications()
        .into_iter()
        .filter(|n| n.notification_type == NotificationType::MembershipCancelled)
        .count();
    assert_eq!(cancellations, 1);

    // A payment brings a cancelled membership back
    app.state
        .services
        .payments
        .record(&member.member_id, cash(40))
        .await
        .unwrap();
    assert_eq!(
        app.store.member(&member.member_id).unwrap().member_status,
        MemberStatus::Active
    );
}

#[tokio::test]
async fn test_update_recomputes_end_date() {
    let app = TestApp::new(utc(2026, 1, 15));
    let member = app.member("Mia Roth", "mia@example.com", MembershipType::Silver).await;
    let members = &app.state.services.members;

    let updated = members
        .update(
            &member.member_id,
            MemberUpdate {
                membership_type: Some(MembershipType::Diamond),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.membership_duration, 6);
    assert_eq!(updated.end_date, utc(2026, 7, 15));

    let updated = members
        .update(
            &member.member_id,
            MemberUpdate {
                start_date: Some(utc(2026, 2, 1)),
                name: Some("Mia Roth-Lee".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.end_date, utc(2026, 8, 1));
    assert_eq!(updated.name, "Mia Roth-Lee");

    let other = app.member("Tom Hale", "tom@example.com", MembershipType::Gold).await;
    let err = members
        .update(
            &other.member_id,
            MemberUpdate {
                email: Some("MIA@example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemberEmailExists);
}

#[tokio::test]
async fn test_delete_member_removes_payments() {
    let app = TestApp::new(utc(2026, 1, 15));
    let member = app.member("Mia Roth", "mia@example.com", MembershipType::Silver).await;
    app.state
        .services
        .payments
        .record(&member.member_id, cash(25))
        .await
        .unwrap();

    app.state.services.members.delete(&member.member_id).await.unwrap();
    assert!(app.store.payments_of(&member.member_id).is_empty());

    let err = app.state.services.members.get(&member.member_id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemberNotFound);
    assert_eq!(err.to_string(), "Member not found");
    let err = app.state.services.members.delete(&member.member_id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemberNotFound);
}

#[tokio::test]
async fn test_notification_find_or_create_is_idempotent() {
    let app = TestApp::new(utc(2026, 1, 15));
    let notifications = &app.state.services.notifications;
    let new = || {
        NewNotification::new(
            NotificationTarget::Member("KB-M01".to_string()),
            NotificationType::PaymentPending,
            "Payment pending",
            "Starts soon",
        )
    };

    let first = notifications.find_or_create(new()).await.unwrap();
    let second = notifications.find_or_create(new()).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(app.store.notifications().len(), 1);

    // Same id under another model is a different notification
    notifications
        .find_or_create(NewNotification::new(
            NotificationTarget::Application("KB-M01".to_string()),
            NotificationType::PaymentPending,
            "Payment pending",
            "Starts soon",
        ))
        .await
        .unwrap();
    assert_eq!(notifications.unread_count().await.unwrap(), 2);

    let read = notifications.mark_read(first.id).await.unwrap();
    assert!(read.read_at.is_some());
    assert_eq!(notifications.mark_all_read().await.unwrap(), 1);
    assert_eq!(notifications.unread_count().await.unwrap(), 0);

    let err = notifications.mark_read(999).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotificationNotFound);
}

#[tokio::test]
async fn test_email_failure_does_not_abort_operations() {
    let app = TestApp::new(utc(2026, 1, 15));
    app.mailer.set_failing(true);

    let member = app.member("Lia Wong", "lia@example.com", MembershipType::Gold).await;
    app.state
        .services
        .payments
        .record(&member.member_id, cash(60))
        .await
        .unwrap();
    app.state
        .services
        .members
        .cancel(&member.member_id, None)
        .await
        .unwrap();

    assert!(app.mailer.sent().is_empty());
    assert_eq!(
        app.store.member(&member.member_id).unwrap().member_status,
        MemberStatus::Cancelled
    );
}
