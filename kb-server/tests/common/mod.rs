//! Shared fixtures for the kb-server integration tests

#![allow(dead_code)]

pub mod memory_store;
pub mod recording_mailer;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use kb_server::config::Config;
use kb_server::state::AppState;
use kb_server::util::Clock;
use rust_decimal::Decimal;
use shared::models::{
    ApplicationCreate, Member, MemberCreate, MembershipType, PaymentCreate, PaymentMethod,
    PaymentStatus, PaymentType,
};

pub use memory_store::MemoryStore;
pub use recording_mailer::RecordingMailer;

/// Clock the tests move by hand
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub clock: Arc<ManualClock>,
    pub state: AppState,
}

impl TestApp {
    pub fn new(now: DateTime<Utc>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let clock = Arc::new(ManualClock::new(now));
        let config = Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("postgres://unused/kb".to_string()),
            "JWT_SECRET" => Some("test-jwt-secret".to_string()),
            _ => None,
        })
        .unwrap();
        let state = AppState::from_parts(config, store.clone(), mailer.clone(), clock.clone());
        Self {
            store,
            mailer,
            clock,
            state,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Staff-created member, still `pending`
    pub async fn member(&self, name: &str, email: &str, membership_type: MembershipType) -> Member {
        self.state
            .services
            .members
            .create_member(new_member(name, email, Some(membership_type), None))
            .await
            .unwrap()
    }

    /// Member that has paid, ending on `end_date`
    pub fn active_member_ending(&self, member_id: &str, email: &str, end_date: DateTime<Utc>) -> Member {
        let mut member = fixture_member(member_id, email, end_date);
        member.member_status = shared::models::MemberStatus::Active;
        self.store.put_member(member.clone());
        member
    }
}

pub fn new_member(
    name: &str,
    email: &str,
    membership_type: Option<MembershipType>,
    membership_duration: Option<u32>,
) -> MemberCreate {
    MemberCreate {
        name: name.to_string(),
        email: email.to_string(),
        phone: Some("+1 555 0100".to_string()),
        address: None,
        gender: None,
        date_of_birth: None,
        membership_type,
        membership_duration,
        start_date: None,
    }
}

pub fn new_application(name: &str, email: &str, membership_type: MembershipType) -> ApplicationCreate {
    ApplicationCreate {
        name: name.to_string(),
        email: email.to_string(),
        phone: None,
        address: None,
        gender: None,
        date_of_birth: None,
        membership_type: Some(membership_type),
        membership_duration: None,
        start_date: None,
    }
}

pub fn cash(amount: i64) -> PaymentCreate {
    PaymentCreate {
        amount: Some(Decimal::new(amount, 0)),
        payment_method: PaymentMethod::Cash,
        payment_type: PaymentType::Membership,
        status: PaymentStatus::Completed,
        payment_date: None,
        notes: None,
    }
}

/// A member built directly, with a one-month term ending on `end_date`
pub fn fixture_member(member_id: &str, email: &str, end_date: DateTime<Utc>) -> Member {
    let start = end_date - Duration::days(30);
    Member {
        member_id: member_id.to_string(),
        name: format!("Member {member_id}"),
        email: email.to_string(),
        phone: None,
        address: None,
        gender: None,
        date_of_birth: None,
        membership_type: MembershipType::Silver,
        membership_duration: 1,
        start_date: start,
        end_date,
        member_status: shared::models::MemberStatus::Pending,
        payments: vec![],
        renewal_history: vec![],
        last_payment_date: None,
        payment_reminder_count: 0,
        payment_reminder_window: 0,
        expiry_reminder_count: 0,
        cancellation_reason: None,
        cancellation_date: None,
        expiry_date: None,
        created_at: start,
        updated_at: start,
        version: 0,
    }
}
