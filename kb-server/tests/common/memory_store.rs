//! In-memory implementation of the repository traits

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kb_server::db::{
    Admin, AdminRepository, ApplicationQuery, ApplicationRepository, CounterRepository,
    DEFAULT_PAGE_SIZE, MemberQuery, MemberRepository, NotificationRepository, PaymentQuery,
    PaymentRepository, RepoError, RepoResult,
};
use shared::models::{
    Application, ApplicationHistory, ApplicationStatus, Member, MemberStatus, NewNotification,
    Notification, NotificationQuery, NotificationStatus, Payment,
};

#[derive(Default)]
pub struct MemoryStore {
    members: DashMap<String, Member>,
    applications: DashMap<String, Application>,
    history: Mutex<Vec<ApplicationHistory>>,
    payments: DashMap<String, Payment>,
    notifications: DashMap<i64, Notification>,
    /// `related_id|related_model|notification_type` -> notification id
    notification_keys: DashMap<String, i64>,
    notification_seq: AtomicI64,
    counters: DashMap<String, i64>,
    admins: DashMap<String, Admin>,
    /// Members whose writes fail, to exercise per-member error handling
    failing_members: Mutex<HashSet<String>>,
    /// Edits another writer commits just before the member's next write
    interleaved: Mutex<HashMap<String, MemberEdit>>,
}

type MemberEdit = Box<dyn FnOnce(&mut Member) + Send>;

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes_for(&self, member_id: &str) {
        self.failing_members
            .lock()
            .unwrap()
            .insert(member_id.to_string());
    }

    /// Let a concurrent writer change the member right before its next
    /// update; the stored version moves on as a real write would
    pub fn interleave_write(&self, member_id: &str, edit: impl FnOnce(&mut Member) + Send + 'static) {
        self.interleaved
            .lock()
            .unwrap()
            .insert(member_id.to_string(), Box::new(edit));
    }

    pub fn member(&self, member_id: &str) -> Option<Member> {
        self.members.get(member_id).map(|m| m.clone())
    }

    /// Put a member in place as-is, bypassing the services
    pub fn put_member(&self, member: Member) {
        self.members.insert(member.member_id.clone(), member);
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn application_count(&self) -> usize {
        self.applications.len()
    }

    pub fn payments_of(&self, member_id: &str) -> Vec<Payment> {
        self.payments
            .iter()
            .filter(|p| p.member_id == member_id)
            .map(|p| p.clone())
            .collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> = self.notifications.iter().map(|n| n.clone()).collect();
        all.sort_by_key(|n| n.id);
        all
    }

    fn check_writable(&self, member_id: &str) -> RepoResult<()> {
        if self.failing_members.lock().unwrap().contains(member_id) {
            return Err(RepoError::Database(format!(
                "injected write failure for {member_id}"
            )));
        }
        Ok(())
    }

    fn email_taken(&self, email: &str, except: Option<&str>) -> bool {
        self.members
            .iter()
            .any(|m| m.email.eq_ignore_ascii_case(email) && Some(m.member_id.as_str()) != except)
    }

    fn find_or_create(&self, n: NewNotification) -> (Notification, bool) {
        let key = format!(
            "{}|{}|{}",
            n.target.related_id(),
            n.target.related_model(),
            n.notification_type
        );
        let mut created = false;
        let id = *self.notification_keys.entry(key).or_insert_with(|| {
            created = true;
            let id = self.notification_seq.fetch_add(1, Ordering::SeqCst) + 1;
            self.notifications
                .insert(id, n.into_notification(id, Utc::now()));
            id
        });
        let stored = self
            .notifications
            .get(&id)
            .map(|n| n.clone())
            .expect("notification indexed but missing");
        (stored, created)
    }
}

fn page<T>(items: Vec<T>, limit: Option<i64>, offset: Option<i64>) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.unwrap_or(0) as usize)
        .take(limit.unwrap_or(DEFAULT_PAGE_SIZE) as usize)
        .collect()
}

#[async_trait]
impl MemberRepository for MemoryStore {
    async fn find_member(&self, member_id: &str) -> RepoResult<Option<Member>> {
        Ok(self.member(member_id))
    }

    async fn find_member_by_email(&self, email: &str) -> RepoResult<Option<Member>> {
        Ok(self
            .members
            .iter()
            .find(|m| m.email.eq_ignore_ascii_case(email))
            .map(|m| m.clone()))
    }

    async fn list_members(&self, query: &MemberQuery) -> RepoResult<Vec<Member>> {
        let search = query.search.as_deref().map(str::to_lowercase);
        let mut members: Vec<Member> = self
            .members
            .iter()
            .filter(|m| query.status.is_none_or(|s| m.member_status == s))
            .filter(|m| query.membership_type.is_none_or(|t| m.membership_type == t))
            .filter(|m| {
                search.as_deref().is_none_or(|s| {
                    m.name.to_lowercase().contains(s)
                        || m.email.contains(s)
                        || m.member_id.to_lowercase().contains(s)
                })
            })
            .map(|m| m.clone())
            .collect();
        members.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(members, query.limit, query.offset))
    }

    async fn members_with_status(&self, statuses: &[MemberStatus]) -> RepoResult<Vec<Member>> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .filter(|m| statuses.contains(&m.member_status))
            .map(|m| m.clone())
            .collect();
        members.sort_by_key(|m| m.end_date);
        Ok(members)
    }

    async fn insert_member(&self, member: &Member) -> RepoResult<()> {
        if self.email_taken(&member.email, None) {
            return Err(RepoError::Duplicate("members_email_key".into()));
        }
        self.members
            .insert(member.member_id.clone(), member.clone());
        Ok(())
    }

    async fn update_member(&self, member: &mut Member) -> RepoResult<()> {
        self.check_writable(&member.member_id)?;
        let edit = self.interleaved.lock().unwrap().remove(&member.member_id);
        let mut stored = self
            .members
            .get_mut(&member.member_id)
            .ok_or_else(|| RepoError::NotFound(member.member_id.clone()))?;
        if let Some(edit) = edit {
            edit(&mut *stored);
            stored.version += 1;
        }
        if stored.version != member.version {
            return Err(RepoError::Conflict(format!(
                "member {} is at version {}, write was based on {}",
                member.member_id, stored.version, member.version
            )));
        }
        member.version += 1;
        *stored = member.clone();
        Ok(())
    }

    async fn update_member_with_notification(
        &self,
        member: &mut Member,
        notification: NewNotification,
    ) -> RepoResult<Notification> {
        self.update_member(member).await?;
        Ok(self.find_or_create(notification).0)
    }

    async fn delete_member(&self, member_id: &str) -> RepoResult<bool> {
        let removed = self.members.remove(member_id).is_some();
        if removed {
            self.payments.retain(|_, p| p.member_id != member_id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn find_application(&self, application_id: &str) -> RepoResult<Option<Application>> {
        Ok(self.applications.get(application_id).map(|a| a.clone()))
    }

    async fn find_pending_application_by_email(
        &self,
        email: &str,
    ) -> RepoResult<Option<Application>> {
        Ok(self
            .applications
            .iter()
            .find(|a| {
                a.application_status == ApplicationStatus::Pending
                    && a.email.eq_ignore_ascii_case(email)
            })
            .map(|a| a.clone()))
    }

    async fn list_applications(&self, query: &ApplicationQuery) -> RepoResult<Vec<Application>> {
        let mut applications: Vec<Application> = self
            .applications
            .iter()
            .filter(|a| query.status.is_none_or(|s| a.application_status == s))
            .map(|a| a.clone())
            .collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(applications, query.limit, query.offset))
    }

    async fn insert_application(&self, application: &Application) -> RepoResult<()> {
        let mut history = self.history.lock().unwrap();
        let mut entry = application.history_entry();
        entry.id = history.len() as i64 + 1;
        history.push(entry);
        self.applications
            .insert(application.application_id.clone(), application.clone());
        Ok(())
    }

    async fn update_application(&self, application: &Application) -> RepoResult<()> {
        let mut stored = self
            .applications
            .get_mut(&application.application_id)
            .ok_or_else(|| RepoError::NotFound(application.application_id.clone()))?;
        *stored = application.clone();
        Ok(())
    }

    async fn accept_application(
        &self,
        application: &Application,
        member: &Member,
        notification: NewNotification,
    ) -> RepoResult<Notification> {
        self.insert_member(member).await?;
        if let Err(e) = self.update_application(application).await {
            self.members.remove(&member.member_id);
            return Err(e);
        }
        Ok(self.find_or_create(notification).0)
    }

    async fn delete_application(&self, application_id: &str) -> RepoResult<bool> {
        Ok(self.applications.remove(application_id).is_some())
    }

    async fn application_history(&self, email: &str) -> RepoResult<Vec<ApplicationHistory>> {
        let mut entries: Vec<ApplicationHistory> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect();
        entries.reverse();
        Ok(entries)
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn find_payment(&self, payment_id: &str) -> RepoResult<Option<Payment>> {
        Ok(self.payments.get(payment_id).map(|p| p.clone()))
    }

    async fn list_payments(&self, query: &PaymentQuery) -> RepoResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|p| query.member_id.as_deref().is_none_or(|id| p.member_id == id))
            .filter(|p| query.status.is_none_or(|s| p.status == s))
            .map(|p| p.clone())
            .collect();
        payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        Ok(page(payments, query.limit, query.offset))
    }

    async fn recent_payments(
        &self,
        member_id: &str,
        since: DateTime<Utc>,
    ) -> RepoResult<Vec<Payment>> {
        Ok(self
            .payments
            .iter()
            .filter(|p| p.member_id == member_id && p.created_at >= since)
            .map(|p| p.clone())
            .collect())
    }

    async fn record_payment(&self, payment: &Payment, member: &mut Member) -> RepoResult<()> {
        self.update_member(member).await?;
        self.payments
            .insert(payment.payment_id.clone(), payment.clone());
        Ok(())
    }

    async fn update_payment(
        &self,
        payment: &Payment,
        member: Option<&mut Member>,
    ) -> RepoResult<()> {
        if let Some(member) = member {
            self.update_member(member).await?;
        }
        self.payments
            .insert(payment.payment_id.clone(), payment.clone());
        Ok(())
    }

    async fn delete_payment(
        &self,
        payment_id: &str,
        member: Option<&mut Member>,
    ) -> RepoResult<bool> {
        if !self.payments.contains_key(payment_id) {
            return Ok(false);
        }
        if let Some(member) = member {
            self.update_member(member).await?;
        }
        Ok(self.payments.remove(payment_id).is_some())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn find_or_create_notification(
        &self,
        notification: NewNotification,
    ) -> RepoResult<(Notification, bool)> {
        Ok(self.find_or_create(notification))
    }

    async fn list_notifications(&self, query: &NotificationQuery) -> RepoResult<Vec<Notification>> {
        let mut all: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| query.status.is_none_or(|s| n.status == s))
            .filter(|n| query.notification_type.is_none_or(|t| n.notification_type == t))
            .map(|n| n.clone())
            .collect();
        all.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page(all, query.limit, None))
    }

    async fn mark_notification_read(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Notification>> {
        Ok(self.notifications.get_mut(&id).map(|mut n| {
            n.status = NotificationStatus::Read;
            n.read_at = n.read_at.or(Some(now));
            n.clone()
        }))
    }

    async fn mark_all_notifications_read(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let mut updated = 0;
        for mut n in self.notifications.iter_mut() {
            if n.status == NotificationStatus::Unread {
                n.status = NotificationStatus::Read;
                n.read_at = Some(now);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn unread_notification_count(&self) -> RepoResult<i64> {
        Ok(self
            .notifications
            .iter()
            .filter(|n| n.status == NotificationStatus::Unread)
            .count() as i64)
    }
}

#[async_trait]
impl CounterRepository for MemoryStore {
    async fn next_value(&self, name: &str) -> RepoResult<i64> {
        let mut value = self.counters.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}

#[async_trait]
impl AdminRepository for MemoryStore {
    async fn find_admin_by_email(&self, email: &str) -> RepoResult<Option<Admin>> {
        Ok(self.admins.get(&email.to_lowercase()).map(|a| a.clone()))
    }

    async fn upsert_admin(&self, email: &str, hashed_password: &str) -> RepoResult<()> {
        let next_id = self.admins.len() as i64 + 1;
        self.admins
            .entry(email.to_lowercase())
            .and_modify(|a| a.hashed_password = hashed_password.to_string())
            .or_insert_with(|| Admin {
                id: next_id,
                email: email.to_lowercase(),
                hashed_password: hashed_password.to_string(),
                created_at: Utc::now(),
            });
        Ok(())
    }
}
