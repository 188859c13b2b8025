//! Business services
//!
//! Each service owns one aggregate and shares the store, mailer and clock.

pub mod applications;
pub mod identifiers;
pub mod members;
pub mod notifications;
pub mod payments;

use std::sync::Arc;

pub use applications::ApplicationService;
pub use identifiers::Identifiers;
pub use members::MemberService;
pub use notifications::NotificationService;
pub use payments::PaymentService;

use crate::db::Store;
use crate::email::Mailer;
use crate::util::Clock;

#[derive(Clone)]
pub struct Services {
    pub members: MemberService,
    pub applications: ApplicationService,
    pub payments: PaymentService,
    pub notifications: NotificationService,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, clock: Arc<dyn Clock>) -> Self {
        let ids = Identifiers::new(store.clone());
        let notifications = NotificationService::new(store.clone(), clock.clone());
        Self {
            members: MemberService::new(
                store.clone(),
                mailer.clone(),
                clock.clone(),
                ids.clone(),
                notifications.clone(),
            ),
            applications: ApplicationService::new(
                store.clone(),
                mailer.clone(),
                clock.clone(),
                ids.clone(),
                notifications.clone(),
            ),
            payments: PaymentService::new(store, mailer, clock, ids, notifications.clone()),
            notifications,
        }
    }
}
