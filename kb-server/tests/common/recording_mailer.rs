//! Mailer that keeps every message instead of sending it

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use kb_server::BoxError;
use kb_server::email::{EmailMessage, Mailer};

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub name: String,
    pub subject: String,
    pub html: String,
}

type SendHook = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    failing: AtomicBool,
    /// Runs inside the next send, before it completes
    next_send: Mutex<Option<SendHook>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Run `hook` while the next email is in flight, e.g. to land a request
    /// in the middle of a sweep
    pub fn on_next_send<F, Fut>(&self, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self.next_send.lock().unwrap() = Some(Box::new(move || Box::pin(hook())));
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<SentEmail> {
        self.sent()
            .into_iter()
            .filter(|e| e.to == to)
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, name: &str, message: EmailMessage) -> Result<(), BoxError> {
        let hook = self.next_send.lock().unwrap().take();
        if let Some(hook) = hook {
            hook().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err("mail relay unavailable".into());
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            name: name.to_string(),
            subject: message.subject,
            html: message.html,
        });
        Ok(())
    }
}
