//! An in-memory [`EmailSender`] for tests.
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use crate::dispatch::{ConfirmationEmail, EmailError, EmailSender};

/// Keeps every email it is given. Can be told to fail, to exercise the non-fatal delivery path.
#[derive(Clone, Debug, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<ConfirmationEmail>>>,
    attempts: Arc<AtomicUsize>,
    fail_with: Arc<Mutex<Option<EmailError>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: EmailError) -> Self {
        let mailer = Self::default();
        mailer.set_failure(Some(error));
        mailer
    }

    pub fn set_failure(&self, error: Option<EmailError>) {
        if let Ok(mut f) = self.fail_with.lock() {
            *f = error;
        }
    }

    pub fn sent(&self) -> Vec<ConfirmationEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Successful and failed sends alike.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl EmailSender for MemoryMailer {
    async fn send(&self, email: &ConfirmationEmail) -> Result<(), EmailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failure = self.fail_with.lock().ok().and_then(|f| f.clone());
        if let Some(e) = failure {
            return Err(e);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}
