//! Verification email delivery
//!
//! Delivery is pluggable. The default [`LogMailer`] writes the link to the
//! log, which is enough for local development.

use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationEmail {
    pub to_email: String,
    pub username: String,
    pub link: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("Email delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Email delivery abstraction used by the verification flow.
pub trait Mailer: Send + Sync {
    /// Deliver a verification message
    fn send(&self, message: &VerificationEmail) -> Result<(), MailerError>;
}

/// Sender that logs the message instead of sending real email.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &VerificationEmail) -> Result<(), MailerError> {
        info!(
            to_email = %message.to_email,
            username = %message.username,
            link = %redact_link(&message.link),
            "verification email send stub"
        );
        debug!(link = %message.link, "verification link");
        Ok(())
    }
}

/// Mask the token, the last path segment of a verification link
pub fn redact_link(link: &str) -> String {
    match link.rsplit_once('/') {
        Some((base, token)) if !token.is_empty() => format!("{}/***", base),
        _ => "***".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Mailer that keeps every message for inspection
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<VerificationEmail>>,
        fail: bool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn sent(&self) -> Vec<VerificationEmail> {
            self.sent.lock().unwrap().clone()
        }

        /// Token at the end of the most recent link
        pub fn last_token(&self) -> Option<String> {
            self.sent
                .lock()
                .unwrap()
                .last()
                .and_then(|m| m.link.rsplit('/').next().map(str::to_string))
        }
    }

    impl Mailer for RecordingMailer {
        fn send(&self, message: &VerificationEmail) -> Result<(), MailerError> {
            if self.fail {
                return Err(MailerError::DeliveryFailed("smtp unavailable".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }
}
