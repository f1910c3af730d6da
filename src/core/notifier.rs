use crate::core::{Mailer, Notification};

/// Best-effort email side channel.
///
/// `notify` never returns an error: a failed send is logged and the run
/// carries on with its primary outcome unchanged.
pub struct Notifier<M: Mailer> {
    mailer: M,
}

impl<M: Mailer> Notifier<M> {
    pub fn new(mailer: M) -> Self {
        Self { mailer }
    }

    /// Returns whether the email was handed to the mail server.
    pub async fn notify(&self, notification: &Notification) -> bool {
        tracing::debug!("Sending notification: {}", notification.subject);

        match self.mailer.send(notification).await {
            Ok(()) => {
                tracing::info!("📧 Email sent: {}", notification.subject);
                true
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    subject = %notification.subject,
                    "Failed to send email"
                );
                false
            }
        }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{EtlError, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMailer {
        attempts: AtomicUsize,
        fail: bool,
    }

    impl Mailer for CountingMailer {
        async fn send(&self, _notification: &Notification) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EtlError::EmailError {
                    message: "535 5.7.8 Username and Password not accepted".to_string(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_notify_reports_delivery() {
        let notifier = Notifier::new(CountingMailer {
            attempts: AtomicUsize::new(0),
            fail: false,
        });

        assert!(notifier.notify(&Notification::new("subject", "body")).await);
        assert_eq!(notifier.mailer().attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_notify_swallows_send_failure() {
        let notifier = Notifier::new(CountingMailer {
            attempts: AtomicUsize::new(0),
            fail: true,
        });

        assert!(!notifier.notify(&Notification::new("subject", "body")).await);
        // No retry.
        assert_eq!(notifier.mailer().attempts.load(Ordering::SeqCst), 1);
    }
}
