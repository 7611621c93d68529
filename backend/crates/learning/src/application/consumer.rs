//! Registration Event Consumer
//!
//! For every `UserRegisteredEvent`: replay the user into the read store,
//! then send the confirmation email with exponential backoff. Every
//! delivery is committed, including malformed ones, so a poison message
//! cannot stall the stream.

use std::sync::Arc;
use std::time::Duration;

use platform::mail::{EmailSender, MailError, OutgoingEmail, confirmation_email, confirmation_link};
use platform::messaging::{Delivery, DomainEvent, EventConsumer};
use platform::token::TokenIssuer;
use tokio_util::sync::CancellationToken;

use crate::application::config::{LearningConfig, RetryPolicy};
use crate::application::events::UserRegisteredEvent;
use crate::domain::entity::User;
use crate::domain::repository::{Change, Store};

/// Pause after a broker error before polling again
const POLL_BACKOFF: Duration = Duration::from_secs(1);

/// What happened to one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Event of another type, committed untouched
    Skipped,
    /// Payload could not be decoded
    Malformed,
    /// Read-side replay failed; no email was sent
    ReplayFailed,
    /// Confirmation email gave up (rejected or retries exhausted)
    EmailFailed,
    Processed,
}

pub struct RegistrationConsumer<S> {
    read: Arc<S>,
    tokens: Arc<TokenIssuer>,
    mailer: Arc<dyn EmailSender>,
    config: Arc<LearningConfig>,
}

impl<S: Store> RegistrationConsumer<S> {
    pub fn new(
        read: Arc<S>,
        tokens: Arc<TokenIssuer>,
        mailer: Arc<dyn EmailSender>,
        config: Arc<LearningConfig>,
    ) -> Self {
        Self {
            read,
            tokens,
            mailer,
            config,
        }
    }

    /// Poll until `shutdown` fires or the stream closes
    pub async fn run(&self, consumer: &dyn EventConsumer, shutdown: CancellationToken) {
        tracing::info!(event = UserRegisteredEvent::NAME, "Registration consumer started");

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = consumer.next() => next,
            };

            let delivery = match next {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    tracing::info!("Event stream closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to receive event");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_BACKOFF) => continue,
                    }
                }
            };

            let outcome = self.process(&delivery).await;
            tracing::debug!(offset = delivery.offset, ?outcome, "Delivery handled");

            if let Err(e) = consumer.commit(&delivery).await {
                tracing::error!(offset = delivery.offset, error = %e, "Failed to commit delivery");
            }
        }

        tracing::info!("Registration consumer stopped");
    }

    pub async fn process(&self, delivery: &Delivery) -> Outcome {
        let envelope = &delivery.envelope;
        if envelope.event_type().is_some_and(|t| t != UserRegisteredEvent::NAME) {
            return Outcome::Skipped;
        }

        let event: UserRegisteredEvent = match envelope.decode() {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(offset = delivery.offset, error = %e, "Malformed registration event");
                return Outcome::Malformed;
            }
        };

        let user = match self.replay(&event).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(user_id = %event.user_id, error = %e, "Read-store replay failed");
                return Outcome::ReplayFailed;
            }
        };

        if user.is_email_confirmed {
            tracing::debug!(user_id = %user.id, "Email already confirmed; no confirmation sent");
            return Outcome::Processed;
        }

        let email = match self.render_confirmation(&user) {
            Ok(email) => email,
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Confirmation token could not be issued");
                return Outcome::EmailFailed;
            }
        };

        match send_with_retry(self.mailer.as_ref(), email, self.config.email_retry).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "Confirmation email sent");
                Outcome::Processed
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Confirmation email abandoned");
                Outcome::EmailFailed
            }
        }
    }

    /// Upsert the registered user unless the read side already has it; a
    /// redelivered event must not undo a later confirmation or profile edit
    async fn replay(&self, event: &UserRegisteredEvent) -> crate::error::StoreResult<User> {
        if let Some(existing) = self.read.find_user_by_id(&event.user_id).await? {
            return Ok(existing);
        }
        let user = event.to_user();
        self.read.apply(&Change::UserUpserted(user.clone())).await?;
        Ok(user)
    }

    fn render_confirmation(&self, user: &User) -> Result<OutgoingEmail, platform::token::TokenError> {
        let token = self
            .tokens
            .issue_confirm_email(&user.id.to_string(), user.role.code())?;
        let link = confirmation_link(&self.config.app_base_url, &token, user.email.as_str());
        Ok(confirmation_email(user.email.as_str(), &user.display_name(), &link))
    }
}

/// `Rejected` is final; anything else is retried up to `policy.max_retries`
pub async fn send_with_retry(
    mailer: &dyn EmailSender,
    email: OutgoingEmail,
    policy: RetryPolicy,
) -> Result<(), MailError> {
    let mut attempt = 0;
    loop {
        match mailer.send(email.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if !e.is_retryable() || attempt >= policy.max_retries => return Err(e),
            Err(e) => {
                let delay = policy.delay(attempt);
                tracing::warn!(to = %email.to, attempt = attempt + 1, ?delay, error = %e, "Email send failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Spawnable entry point
pub async fn run_registration_consumer<S: Store>(
    consumer: Arc<dyn EventConsumer>,
    read: Arc<S>,
    tokens: Arc<TokenIssuer>,
    mailer: Arc<dyn EmailSender>,
    config: Arc<LearningConfig>,
    shutdown: CancellationToken,
) {
    RegistrationConsumer::new(read, tokens, mailer, config)
        .run(consumer.as_ref(), shutdown)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::assert_ok;

    struct Flaky {
        calls: AtomicU32,
        fail_first: u32,
        error: MailError,
    }

    #[async_trait]
    impl EmailSender for Flaky {
        async fn send(&self, _email: OutgoingEmail) -> Result<(), MailError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first { Err(self.error.clone()) } else { Ok(()) }
        }
    }

    fn email() -> OutgoingEmail {
        confirmation_email("a@test.com", "A", "http://localhost/x")
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let mailer = Flaky {
            calls: AtomicU32::new(0),
            fail_first: 2,
            error: MailError::Transient("421".into()),
        };
        assert_ok!(send_with_retry(&mailer, email(), fast()).await);
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let mailer = Flaky {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            error: MailError::Transient("timeout".into()),
        };
        assert!(send_with_retry(&mailer, email(), fast()).await.is_err());
        // first attempt plus three retries
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let mailer = Flaky {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            error: MailError::Rejected("550".into()),
        };
        let err = send_with_retry(&mailer, email(), fast()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 1);
    }
}
