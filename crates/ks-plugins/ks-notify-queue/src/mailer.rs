use async_trait::async_trait;
use ks_core::events::OutgoingMail;
use ks_core::traits::Mailer;
use tracing::info;

/// Writes every message to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "mail"
        );
        Ok(())
    }
}
