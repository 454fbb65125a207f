use futures_util::future::BoxFuture;
use log::info;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound email capability. Delivery is always best-effort: callers must
/// treat a send failure as non-fatal and never let it block the in-app
/// notification record.
pub trait Mailer: 'static {
    fn send(&self, mail: OutgoingMail) -> BoxFuture<'static, Result<(), Error>>;
}

/// Writes the mail to the log instead of handing it to a provider. No
/// concrete email provider is wired up in this service.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: OutgoingMail) -> BoxFuture<'static, Result<(), Error>> {
        Box::pin(async move {
            info!("email to {}: [{}] {}", mail.to, mail.subject, mail.body);
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mailer = LogMailer;
        let res = mailer
            .send(OutgoingMail {
                to: "thabo@example.co.za".into(),
                subject: "Payment Verified".into(),
                body: "Your application fee payment has been verified.".into(),
            })
            .await;
        assert!(res.is_ok());
    }
}
