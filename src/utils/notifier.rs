//! Notification delivery helpers and in-process notifiers

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::config::NotificationChannel;
use crate::traits::*;
use crate::types::*;

/// Per-channel outcome of one notification
#[derive(Debug, Default)]
pub struct Delivery {
    pub delivered: Vec<NotificationChannel>,
    pub failed: Vec<(NotificationChannel, LedgerError)>,
}

impl Delivery {
    pub fn any_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }

    /// `mail: <error>; database: <error>`
    pub fn failure_summary(&self) -> String {
        self.failed
            .iter()
            .map(|(channel, err)| format!("{}: {}", channel.as_str(), err))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// The first failure, if any
    pub fn into_result(self) -> LedgerResult<()> {
        match self.failed.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}

/// Send `notification` on every channel and report how each one went
pub async fn deliver(
    notifier: &dyn Notifier,
    channels: &[NotificationChannel],
    notification: &Notification,
) -> Delivery {
    let mut delivery = Delivery::default();
    for channel in channels {
        match notifier.notify(*channel, notification).await {
            Ok(()) => delivery.delivered.push(*channel),
            Err(err) => {
                tracing::warn!(channel = channel.as_str(), error = %err, "notification delivery failed");
                delivery.failed.push((*channel, err));
            }
        }
    }
    delivery
}

/// Send `notification` on every channel; all channels are tried and the first error is returned
pub async fn dispatch(
    notifier: &dyn Notifier,
    channels: &[NotificationChannel],
    notification: &Notification,
) -> LedgerResult<()> {
    deliver(notifier, channels, notification).await.into_result()
}

/// Writes notifications to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        channel: NotificationChannel,
        notification: &Notification,
    ) -> LedgerResult<()> {
        tracing::info!(channel = ?channel, notification = ?notification, "notification");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Outbox {
    sent: Vec<(NotificationChannel, Notification)>,
    failing: Vec<NotificationChannel>,
}

/// Keeps delivered notifications in memory; clones share the same outbox
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    outbox: Arc<Mutex<Outbox>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery on `channel` fail from now on
    pub fn fail_on(&self, channel: NotificationChannel) {
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.failing.push(channel);
        }
    }

    pub fn sent(&self) -> Vec<(NotificationChannel, Notification)> {
        self.outbox
            .lock()
            .map(|outbox| outbox.sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        channel: NotificationChannel,
        notification: &Notification,
    ) -> LedgerResult<()> {
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| LedgerError::Storage("notifier outbox poisoned".to_string()))?;
        if outbox.failing.contains(&channel) {
            return Err(LedgerError::Storage(format!(
                "{:?} channel unavailable",
                channel
            )));
        }
        outbox.sent.push((channel, notification.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn warning() -> Notification {
        Notification::CreditLimitWarning {
            document: DocumentRef::invoice("inv-1"),
            contact_id: "c-1".into(),
            limit: BigDecimal::from(100),
            exposure: BigDecimal::from(150),
        }
    }

    #[tokio::test]
    async fn test_dispatch_tries_every_channel() {
        let notifier = RecordingNotifier::new();
        notifier.fail_on(NotificationChannel::Mail);

        let result = dispatch(
            &notifier,
            &[NotificationChannel::Mail, NotificationChannel::Database],
            &warning(),
        )
        .await;
        assert!(result.is_err());

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, NotificationChannel::Database);
    }

    #[tokio::test]
    async fn test_delivery_reports_each_channel() {
        let notifier = RecordingNotifier::new();
        notifier.fail_on(NotificationChannel::Mail);

        let delivery = deliver(
            &notifier,
            &[NotificationChannel::Mail, NotificationChannel::Database],
            &warning(),
        )
        .await;
        assert!(delivery.any_delivered());
        assert_eq!(delivery.delivered, vec![NotificationChannel::Database]);
        assert!(delivery.failure_summary().starts_with("mail: "));
        assert!(delivery.into_result().is_err());
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        assert!(dispatch(&LogNotifier, &[NotificationChannel::Mail], &warning())
            .await
            .is_ok());
    }
}
