use std::{sync::Arc, time::Duration};

use log::*;
use match_payment_engine::{
    db_types::UserId,
    reminders::{NotificationMessage, Urgency},
    traits::{DeliveryError, NotificationDelivery},
};
use mp_common::Secret;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::Serialize;

use crate::errors::ServerError;

/// The body POSTed to the notification webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub user_id: &'a UserId,
    pub urgency: Urgency,
    #[serde(flatten)]
    pub message: &'a NotificationMessage,
}

/// Delivers participant notifications on behalf of the server.
///
/// With a webhook configured, every notification is POSTed there as JSON and any non-2xx response counts as a failed
/// delivery. Without one, notifications are written to the log and always succeed.
#[derive(Clone)]
pub enum ServerNotifier {
    Log,
    Webhook { client: Arc<Client>, url: Secret<String>, timeout: Duration },
}

impl ServerNotifier {
    pub fn new(webhook_url: Option<Secret<String>>, timeout: Duration) -> Result<Self, ServerError> {
        let Some(url) = webhook_url else {
            return Ok(Self::Log);
        };
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::InitializeError(format!("Could not create the notification client. {e}")))?;
        Ok(Self::Webhook { client: Arc::new(client), url, timeout })
    }
}

impl std::fmt::Debug for ServerNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => write!(f, "ServerNotifier::Log"),
            Self::Webhook { .. } => write!(f, "ServerNotifier::Webhook"),
        }
    }
}

impl NotificationDelivery for ServerNotifier {
    async fn send(&self, user_id: &UserId, message: &NotificationMessage, urgency: Urgency) -> Result<(), DeliveryError> {
        match self {
            Self::Log => {
                info!(
                    "📬️ [{urgency}] {user_id} / {}: {}. {} {}",
                    message.match_id,
                    message.title,
                    message.body,
                    message.time_remaining.as_deref().unwrap_or_default()
                );
                Ok(())
            },
            Self::Webhook { client, url, timeout } => {
                let payload = WebhookPayload { user_id, urgency, message };
                trace!("📬️ Posting {urgency} notification for {user_id}");
                let response = client.post(url.reveal().as_str()).json(&payload).send().await.map_err(|e| {
                    if e.is_timeout() {
                        DeliveryError::TimedOut(timeout.as_secs())
                    } else {
                        DeliveryError::Failed(e.to_string())
                    }
                })?;
                let status = response.status();
                if status.is_success() {
                    debug!("📬️ Notified {user_id} about {} ({urgency})", message.match_id);
                    Ok(())
                } else {
                    let text = response.text().await.unwrap_or_default();
                    warn!("📬️ Notification webhook rejected the message for {user_id}. {status}: {text}");
                    Err(DeliveryError::Failed(format!("Webhook responded with {status}")))
                }
            },
        }
    }
}

#[cfg(test)]
mod test {
    use match_payment_engine::db_types::MatchId;

    use super::*;

    #[test]
    fn no_url_means_log_only() {
        let notifier = ServerNotifier::new(None, Duration::from_secs(1)).unwrap();
        assert!(matches!(notifier, ServerNotifier::Log));
        let url = Secret::new("http://localhost:9/notify".to_string());
        let notifier = ServerNotifier::new(Some(url), Duration::from_secs(1)).unwrap();
        assert_eq!(format!("{notifier:?}"), "ServerNotifier::Webhook");
    }

    #[test]
    fn payload_flattens_the_message() {
        let user = UserId::from("alice");
        let message = NotificationMessage::new(MatchId::from("m1"), "Payment window open", "Pay 150 by 11:00")
            .with_time_remaining("1 hour".into());
        let payload = WebhookPayload { user_id: &user, urgency: Urgency::Hourly, message: &message };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["user_id"], "alice");
        assert_eq!(json["match_id"], "m1");
        assert_eq!(json["title"], "Payment window open");
        assert_eq!(json["time_remaining"], "1 hour");
    }

    #[tokio::test]
    async fn log_delivery_always_succeeds() {
        let notifier = ServerNotifier::Log;
        let message = NotificationMessage::new(MatchId::from("m1"), "Hello", "World");
        notifier.send(&UserId::from("bob"), &message, Urgency::Notice).await.unwrap();
    }
}
