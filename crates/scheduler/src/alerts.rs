use std::fmt::Display;
use std::sync::Arc;

use tracing::{debug, error, warn};

use brewbot_chat::platform::{DirectMessenger, NoopDirectMessenger};
use brewbot_chat::replies;

/// Best-effort notifications to the configured admin user.
pub struct OperatorAlerts {
    messenger: Arc<dyn DirectMessenger>,
    admin_user_id: Option<String>,
}

impl OperatorAlerts {
    pub fn new(messenger: Arc<dyn DirectMessenger>, admin_user_id: Option<String>) -> Self {
        Self { messenger, admin_user_id }
    }

    pub fn disabled() -> Self {
        Self { messenger: Arc::new(NoopDirectMessenger), admin_user_id: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.admin_user_id.is_some()
    }

    /// Never fails; delivery errors are logged and dropped.
    pub async fn notify(&self, text: &str) {
        let Some(admin_user_id) = self.admin_user_id.as_deref() else {
            debug!(
                event_name = "system.alert.skipped",
                "no admin user configured; alert not forwarded"
            );
            return;
        };

        let content = replies::admin_notification(text);
        if let Err(error) = self.messenger.send_direct_message(admin_user_id, &content).await {
            warn!(
                event_name = "system.alert.delivery_failed",
                admin_user_id,
                error = %error,
                "could not forward operator alert"
            );
        }
    }

    pub async fn report_error(&self, context: &str, error: &(dyn Display + Sync)) {
        error!(event_name = "system.alert.error", context, error = %error, "{context}");
        self.notify(&format!("{context}: {error}")).await;
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::RecordingMessenger;
    use super::OperatorAlerts;

    #[tokio::test]
    async fn alerts_are_prefixed_and_sent_to_admin() {
        let messenger = Arc::new(RecordingMessenger::default());
        let alerts = OperatorAlerts::new(messenger.clone(), Some("ADMIN".to_owned()));

        alerts.report_error("Error saving coffee_pairs.json", &"disk full").await;

        assert_eq!(
            messenger.sent_to("ADMIN").await,
            vec!["📣 Admin Notification: Error saving coffee_pairs.json: disk full".to_owned()]
        );
    }

    #[tokio::test]
    async fn missing_admin_makes_alerts_a_noop() {
        let messenger = Arc::new(RecordingMessenger::default());
        let alerts = OperatorAlerts::new(messenger.clone(), None);

        alerts.notify("anything").await;

        assert!(!alerts.is_enabled());
        assert!(messenger.sent().await.is_empty());
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let messenger = Arc::new(RecordingMessenger::failing_for(&["ADMIN"]));
        let alerts = OperatorAlerts::new(messenger.clone(), Some("ADMIN".to_owned()));

        alerts.notify("still fine").await;
        assert!(messenger.sent().await.is_empty());
    }
}
