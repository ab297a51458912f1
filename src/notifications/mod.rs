// Notification dispatch for request lifecycle events

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::{MailTransportKind, NotificationConfig};
use crate::domain::{Report, Request, RequestId, RequestState};
use crate::store::{StoreError, TicketStore};

pub mod email;

pub use email::{EmailMessage, EmailNotifier, LogTransport, MailTransport, OutboxTransport};

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Report for request {request_id} has no document to attach")]
    MissingDocument { request_id: RequestId },

    #[error("Delivery failed: {reason}")]
    Delivery { reason: String },
}

/// Outbound notifications triggered by the workflow.
///
/// The workflow treats failures of the two lifecycle notifications as
/// non-fatal. `send_report` is an explicit user action and its failure is
/// reported back to the caller.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify_new_request(&self, request: &Request) -> Result<(), NotificationError>;

    async fn notify_state_change(
        &self,
        request: &Request,
        previous_state: RequestState,
    ) -> Result<(), NotificationError>;

    async fn send_report(&self, report: &Report, recipient: &str)
        -> Result<(), NotificationError>;
}

/// Dispatcher used when notifications are switched off in configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl NotificationDispatcher for DisabledNotifier {
    async fn notify_new_request(&self, request: &Request) -> Result<(), NotificationError> {
        debug!(request_id = request.id, "Notifications disabled, skipping new-request notice");
        Ok(())
    }

    async fn notify_state_change(
        &self,
        request: &Request,
        previous_state: RequestState,
    ) -> Result<(), NotificationError> {
        debug!(
            request_id = request.id,
            from = %previous_state,
            to = %request.state,
            "Notifications disabled, skipping state-change notice"
        );
        Ok(())
    }

    async fn send_report(
        &self,
        report: &Report,
        _recipient: &str,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery {
            reason: format!(
                "notifications are disabled; report for request {} was not sent",
                report.request_id
            ),
        })
    }
}

/// Build the dispatcher selected by configuration
pub fn dispatcher_from_config(
    config: &NotificationConfig,
    store: Arc<dyn TicketStore>,
) -> Arc<dyn NotificationDispatcher> {
    if !config.enabled {
        return Arc::new(DisabledNotifier);
    }

    let transport: Arc<dyn MailTransport> = match config.transport {
        MailTransportKind::Log => Arc::new(LogTransport),
        MailTransportKind::Outbox => Arc::new(OutboxTransport::new(&config.outbox_dir)),
    };
    Arc::new(EmailNotifier::new(store, transport, &config.from_address))
}
