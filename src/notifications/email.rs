// Email composition and delivery transports

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::{NotificationDispatcher, NotificationError};
use crate::domain::{Report, Request, RequestState, Role};
use crate::store::{TicketStore, UserFilter};

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Paths of files to attach
    pub attachments: Vec<String>,
}

/// Final hop of an email. Transport configuration lives outside this crate.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// Writes each message to the log instead of sending it
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        info!(
            to = ?message.to,
            subject = %message.subject,
            attachments = message.attachments.len(),
            "Email (log transport)\n{}",
            message.body
        );
        Ok(())
    }
}

/// Drops each message as a JSON file into a directory for a relay to pick up
#[derive(Debug, Clone)]
pub struct OutboxTransport {
    dir: PathBuf,
}

impl OutboxTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl MailTransport for OutboxTransport {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!(
            "{}-{}.json",
            Utc::now().format("%Y%m%dT%H%M%S"),
            uuid::Uuid::new_v4()
        ));
        let json = serde_json::to_vec_pretty(message)?;
        tokio::fs::write(&path, json).await?;
        info!(path = %path.display(), subject = %message.subject, "Email queued in outbox");
        Ok(())
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

/// Composes lifecycle emails and hands them to a [`MailTransport`]
pub struct EmailNotifier {
    store: Arc<dyn TicketStore>,
    transport: Arc<dyn MailTransport>,
    from: String,
}

impl EmailNotifier {
    pub fn new(
        store: Arc<dyn TicketStore>,
        transport: Arc<dyn MailTransport>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transport,
            from: from.into(),
        }
    }

    fn message(&self, to: Vec<String>, subject: String, body: String) -> EmailMessage {
        EmailMessage {
            from: self.from.clone(),
            to,
            subject,
            body,
            attachments: Vec::new(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for EmailNotifier {
    /// New requests go to every active engineer
    async fn notify_new_request(&self, request: &Request) -> Result<(), NotificationError> {
        let recipients: Vec<String> = self
            .store
            .list_users(&UserFilter::active_with_role(Role::Engineer))
            .await?
            .into_iter()
            .map(|user| user.email)
            .collect();

        if recipients.is_empty() {
            info!(request_id = request.id, "No active engineers to notify");
            return Ok(());
        }

        let machine = self.store.get_machine(request.machine_id).await?;
        let creator = self.store.get_user(request.created_by).await?;
        let body = format!(
            "A new maintenance request has been created.\n\n\
             Request: #{}\n\
             Machine: {}\n\
             Requested by: {}\n\
             Description: {}\n\
             State: {}\n\
             Date: {}\n",
            request.id,
            machine.display_name(),
            creator.full_name(),
            request.description,
            request.state.label(),
            format_timestamp(request.created_at),
        );

        let count = recipients.len();
        let message = self.message(recipients, format!("New request #{}", request.id), body);
        self.transport.deliver(&message).await?;
        info!(request_id = request.id, recipients = count, "New-request notification sent");
        Ok(())
    }

    /// State changes go to the user who opened the request
    async fn notify_state_change(
        &self,
        request: &Request,
        previous_state: RequestState,
    ) -> Result<(), NotificationError> {
        let creator = self.store.get_user(request.created_by).await?;
        let machine = self.store.get_machine(request.machine_id).await?;
        let body = format!(
            "The maintenance request has changed state.\n\n\
             Request: #{}\n\
             Previous state: {}\n\
             New state: {}\n\
             Machine: {}\n\
             Updated: {}\n",
            request.id,
            previous_state.label(),
            request.state.label(),
            machine.display_name(),
            format_timestamp(request.updated_at),
        );

        let message = self.message(
            vec![creator.email.clone()],
            format!("State change - request #{}", request.id),
            body,
        );
        self.transport.deliver(&message).await?;
        info!(
            request_id = request.id,
            recipient = %creator.email,
            "State-change notification sent"
        );
        Ok(())
    }

    async fn send_report(
        &self,
        report: &Report,
        recipient: &str,
    ) -> Result<(), NotificationError> {
        let document = report
            .document
            .as_ref()
            .ok_or(NotificationError::MissingDocument {
                request_id: report.request_id,
            })?;
        let machine = self.store.get_machine(report.machine_id).await?;

        let summary: String = report.fields.description.chars().take(200).collect();
        let body = format!(
            "Hello,\n\n\
             Please find attached the requested maintenance report.\n\n\
             Details:\n\
             - Request: #{}\n\
             - Machine: {}\n\
             - Date: {}\n\
             - Description: {}...\n\n\
             Regards,\n\
             MantenTask\n",
            report.request_id,
            machine.display_name(),
            format_timestamp(report.created_at),
            summary,
        );

        let mut message = self.message(
            vec![recipient.to_string()],
            format!("Maintenance report - request #{}", report.request_id),
            body,
        );
        message.attachments.push(document.location.clone());
        self.transport.deliver(&message).await?;
        info!(request_id = report.request_id, recipient, "Report emailed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AccessLevel, DocumentHandle, NewMachine, NewRequest, NewUser, ReportFields,
    };
    use crate::store::MemoryTicketStore;
    use chrono::NaiveDate;

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            first_name: username.to_string(),
            paternal_surname: "Pérez".to_string(),
            maternal_surname: "García".to_string(),
            email: format!("{username}@example.com"),
            phone: None,
            branch_id: None,
            role,
            access_level: AccessLevel::Advanced,
        }
    }

    async fn fixture() -> (Arc<MemoryTicketStore>, Request) {
        let store = Arc::new(MemoryTicketStore::new());
        let branch = store.insert_branch("Sucursal Norte").await.unwrap();
        let machine = store
            .insert_machine(NewMachine {
                branch_id: branch.id,
                model: "Torno CNC TX-300".to_string(),
                brand: "Haas".to_string(),
                serial_number: None,
                purchased_on: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                installed_on: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
                last_maintenance_on: None,
            })
            .await
            .unwrap();
        let supervisor = store.insert_user(new_user("agarcia", Role::Supervisor)).await.unwrap();
        store.insert_user(new_user("jperez", Role::Engineer)).await.unwrap();
        let inactive = store.insert_user(new_user("old", Role::Engineer)).await.unwrap();
        let mut inactive = inactive;
        inactive.active = false;
        store.save_user(&inactive).await.unwrap();

        let request = store
            .insert_request(NewRequest {
                machine_id: machine.id,
                created_by: supervisor.id,
                description: "Spindle vibration".to_string(),
                scheduled_for: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        (store, request)
    }

    #[tokio::test]
    async fn new_request_goes_to_active_engineers_only() {
        let (store, request) = fixture().await;
        let mut transport = MockMailTransport::new();
        transport
            .expect_deliver()
            .withf(|message| {
                message.to == vec!["jperez@example.com".to_string()]
                    && message.subject.contains("New request")
                    && message.body.contains("Haas Torno CNC TX-300")
            })
            .times(1)
            .returning(|_| Ok(()));

        let notifier = EmailNotifier::new(store, Arc::new(transport), "noreply@example.com");
        notifier.notify_new_request(&request).await.unwrap();
    }

    #[tokio::test]
    async fn state_change_goes_to_creator() {
        let (store, mut request) = fixture().await;
        request.state = RequestState::InProgress;
        let mut transport = MockMailTransport::new();
        transport
            .expect_deliver()
            .withf(|message| {
                message.to == vec!["agarcia@example.com".to_string()]
                    && message.body.contains("Previous state: Pendiente")
                    && message.body.contains("New state: En Proceso")
            })
            .times(1)
            .returning(|_| Ok(()));

        let notifier = EmailNotifier::new(store, Arc::new(transport), "noreply@example.com");
        notifier
            .notify_state_change(&request, RequestState::Pending)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn report_email_requires_a_document() {
        let (store, request) = fixture().await;
        let mut transport = MockMailTransport::new();
        transport.expect_deliver().never();
        let notifier = EmailNotifier::new(store.clone(), Arc::new(transport), "noreply@example.com");

        let mut report = Report {
            request_id: request.id,
            machine_id: request.machine_id,
            author_id: request.created_by,
            fields: ReportFields {
                description: "Bearing replaced".to_string(),
                ..Default::default()
            },
            created_at: Utc::now(),
            document: None,
        };
        let err = notifier
            .send_report(&report, "client@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::MissingDocument { .. }));

        report.document = Some(DocumentHandle {
            location: "/tmp/report.pdf".to_string(),
            generated_at: Utc::now(),
        });
        let mut transport = MockMailTransport::new();
        transport
            .expect_deliver()
            .withf(|message| {
                message.to == vec!["client@example.com".to_string()]
                    && message.attachments == vec!["/tmp/report.pdf".to_string()]
            })
            .times(1)
            .returning(|_| Ok(()));
        let notifier = EmailNotifier::new(store, Arc::new(transport), "noreply@example.com");
        notifier
            .send_report(&report, "client@example.com")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn outbox_writes_json_message() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("outbox");
        let transport = OutboxTransport::new(&dir);
        let message = EmailMessage {
            from: "noreply@example.com".to_string(),
            to: vec!["someone@example.com".to_string()],
            subject: "Hello".to_string(),
            body: "Body".to_string(),
            attachments: vec![],
        };

        transport.deliver(&message).await.unwrap();

        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        let written: EmailMessage =
            serde_json::from_slice(&tokio::fs::read(entry.path()).await.unwrap()).unwrap();
        assert_eq!(written, message);
    }
}
