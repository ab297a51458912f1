// Report creation, document generation and delivery

use chrono::Utc;
use tracing::{info, warn, Instrument};

use super::errors::WorkflowError;
use super::policy::Action;
use super::state_machine::TicketWorkflow;
use crate::documents::ReportContext;
use crate::domain::{DocumentHandle, Report, ReportFields, RequestId, User};
use crate::store::{ReportFilter, StoreError};
use crate::telemetry::{create_workflow_span, generate_correlation_id};

impl TicketWorkflow {
    /// Record the report for a request and render its document.
    ///
    /// A request holds at most one report; a second attempt is a `Conflict`
    /// whoever the actor is. Document generation failures are logged and the
    /// report is returned without a document.
    pub async fn create_report(
        &self,
        request_id: RequestId,
        actor: &User,
        fields: ReportFields,
    ) -> Result<Report, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(
            "create_report",
            Some(request_id),
            Some(actor.id),
            Some(&correlation_id),
        );

        async move {
            let request = self.store.get_request(request_id).await?;
            if self.store.report_exists_for(request_id).await? {
                return Err(WorkflowError::Conflict { request_id });
            }
            self.authorize(actor, Action::CreateReport)?;

            if fields.description.trim().is_empty() {
                return Err(WorkflowError::invalid_input(
                    "description",
                    "must not be blank",
                ));
            }

            let mut report = Report {
                request_id,
                machine_id: request.machine_id,
                author_id: actor.id,
                fields,
                created_at: Utc::now(),
                document: None,
            };
            self.store.save_report(&report).await?;
            info!(request_id, author_id = actor.id, "Report created");

            match self.render_and_attach(&report).await {
                Ok(document) => report.document = Some(document),
                Err(e) => {
                    warn!(request_id, error = %e, "Report saved without a document");
                }
            }

            Ok(report)
        }
        .instrument(span)
        .await
    }

    pub async fn get_report(&self, request_id: RequestId) -> Result<Report, WorkflowError> {
        Ok(self.store.get_report(request_id).await?)
    }

    /// Reports for a machine or by an author, newest first
    pub async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<Report>, WorkflowError> {
        Ok(self.store.list_reports(filter).await?)
    }

    /// Render the document for an existing report again, replacing the stored reference
    pub async fn regenerate_document(
        &self,
        request_id: RequestId,
        actor: &User,
    ) -> Result<Report, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(
            "regenerate_document",
            Some(request_id),
            Some(actor.id),
            Some(&correlation_id),
        );

        async move {
            self.authorize(actor, Action::RegenerateDocument)?;

            let mut report = self.store.get_report(request_id).await?;
            let document = self.render_and_attach(&report).await?;
            info!(request_id, location = %document.location, "Report document regenerated");
            report.document = Some(document);
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Send the report document to `recipient`, rendering it first when missing
    pub async fn email_report(
        &self,
        request_id: RequestId,
        actor: &User,
        recipient: &str,
    ) -> Result<Report, WorkflowError> {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(
            "email_report",
            Some(request_id),
            Some(actor.id),
            Some(&correlation_id),
        );

        async move {
            self.authorize(actor, Action::EmailReport)?;

            let recipient = recipient.trim();
            if !looks_like_email(recipient) {
                return Err(WorkflowError::invalid_input(
                    "recipient",
                    format!("'{recipient}' is not an email address"),
                ));
            }

            let mut report = self.store.get_report(request_id).await?;
            if report.document.is_none() {
                report.document = Some(self.render_and_attach(&report).await?);
            }

            self.notifier.send_report(&report, recipient).await?;
            info!(request_id, recipient, "Report sent");
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Gather the records a document describes
    async fn report_context(&self, report: &Report) -> Result<ReportContext, WorkflowError> {
        let request = self.store.get_request(report.request_id).await?;
        let machine = self.store.get_machine(report.machine_id).await?;
        let author = self.store.get_user(report.author_id).await?;
        let branch = match self.store.get_branch(machine.branch_id).await {
            Ok(branch) => Some(branch),
            Err(StoreError::NotFound { .. }) => None,
            Err(e) => return Err(e.into()),
        };

        Ok(ReportContext {
            report: report.clone(),
            request,
            machine,
            branch,
            author,
        })
    }

    async fn render_and_attach(&self, report: &Report) -> Result<DocumentHandle, WorkflowError> {
        let context = self.report_context(report).await?;
        let document = self.documents.generate_document(&context).await?;
        self.store
            .attach_document(report.request_id, &document)
            .await?;
        Ok(document)
    }
}

fn looks_like_email(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::looks_like_email;

    #[test]
    fn recipient_validation() {
        assert!(looks_like_email("cliente@empresa.mx"));
        assert!(!looks_like_email("cliente"));
        assert!(!looks_like_email("@empresa.mx"));
        assert!(!looks_like_email("cliente@localhost"));
        assert!(!looks_like_email("clie nte@empresa.mx"));
    }
}
