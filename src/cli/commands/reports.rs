use anyhow::Result;

use super::{print_json, AppContext};
use crate::cli::ReportCommand;
use crate::domain::ReportFields;
use crate::store::ReportFilter;

pub async fn execute(command: ReportCommand, context: &AppContext) -> Result<()> {
    match command {
        ReportCommand::Create {
            actor,
            request,
            description,
            work_performed,
            parts_replaced,
            recommendations,
        } => {
            let actor = context.actor(actor.actor).await?;
            let fields = ReportFields {
                description,
                work_performed,
                parts_replaced,
                recommendations,
            };
            let report = context
                .workflow
                .create_report(request, &actor, fields)
                .await?;
            if report.document.is_none() {
                eprintln!("Report saved, but its PDF could not be generated. Try 'mantentask report regenerate'.");
            }
            print_json(&report)
        }
        ReportCommand::Regenerate { actor, request } => {
            let actor = context.actor(actor.actor).await?;
            let report = context.workflow.regenerate_document(request, &actor).await?;
            print_json(&report)
        }
        ReportCommand::Email { actor, request, to } => {
            let actor = context.actor(actor.actor).await?;
            let report = context.workflow.email_report(request, &actor, &to).await?;
            print_json(&report)
        }
        ReportCommand::Show { request } => {
            let report = context.workflow.get_report(request).await?;
            print_json(&report)
        }
        ReportCommand::List { machine, author } => {
            let filter = ReportFilter {
                machine_id: machine,
                author_id: author,
            };
            let reports = context.workflow.list_reports(&filter).await?;
            print_json(&reports)
        }
    }
}
