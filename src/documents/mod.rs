// Report document generation

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Branch, DocumentHandle, Machine, Report, Request, User};

pub mod pdf;

pub use pdf::PdfReportGenerator;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rendering failed: {reason}")]
    Rendering { reason: String },
}

/// Everything a document needs to describe a report
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub report: Report,
    pub request: Request,
    pub machine: Machine,
    pub branch: Option<Branch>,
    pub author: User,
}

/// Renders a report into a stored document
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate_document(
        &self,
        context: &ReportContext,
    ) -> Result<DocumentHandle, DocumentError>;
}
