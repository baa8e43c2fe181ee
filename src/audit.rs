//! Audit logging (`spec.md` ambient stack), grounded on
//! `auth/audit_logger.rs`'s `AuditLogger` trait/`AuditEntry` shape,
//! narrowed to the events this kernel actually produces: authentication
//! outcomes and authorization decisions. Never carries token material —
//! only the subject, operation, and a user-safe error message.

use serde::{Deserialize, Serialize};

/// What happened, not what secret was involved — this kernel doesn't
/// track secret taxonomy the way an OAuth-callback-centric logger would,
/// since it never sees raw tokens cross an HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    Authentication,
    PermissionCheck,
    SessionCreated,
    SessionRefreshed,
    SessionInvalidated,
    SigningKeyRotated,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::Authentication => "authentication",
            AuditEventType::PermissionCheck => "permission_check",
            AuditEventType::SessionCreated => "session_created",
            AuditEventType::SessionRefreshed => "session_refreshed",
            AuditEventType::SessionInvalidated => "session_invalidated",
            AuditEventType::SigningKeyRotated => "signing_key_rotated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event_type: AuditEventType,
    /// The caller's subject (`spec.md` §4.6 `GetSubject`), `None` when
    /// authentication itself failed before a `Caller` existed.
    pub subject: Option<String>,
    pub operation: String,
    pub success: bool,
    /// User-safe error message; never the raw library error, which may
    /// carry more detail than should cross a log sink's retention policy.
    pub error_message: Option<String>,
}

pub trait AuditLogger: Send + Sync {
    fn log_entry(&self, entry: AuditEntry);

    fn log_success(&self, event_type: AuditEventType, subject: Option<String>, operation: &str) {
        self.log_entry(AuditEntry {
            event_type,
            subject,
            operation: operation.to_string(),
            success: true,
            error_message: None,
        });
    }

    fn log_failure(
        &self,
        event_type: AuditEventType,
        subject: Option<String>,
        operation: &str,
        error: &str,
    ) {
        self.log_entry(AuditEntry {
            event_type,
            subject,
            operation: operation.to_string(),
            success: false,
            error_message: Some(error.to_string()),
        });
    }
}

/// Default logger: every entry becomes one `tracing` event at `info`
/// (success) or `warn` (failure), structured fields only — no message
/// interpolation that could smuggle a token into a log line.
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn log_entry(&self, entry: AuditEntry) {
        if entry.success {
            tracing::info!(
                event = entry.event_type.as_str(),
                subject = entry.subject.as_deref().unwrap_or("-"),
                operation = %entry.operation,
                "auth event"
            );
        } else {
            tracing::warn!(
                event = entry.event_type.as_str(),
                subject = entry.subject.as_deref().unwrap_or("-"),
                operation = %entry.operation,
                error = entry.error_message.as_deref().unwrap_or(""),
                "auth event failed"
            );
        }
    }
}
