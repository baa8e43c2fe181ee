//! Error kinds for the authentication/authorization kernel.
//!
//! The kernel never talks HTTP (that's an external collaborator's job), but
//! callers need enough structure to map a failure to a transport-level
//! response. `AuthError` carries a closed set of kinds (`spec.md` §7); the
//! `Forbidden`/`NotFound` split is deliberate information hiding — a caller
//! maps `NotFound` the same way whether the namespace doesn't exist or the
//! subject simply can't see it.

use thiserror::Error;

/// Errors raised by any component of the kernel.
#[derive(Debug, Error, Clone)]
pub enum AuthError {
    /// Bad/expired/unknown token, unknown issuer, disabled user.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but denied, and the subject has viewer access to the
    /// referenced object.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Authenticated but denied, and the subject has no viewer access —
    /// the namespace's existence is not disclosed.
    #[error("not found")]
    NotFound,

    /// Active session already exists, or a unique-constraint race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing required constraints, malformed input, unsupported
    /// `code_challenge_method`, etc.
    #[error("invalid: {0}")]
    Invalid(String),

    /// A non-View permission was requested while the system is in
    /// maintenance mode.
    #[error("system is in maintenance mode")]
    InMaintenanceMode,

    /// Store/plugin unexpected failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Coarse kind, useful for metrics/logging without matching on the full
    /// enum (and without leaking the message text, which may carry detail
    /// that's fine to log but not to key a metric on).
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Unauthorized(_) => "unauthorized",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::NotFound => "not_found",
            AuthError::Conflict(_) => "conflict",
            AuthError::Invalid(_) => "invalid",
            AuthError::InMaintenanceMode => "in_maintenance_mode",
            AuthError::Internal(_) => "internal",
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AuthError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AuthError::Forbidden(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AuthError::Invalid(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AuthError::Internal(msg.into())
    }

    /// Converts a denied-permission result to `Forbidden` or `NotFound`
    /// depending on whether the subject has viewer access to the
    /// referenced object (`spec.md` §4.6 `UnauthorizedError`).
    pub fn unauthorized_error(message: impl Into<String>, has_viewer_access: bool) -> Self {
        if has_viewer_access {
            AuthError::Forbidden(message.into())
        } else {
            AuthError::NotFound
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
