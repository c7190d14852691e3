//! Typed failures raised by entity services.
//!
//! Errors are classified the way the outer boundary reports them:
//! - PermissionDenied: the actor lacks read or write access
//! - ImproperAction: a workflow precondition does not hold
//! - IllegalAction: an authorization bypass attempt
//! - NotFound / Db: missing rows and store failures

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("You do not have permission to {0} this entity")]
    PermissionDenied(&'static str),

    #[error("{0}")]
    ImproperAction(String),

    #[error("Illegal action: {0}")]
    IllegalAction(String),

    #[error("Nothing to show with this id")]
    NotFound,

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for EntityError {
    fn from(err: rusqlite::Error) -> Self {
        EntityError::Db(DbError::Sqlite(err))
    }
}

impl EntityError {
    pub fn improper(message: impl Into<String>) -> Self {
        EntityError::ImproperAction(message.into())
    }

    pub fn illegal(message: impl Into<String>) -> Self {
        EntityError::IllegalAction(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EntityError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            EntityError::ImproperAction(_) => ErrorKind::ImproperAction,
            EntityError::IllegalAction(_) => ErrorKind::IllegalAction,
            EntityError::NotFound => ErrorKind::NotFound,
            EntityError::Db(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-style status for the presentation boundary.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::PermissionDenied | ErrorKind::IllegalAction => 403,
            ErrorKind::ImproperAction => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PermissionDenied,
    ImproperAction,
    IllegalAction,
    NotFound,
    Internal,
}

/// Serializable error representation for an API boundary.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub message: String,
    pub kind: ErrorKind,
    pub status: u16,
}

impl From<&EntityError> for ApiError {
    fn from(err: &EntityError) -> Self {
        // Store details stay in the logs.
        let message = match err {
            EntityError::Db(_) => "Something went wrong on our side".to_string(),
            other => other.to_string(),
        };
        ApiError {
            message,
            kind: err.kind(),
            status: err.status_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(EntityError::PermissionDenied("read").status_code(), 403);
        assert_eq!(EntityError::improper("x").status_code(), 400);
        assert_eq!(EntityError::illegal("x").status_code(), 403);
        assert_eq!(EntityError::NotFound.status_code(), 404);
        assert_eq!(
            EntityError::Db(DbError::Migration("x".into())).status_code(),
            500
        );
    }

    #[test]
    fn test_api_error_hides_store_details() {
        let err = EntityError::Db(DbError::Migration("secret path".into()));
        let api = ApiError::from(&err);
        assert!(!api.message.contains("secret"));
        assert_eq!(api.kind, ErrorKind::Internal);

        let err = EntityError::improper("Experiments must use a template!");
        let api = ApiError::from(&err);
        assert_eq!(api.message, "Experiments must use a template!");
        assert_eq!(api.status, 400);
    }
}
