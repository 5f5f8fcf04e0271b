use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentone_core::{AuthError, CommentError, DatabaseError, StorageError, UploadError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("A moderator already exists")]
    ModeratorExists,
    #[error("Missing or invalid session")]
    Unauthorized,
    #[error("You don't have permission to do that")]
    Forbidden,
    #[error("{0}")]
    BadRequest(&'static str),
    /// Rejections that carry a fixed user-facing message, like the
    /// new-account upload limit
    #[error("{0}")]
    Rejected(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::ModeratorExists => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(_) => StatusCode::FORBIDDEN,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::ModeratorExists => Self::ModeratorExists,
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<UploadError> for ServerError {
    fn from(value: UploadError) -> Self {
        match value {
            UploadError::NewUserLimit => Self::Rejected(value.to_string()),
            UploadError::NothingIngested => {
                Self::BadRequest("No audio could be ingested from this upload")
            }
            UploadError::Db(e) => e.into(),
            UploadError::Storage(e) => e.into(),
        }
    }
}

impl From<CommentError> for ServerError {
    fn from(value: CommentError) -> Self {
        match value {
            CommentError::EmptyBody => Self::BadRequest("Comment body can't be empty"),
            CommentError::Db(e) => e.into(),
        }
    }
}

impl From<StorageError> for ServerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(_) => Self::NotFound {
                resource: "stored object",
                identifier: "key",
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}
