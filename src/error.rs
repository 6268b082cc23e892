use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::logging::RequestId;
use crate::workflow::{FieldErrors, Rejection};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{1}")]
    Status(Status, String),
    /// A uniqueness constraint in the store was violated.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Rejected(#[from] Rejection),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Status(Status::NotFound, format!("Not found: {}", what.into()))
    }

    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::Status(
            Status::BadRequest,
            format!("Bad request: {}", reason.into()),
        )
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Status(Status::InternalServerError, reason.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) => Status::InternalServerError,
            Self::Status(status, _) => *status,
            Self::Conflict(_) => Status::Conflict,
            Self::Rejected(rejection) => rejection.status(),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let id = req.local_cache(RequestId::next);
        let status = self.status();

        let message = if status.class() == StatusClass::ServerError {
            error!("  req{id} {self}");
            // Don't leak driver internals to clients.
            match self {
                Self::Db(_) => status.reason_lossy().to_string(),
                _ => self.to_string(),
            }
        } else {
            warn!("  req{id} {self}");
            self.to_string()
        };

        let fields = match self {
            Self::Rejected(Rejection::Validation(fields)) => Some(fields),
            _ => None,
        };
        let body = ErrorBody {
            status: status.code,
            message,
            fields,
        };
        (status, Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(Error::not_found("thing").status(), Status::NotFound);
        assert_eq!(Error::bad_request("nope").status(), Status::BadRequest);
        assert_eq!(
            Error::internal("oops").status(),
            Status::InternalServerError
        );
        assert_eq!(Error::Conflict("dup".into()).status(), Status::Conflict);
        assert_eq!(
            Error::from(Rejection::VotingClosed).status(),
            Status::Forbidden
        );
        assert_eq!(
            Error::from(Rejection::InvalidToken).status(),
            Status::NotFound
        );
    }
}
