use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        accounts::AccountError, feed::FeedError, follows::FollowError, groups::GroupError,
        messages::MessageError, posts::PostError, repos::RepoError,
    },
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<RepoError> for HttpError {
    fn from(error: RepoError) -> Self {
        let status = match error {
            RepoError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpError::from_error(
            "application::error::repo_error",
            status,
            "Internal server error",
            &error,
        )
    }
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        const SOURCE: &str = "application::error::feed_error";
        match error {
            FeedError::UnknownGroup => {
                HttpError::new(SOURCE, StatusCode::NOT_FOUND, "Not found", "Unknown group slug")
            }
            FeedError::UnknownAuthor => {
                HttpError::new(SOURCE, StatusCode::NOT_FOUND, "Not found", "Unknown username")
            }
            FeedError::UnknownPost => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Not found",
                "Post does not exist for this author",
            ),
            FeedError::Repo(err) => err.into(),
        }
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        const SOURCE: &str = "application::error::post_error";
        match error {
            PostError::NotFound => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Not found",
                "Post does not exist for this author",
            ),
            PostError::Forbidden => HttpError::new(
                SOURCE,
                StatusCode::FORBIDDEN,
                "Forbidden",
                "Only the author may change this post",
            ),
            PostError::Invalid(errors) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid input",
                errors.to_string(),
            ),
            PostError::Repo(err) => err.into(),
            PostError::Storage(err) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store upload",
                &err,
            ),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        match error {
            FollowError::UnknownUser => HttpError::new(
                "application::error::follow_error",
                StatusCode::NOT_FOUND,
                "Not found",
                "Unknown username",
            ),
            FollowError::Repo(err) => err.into(),
        }
    }
}

impl From<MessageError> for HttpError {
    fn from(error: MessageError) -> Self {
        const SOURCE: &str = "application::error::message_error";
        match error {
            MessageError::UnknownUser => {
                HttpError::new(SOURCE, StatusCode::NOT_FOUND, "Not found", "Unknown username")
            }
            MessageError::Invalid(errors) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid input",
                errors.to_string(),
            ),
            MessageError::Repo(err) => err.into(),
        }
    }
}

impl From<GroupError> for HttpError {
    fn from(error: GroupError) -> Self {
        match error {
            GroupError::Invalid(errors) => HttpError::new(
                "application::error::group_error",
                StatusCode::BAD_REQUEST,
                "Invalid input",
                errors.to_string(),
            ),
            GroupError::Repo(err) => err.into(),
        }
    }
}

impl From<AccountError> for HttpError {
    fn from(error: AccountError) -> Self {
        const SOURCE: &str = "application::error::account_error";
        match error {
            AccountError::Invalid(errors) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid input",
                errors.to_string(),
            ),
            AccountError::InvalidCredentials => HttpError::new(
                SOURCE,
                StatusCode::UNAUTHORIZED,
                "Invalid credentials",
                "invalid username or password",
            ),
            AccountError::Hashing(detail) => HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                detail,
            ),
            AccountError::Repo(err) => err.into(),
        }
    }
}

/// Errors that end the process; reported once by `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("invalid command: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
