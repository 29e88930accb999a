//! Per-request identity context.
//!
//! The requester's user id arrives in the `x-user-id` header, supplied by the
//! session layer in front of this service. Routes open to anonymous readers
//! extract a `Viewer`; routes that require a logged-in user extract an
//! `AuthenticatedUser`.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;

/// Header carrying the requester's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The current requester, possibly anonymous.
#[derive(Debug, Clone, Copy)]
pub struct Viewer(pub Option<i64>);

/// A requester that must be logged in.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub id: i64,
}

fn user_id_from_parts(parts: &Parts) -> Result<Option<i64>, AppError> {
    let Some(value) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid {} header", USER_ID_HEADER)))
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(user_id_from_parts(parts)?))
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match user_id_from_parts(parts)? {
            Some(id) => Ok(AuthenticatedUser { id }),
            None => Err(AppError::Unauthorized(
                "You must be logged in for this action".to_string(),
            )),
        }
    }
}
