//! Request extractors and path helpers shared by the route handlers

use axum::extract::{FromRequest, FromRequestParts};
use uuid::Uuid;

use crate::error::ApiError;

/// JSON body extractor whose rejections (malformed JSON, missing fields, wrong types) render
/// as 400 in the failure envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor with the same rejection handling
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Parses a path id, rejecting malformed ones with 400
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} id", what)))
}

/// Rejects access to another user's resources with 403
pub fn ensure_same_user(requested: Option<&str>, caller: Uuid) -> Result<(), ApiError> {
    match requested {
        None => Ok(()),
        Some(raw) => {
            let requested = parse_id(raw, "user")?;
            if requested == caller {
                Ok(())
            } else {
                Err(ApiError::Forbidden(
                    "Not allowed to access another user's data".to_string(),
                ))
            }
        }
    }
}
