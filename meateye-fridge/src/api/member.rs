//! Member identity extractor

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated member id
pub const MEMBER_HEADER: &str = "x-member-id";

/// Authenticated member, taken from [`MEMBER_HEADER`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for MemberId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(MEMBER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", MEMBER_HEADER)))?;

        let text = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("{} is not valid text", MEMBER_HEADER)))?;

        Uuid::parse_str(text.trim())
            .map(MemberId)
            .map_err(|_| ApiError::Unauthorized(format!("{} is not a valid member id", MEMBER_HEADER)))
    }
}
