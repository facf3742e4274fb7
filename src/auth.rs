use anyhow::anyhow;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::AppError;
use crate::error::LibError;
use crate::models::UserId;

/// Header an upstream gateway sets once it has verified the caller.
pub const USER_ID_HEADER: &str = "x-user-id";

/// A caller whose identity was established before the request reached a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    id: UserId,
}

impl AuthenticatedUser {
    pub fn new(id: UserId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> UserId {
        self.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or_else(|| {
                AppError(LibError::unauthorized(
                    "Authentication required",
                    anyhow!("{} {} has no verified caller", parts.method, parts.uri.path()),
                ))
            })
    }
}

/// Maps the gateway-verified `x-user-id` header onto an [`AuthenticatedUser`].
///
/// Requests without the header pass through untouched so that public routes keep
/// working; protected handlers reject them through the extractor. A malformed
/// header is rejected here.
pub async fn trusted_header_identity(mut req: Request, next: Next) -> Response {
    let parsed = req.headers().get(USER_ID_HEADER).map(|value| {
        value
            .to_str()
            .map_err(|err| anyhow!("non-ascii {} header: {}", USER_ID_HEADER, err))
            .and_then(|raw| {
                raw.trim()
                    .parse::<UserId>()
                    .map_err(|err| anyhow!("malformed {} header: {}", USER_ID_HEADER, err))
            })
    });

    match parsed {
        None => {}
        Some(Ok(user_id)) => {
            req.extensions_mut().insert(AuthenticatedUser::new(user_id));
        }
        Some(Err(source)) => {
            return AppError(LibError::unauthorized("Invalid caller identity", source))
                .into_response();
        }
    }

    next.run(req).await
}
