use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::auth::hash_access_token;
use crate::error::ApiError;
use crate::models::{AppState, User};

/// Caller identity, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());

            let user = state
                .store
                .resolve_session(&token_hash)
                .await?
                .ok_or_else(ApiError::session_expired)?;

            Ok(AuthContext { user })
        }
    }
}
