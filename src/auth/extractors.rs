use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::{claims::TokenKind, jwt::JwtKeys};
use crate::{error::ApiError, users::model::Role};

/// Identity of an authenticated caller, taken from access-token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

/// Extracts and validates the bearer JWT.
pub struct AuthUser(pub Caller);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                ApiError::unauthenticated("Authentication credentials were not provided.")
            })?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::unauthenticated("Invalid Authorization header"))?;

        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::unauthenticated("Invalid or expired token")
        })?;

        if claims.kind != TokenKind::Access {
            return Err(ApiError::unauthenticated("Access token required"));
        }

        Ok(AuthUser(Caller {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::jwt::tests::user, state::AppState};
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};

    async fn extract(state: &AppState, header: Option<String>) -> Result<AuthUser, ApiError> {
        let mut builder = Request::builder().uri("/patients/");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn builds_caller_from_access_claims() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let doctor = user("doctor1", Role::Doctor);
        let token = keys.sign_access(&doctor).unwrap();

        let AuthUser(caller) = extract(&state, Some(format!("Bearer {token}"))).await.unwrap();
        assert_eq!(caller.id, doctor.id);
        assert_eq!(caller.username, "doctor1");
        assert_eq!(caller.role, Role::Doctor);
    }

    #[tokio::test]
    async fn rejects_missing_garbage_and_refresh_tokens() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let refresh = keys.sign_refresh(&user("p", Role::Patient)).unwrap();

        for header in [
            None,
            Some("Token abc".to_string()),
            Some("Bearer not-a-jwt".to_string()),
            Some(format!("Bearer {refresh}")),
        ] {
            let err = extract(&state, header).await.err().unwrap();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
