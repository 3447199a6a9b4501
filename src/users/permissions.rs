use std::marker::PhantomData;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::model::Role;
use crate::{
    auth::{
        extractors::{AuthUser, Caller},
        jwt::JwtKeys,
    },
    error::ApiError,
};

/// Role capability checks. An endpoint admits a caller when any of its
/// permissions does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    IsHod,
    IsDoctor,
    IsPatient,
}

impl Permission {
    /// `None` is an anonymous caller, which no permission admits.
    pub fn has_permission(self, caller: Option<&Caller>) -> bool {
        let Some(caller) = caller else {
            return false;
        };
        match self {
            Permission::IsHod => caller.role == Role::Hod,
            Permission::IsDoctor => caller.role == Role::Doctor,
            Permission::IsPatient => caller.role == Role::Patient,
        }
    }
}

/// The set of permissions an endpoint admits.
pub trait Policy {
    const ALLOWED: &'static [Permission];
}

pub struct DoctorOrHod;
pub struct DoctorOrPatient;
pub struct HodOnly;

impl Policy for DoctorOrHod {
    const ALLOWED: &'static [Permission] = &[Permission::IsDoctor, Permission::IsHod];
}

impl Policy for DoctorOrPatient {
    const ALLOWED: &'static [Permission] = &[Permission::IsDoctor, Permission::IsPatient];
}

impl Policy for HodOnly {
    const ALLOWED: &'static [Permission] = &[Permission::IsHod];
}

/// OR-composes `allowed`; runs before any data is resolved.
pub fn require_any(caller: &Caller, allowed: &[Permission]) -> Result<(), ApiError> {
    if allowed.iter().any(|p| p.has_permission(Some(caller))) {
        return Ok(());
    }
    warn!(
        user_id = %caller.id,
        username = %caller.username,
        role = %caller.role,
        "permission denied"
    );
    Err(ApiError::forbidden(
        "You do not have permission to perform this action.",
    ))
}

/// An authenticated caller admitted by `P`.
///
/// Extracted from request parts, so it rejects before any body extractor or
/// scope resolution runs.
pub struct Authorized<P>(pub Caller, pub PhantomData<P>);

impl<P: Policy> Authorized<P> {
    pub fn check(caller: Caller) -> Result<Self, ApiError> {
        require_any(&caller, P::ALLOWED)?;
        Ok(Self(caller, PhantomData))
    }
}

#[async_trait]
impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    P: Policy,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(caller) = AuthUser::from_request_parts(parts, state).await?;
        Self::check(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use uuid::Uuid;

    fn caller(role: Role) -> Caller {
        Caller {
            id: Uuid::new_v4(),
            username: "u".into(),
            role,
        }
    }

    #[test]
    fn each_predicate_admits_exactly_its_role() {
        let cases = [
            (Permission::IsHod, Role::Hod),
            (Permission::IsDoctor, Role::Doctor),
            (Permission::IsPatient, Role::Patient),
        ];
        for (permission, role) in cases {
            for other in [Role::Hod, Role::Doctor, Role::Patient] {
                assert_eq!(
                    permission.has_permission(Some(&caller(other))),
                    other == role,
                    "{permission:?} vs {other}"
                );
            }
            assert!(!permission.has_permission(None));
        }
    }

    #[test]
    fn require_any_or_composes() {
        assert!(require_any(&caller(Role::Doctor), DoctorOrHod::ALLOWED).is_ok());
        assert!(require_any(&caller(Role::Hod), DoctorOrHod::ALLOWED).is_ok());
        let err = require_any(&caller(Role::Patient), DoctorOrHod::ALLOWED).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        assert!(require_any(&caller(Role::Patient), DoctorOrPatient::ALLOWED).is_ok());
        assert!(require_any(&caller(Role::Hod), DoctorOrPatient::ALLOWED).is_err());
        assert!(require_any(&caller(Role::Doctor), HodOnly::ALLOWED).is_err());
    }

    #[tokio::test]
    async fn authorized_rejects_role_from_token_claims() {
        use crate::{auth::jwt::tests::user, state::AppState};
        use axum::http::{header::AUTHORIZATION, Request};

        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(&user("doctor1", Role::Doctor))
            .unwrap();
        let parts = || {
            let req = Request::builder()
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(())
                .unwrap();
            req.into_parts().0
        };

        let Authorized(doctor, _) =
            Authorized::<DoctorOrHod>::from_request_parts(&mut parts(), &state)
                .await
                .unwrap();
        assert_eq!(doctor.username, "doctor1");

        let err = Authorized::<HodOnly>::from_request_parts(&mut parts(), &state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
