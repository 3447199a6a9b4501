use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, state::AppState, users::model::User};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            refresh_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((refresh_ttl_minutes as u64) * 60),
        }
    }
}

/// `{access, refresh}` as returned by the token endpoints.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl JwtKeys {
    fn sign_with_kind(&self, user: &User, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        self.sign_with_kind(user, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user: &User) -> anyhow::Result<String> {
        self.sign_with_kind(user, TokenKind::Refresh)
    }

    pub fn issue_pair(&self, user: &User) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access: self.sign_access(user)?,
            refresh: self.sign_refresh(user)?,
        })
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::users::model::Role;
    use std::sync::Arc;
    use uuid::Uuid;

    pub(crate) fn user(username: &str, role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.into(),
            email: String::new(),
            password_hash: String::new(),
            role,
            is_superuser: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn make_keys(issuer: &str, audience: &str) -> JwtKeys {
        let mut state = AppState::fake();
        let mut config = (*state.config).clone();
        config.jwt.issuer = issuer.into();
        config.jwt.audience = audience.into();
        state.config = Arc::new(config);
        JwtKeys::from_ref(&state)
    }

    #[test]
    fn access_token_carries_username_and_role() {
        let keys = make_keys("test-issuer", "test-aud");
        let doctor = user("doctor1", Role::Doctor);
        let token = keys.sign_access(&doctor).expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, doctor.id);
        assert_eq!(claims.username, "doctor1");
        assert_eq!(claims.role, Role::Doctor);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn issue_pair_and_verify_refresh() {
        let keys = make_keys("iss", "aud");
        let hod = user("chief", Role::Hod);
        let pair = keys.issue_pair(&hod).expect("issue pair");
        let claims = keys.verify_refresh(&pair.refresh).expect("verify refresh");
        assert_eq!(claims.sub, hod.id);
        assert_eq!(claims.kind, TokenKind::Refresh);

        let err = keys.verify_refresh(&pair.access).unwrap_err();
        assert!(err.to_string().contains("not a refresh token"));
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("good-iss", "good-aud");
        let bad_keys = make_keys("bad-iss", "bad-aud");
        let token = good_keys
            .sign_access(&user("p", Role::Patient))
            .expect("sign access");
        assert!(bad_keys.verify(&token).is_err());
    }
}
