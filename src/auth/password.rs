//! Argon2id credential hashing. Stored values are PHC strings, so the
//! parameters travel with each hash.

use anyhow::Context;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

pub const MIN_PASSWORD_LEN: usize = 8;

fn argon2() -> Argon2<'static> {
    Argon2::default()
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow::anyhow!("hashing password: {err}"))
}

/// `Ok(false)` means the password did not match. A stored value that is not
/// a usable PHC string is an error, not a failed login.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| anyhow::anyhow!("{err}"))
        .context("stored password hash is malformed")?;
    match argon2().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(err) => Err(anyhow::anyhow!("verifying password: {err}")),
    }
}
