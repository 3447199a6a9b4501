use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// The single role every account holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
pub enum Role {
    Doctor,
    Patient,
    Hod,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Doctor => "DOCTOR",
            Role::Patient => "PATIENT",
            Role::Hod => "HOD",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub role: Role,
    pub is_superuser: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An account about to be saved.
///
/// Fields are private so the superuser rule cannot be bypassed: a superuser is
/// always saved as HOD, whatever role it was built with.
#[derive(Debug, Clone)]
pub struct NewUser {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role: Role,
    is_superuser: bool,
}

impl NewUser {
    pub fn new(username: &str, email: &str, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role,
            is_superuser: false,
        }
    }

    pub fn superuser(username: &str, email: &str, password_hash: String) -> Self {
        Self::new(username, email, password_hash, Role::Hod).with_superuser(true)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn is_superuser(&self) -> bool {
        self.is_superuser
    }

    /// Role as it will be persisted.
    pub fn role(&self) -> Role {
        if self.is_superuser {
            Role::Hod
        } else {
            self.role
        }
    }

    pub fn with_superuser(mut self, is_superuser: bool) -> Self {
        self.is_superuser = is_superuser;
        self
    }
}
