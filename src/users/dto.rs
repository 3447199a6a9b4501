use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{Role, User};

/// Body of `POST /create-doctor/`.
#[derive(Debug, Deserialize)]
pub struct CreateDoctorRequest {
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of `POST /create-patient/`: the account plus its profile.
#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    pub blood_group: Option<String>,
}

/// Body of `POST /register/`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}
