use serde::Deserialize;

/// Request body for `POST /token/`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for `POST /token/refresh/`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}
