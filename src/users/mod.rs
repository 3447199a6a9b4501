use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod model;
pub mod permissions;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::provisioning_routes()
}
