use crate::state::AppState;
use axum::Router;

mod dto;
pub mod filters;
pub mod handlers;
pub mod model;
pub mod scope;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::patient_routes())
        .merge(handlers::heart_rate_routes())
}
