mod app;
mod auth;
mod config;
mod docs;
mod error;
mod patients;
mod query;
mod state;
mod store;
mod users;
mod validation;

use crate::{state::AppState, users::services::ensure_superuser};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "wardbook=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let (state, pool) = AppState::init().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    if let Some(admin) = &state.config.bootstrap_admin {
        ensure_superuser(state.store.as_ref(), admin).await?;
    }

    app::serve(app::build_app(state)).await
}
