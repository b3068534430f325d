use std::sync::Arc;

use dotenvy::dotenv;
use tracing::info;

use library_payments::{
    adapters::http::app_state::AppState,
    infra::{
        app::create_app,
        error::InfraError,
        payment_jobs::{run_callback_retry_loop, run_expire_payments_loop},
        setup::init_app_state,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;

    let app = create_app(app_state.clone());

    // Background jobs start after tracing is initialized by create_app.
    spawn_payment_jobs(&app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(InfraError::TcpBind)?;

    info!("Payments service listening at {}", &listener.local_addr()?);

    axum::serve(listener, app)
        .await
        .map_err(InfraError::Server)?;

    Ok(())
}

fn spawn_payment_jobs(app_state: &AppState) {
    let config = &app_state.config;

    let payment_uc = Arc::clone(&app_state.payment_use_cases);
    let interval_secs = config.expire_interval_secs;
    let batch = config.expire_batch_limit();
    tokio::spawn(async move {
        run_expire_payments_loop(payment_uc, interval_secs, batch).await;
    });

    let callback_uc = Arc::clone(&app_state.callback_use_cases);
    let interval_secs = config.callback_retry_interval_secs;
    let batch_size = config.callback_retry_batch_size;
    tokio::spawn(async move {
        run_callback_retry_loop(callback_uc, interval_secs, batch_size).await;
    });
}
