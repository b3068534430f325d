use std::fs::File;
use std::sync::Arc;

use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::{
        ports::payment_gateway::PaymentGatewayPort,
        use_cases::{
            payment::{PaymentRepoTrait, PaymentUseCases},
            payment_callback::{CallbackRetryRepoTrait, CallbackUseCases},
            receipt::{ReceiptRepoTrait, ReceiptUseCases},
            saved_card::{SavedCardRepoTrait, SavedCardUseCases},
        },
    },
    domain::services::payment_service::PaymentService,
    infra::{
        config::{AppConfig, GatewayProvider},
        dummy_gateway::DummyGateway,
        error::InfraError,
        postgres_persistence,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();
    config.validate()?;

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let payment_repo = postgres_arc.clone() as Arc<dyn PaymentRepoTrait>;
    let retry_repo = postgres_arc.clone() as Arc<dyn CallbackRetryRepoTrait>;
    let card_repo = postgres_arc.clone() as Arc<dyn SavedCardRepoTrait>;
    let receipt_repo = postgres_arc.clone() as Arc<dyn ReceiptRepoTrait>;

    let gateway = init_gateway(&config)?;

    let service = PaymentService::new(config.payment_limits.clone());

    let payment_use_cases = PaymentUseCases::new(
        payment_repo.clone(),
        gateway,
        Arc::new(config.gateway.clone()),
        service.clone(),
    );

    let callback_use_cases = CallbackUseCases::new(
        payment_repo.clone(),
        retry_repo,
        service,
        config.callback_retry_max_attempts,
    );

    let saved_card_use_cases = SavedCardUseCases::new(card_repo);
    let receipt_use_cases = ReceiptUseCases::new(receipt_repo, payment_repo);

    Ok(AppState {
        config: Arc::new(config),
        payment_use_cases: Arc::new(payment_use_cases),
        callback_use_cases: Arc::new(callback_use_cases),
        saved_card_use_cases: Arc::new(saved_card_use_cases),
        receipt_use_cases: Arc::new(receipt_use_cases),
    })
}

/// Builds the gateway named by `GATEWAY_PROVIDER`. Fails when it is unset.
pub fn init_gateway(config: &AppConfig) -> Result<Arc<dyn PaymentGatewayPort>, InfraError> {
    match config.gateway_provider()? {
        GatewayProvider::Dummy => {
            warn!("Using the dummy payment gateway: payments settle without charging any card");
            Ok(Arc::new(DummyGateway::new()))
        }
    }
}

/// Installs the process-wide subscriber: pretty console output plus JSON
/// lines in `app.log`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "library_payments=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs). Without a writable file, console only.
    let json_layer = File::create("app.log").ok().map(|file| {
        fmt::layer()
            .json()
            .with_writer(file)
            .with_current_span(true)
            .with_span_list(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
