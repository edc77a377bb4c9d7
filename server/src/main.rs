// orderflow-server/src/main.rs

mod config;
mod errors;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::services::{DineroClient, SlackSink, StripeClient};
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use orderflow::memory::{InMemoryGateway, InMemoryInvoicing, LogSink};
use orderflow::{
  CheckoutService, FulfillmentRegistry, InvoicingService, LedgerAccounts, NotificationSink, Notifier, OrderLocks,
  PaymentGateway, PayoutReconciler, SignatureVerifier, StoreSettings, WebhookDispatcher, Workflow,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

struct Collaborators {
  gateway: Arc<dyn PaymentGateway>,
  invoicing: Arc<dyn InvoicingService>,
  sink: Arc<dyn NotificationSink>,
}

fn build_collaborators(config: &AppConfig, settings: &StoreSettings, accounts: LedgerAccounts) -> AppResult<Collaborators> {
  if config.use_mock_services {
    tracing::warn!("USE_MOCK_SERVICES is set, running against in-memory collaborators.");
    return Ok(Collaborators {
      gateway: Arc::new(InMemoryGateway::with_store_catalog(settings)),
      invoicing: Arc::new(InMemoryInvoicing::new()),
      sink: Arc::new(LogSink),
    });
  }

  let missing = |name: &str| AppError::Config(format!("{} settings are missing", name));
  let stripe = config.stripe.as_ref().ok_or_else(|| missing("Stripe"))?;
  let dinero = config.dinero.clone().ok_or_else(|| missing("Dinero"))?;
  let slack = config.slack.clone().ok_or_else(|| missing("Slack"))?;

  let http = reqwest::Client::builder()
    .timeout(HTTP_CLIENT_TIMEOUT)
    .build()
    .map_err(|e| AppError::Config(format!("Could not build HTTP client: {}", e)))?;

  Ok(Collaborators {
    gateway: Arc::new(StripeClient::new(http.clone(), stripe.secret_key.clone())),
    invoicing: Arc::new(DineroClient::new(http.clone(), dinero, accounts)),
    sink: Arc::new(SlackSink::new(http, slack)),
  })
}

fn signature_verifier(config: &AppConfig) -> AppResult<SignatureVerifier> {
  if config.webhook_insecure {
    tracing::warn!("WEBHOOK_INSECURE is set, webhook signatures are NOT verified.");
    return Ok(SignatureVerifier::insecure());
  }
  config
    .webhook_secret
    .as_ref()
    .map(SignatureVerifier::new)
    .ok_or_else(|| AppError::Config("STRIPE_WEBHOOK_SECRET is required".to_string()))
}

fn build_state(app_config: Arc<AppConfig>) -> AppResult<AppState> {
  let settings = Arc::new(app_config.store.clone());
  let accounts = LedgerAccounts::default();
  let collaborators = build_collaborators(&app_config, &settings, accounts)?;

  let (notifier, queue) = Notifier::channel(app_config.notification_queue_capacity);
  // Single worker, so operator alerts never block a webhook response.
  tokio::spawn(queue.run(collaborators.sink.clone()));

  let locks = OrderLocks::default();
  let fulfillments = FulfillmentRegistry::standard(settings.clone(), collaborators.gateway.clone());
  tracing::info!(strategies = fulfillments.len(), "Fulfillment strategies registered.");

  let workflow = Arc::new(Workflow::new(
    collaborators.gateway.clone(),
    collaborators.invoicing.clone(),
    fulfillments,
    notifier.clone(),
  ));
  let payouts = Arc::new(PayoutReconciler::new(
    collaborators.gateway.clone(),
    collaborators.invoicing.clone(),
    accounts,
  ));
  let dispatcher = Arc::new(WebhookDispatcher::new(
    signature_verifier(&app_config)?,
    workflow,
    payouts,
    locks.clone(),
    notifier.clone(),
  ));
  let checkout = Arc::new(CheckoutService::new(collaborators.gateway, settings, locks, notifier));

  Ok(AppState {
    dispatcher,
    checkout,
    config: app_config,
  })
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO) // Default level
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE) // Log when spans close, showing duration
    .init();

  tracing::info!("Starting order fulfillment server...");

  let app_state = match AppConfig::from_env().map(Arc::new).and_then(build_state) {
    Ok(state) => state,
    Err(e) => {
      tracing::error!(error = %e, "Failed to initialise application.");
      return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
  };
  tracing::debug!(config = ?app_state.config, "Loaded config details");

  let server_address = format!("{}:{}", app_state.config.server_host, app_state.config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone())) // Share AppState with handlers
      .wrap(tracing_actix_web::TracingLogger::default()) // Actix middleware for tracing requests
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
