// orderflow-server/src/state.rs
use crate::config::AppConfig;
use orderflow::{CheckoutService, WebhookDispatcher};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub dispatcher: Arc<WebhookDispatcher>,
  pub checkout: Arc<CheckoutService>,
  pub config: Arc<AppConfig>, // Share loaded config
}
