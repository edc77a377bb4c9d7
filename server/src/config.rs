// orderflow-server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use orderflow::StoreSettings;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct StripeConfig {
  pub secret_key: String,
}

#[derive(Clone)]
pub struct DineroConfig {
  pub client_key: String,
  pub client_secret: String,
  pub api_key: String,
  pub organization_id: String,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
  pub url: String,
  pub channel: String,
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,

  /// Run against the in-memory collaborators instead of Stripe, Dinero and Slack.
  pub use_mock_services: bool,
  /// Skip webhook signature checks. Never set in production.
  pub webhook_insecure: bool,
  /// Present unless `webhook_insecure` is set.
  pub webhook_secret: Option<String>,

  // Only `None` in mock mode.
  pub stripe: Option<StripeConfig>,
  pub dinero: Option<DineroConfig>,
  pub slack: Option<SlackConfig>,

  pub store: StoreSettings,
  pub request_deadline: Duration,
  pub notification_queue_capacity: usize,
}

impl std::fmt::Debug for AppConfig {
  // Secrets stay out of the logs.
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("use_mock_services", &self.use_mock_services)
      .field("webhook_insecure", &self.webhook_insecure)
      .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[REDACTED]"))
      .field("stripe", &self.stripe.as_ref().map(|_| "[REDACTED]"))
      .field("dinero", &self.dinero.as_ref().map(|d| &d.organization_id))
      .field("slack", &self.slack)
      .field("store", &self.store)
      .field("request_deadline", &self.request_deadline)
      .field("notification_queue_capacity", &self.notification_queue_capacity)
      .finish()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };
    let get_flag = |var_name: &str| {
      get_env(var_name)
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .map_err(|e| AppError::Config(format!("Invalid {} value: {}", var_name, e)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

    let use_mock_services = get_flag("USE_MOCK_SERVICES")?;
    let webhook_insecure = get_flag("WEBHOOK_INSECURE")?;
    let webhook_secret = if webhook_insecure {
      get_env("STRIPE_WEBHOOK_SECRET").ok()
    } else {
      Some(get_env("STRIPE_WEBHOOK_SECRET")?)
    };

    let (stripe, dinero, slack) = if use_mock_services {
      (None, None, None)
    } else {
      let stripe = StripeConfig {
        secret_key: get_env("STRIPE_SECRET_KEY")?,
      };
      let dinero = DineroConfig {
        client_key: get_env("DINERO_CLIENT_KEY")?,
        client_secret: get_env("DINERO_CLIENT_SECRET")?,
        api_key: get_env("DINERO_API_KEY")?,
        organization_id: get_env("DINERO_ORGANIZATION_ID")?,
      };
      let slack = SlackConfig {
        url: get_env("SLACK_URL")?,
        channel: get_env("SLACK_CHANNEL").unwrap_or_else(|_| "#orders".to_string()),
      };
      (Some(stripe), Some(dinero), Some(slack))
    };

    let defaults = StoreSettings::default();
    let store = StoreSettings {
      download_base_url: get_env("DOWNLOAD_BASE_URL").unwrap_or(defaults.download_base_url),
      program_sku: get_env("PROGRAM_SKU").unwrap_or(defaults.program_sku),
      recipe_book_sku: get_env("RECIPE_BOOK_SKU").unwrap_or(defaults.recipe_book_sku),
      bundle_coupon: get_env("BUNDLE_COUPON").unwrap_or(defaults.bundle_coupon),
      invoice_template_id: get_env("INVOICE_TEMPLATE_ID").ok().filter(|id| !id.is_empty()),
      ..defaults
    };

    let request_deadline = get_env("REQUEST_DEADLINE_SECS")
      .unwrap_or_else(|_| "120".to_string())
      .parse::<u64>()
      .map(Duration::from_secs)
      .map_err(|e| AppError::Config(format!("Invalid REQUEST_DEADLINE_SECS: {}", e)))?;
    let notification_queue_capacity = get_env("NOTIFICATION_QUEUE_CAPACITY")
      .unwrap_or_else(|_| "64".to_string())
      .parse::<usize>()
      .ok()
      .filter(|capacity| *capacity > 0)
      .ok_or_else(|| AppError::Config("NOTIFICATION_QUEUE_CAPACITY must be a positive integer".to_string()))?;

    tracing::info!(mock = use_mock_services, "Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      use_mock_services,
      webhook_insecure,
      webhook_secret,
      stripe,
      dinero,
      slack,
      store,
      request_deadline,
      notification_queue_capacity,
    })
  }
}
