// orderflow-server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use orderflow::{CheckoutError, WebhookError};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Webhook Error: {source}")]
  Webhook {
    #[from]
    source: WebhookError,
  },

  #[error("Checkout Error: {source}")]
  Checkout {
    #[from]
    source: CheckoutError,
  },

  #[error("Request did not finish within {0:?}")]
  Timeout(Duration),
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
      // A 5xx makes Stripe redeliver; a rejected payload would only fail again.
      AppError::Webhook { source } if source.is_rejection() => StatusCode::BAD_REQUEST,
      AppError::Webhook { .. } => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Checkout { source } => match source {
        CheckoutError::EmptyBasket => StatusCode::BAD_REQUEST,
        CheckoutError::CardRejected { .. } => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::CreateOrder { .. } | CheckoutError::Charge { .. } => StatusCode::INTERNAL_SERVER_ERROR,
      },
      AppError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }

    let body = match self {
      AppError::Config(m) => json!({"error": "Configuration issue", "detail": m}),
      AppError::Webhook { source } if source.is_rejection() => {
        json!({"error": "Webhook rejected", "detail": source.to_string()})
      }
      AppError::Webhook { source } => json!({"error": "Webhook processing failed", "detail": source.to_string()}),
      AppError::Checkout {
        source: CheckoutError::CardRejected { order_id, code, message },
      } => json!({"error": message, "code": code, "orderId": order_id}),
      AppError::Checkout { source } => json!({"error": source.to_string()}),
      AppError::Timeout(deadline) => {
        json!({"error": "Request timed out", "deadlineSecs": deadline.as_secs()})
      }
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
