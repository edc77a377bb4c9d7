// orderflow-server/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use orderflow::CheckoutRequest;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::state::AppState;

#[instrument(
    name = "handler::checkout",
    skip(app_state, request),
    fields(skus = request.skus.len())
)]
pub async fn checkout_handler(
  app_state: web::Data<AppState>,
  request: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
  let deadline = app_state.config.request_deadline;
  let order = tokio::time::timeout(deadline, app_state.checkout.place_order(&request))
    .await
    .map_err(|_| AppError::Timeout(deadline))??;

  info!(order_id = %order.id, status = %order.status, "Checkout completed.");
  Ok(HttpResponse::Ok().json(json!({
    "orderId": order.id,
    "status": order.status.as_str(),
    "orderType": order.order_type_raw(),
    "amount": order.amount,
  })))
}
