// orderflow-server/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use orderflow::{Acknowledgement, FlowOutcome};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

#[instrument(
    name = "handler::stripe_webhook",
    skip(app_state, req, body),
    fields(payload_size = body.len())
)]
pub async fn stripe_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok());

  let deadline = app_state.config.request_deadline;
  let acknowledgement = tokio::time::timeout(deadline, app_state.dispatcher.handle(&body, signature))
    .await
    .map_err(|_| AppError::Timeout(deadline))??;

  info!(?acknowledgement, "Webhook acknowledged.");
  Ok(HttpResponse::Ok().json(acknowledgement_body(&acknowledgement)))
}

fn acknowledgement_body(acknowledgement: &Acknowledgement) -> Value {
  match acknowledgement {
    Acknowledgement::Flow {
      event_type,
      order_id,
      outcome,
    } => {
      let (result, flow_status) = match outcome {
        FlowOutcome::Halted { .. } => ("halted", None),
        FlowOutcome::Idle => ("idle", None),
        FlowOutcome::Skipped { current } => ("skipped", Some(current.as_str())),
        FlowOutcome::Advanced { to, .. } => ("advanced", Some(to.as_str())),
        FlowOutcome::AlreadyFulfilled => ("already_fulfilled", None),
        FlowOutcome::Celebrated => ("celebrated", None),
      };
      json!({
        "received": true,
        "eventType": event_type.as_str(),
        "orderId": order_id,
        "result": result,
        "flowStatus": flow_status,
      })
    }
    Acknowledgement::Charged { order_id } => json!({"received": true, "orderId": order_id, "result": "charged"}),
    Acknowledgement::ChargeSkipped { order_id, status } => {
      json!({"received": true, "orderId": order_id, "result": "charge_skipped", "status": status.as_str()})
    }
    Acknowledgement::ChargeFailed { order_id } => {
      json!({"received": true, "orderId": order_id, "result": "charge_failed"})
    }
    Acknowledgement::PayoutBooked { payout_id, entries } => {
      json!({"received": true, "payoutId": payout_id, "result": "payout_booked", "entries": entries})
    }
    Acknowledgement::Observed { event_type } => {
      json!({"received": true, "eventType": event_type.as_str(), "result": "observed"})
    }
    Acknowledgement::Ignored { event_type } => {
      json!({"received": true, "eventType": event_type, "result": "ignored"})
    }
  }
}
