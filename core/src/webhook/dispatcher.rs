// orderflow/src/webhook/dispatcher.rs

use super::event::{EventKind, WebhookEvent};
use super::signature::SignatureVerifier;
use crate::domain::{meta, Order, OrderStatus};
use crate::error::{FlowError, WebhookError};
use crate::notify::{Notification, Notifier};
use crate::payout::PayoutReconciler;
use crate::ports::CardError;
use crate::workflow::{FlowOutcome, OrderLocks, Workflow};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// How a delivery was acknowledged. Every variant maps to a 2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
  /// A workflow entry point ran for the order.
  Flow {
    event_type: EventKind,
    order_id: String,
    outcome: FlowOutcome,
  },
  Charged { order_id: String },
  /// The order was no longer awaiting payment when the event arrived.
  ChargeSkipped { order_id: String, status: OrderStatus },
  /// Charging failed; reported to operators, not to the gateway.
  ChargeFailed { order_id: String },
  PayoutBooked { payout_id: String, entries: usize },
  /// Known event with no transition attached.
  Observed { event_type: EventKind },
  Ignored { event_type: String },
}

/// Verifies, classifies and routes gateway webhook deliveries.
pub struct WebhookDispatcher {
  verifier: SignatureVerifier,
  workflow: Arc<Workflow>,
  payouts: Arc<PayoutReconciler>,
  locks: OrderLocks,
  notifier: Notifier,
}

impl WebhookDispatcher {
  pub fn new(
    verifier: SignatureVerifier,
    workflow: Arc<Workflow>,
    payouts: Arc<PayoutReconciler>,
    locks: OrderLocks,
    notifier: Notifier,
  ) -> Self {
    Self {
      verifier,
      workflow,
      payouts,
      locks,
      notifier,
    }
  }

  /// Handles one raw delivery.
  ///
  /// Rejections (bad signature, unparseable body) and workflow failures are
  /// returned as errors after notifying operators; the caller maps them to
  /// 4xx and 5xx respectively.
  #[instrument(name = "WebhookDispatcher::handle", skip_all, fields(bytes = payload.len()), err(Display))]
  pub async fn handle(&self, payload: &[u8], signature: Option<&str>) -> Result<Acknowledgement, WebhookError> {
    if let Err(e) = self.verifier.verify(payload, signature) {
      self.notifier.notify(Notification::failure(
        "Webhook signature verification failed",
        e.to_string(),
        "Rejected webhook",
      ));
      return Err(e.into());
    }

    let (event_id, webhook_event) = match WebhookEvent::parse(payload) {
      Ok(parsed) => parsed,
      Err(e) => {
        self.notifier.notify(Notification::failure(
          "Error decoding webhook event",
          format!("{}: {}", e, String::from_utf8_lossy(&payload[..payload.len().min(512)])),
          "Malformed event",
        ));
        return Err(e);
      }
    };

    event!(
      Level::INFO,
      event_id = event_id.as_deref().unwrap_or_default(),
      event_type = webhook_event.event_type(),
      "Webhook received."
    );
    self.route(webhook_event).await
  }

  /// Routes an already verified event.
  pub async fn route(&self, webhook_event: WebhookEvent) -> Result<Acknowledgement, WebhookError> {
    match webhook_event {
      WebhookEvent::OrderCreated(order) => Ok(self.charge(&order).await),
      WebhookEvent::OrderPaymentSucceeded(order) => {
        let _guard = self.locks.lock(&order.id).await;
        let result = self.workflow.create_customer(&order.id).await;
        self.flow_result(EventKind::OrderPaymentSucceeded, &order, result)
      }
      WebhookEvent::OrderUpdated(order) => {
        let _guard = self.locks.lock(&order.id).await;
        let result = self.workflow.start_flow(&order.id).await;
        self.flow_result(EventKind::OrderUpdated, &order, result)
      }
      WebhookEvent::PayoutPaid(payout) => match self.payouts.reconcile(&payout).await {
        Ok(entries) => {
          self.notifier.notify(Notification::success(
            "Payout",
            format!("payout paid: {}", payout.id),
            "Completed",
          ));
          Ok(Acknowledgement::PayoutBooked {
            payout_id: payout.id,
            entries: entries.len(),
          })
        }
        Err(e) => {
          self.notifier.notify(Notification::failure(
            format!("Payout {}", e.payout_id()),
            e.to_string(),
            "Payout not booked",
          ));
          Err(e.into())
        }
      },
      WebhookEvent::OrderPaymentFailed(order) => {
        event!(Level::WARN, order_id = %order.id, "Payment failed for order, no action taken.");
        Ok(Acknowledgement::Observed {
          event_type: EventKind::OrderPaymentFailed,
        })
      }
      WebhookEvent::ChargeRefunded(charge) => {
        event!(
          Level::WARN,
          charge_id = %charge.id,
          order_id = charge.order.as_deref().unwrap_or_default(),
          amount_refunded = charge.amount_refunded,
          "Charge refunded, no action taken."
        );
        Ok(Acknowledgement::Observed {
          event_type: EventKind::ChargeRefunded,
        })
      }
      WebhookEvent::Unknown(event_type) => {
        event!(Level::DEBUG, event_type = %event_type, "Ignoring unhandled event type.");
        Ok(Acknowledgement::Ignored { event_type })
      }
    }
  }

  /// Charges a freshly created order with the token stored in its metadata.
  /// Only orders still in `created` are charged, so a checkout that already
  /// paid synchronously is not charged again.
  async fn charge(&self, order: &Order) -> Acknowledgement {
    let _guard = self.locks.lock(&order.id).await;
    let gateway = self.workflow.gateway();

    let live = match gateway.get_order(&order.id).await {
      Ok(live) => live,
      Err(e) => return self.charge_failed(&order.id, format!("Could not load order: {:#}", e)),
    };
    if live.status != OrderStatus::Created {
      event!(Level::INFO, order_id = %live.id, status = %live.status, "Order not awaiting payment, not charging.");
      return Acknowledgement::ChargeSkipped {
        order_id: live.id,
        status: live.status,
      };
    }

    let Some(token) = live.meta(meta::TOKEN).filter(|t| !t.is_empty()) else {
      return self.charge_failed(&live.id, "Order has no payment token".to_string());
    };

    let paid = gateway.pay_order(&live.id, token).await;
    match paid {
      Ok(_) => {
        event!(Level::INFO, order_id = %live.id, "Order charged.");
        Acknowledgement::Charged { order_id: live.id }
      }
      Err(e) => {
        let detail = match e.downcast_ref::<CardError>() {
          Some(card) => card.to_string(),
          None => format!("{:#}", e),
        };
        self.charge_failed(&live.id, detail)
      }
    }
  }

  fn charge_failed(&self, order_id: &str, detail: String) -> Acknowledgement {
    event!(Level::ERROR, order_id = %order_id, detail = %detail, "Charging order failed.");
    self.notifier.notify(Notification::failure(
      "Could not capture payment",
      format!("Order {}: {}", order_id, detail),
      "Error pay order",
    ));
    Acknowledgement::ChargeFailed {
      order_id: order_id.to_string(),
    }
  }

  fn flow_result(
    &self,
    event_type: EventKind,
    order: &Order,
    result: Result<FlowOutcome, FlowError>,
  ) -> Result<Acknowledgement, WebhookError> {
    match result {
      Ok(outcome) => Ok(Acknowledgement::Flow {
        event_type,
        order_id: order.id.clone(),
        outcome,
      }),
      Err(source) => {
        let step = source.step().map(|s| s.as_str()).unwrap_or("dispatch");
        self.notifier.notify(Notification::failure(
          format!("Order {} - step {}", source.order_id(), step),
          source.to_string(),
          "Workflow failed",
        ));
        Err(WebhookError::Flow {
          event_type: event_type.as_str().to_string(),
          source,
        })
      }
    }
  }
}
