// orderflow/src/webhook/event.rs

use crate::domain::{Order, Payout};
use crate::error::WebhookError;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Event types the dispatcher acts on. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
  PayoutPaid,
  OrderCreated,
  OrderPaymentSucceeded,
  OrderPaymentFailed,
  ChargeRefunded,
  OrderUpdated,
}

impl EventKind {
  pub const ALL: [EventKind; 6] = [
    EventKind::PayoutPaid,
    EventKind::OrderCreated,
    EventKind::OrderPaymentSucceeded,
    EventKind::OrderPaymentFailed,
    EventKind::ChargeRefunded,
    EventKind::OrderUpdated,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      EventKind::PayoutPaid => "payout.paid",
      EventKind::OrderCreated => "order.created",
      EventKind::OrderPaymentSucceeded => "order.payment_succeeded",
      EventKind::OrderPaymentFailed => "order.payment_failed",
      EventKind::ChargeRefunded => "charge.refunded",
      EventKind::OrderUpdated => "order.updated",
    }
  }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EventKind {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    EventKind::ALL.iter().copied().find(|kind| kind.as_str() == s).ok_or(())
  }
}

/// The signed wrapper every delivery arrives in.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(rename = "type")]
  pub event_type: String,
  pub data: EnvelopeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeData {
  #[serde(alias = "raw")]
  pub object: Value,
}

/// The parts of a refunded charge worth logging.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Charge {
  pub id: String,
  #[serde(default)]
  pub amount_refunded: i64,
  #[serde(default)]
  pub order: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
  PayoutPaid(Payout),
  OrderCreated(Order),
  OrderPaymentSucceeded(Order),
  OrderPaymentFailed(Order),
  ChargeRefunded(Charge),
  OrderUpdated(Order),
  /// Any type not listed above; acknowledged and ignored.
  Unknown(String),
}

impl WebhookEvent {
  /// Parses a raw (already verified) delivery body.
  pub fn parse(payload: &[u8]) -> Result<(Option<String>, WebhookEvent), WebhookError> {
    let envelope: Envelope = serde_json::from_slice(payload).map_err(|source| WebhookError::MalformedEvent {
      event_type: "<envelope>".to_string(),
      source,
    })?;

    let Ok(kind) = envelope.event_type.parse::<EventKind>() else {
      return Ok((envelope.id, WebhookEvent::Unknown(envelope.event_type)));
    };

    let object = envelope.data.object;
    let malformed = |source| WebhookError::MalformedEvent {
      event_type: kind.as_str().to_string(),
      source,
    };
    let event = match kind {
      EventKind::PayoutPaid => WebhookEvent::PayoutPaid(serde_json::from_value(object).map_err(malformed)?),
      EventKind::OrderCreated => WebhookEvent::OrderCreated(serde_json::from_value(object).map_err(malformed)?),
      EventKind::OrderPaymentSucceeded => {
        WebhookEvent::OrderPaymentSucceeded(serde_json::from_value(object).map_err(malformed)?)
      }
      EventKind::OrderPaymentFailed => {
        WebhookEvent::OrderPaymentFailed(serde_json::from_value(object).map_err(malformed)?)
      }
      EventKind::ChargeRefunded => WebhookEvent::ChargeRefunded(serde_json::from_value(object).map_err(malformed)?),
      EventKind::OrderUpdated => WebhookEvent::OrderUpdated(serde_json::from_value(object).map_err(malformed)?),
    };
    Ok((envelope.id, event))
  }

  pub fn event_type(&self) -> &str {
    match self {
      WebhookEvent::PayoutPaid(_) => EventKind::PayoutPaid.as_str(),
      WebhookEvent::OrderCreated(_) => EventKind::OrderCreated.as_str(),
      WebhookEvent::OrderPaymentSucceeded(_) => EventKind::OrderPaymentSucceeded.as_str(),
      WebhookEvent::OrderPaymentFailed(_) => EventKind::OrderPaymentFailed.as_str(),
      WebhookEvent::ChargeRefunded(_) => EventKind::ChargeRefunded.as_str(),
      WebhookEvent::OrderUpdated(_) => EventKind::OrderUpdated.as_str(),
      WebhookEvent::Unknown(event_type) => event_type,
    }
  }
}
