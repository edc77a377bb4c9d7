// orderflow/src/error.rs
use anyhow::Error as AnyhowError;
use std::fmt;
use thiserror::Error;

/// Remote collaborator a failed call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
  Gateway,
  Invoicing,
}

impl fmt::Display for Service {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Service::Gateway => f.write_str("payment gateway"),
      Service::Invoicing => f.write_str("invoicing service"),
    }
  }
}

/// Named workflow steps, used to label errors and log spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  LoadOrder,
  ChargeOrder,
  CreateCustomer,
  CreateInvoice,
  BookInvoice,
  CreatePayment,
  SendInvoice,
  Celebrate,
}

impl Step {
  pub fn as_str(&self) -> &'static str {
    match self {
      Step::LoadOrder => "load_order",
      Step::ChargeOrder => "charge_order",
      Step::CreateCustomer => "create_customer",
      Step::CreateInvoice => "create_invoice",
      Step::BookInvoice => "book_invoice",
      Step::CreatePayment => "create_payment",
      Step::SendInvoice => "send_invoice",
      Step::Celebrate => "celebrate",
    }
  }
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("{service} call failed in step '{step}' for order {order_id}: {source}")]
  ExternalService {
    service: Service,
    step: Step,
    order_id: String,
    #[source]
    source: AnyhowError,
  },

  #[error("No fulfillment registered for order type '{order_type}' (order {order_id})")]
  UnknownOrderType { order_id: String, order_type: String },

  #[error("Unrecognised flowstatus '{value}' on order {order_id}")]
  UnknownFlowStatus { order_id: String, value: String },

  #[error("Order {order_id} is missing metadata '{key}' needed by step '{step}'")]
  MissingMetadata {
    order_id: String,
    step: Step,
    key: &'static str,
  },

  #[error("Rendering fulfillment message for order {order_id} failed: {source}")]
  Fulfillment {
    order_id: String,
    #[source]
    source: FulfillmentError,
  },
}

impl FlowError {
  pub(crate) fn gateway(step: Step, order_id: &str, source: AnyhowError) -> Self {
    FlowError::ExternalService {
      service: Service::Gateway,
      step,
      order_id: order_id.to_string(),
      source,
    }
  }

  pub(crate) fn invoicing(step: Step, order_id: &str, source: AnyhowError) -> Self {
    FlowError::ExternalService {
      service: Service::Invoicing,
      step,
      order_id: order_id.to_string(),
      source,
    }
  }

  pub fn order_id(&self) -> &str {
    match self {
      FlowError::ExternalService { order_id, .. }
      | FlowError::UnknownOrderType { order_id, .. }
      | FlowError::UnknownFlowStatus { order_id, .. }
      | FlowError::MissingMetadata { order_id, .. }
      | FlowError::Fulfillment { order_id, .. } => order_id,
    }
  }

  /// The step that failed, when the failure belongs to one.
  pub fn step(&self) -> Option<Step> {
    match self {
      FlowError::ExternalService { step, .. } | FlowError::MissingMetadata { step, .. } => Some(*step),
      FlowError::Fulfillment { .. } | FlowError::UnknownOrderType { .. } => Some(Step::SendInvoice),
      FlowError::UnknownFlowStatus { .. } => None,
    }
  }
}

#[derive(Debug, Error)]
pub enum FulfillmentError {
  #[error("Catalog lookup for SKU {sku_id} failed: {source}")]
  Catalog {
    sku_id: String,
    #[source]
    source: AnyhowError,
  },

  #[error("SKU {sku_id} has no '{attribute}' attribute")]
  MissingAttribute { sku_id: String, attribute: &'static str },

  #[error("Order has no purchased items to list")]
  NoItems,
}

#[derive(Debug, Error)]
pub enum PayoutError {
  #[error("Listing balance transactions for payout {payout_id} failed: {source}")]
  ListTransactions {
    payout_id: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Posting ledger entries for payout {payout_id} failed: {source}")]
  PostLedger {
    payout_id: String,
    #[source]
    source: AnyhowError,
  },
}

impl PayoutError {
  pub fn payout_id(&self) -> &str {
    match self {
      PayoutError::ListTransactions { payout_id, .. } | PayoutError::PostLedger { payout_id, .. } => payout_id,
    }
  }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
  #[error("Basket is empty")]
  EmptyBasket,

  #[error("Creating order failed: {source}")]
  CreateOrder {
    #[source]
    source: AnyhowError,
  },

  /// Customer-facing rejection; `message` is ready to show.
  #[error("{message}")]
  CardRejected {
    order_id: String,
    code: String,
    message: String,
  },

  #[error("Charging order {order_id} failed: {source}")]
  Charge {
    order_id: String,
    #[source]
    source: AnyhowError,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
  #[error("Signature header missing")]
  MissingHeader,

  #[error("Signature header malformed: {0}")]
  MalformedHeader(String),

  #[error("Signature timestamp is {age_secs}s away from now, tolerance is {tolerance_secs}s")]
  OutsideTolerance { age_secs: i64, tolerance_secs: i64 },

  #[error("No signature matches the payload")]
  Mismatch,
}

#[derive(Debug, Error)]
pub enum WebhookError {
  #[error("Webhook signature rejected: {0}")]
  Signature(#[from] SignatureError),

  #[error("Malformed '{event_type}' event: {source}")]
  MalformedEvent {
    event_type: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("Handling '{event_type}' failed: {source}")]
  Flow {
    event_type: String,
    #[source]
    source: FlowError,
  },

  #[error(transparent)]
  Payout(#[from] PayoutError),
}

impl WebhookError {
  /// Whether the payload itself was refused, as opposed to a downstream
  /// failure that redelivery may fix.
  pub fn is_rejection(&self) -> bool {
    matches!(self, WebhookError::Signature(_) | WebhookError::MalformedEvent { .. })
  }
}

pub type FlowResult<T, E = FlowError> = std::result::Result<T, E>;
