// orderflow/src/domain/order.rs

//! The gateway-owned `Order` as this crate sees it, plus the closed enumerations
//! that give its string-typed metadata a shape: `FlowStatus`, `OrderType`,
//! `OrderStatus` and `LineItemKind`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Metadata keys written on the gateway order. The spelling is the wire contract.
pub mod meta {
  pub const FLOW_STATUS: &str = "flowstatus";
  pub const NAME: &str = "name";
  pub const EMAIL: &str = "email";
  pub const ADDRESS: &str = "address";
  pub const TOKEN: &str = "token";
  pub const ORDER_TYPE: &str = "ordertype";
  pub const TSHIRT: &str = "tshirt";
  pub const NEWSLETTER: &str = "newsletter";
  pub const CUSTOMER: &str = "customer";
  pub const INVOICE_ID: &str = "invoiceID";
  pub const INVOICE_TIMESTAMP: &str = "invoiceTimestamp";
  pub const INVOICE_NUMBER: &str = "invoiceNumber";
}

/// Gateway-side order status.
///
/// `Fulfilled`, `Canceled` and `Returned` are terminal. `Paid` sits between
/// creation and fulfillment once the charge went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Created,
  Paid,
  Fulfilled,
  Canceled,
  Returned,
}

impl OrderStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Created => "created",
      OrderStatus::Paid => "paid",
      OrderStatus::Fulfilled => "fulfilled",
      OrderStatus::Canceled => "canceled",
      OrderStatus::Returned => "returned",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Fulfilled | OrderStatus::Canceled | OrderStatus::Returned)
  }

  /// Canceled and returned orders leave the workflow without error.
  pub fn is_withdrawn(&self) -> bool {
    matches!(self, OrderStatus::Canceled | OrderStatus::Returned)
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Position of an order in the fulfillment pipeline, persisted under
/// `meta::FLOW_STATUS`. An order without the key has not been paid yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowStatus {
  UserCreated,
  InvoiceCreated,
  InvoiceBooked,
  InvoicePaid,
  EmailSent,
}

impl FlowStatus {
  /// Every status in pipeline order.
  pub const SEQUENCE: [FlowStatus; 5] = [
    FlowStatus::UserCreated,
    FlowStatus::InvoiceCreated,
    FlowStatus::InvoiceBooked,
    FlowStatus::InvoicePaid,
    FlowStatus::EmailSent,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      FlowStatus::UserCreated => "UserCreated",
      FlowStatus::InvoiceCreated => "InvoiceCreated",
      // Lower-case initial is what existing orders carry.
      FlowStatus::InvoiceBooked => "invoiceBooked",
      FlowStatus::InvoicePaid => "InvoicePaid",
      FlowStatus::EmailSent => "EmailSent",
    }
  }

  /// The status the next transition writes, `None` once the order is done.
  pub fn next(&self) -> Option<FlowStatus> {
    match self {
      FlowStatus::UserCreated => Some(FlowStatus::InvoiceCreated),
      FlowStatus::InvoiceCreated => Some(FlowStatus::InvoiceBooked),
      FlowStatus::InvoiceBooked => Some(FlowStatus::InvoicePaid),
      FlowStatus::InvoicePaid => Some(FlowStatus::EmailSent),
      FlowStatus::EmailSent => None,
    }
  }
}

impl fmt::Display for FlowStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for FlowStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    FlowStatus::SEQUENCE
      .iter()
      .copied()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| s.to_string())
  }
}

/// Product classification stored under `meta::ORDER_TYPE`. Selects the
/// fulfillment strategy and the invoice template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
  Badass,
  Bootcamp,
  Foodie,
  Bundle,
  OnlineBootcamp,
}

impl OrderType {
  pub const ALL: [OrderType; 5] = [
    OrderType::Badass,
    OrderType::Bootcamp,
    OrderType::Foodie,
    OrderType::Bundle,
    OrderType::OnlineBootcamp,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderType::Badass => "badass",
      OrderType::Bootcamp => "bootcamp",
      OrderType::Foodie => "foodie",
      OrderType::Bundle => "bundle",
      OrderType::OnlineBootcamp => "onlineBootcamp",
    }
  }

  /// Classifies a basket at checkout: two or more SKUs make a bundle, the
  /// program and recipe-book SKUs map to their own types, anything else is
  /// treated as an online bootcamp.
  pub fn for_basket<S: AsRef<str>>(skus: &[S], program_sku: &str, recipe_book_sku: &str) -> OrderType {
    if skus.len() > 1 {
      return OrderType::Bundle;
    }
    match skus.first().map(AsRef::as_ref) {
      Some(sku) if sku == program_sku => OrderType::Badass,
      Some(sku) if sku == recipe_book_sku => OrderType::Foodie,
      _ => OrderType::OnlineBootcamp,
    }
  }
}

impl fmt::Display for OrderType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    OrderType::ALL
      .iter()
      .copied()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| s.to_string())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineItemKind {
  Sku,
  Discount,
  Tax,
  Shipping,
  #[serde(other)]
  Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
  #[serde(rename = "type")]
  pub kind: LineItemKind,
  /// Minor currency units; negative for discounts.
  pub amount: i64,
  #[serde(default)]
  pub description: String,
  /// SKU id for `Sku` lines, coupon id for `Discount` lines.
  #[serde(default)]
  pub parent: Option<String>,
  #[serde(default)]
  pub quantity: Option<u32>,
}

impl LineItem {
  pub fn sku(sku_id: impl Into<String>, description: impl Into<String>, amount: i64) -> Self {
    Self {
      kind: LineItemKind::Sku,
      amount,
      description: description.into(),
      parent: Some(sku_id.into()),
      quantity: Some(1),
    }
  }

  pub fn discount(coupon_id: impl Into<String>, amount: i64) -> Self {
    Self {
      kind: LineItemKind::Discount,
      amount,
      description: "Discount".to_string(),
      parent: Some(coupon_id.into()),
      quantity: None,
    }
  }
}

/// A purchase record owned by the payment gateway.
///
/// Everything except `status` and `metadata` is immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  pub id: String,
  pub status: OrderStatus,
  /// Total in minor currency units.
  pub amount: i64,
  #[serde(default)]
  pub currency: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub items: Vec<LineItem>,
  #[serde(default)]
  pub metadata: BTreeMap<String, String>,
}

impl Order {
  pub fn meta(&self, key: &str) -> Option<&str> {
    self.metadata.get(key).map(String::as_str)
  }

  /// Raw flowstatus value; empty strings count as absent.
  pub fn flow_status_raw(&self) -> Option<&str> {
    self.meta(meta::FLOW_STATUS).filter(|value| !value.is_empty())
  }

  pub fn flow_status(&self) -> Result<Option<FlowStatus>, String> {
    self.flow_status_raw().map(str::parse).transpose()
  }

  pub fn order_type_raw(&self) -> Option<&str> {
    self.meta(meta::ORDER_TYPE)
  }

  pub fn customer_name(&self) -> &str {
    self.meta(meta::NAME).unwrap_or_default()
  }

  pub fn sku_items(&self) -> impl Iterator<Item = &LineItem> {
    self.items.iter().filter(|item| item.kind == LineItemKind::Sku)
  }

  /// Applies a patch the way the gateway does: metadata keys are merged, a
  /// status, when present, replaces the current one.
  pub fn apply(&mut self, patch: &OrderPatch) {
    for (key, value) in &patch.metadata {
      self.metadata.insert(key.clone(), value.clone());
    }
    if let Some(status) = patch.status {
      self.status = status;
    }
  }
}

/// An update sent to the gateway. Only the listed keys are touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
  pub metadata: BTreeMap<String, String>,
  pub status: Option<OrderStatus>,
}

impl OrderPatch {
  /// A patch that moves the order to `flow` and nothing else.
  pub fn advance(flow: FlowStatus) -> Self {
    let mut patch = Self::default();
    patch.metadata.insert(meta::FLOW_STATUS.to_string(), flow.as_str().to_string());
    patch
  }

  pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
    self.metadata.insert(key.to_string(), value.into());
    self
  }

  pub fn with_status(mut self, status: OrderStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn flow_status(&self) -> Option<&str> {
    self.metadata.get(meta::FLOW_STATUS).map(String::as_str)
  }
}

/// Parameters for creating an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
  pub currency: String,
  pub email: String,
  pub skus: Vec<String>,
  pub coupon: Option<String>,
  pub metadata: BTreeMap<String, String>,
}
