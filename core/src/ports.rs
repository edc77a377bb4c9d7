// orderflow/src/ports.rs

//! Capabilities the workflow consumes from remote collaborators.
//!
//! Every call returns `anyhow::Result`: transport and API failures are opaque
//! to the workflow, which only wraps them with the step and order they broke.
//! The one failure the workflow looks inside is a declined charge, carried as
//! a [`CardError`] that callers recover with `downcast_ref`.

use crate::domain::{BalanceTransaction, LedgerEntry, Money, NewOrder, Order, OrderPatch};
use crate::notify::Notification;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// A catalog entry for one SKU and its free-form attributes
/// (bootcamp date, start time, focus, community link, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductVariant {
  pub id: String,
  pub attributes: BTreeMap<String, String>,
}

impl ProductVariant {
  pub fn attribute(&self, key: &str) -> Option<&str> {
    self.attributes.get(key).map(String::as_str)
  }
}

/// Card-level rejection reported by the gateway when charging an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("card error ({code}): {message}")]
pub struct CardError {
  /// Gateway decline code, e.g. `card_declined`, `expired_card`.
  pub code: String,
  pub message: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn get_order(&self, order_id: &str) -> anyhow::Result<Order>;

  /// Merges `patch` into the order and returns the updated order.
  async fn update_order(&self, order_id: &str, patch: &OrderPatch) -> anyhow::Result<Order>;

  /// Charges the order with a stored payment source token.
  async fn pay_order(&self, order_id: &str, source_token: &str) -> anyhow::Result<Order>;

  async fn create_order(&self, order: &NewOrder) -> anyhow::Result<Order>;

  async fn list_balance_transactions(&self, payout_id: &str) -> anyhow::Result<Vec<BalanceTransaction>>;

  async fn get_product_variant(&self, sku_id: &str) -> anyhow::Result<ProductVariant>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
  pub email: String,
  pub name: String,
  pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
  pub description: String,
  pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDraft {
  pub customer_id: String,
  pub lines: Vec<InvoiceLine>,
  /// Layout template; `None` uses the service default.
  pub template_id: Option<String>,
}

/// Handle to an invoice as the invoicing service returns it.
///
/// `timestamp` is the service's optimistic-concurrency token; every mutation
/// must present the latest one. `number` is only assigned once booked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRef {
  pub id: String,
  pub number: Option<i64>,
  pub timestamp: String,
}

#[async_trait]
pub trait InvoicingService: Send + Sync {
  /// Returns the new contact id.
  async fn create_customer(&self, customer: &NewCustomer) -> anyhow::Result<String>;

  async fn create_invoice(&self, draft: &InvoiceDraft) -> anyhow::Result<InvoiceRef>;

  /// Finalizes a draft. Booking an already booked invoice returns it unchanged.
  async fn book_invoice(&self, invoice_id: &str, timestamp: &str) -> anyhow::Result<InvoiceRef>;

  /// Registers a payment. Paying an already paid invoice is a no-op.
  async fn create_payment(&self, invoice_id: &str, amount: Money) -> anyhow::Result<()>;

  async fn send_invoice(&self, invoice_id: &str, subject: &str, body: &str) -> anyhow::Result<()>;

  async fn post_ledger_entries(&self, entries: &[LedgerEntry]) -> anyhow::Result<()>;
}

/// Operator alerting channel. Called from the notification worker only.
#[async_trait]
pub trait NotificationSink: Send + Sync {
  async fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}
