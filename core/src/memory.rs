// orderflow/src/memory.rs

//! In-process collaborators.
//!
//! Deterministic stand-ins for the payment gateway, the invoicing service and
//! the notification sink. They keep state in memory, record every call, and
//! can be told to fail specific operations. Used by the test-suite, the
//! walkthrough example and the server's mock mode.

use crate::domain::{
  BalanceTransaction, LedgerEntry, LineItem, Money, NewOrder, Order, OrderPatch, OrderStatus,
};
use crate::fulfillment::StoreSettings;
use crate::notify::Notification;
use crate::ports::{
  CardError, InvoiceDraft, InvoiceRef, InvoicingService, NewCustomer, NotificationSink, PaymentGateway,
  ProductVariant,
};
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{event, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
  GetOrder,
  UpdateOrder,
  PayOrder,
  CreateOrder,
  ListBalanceTransactions,
  GetProductVariant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
  GetOrder(String),
  UpdateOrder(String, OrderPatch),
  PayOrder(String, String),
  CreateOrder(NewOrder),
  ListBalanceTransactions(String),
  GetProductVariant(String),
}

impl GatewayCall {
  pub fn op(&self) -> GatewayOp {
    match self {
      GatewayCall::GetOrder(_) => GatewayOp::GetOrder,
      GatewayCall::UpdateOrder(..) => GatewayOp::UpdateOrder,
      GatewayCall::PayOrder(..) => GatewayOp::PayOrder,
      GatewayCall::CreateOrder(_) => GatewayOp::CreateOrder,
      GatewayCall::ListBalanceTransactions(_) => GatewayOp::ListBalanceTransactions,
      GatewayCall::GetProductVariant(_) => GatewayOp::GetProductVariant,
    }
  }

  /// Anything other than a read.
  pub fn is_mutation(&self) -> bool {
    matches!(
      self,
      GatewayCall::UpdateOrder(..) | GatewayCall::PayOrder(..) | GatewayCall::CreateOrder(_)
    )
  }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
  description: String,
  price: i64,
}

#[derive(Debug, Default)]
struct GatewayState {
  orders: HashMap<String, Order>,
  catalog: HashMap<String, CatalogEntry>,
  coupons: HashMap<String, i64>,
  variants: HashMap<String, ProductVariant>,
  balance: HashMap<String, Vec<BalanceTransaction>>,
  calls: Vec<GatewayCall>,
  failing: HashSet<GatewayOp>,
  decline: Option<CardError>,
  next_id: u64,
}

/// Payment gateway kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
  state: Mutex<GatewayState>,
}

impl InMemoryGateway {
  pub fn new() -> Self {
    Self::default()
  }

  /// A gateway selling the store's program and recipe book, with the bundle
  /// coupon taking 20% off the pair.
  pub fn with_store_catalog(settings: &StoreSettings) -> Self {
    let gateway = Self::new();
    gateway.add_sku(&settings.program_sku, "Badass træningsprogram", 49900);
    gateway.add_sku(&settings.recipe_book_sku, "15-minute kitchen", 19900);
    gateway.add_coupon(&settings.bundle_coupon, -13960);
    gateway
  }

  pub fn add_sku(&self, sku_id: &str, description: &str, price: i64) {
    self.state.lock().catalog.insert(
      sku_id.to_string(),
      CatalogEntry {
        description: description.to_string(),
        price,
      },
    );
  }

  /// `amount` is the discount line's (negative) amount.
  pub fn add_coupon(&self, coupon_id: &str, amount: i64) {
    self.state.lock().coupons.insert(coupon_id.to_string(), amount);
  }

  pub fn add_variant(&self, variant: ProductVariant) {
    self.state.lock().variants.insert(variant.id.clone(), variant);
  }

  pub fn add_balance_transactions(&self, payout_id: &str, transactions: Vec<BalanceTransaction>) {
    self
      .state
      .lock()
      .balance
      .entry(payout_id.to_string())
      .or_default()
      .extend(transactions);
  }

  pub fn insert_order(&self, order: Order) {
    self.state.lock().orders.insert(order.id.clone(), order);
  }

  pub fn order(&self, order_id: &str) -> Option<Order> {
    self.state.lock().orders.get(order_id).cloned()
  }

  /// Changes an order's status without recording a call, as an operator
  /// would from the gateway dashboard.
  pub fn set_status(&self, order_id: &str, status: OrderStatus) {
    if let Some(order) = self.state.lock().orders.get_mut(order_id) {
      order.status = status;
    }
  }

  pub fn fail(&self, op: GatewayOp) {
    self.state.lock().failing.insert(op);
  }

  pub fn recover(&self, op: GatewayOp) {
    self.state.lock().failing.remove(&op);
  }

  /// Makes every charge fail with `card` until cleared.
  pub fn decline_charges(&self, card: Option<CardError>) {
    self.state.lock().decline = card;
  }

  pub fn calls(&self) -> Vec<GatewayCall> {
    self.state.lock().calls.clone()
  }

  pub fn clear_calls(&self) {
    self.state.lock().calls.clear();
  }

  fn record(&self, call: GatewayCall) -> anyhow::Result<parking_lot::MutexGuard<'_, GatewayState>> {
    let mut state = self.state.lock();
    let op = call.op();
    state.calls.push(call);
    if state.failing.contains(&op) {
      bail!("injected gateway failure: {:?}", op);
    }
    Ok(state)
  }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
  async fn get_order(&self, order_id: &str) -> anyhow::Result<Order> {
    let state = self.record(GatewayCall::GetOrder(order_id.to_string()))?;
    state
      .orders
      .get(order_id)
      .cloned()
      .ok_or_else(|| anyhow!("No such order: {}", order_id))
  }

  async fn update_order(&self, order_id: &str, patch: &OrderPatch) -> anyhow::Result<Order> {
    let mut state = self.record(GatewayCall::UpdateOrder(order_id.to_string(), patch.clone()))?;
    let order = state
      .orders
      .get_mut(order_id)
      .ok_or_else(|| anyhow!("No such order: {}", order_id))?;
    order.apply(patch);
    Ok(order.clone())
  }

  async fn pay_order(&self, order_id: &str, source_token: &str) -> anyhow::Result<Order> {
    let mut state = self.record(GatewayCall::PayOrder(order_id.to_string(), source_token.to_string()))?;
    if let Some(card) = state.decline.clone() {
      return Err(card.into());
    }
    let order = state
      .orders
      .get_mut(order_id)
      .ok_or_else(|| anyhow!("No such order: {}", order_id))?;
    if order.status != OrderStatus::Created {
      bail!("Order {} cannot be paid in status {}", order_id, order.status);
    }
    order.status = OrderStatus::Paid;
    Ok(order.clone())
  }

  async fn create_order(&self, new_order: &NewOrder) -> anyhow::Result<Order> {
    let mut state = self.record(GatewayCall::CreateOrder(new_order.clone()))?;
    let mut items = Vec::with_capacity(new_order.skus.len() + 1);
    for sku_id in &new_order.skus {
      let entry = state
        .catalog
        .get(sku_id)
        .ok_or_else(|| anyhow!("No such sku: {}", sku_id))?;
      items.push(LineItem::sku(sku_id.as_str(), entry.description.as_str(), entry.price));
    }
    if let Some(coupon_id) = &new_order.coupon {
      let amount = *state
        .coupons
        .get(coupon_id)
        .ok_or_else(|| anyhow!("No such coupon: {}", coupon_id))?;
      items.push(LineItem::discount(coupon_id.as_str(), amount));
    }

    state.next_id += 1;
    let order = Order {
      id: format!("or_{:06}", state.next_id),
      status: OrderStatus::Created,
      amount: items.iter().map(|item| item.amount).sum(),
      currency: Some(new_order.currency.clone()),
      email: Some(new_order.email.clone()),
      items,
      metadata: new_order.metadata.clone(),
    };
    state.orders.insert(order.id.clone(), order.clone());
    Ok(order)
  }

  async fn list_balance_transactions(&self, payout_id: &str) -> anyhow::Result<Vec<BalanceTransaction>> {
    let state = self.record(GatewayCall::ListBalanceTransactions(payout_id.to_string()))?;
    Ok(state.balance.get(payout_id).cloned().unwrap_or_default())
  }

  async fn get_product_variant(&self, sku_id: &str) -> anyhow::Result<ProductVariant> {
    let state = self.record(GatewayCall::GetProductVariant(sku_id.to_string()))?;
    state
      .variants
      .get(sku_id)
      .cloned()
      .ok_or_else(|| anyhow!("No such sku: {}", sku_id))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoicingOp {
  CreateCustomer,
  CreateInvoice,
  BookInvoice,
  CreatePayment,
  SendInvoice,
  PostLedgerEntries,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoicingCall {
  CreateCustomer(NewCustomer),
  CreateInvoice(InvoiceDraft),
  BookInvoice { invoice_id: String, timestamp: String },
  CreatePayment { invoice_id: String, amount: Money },
  SendInvoice { invoice_id: String, subject: String, body: String },
  PostLedgerEntries(Vec<LedgerEntry>),
}

impl InvoicingCall {
  pub fn op(&self) -> InvoicingOp {
    match self {
      InvoicingCall::CreateCustomer(_) => InvoicingOp::CreateCustomer,
      InvoicingCall::CreateInvoice(_) => InvoicingOp::CreateInvoice,
      InvoicingCall::BookInvoice { .. } => InvoicingOp::BookInvoice,
      InvoicingCall::CreatePayment { .. } => InvoicingOp::CreatePayment,
      InvoicingCall::SendInvoice { .. } => InvoicingOp::SendInvoice,
      InvoicingCall::PostLedgerEntries(_) => InvoicingOp::PostLedgerEntries,
    }
  }
}

/// An invoice as the in-memory service stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredInvoice {
  pub id: String,
  pub draft: InvoiceDraft,
  pub number: Option<i64>,
  pub timestamp: String,
  pub paid: Option<Money>,
  pub sent: Vec<(String, String)>,
}

impl StoredInvoice {
  fn as_ref(&self) -> InvoiceRef {
    InvoiceRef {
      id: self.id.clone(),
      number: self.number,
      timestamp: self.timestamp.clone(),
    }
  }

  fn touch(&mut self, version: u64) {
    self.timestamp = format!("{:016x}", version);
  }
}

#[derive(Debug, Default)]
struct InvoicingState {
  contacts: BTreeMap<String, NewCustomer>,
  invoices: BTreeMap<String, StoredInvoice>,
  ledger: Vec<LedgerEntry>,
  calls: Vec<InvoicingCall>,
  failing: HashSet<InvoicingOp>,
  next_id: u64,
  next_number: i64,
  version: u64,
}

/// Invoicing service kept in memory. Enforces the optimistic timestamp on
/// booking and refuses to email drafts.
#[derive(Debug, Default)]
pub struct InMemoryInvoicing {
  state: Mutex<InvoicingState>,
}

impl InMemoryInvoicing {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail(&self, op: InvoicingOp) {
    self.state.lock().failing.insert(op);
  }

  pub fn recover(&self, op: InvoicingOp) {
    self.state.lock().failing.remove(&op);
  }

  pub fn calls(&self) -> Vec<InvoicingCall> {
    self.state.lock().calls.clone()
  }

  pub fn clear_calls(&self) {
    self.state.lock().calls.clear();
  }

  pub fn contact(&self, contact_id: &str) -> Option<NewCustomer> {
    self.state.lock().contacts.get(contact_id).cloned()
  }

  pub fn invoice(&self, invoice_id: &str) -> Option<StoredInvoice> {
    self.state.lock().invoices.get(invoice_id).cloned()
  }

  pub fn ledger(&self) -> Vec<LedgerEntry> {
    self.state.lock().ledger.clone()
  }

  fn record(&self, call: InvoicingCall) -> anyhow::Result<parking_lot::MutexGuard<'_, InvoicingState>> {
    let mut state = self.state.lock();
    let op = call.op();
    state.calls.push(call);
    if state.failing.contains(&op) {
      bail!("injected invoicing failure: {:?}", op);
    }
    Ok(state)
  }
}

fn stored<'a>(state: &'a mut InvoicingState, invoice_id: &str) -> anyhow::Result<&'a mut StoredInvoice> {
  state
    .invoices
    .get_mut(invoice_id)
    .ok_or_else(|| anyhow!("No such invoice: {}", invoice_id))
}

#[async_trait]
impl InvoicingService for InMemoryInvoicing {
  async fn create_customer(&self, customer: &NewCustomer) -> anyhow::Result<String> {
    let mut state = self.record(InvoicingCall::CreateCustomer(customer.clone()))?;
    state.next_id += 1;
    let contact_id = format!("contact-{}", state.next_id);
    state.contacts.insert(contact_id.clone(), customer.clone());
    Ok(contact_id)
  }

  async fn create_invoice(&self, draft: &InvoiceDraft) -> anyhow::Result<InvoiceRef> {
    let mut state = self.record(InvoicingCall::CreateInvoice(draft.clone()))?;
    if !state.contacts.contains_key(&draft.customer_id) {
      bail!("No such contact: {}", draft.customer_id);
    }
    if draft.lines.is_empty() {
      bail!("Invoice needs at least one line");
    }
    state.next_id += 1;
    state.version += 1;
    let mut invoice = StoredInvoice {
      id: format!("invoice-{}", state.next_id),
      draft: draft.clone(),
      number: None,
      timestamp: String::new(),
      paid: None,
      sent: Vec::new(),
    };
    invoice.touch(state.version);
    let handle = invoice.as_ref();
    state.invoices.insert(invoice.id.clone(), invoice);
    Ok(handle)
  }

  async fn book_invoice(&self, invoice_id: &str, timestamp: &str) -> anyhow::Result<InvoiceRef> {
    let mut state = self.record(InvoicingCall::BookInvoice {
      invoice_id: invoice_id.to_string(),
      timestamp: timestamp.to_string(),
    })?;
    {
      let invoice = stored(&mut state, invoice_id)?;
      if invoice.number.is_some() {
        return Ok(invoice.as_ref());
      }
      if invoice.timestamp != timestamp {
        bail!("Stale timestamp for invoice {}", invoice_id);
      }
    }
    state.next_number += 1;
    state.version += 1;
    let (number, version) = (state.next_number, state.version);
    let invoice = stored(&mut state, invoice_id)?;
    invoice.number = Some(number);
    invoice.touch(version);
    Ok(invoice.as_ref())
  }

  async fn create_payment(&self, invoice_id: &str, amount: Money) -> anyhow::Result<()> {
    let mut state = self.record(InvoicingCall::CreatePayment {
      invoice_id: invoice_id.to_string(),
      amount,
    })?;
    state.version += 1;
    let version = state.version;
    let invoice = stored(&mut state, invoice_id)?;
    if invoice.paid.is_some() {
      return Ok(());
    }
    invoice.paid = Some(amount);
    invoice.touch(version);
    Ok(())
  }

  async fn send_invoice(&self, invoice_id: &str, subject: &str, body: &str) -> anyhow::Result<()> {
    let mut state = self.record(InvoicingCall::SendInvoice {
      invoice_id: invoice_id.to_string(),
      subject: subject.to_string(),
      body: body.to_string(),
    })?;
    let invoice = stored(&mut state, invoice_id)?;
    if invoice.number.is_none() {
      bail!("Invoice {} is a draft and cannot be emailed", invoice_id);
    }
    invoice.sent.push((subject.to_string(), body.to_string()));
    Ok(())
  }

  async fn post_ledger_entries(&self, entries: &[LedgerEntry]) -> anyhow::Result<()> {
    let mut state = self.record(InvoicingCall::PostLedgerEntries(entries.to_vec()))?;
    state.ledger.extend_from_slice(entries);
    Ok(())
  }
}

/// Sink that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
  async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
    event!(
      Level::INFO,
      title = %notification.title,
      status = %notification.status,
      color = notification.color.hex(),
      "{}",
      notification.detail
    );
    Ok(())
  }
}

/// Sink that keeps every delivered notification.
#[derive(Debug, Default)]
pub struct RecordingSink {
  delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn delivered(&self) -> Vec<Notification> {
    self.delivered.lock().clone()
  }
}

#[async_trait]
impl NotificationSink for RecordingSink {
  async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
    self.delivered.lock().push(notification.clone());
    Ok(())
  }
}
