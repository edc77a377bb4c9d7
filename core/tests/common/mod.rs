// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use orderflow::memory::{InMemoryGateway, InMemoryInvoicing};
use orderflow::ports::ProductVariant;
use orderflow::{
  meta, CheckoutService, FlowStatus, FulfillmentRegistry, LedgerAccounts, LineItem, Notification, NotificationQueue,
  Notifier, Order, OrderLocks, OrderStatus, OrderType, PayoutReconciler, SignatureVerifier, StoreSettings,
  WebhookDispatcher, Workflow,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Level;

pub const SECRET: &str = "whsec_test_secret";
pub const ORDER_ID: &str = "or_test_1";
pub const BOOTCAMP_SKU_A: &str = "sku_bootcamp_mar";
pub const BOOTCAMP_SKU_B: &str = "sku_bootcamp_apr";
pub const ONLINE_SKU: &str = "sku_online_spring";

/// Every collaborator in memory, wired the way the server wires the real ones.
pub struct Harness {
  pub settings: Arc<StoreSettings>,
  pub gateway: Arc<InMemoryGateway>,
  pub invoicing: Arc<InMemoryInvoicing>,
  pub notifier: Notifier,
  pub queue: NotificationQueue,
  pub locks: OrderLocks,
  pub workflow: Arc<Workflow>,
  pub payouts: Arc<PayoutReconciler>,
}

impl Harness {
  pub fn new() -> Self {
    let settings = Arc::new(StoreSettings::default());
    let gateway = Arc::new(InMemoryGateway::with_store_catalog(&settings));
    gateway.add_variant(variant(
      BOOTCAMP_SKU_A,
      &[("date", "12. marts"), ("StartsAt", "10:00"), ("fokus", "Ben og baller")],
    ));
    gateway.add_variant(variant(
      BOOTCAMP_SKU_B,
      &[("date", "9. april"), ("StartsAt", "11:30"), ("fokus", "Overkrop")],
    ));
    gateway.add_variant(variant(ONLINE_SKU, &[("facebook", "https://facebook.com/groups/badass-online")]));

    let invoicing = Arc::new(InMemoryInvoicing::new());
    let (notifier, queue) = Notifier::channel(64);
    let fulfillments = FulfillmentRegistry::standard(settings.clone(), gateway.clone());
    let workflow = Arc::new(Workflow::new(
      gateway.clone(),
      invoicing.clone(),
      fulfillments,
      notifier.clone(),
    ));
    let payouts = Arc::new(PayoutReconciler::new(
      gateway.clone(),
      invoicing.clone(),
      LedgerAccounts::default(),
    ));

    Self {
      settings,
      gateway,
      invoicing,
      notifier,
      queue,
      locks: OrderLocks::new(),
      workflow,
      payouts,
    }
  }

  pub fn dispatcher(&self) -> WebhookDispatcher {
    self.dispatcher_with(SignatureVerifier::new(SECRET))
  }

  pub fn dispatcher_with(&self, verifier: SignatureVerifier) -> WebhookDispatcher {
    WebhookDispatcher::new(
      verifier,
      self.workflow.clone(),
      self.payouts.clone(),
      self.locks.clone(),
      self.notifier.clone(),
    )
  }

  pub fn checkout(&self) -> CheckoutService {
    CheckoutService::new(
      self.gateway.clone(),
      self.settings.clone(),
      self.locks.clone(),
      self.notifier.clone(),
    )
  }

  pub fn notifications(&mut self) -> Vec<Notification> {
    self.queue.drain()
  }

  pub fn clear_calls(&self) {
    self.gateway.clear_calls();
    self.invoicing.clear_calls();
  }

  pub fn order(&self, order_id: &str) -> Order {
    self.gateway.order(order_id).expect("order exists in gateway")
  }
}

pub fn variant(sku_id: &str, attributes: &[(&str, &str)]) -> ProductVariant {
  ProductVariant {
    id: sku_id.to_string(),
    attributes: attributes
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect(),
  }
}

/// A paid order for `order_type` as the gateway would hold it before any
/// workflow step ran.
pub fn sample_order(order_id: &str, order_type: OrderType) -> Order {
  let settings = StoreSettings::default();
  let items = match order_type {
    OrderType::Badass => vec![LineItem::sku(settings.program_sku.as_str(), "Badass træningsprogram", 49900)],
    OrderType::Foodie => vec![LineItem::sku(settings.recipe_book_sku.as_str(), "15-minute kitchen", 19900)],
    OrderType::Bundle => vec![
      LineItem::sku(settings.program_sku.as_str(), "Badass træningsprogram", 49900),
      LineItem::sku(settings.recipe_book_sku.as_str(), "15-minute kitchen", 19900),
      LineItem::discount(settings.bundle_coupon.as_str(), -13960),
    ],
    OrderType::Bootcamp => vec![
      LineItem::sku(BOOTCAMP_SKU_A, "Bootcamp marts", 15000),
      LineItem::sku(BOOTCAMP_SKU_B, "Bootcamp april", 15000),
    ],
    OrderType::OnlineBootcamp => vec![LineItem::sku(ONLINE_SKU, "Online bootcamp", 29900)],
  };

  let mut metadata = BTreeMap::new();
  metadata.insert(meta::NAME.to_string(), "Anna".to_string());
  metadata.insert(meta::EMAIL.to_string(), "a@x.com".to_string());
  metadata.insert(meta::ADDRESS.to_string(), "Main st".to_string());
  metadata.insert(meta::TOKEN.to_string(), "tok_visa".to_string());
  metadata.insert(meta::ORDER_TYPE.to_string(), order_type.as_str().to_string());

  Order {
    id: order_id.to_string(),
    status: OrderStatus::Paid,
    amount: items.iter().map(|item| item.amount).sum(),
    currency: Some("dkk".to_string()),
    email: Some("a@x.com".to_string()),
    items,
    metadata,
  }
}

pub fn with_flow(mut order: Order, flow: FlowStatus) -> Order {
  order
    .metadata
    .insert(meta::FLOW_STATUS.to_string(), flow.as_str().to_string());
  order
}

pub fn envelope(event_type: &str, object: Value) -> Vec<u8> {
  serde_json::to_vec(&json!({
    "id": "evt_test",
    "object": "event",
    "type": event_type,
    "data": { "object": object },
  }))
  .expect("envelope serializes")
}

/// Body and `Stripe-Signature` header for a delivery signed just now.
pub fn signed(event_type: &str, object: Value) -> (Vec<u8>, String) {
  let body = envelope(event_type, object);
  let header = SignatureVerifier::new(SECRET)
    .sign(&body, chrono::Utc::now().timestamp())
    .expect("signing works");
  (body, header)
}

pub fn order_json(order: &Order) -> Value {
  serde_json::to_value(order).expect("order serializes")
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
