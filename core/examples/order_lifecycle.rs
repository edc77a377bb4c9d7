// orderflow/examples/order_lifecycle.rs

//! Walks one bundle purchase from checkout to the celebration notification
//! using the in-memory collaborators. Each `order.updated` delivery the
//! gateway would send after a metadata change is simulated by routing the
//! event by hand.

use orderflow::memory::{InMemoryGateway, InMemoryInvoicing, LogSink};
use orderflow::{
  meta, Acknowledgement, CheckoutRequest, CheckoutService, FlowOutcome, FulfillmentRegistry, LedgerAccounts,
  Notifier, OrderLocks, Payout, PayoutReconciler, SignatureVerifier, StoreSettings, WebhookDispatcher, WebhookEvent,
  Workflow,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Order Lifecycle Example ---");

  let settings = Arc::new(StoreSettings::default());
  let gateway = Arc::new(InMemoryGateway::with_store_catalog(&settings));
  let invoicing = Arc::new(InMemoryInvoicing::new());
  let (notifier, queue) = Notifier::channel(16);
  let worker = tokio::spawn(queue.run(Arc::new(LogSink)));
  let locks = OrderLocks::new();

  let workflow = Arc::new(Workflow::new(
    gateway.clone(),
    invoicing.clone(),
    FulfillmentRegistry::standard(settings.clone(), gateway.clone()),
    notifier.clone(),
  ));
  let payouts = Arc::new(PayoutReconciler::new(
    gateway.clone(),
    invoicing.clone(),
    LedgerAccounts::default(),
  ));
  let dispatcher = WebhookDispatcher::new(
    SignatureVerifier::insecure(),
    workflow,
    payouts,
    locks.clone(),
    notifier.clone(),
  );
  let checkout = CheckoutService::new(gateway.clone(), settings.clone(), locks, notifier.clone());

  // 1. Checkout creates and charges the order.
  let order = checkout
    .place_order(&CheckoutRequest {
      name: "Anna".to_string(),
      email: "anna@example.com".to_string(),
      address: "Main st 1".to_string(),
      tshirt: "M".to_string(),
      stripe_token: "tok_visa".to_string(),
      skus: vec![settings.program_sku.clone(), settings.recipe_book_sku.clone()],
      newsletter: false,
    })
    .await?;
  info!(order_id = %order.id, amount = order.amount, "Order placed.");

  // 2. The gateway confirms the payment.
  let ack = dispatcher.route(WebhookEvent::OrderPaymentSucceeded(order.clone())).await?;
  info!(?ack, "payment_succeeded handled.");

  // 3. Every metadata update triggers order.updated; keep feeding them back.
  loop {
    let ack = dispatcher.route(WebhookEvent::OrderUpdated(order.clone())).await?;
    info!(?ack, "order.updated handled.");
    if let Acknowledgement::Flow {
      outcome: FlowOutcome::Celebrated,
      ..
    } = ack
    {
      break;
    }
  }

  let done = gateway.order(&order.id).ok_or_else(|| anyhow::anyhow!("order vanished"))?;
  info!(
    status = %done.status,
    invoice_number = done.meta(meta::INVOICE_NUMBER).unwrap_or_default(),
    "Order finished."
  );

  // 4. Later the gateway pays out and the fees are booked.
  dispatcher
    .route(WebhookEvent::PayoutPaid(Payout {
      id: "po_example".to_string(),
      amount: done.amount,
      currency: Some("dkk".to_string()),
    }))
    .await?;
  for entry in invoicing.ledger() {
    info!(account = entry.account_number, amount = %entry.amount, "{}", entry.description);
  }

  drop(dispatcher);
  drop(checkout);
  drop(notifier);
  worker.await?;
  Ok(())
}
