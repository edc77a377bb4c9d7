use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orderflow::memory::{InMemoryGateway, InMemoryInvoicing};
use orderflow::{
  meta, FlowOutcome, Fulfillment, FulfillmentRegistry, LineItem, Notifier, Order, OrderStatus, OrderType, SignatureVerifier,
  StoreSettings, WebhookEvent, Workflow,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Runtime; // To run async code within Criterion

const SECRET: &str = "whsec_bench";

fn bench_order(order_id: &str, sku_count: usize) -> Order {
  let settings = StoreSettings::default();
  let items = (0..sku_count)
    .map(|i| LineItem::sku(settings.program_sku.as_str(), format!("Produkt {}", i), 49900))
    .collect::<Vec<_>>();
  let mut metadata = BTreeMap::new();
  metadata.insert(meta::NAME.to_string(), "Bench Customer".to_string());
  metadata.insert(meta::EMAIL.to_string(), "bench@example.com".to_string());
  metadata.insert(meta::ADDRESS.to_string(), "Benchvej 1".to_string());
  metadata.insert(meta::ORDER_TYPE.to_string(), OrderType::Badass.as_str().to_string());
  Order {
    id: order_id.to_string(),
    status: OrderStatus::Paid,
    amount: items.iter().map(|item| item.amount).sum(),
    currency: Some("dkk".to_string()),
    email: Some("bench@example.com".to_string()),
    items,
    metadata,
  }
}

fn envelope(order: &Order) -> Vec<u8> {
  serde_json::to_vec(&json!({
    "id": "evt_bench",
    "type": "order.updated",
    "data": { "object": order },
  }))
  .unwrap()
}

// --- Benchmark Functions ---

fn bench_signature_verification(c: &mut Criterion) {
  let mut group = c.benchmark_group("SignatureVerification");
  let verifier = SignatureVerifier::new(SECRET);
  let now = 1_700_000_000;

  for sku_count in [1usize, 10, 100].iter() {
    let body = envelope(&bench_order("or_bench", *sku_count));
    let header = verifier.sign(&body, now).unwrap();
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_with_input(BenchmarkId::new("verify", body.len()), &body, |b, body| {
      b.iter(|| verifier.verify_at(body, Some(&header), now).unwrap());
    });
  }
  group.finish();
}

fn bench_event_parsing(c: &mut Criterion) {
  let mut group = c.benchmark_group("EventParsing");
  for sku_count in [1usize, 10, 100].iter() {
    let body = envelope(&bench_order("or_bench", *sku_count));
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_with_input(BenchmarkId::new("order.updated", sku_count), &body, |b, body| {
      b.iter(|| WebhookEvent::parse(body).unwrap());
    });
  }
  group.finish();
}

fn bench_fulfillment_rendering(c: &mut Criterion) {
  let mut group = c.benchmark_group("FulfillmentRendering");
  let rt = Runtime::new().unwrap();
  let settings = Arc::new(StoreSettings::default());
  let gateway = Arc::new(InMemoryGateway::new());
  let registry = FulfillmentRegistry::standard(settings, gateway);
  let order = bench_order("or_bench", 1);

  for order_type in [OrderType::Badass, OrderType::Bundle, OrderType::Foodie] {
    let strategy = registry.get(order_type).unwrap().clone();
    group.bench_function(order_type.as_str(), |b| {
      b.to_async(&rt).iter(|| {
        let strategy = strategy.clone();
        let order = order.clone();
        async move { strategy.fulfill(&order).await.unwrap() }
      });
    });
  }
  group.finish();
}

fn bench_full_workflow(c: &mut Criterion) {
  let mut group = c.benchmark_group("FullWorkflow");
  let rt = Runtime::new().unwrap();

  group.bench_function("create_customer_to_celebrate", |b| {
    b.to_async(&rt).iter_batched(
      || {
        let settings = Arc::new(StoreSettings::default());
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.insert_order(bench_order("or_bench", 1));
        let invoicing = Arc::new(InMemoryInvoicing::new());
        // Queue is dropped; celebrate notifications are discarded.
        let (notifier, _queue) = Notifier::channel(1);
        let registry = FulfillmentRegistry::standard(settings, gateway.clone());
        Workflow::new(gateway, invoicing, registry, notifier)
      },
      |workflow| async move {
        workflow.create_customer("or_bench").await.unwrap();
        while workflow.start_flow("or_bench").await.unwrap() != FlowOutcome::Celebrated {}
      },
      criterion::BatchSize::SmallInput,
    );
  });
  group.finish();
}

criterion_group!(
  benches,
  bench_signature_verification,
  bench_event_parsing,
  bench_fulfillment_rendering,
  bench_full_workflow
);
criterion_main!(benches);
