// tests/checkout_tests.rs
mod common;
use common::*;
use orderflow::memory::{GatewayCall, GatewayOp};
use orderflow::webhook::WebhookEvent;
use orderflow::{meta, Acknowledgement, CardError, CheckoutError, CheckoutRequest, OrderStatus, PaymentGateway};
use std::time::Duration;
use serial_test::serial;

fn request(skus: &[&str]) -> CheckoutRequest {
  CheckoutRequest {
    name: "Anna".to_string(),
    email: "a@x.com".to_string(),
    address: "Main st".to_string(),
    tshirt: "M".to_string(),
    stripe_token: "tok_visa".to_string(),
    skus: skus.iter().map(|s| s.to_string()).collect(),
    newsletter: true,
  }
}

#[tokio::test]
#[serial]
async fn test_single_program_order_is_created_and_paid() {
  setup_tracing();
  let h = Harness::new();
  let program = h.settings.program_sku.clone();

  let order = h.checkout().place_order(&request(&[program.as_str()])).await.unwrap();

  assert_eq!(order.status, OrderStatus::Paid);
  assert_eq!(order.amount, 49900);
  assert_eq!(order.meta(meta::ORDER_TYPE), Some("badass"));
  assert_eq!(order.meta(meta::TOKEN), Some("tok_visa"));
  assert_eq!(order.meta(meta::NEWSLETTER), Some("true"));
  assert_eq!(order.meta(meta::TSHIRT), Some("M"));
  assert_eq!(order.flow_status(), Ok(None));

  let created = h
    .gateway
    .calls()
    .into_iter()
    .find_map(|call| match call {
      GatewayCall::CreateOrder(new_order) => Some(new_order),
      _ => None,
    })
    .unwrap();
  assert_eq!(created.currency, "dkk");
  assert_eq!(created.coupon, None);
}

#[tokio::test]
#[serial]
async fn test_two_products_make_a_discounted_bundle() {
  setup_tracing();
  let h = Harness::new();
  let skus = [h.settings.program_sku.clone(), h.settings.recipe_book_sku.clone()];

  let order = h
    .checkout()
    .place_order(&request(&[skus[0].as_str(), skus[1].as_str()]))
    .await
    .unwrap();

  assert_eq!(order.meta(meta::ORDER_TYPE), Some("bundle"));
  assert_eq!(order.amount, 49900 + 19900 - 13960);
  assert!(order.items.iter().any(|item| item.parent.as_deref() == Some(h.settings.bundle_coupon.as_str())));
}

#[tokio::test]
#[serial]
async fn test_unlisted_sku_defaults_to_online_bootcamp() {
  setup_tracing();
  let h = Harness::new();
  h.gateway.add_sku(ONLINE_SKU, "Online bootcamp", 29900);
  let order = h.checkout().place_order(&request(&[ONLINE_SKU])).await.unwrap();
  assert_eq!(order.meta(meta::ORDER_TYPE), Some("onlineBootcamp"));
}

#[tokio::test]
#[serial]
async fn test_empty_basket_is_rejected_before_any_call() {
  setup_tracing();
  let h = Harness::new();
  let result = h.checkout().place_order(&request(&[])).await;
  assert!(matches!(result, Err(CheckoutError::EmptyBasket)));
  assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
#[serial]
async fn test_declined_card_returns_danish_message() {
  setup_tracing();
  let mut h = Harness::new();
  h.gateway.decline_charges(Some(CardError {
    code: "expired_card".to_string(),
    message: "Your card has expired.".to_string(),
  }));
  let program = h.settings.program_sku.clone();

  match h.checkout().place_order(&request(&[program.as_str()])).await {
    Err(CheckoutError::CardRejected { code, message, order_id }) => {
      assert_eq!(code, "expired_card");
      assert_eq!(message, "Kortet er udløbet. Prøv igen med et andet kort.");
      assert_eq!(h.order(&order_id).status, OrderStatus::Created);
    }
    other => panic!("expected CardRejected, got {:?}", other),
  }
  assert_eq!(h.notifications().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_gateway_failure_on_create_is_notified() {
  setup_tracing();
  let mut h = Harness::new();
  h.gateway.fail(GatewayOp::CreateOrder);
  let program = h.settings.program_sku.clone();

  let result = h.checkout().place_order(&request(&[program.as_str()])).await;
  assert!(matches!(result, Err(CheckoutError::CreateOrder { .. })));
  assert_eq!(h.notifications().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_checkout_then_order_created_webhook_does_not_charge_twice() {
  setup_tracing();
  let h = Harness::new();
  let program = h.settings.program_sku.clone();
  let order = h.checkout().place_order(&request(&[program.as_str()])).await.unwrap();

  let ack = h
    .dispatcher()
    .route(WebhookEvent::OrderCreated(order.clone()))
    .await
    .unwrap();
  assert_eq!(
    ack,
    Acknowledgement::ChargeSkipped {
      order_id: order.id.clone(),
      status: OrderStatus::Paid
    }
  );
  let charges = h
    .gateway
    .calls()
    .iter()
    .filter(|call| matches!(call, GatewayCall::PayOrder(..)))
    .count();
  assert_eq!(charges, 1);
}

#[tokio::test]
#[serial]
async fn test_webhook_charge_first_leaves_checkout_successful() {
  setup_tracing();
  let mut h = Harness::new();
  let program = h.settings.program_sku.clone();
  let order_id = "or_000001";

  // Hold the order lock as the `order.created` webhook would while charging.
  let guard = h.locks.lock(order_id).await;
  let checkout = h.checkout();
  let pending = tokio::spawn(async move { checkout.place_order(&request(&[program.as_str()])).await });

  while h.gateway.order(order_id).is_none() {
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  h.gateway.pay_order(order_id, "tok_visa").await.unwrap();
  drop(guard);

  let order = pending.await.unwrap().unwrap();
  assert_eq!(order.id, order_id);
  assert_eq!(order.status, OrderStatus::Paid);

  let charges = h
    .gateway
    .calls()
    .iter()
    .filter(|call| matches!(call, GatewayCall::PayOrder(..)))
    .count();
  assert_eq!(charges, 1);
  assert!(h.notifications().is_empty());
}
