// tests/dispatcher_tests.rs
mod common;
use common::*;
use orderflow::memory::{GatewayCall, GatewayOp, InvoicingCall, InvoicingOp};
use orderflow::webhook::EventKind;
use orderflow::{
  meta, Acknowledgement, CardError, Color, FlowOutcome, FlowStatus, OrderStatus, OrderType, SignatureVerifier,
  WebhookError,
};
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_unknown_event_type_is_acked_without_calls() {
  setup_tracing();
  let mut h = Harness::new();
  let (body, header) = signed("foo.bar", json!({ "id": "x" }));

  let ack = h.dispatcher().handle(&body, Some(&header)).await.unwrap();
  assert_eq!(
    ack,
    Acknowledgement::Ignored {
      event_type: "foo.bar".to_string()
    }
  );
  assert!(h.gateway.calls().is_empty());
  assert!(h.invoicing.calls().is_empty());
  assert!(h.notifications().is_empty());
}

#[tokio::test]
#[serial]
async fn test_bad_signature_is_rejected_and_notified() {
  setup_tracing();
  let mut h = Harness::new();
  let order = sample_order(ORDER_ID, OrderType::Badass);
  h.gateway.insert_order(order.clone());
  let (body, _) = signed("order.updated", order_json(&order));
  let forged = SignatureVerifier::new("not_the_secret")
    .sign(&body, chrono::Utc::now().timestamp())
    .unwrap();

  let result = h.dispatcher().handle(&body, Some(&forged)).await;
  let err = result.unwrap_err();
  assert!(matches!(err, WebhookError::Signature(_)));
  assert!(err.is_rejection());

  let missing = h.dispatcher().handle(&body, None).await.unwrap_err();
  assert!(matches!(missing, WebhookError::Signature(_)));

  assert!(h.gateway.calls().is_empty());
  assert!(h.invoicing.calls().is_empty());
  let notifications = h.notifications();
  assert_eq!(notifications.len(), 2);
  assert!(notifications.iter().all(|n| n.color == Color::Failure));
}

#[tokio::test]
#[serial]
async fn test_malformed_event_is_rejected_and_notified() {
  setup_tracing();
  let mut h = Harness::new();
  let verifier = SignatureVerifier::new(SECRET);
  let body = br#"{"type":"order.updated","data":{"object":{"id":42}}}"#.to_vec();
  let header = verifier.sign(&body, chrono::Utc::now().timestamp()).unwrap();

  let err = h.dispatcher().handle(&body, Some(&header)).await.unwrap_err();
  assert!(matches!(err, WebhookError::MalformedEvent { .. }));
  assert!(err.is_rejection());
  assert!(h.gateway.calls().is_empty());
  assert_eq!(h.notifications().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_payment_succeeded_creates_customer() {
  setup_tracing();
  let h = Harness::new();
  let order = sample_order(ORDER_ID, OrderType::Badass);
  h.gateway.insert_order(order.clone());
  let (body, header) = signed("order.payment_succeeded", order_json(&order));

  let ack = h.dispatcher().handle(&body, Some(&header)).await.unwrap();
  assert_eq!(
    ack,
    Acknowledgement::Flow {
      event_type: EventKind::OrderPaymentSucceeded,
      order_id: ORDER_ID.to_string(),
      outcome: FlowOutcome::Advanced {
        from: None,
        to: FlowStatus::UserCreated
      },
    }
  );

  let invoicing_calls = h.invoicing.calls();
  let [InvoicingCall::CreateCustomer(customer)] = invoicing_calls.as_slice() else {
    panic!("expected exactly one CreateCustomer, got {:?}", invoicing_calls);
  };
  assert_eq!(customer.name, "Anna");
  assert_eq!(customer.email, "a@x.com");
  assert_eq!(customer.address, "Main st");

  let update = h
    .gateway
    .calls()
    .into_iter()
    .find_map(|call| match call {
      GatewayCall::UpdateOrder(id, patch) => Some((id, patch)),
      _ => None,
    })
    .expect("order was updated");
  assert_eq!(update.0, ORDER_ID);
  assert_eq!(update.1.flow_status(), Some("UserCreated"));
  assert_eq!(
    update.1.metadata.get(meta::CUSTOMER).map(String::as_str),
    Some("contact-1")
  );
}

#[tokio::test]
#[serial]
async fn test_order_updated_uses_live_status_not_payload() {
  setup_tracing();
  let h = Harness::new();
  h.gateway.insert_order(sample_order(ORDER_ID, OrderType::Badass));
  h.workflow.create_customer(ORDER_ID).await.unwrap();

  // The payload still says "no flowstatus"; the live order is at UserCreated.
  let stale = sample_order(ORDER_ID, OrderType::Badass);
  let (body, header) = signed("order.updated", order_json(&stale));
  let ack = h.dispatcher().handle(&body, Some(&header)).await.unwrap();

  assert!(matches!(
    ack,
    Acknowledgement::Flow {
      outcome: FlowOutcome::Advanced {
        to: FlowStatus::InvoiceCreated,
        ..
      },
      ..
    }
  ));
}

#[tokio::test]
#[serial]
async fn test_step_failure_returns_error_and_notifies() {
  setup_tracing();
  let mut h = Harness::new();
  h.gateway.insert_order(sample_order(ORDER_ID, OrderType::Badass));
  h.invoicing.fail(InvoicingOp::CreateCustomer);
  let order = h.order(ORDER_ID);
  let (body, header) = signed("order.payment_succeeded", order_json(&order));

  let err = h.dispatcher().handle(&body, Some(&header)).await.unwrap_err();
  assert!(matches!(err, WebhookError::Flow { .. }));
  assert!(!err.is_rejection());
  assert_eq!(h.order(ORDER_ID).flow_status(), Ok(None));

  let notifications = h.notifications();
  assert_eq!(notifications.len(), 1);
  assert!(notifications[0].title.contains("create_customer"));
}

#[tokio::test]
#[serial]
async fn test_order_created_charges_with_stored_token() {
  setup_tracing();
  let h = Harness::new();
  let mut order = sample_order(ORDER_ID, OrderType::Badass);
  order.status = OrderStatus::Created;
  h.gateway.insert_order(order.clone());
  let (body, header) = signed("order.created", order_json(&order));

  let ack = h.dispatcher().handle(&body, Some(&header)).await.unwrap();
  assert_eq!(
    ack,
    Acknowledgement::Charged {
      order_id: ORDER_ID.to_string()
    }
  );
  assert!(h
    .gateway
    .calls()
    .contains(&GatewayCall::PayOrder(ORDER_ID.to_string(), "tok_visa".to_string())));
  assert_eq!(h.order(ORDER_ID).status, OrderStatus::Paid);

  // Redelivery finds the order already paid.
  let again = h.dispatcher().handle(&body, Some(&header)).await.unwrap();
  assert_eq!(
    again,
    Acknowledgement::ChargeSkipped {
      order_id: ORDER_ID.to_string(),
      status: OrderStatus::Paid
    }
  );
}

#[tokio::test]
#[serial]
async fn test_charge_failure_is_acked_and_notified() {
  setup_tracing();
  let mut h = Harness::new();
  let mut order = sample_order(ORDER_ID, OrderType::Badass);
  order.status = OrderStatus::Created;
  h.gateway.insert_order(order.clone());
  h.gateway.decline_charges(Some(CardError {
    code: "card_declined".to_string(),
    message: "Your card was declined.".to_string(),
  }));
  let (body, header) = signed("order.created", order_json(&order));

  let ack = h.dispatcher().handle(&body, Some(&header)).await.unwrap();
  assert_eq!(
    ack,
    Acknowledgement::ChargeFailed {
      order_id: ORDER_ID.to_string()
    }
  );
  let notifications = h.notifications();
  assert_eq!(notifications.len(), 1);
  assert!(notifications[0].detail.contains("card_declined"));
}

#[tokio::test]
#[serial]
async fn test_payment_failed_and_refund_are_observed_only() {
  setup_tracing();
  let h = Harness::new();
  let order = sample_order(ORDER_ID, OrderType::Badass);
  h.gateway.insert_order(order.clone());

  let (body, header) = signed("order.payment_failed", order_json(&order));
  let ack = h.dispatcher().handle(&body, Some(&header)).await.unwrap();
  assert_eq!(
    ack,
    Acknowledgement::Observed {
      event_type: EventKind::OrderPaymentFailed
    }
  );

  let (body, header) = signed(
    "charge.refunded",
    json!({ "id": "ch_1", "amount_refunded": 49900, "order": ORDER_ID }),
  );
  let ack = h.dispatcher().handle(&body, Some(&header)).await.unwrap();
  assert_eq!(
    ack,
    Acknowledgement::Observed {
      event_type: EventKind::ChargeRefunded
    }
  );

  assert!(h.gateway.calls().is_empty());
  assert!(h.invoicing.calls().is_empty());
}

#[tokio::test]
#[serial]
async fn test_payout_paid_posts_ledger_and_notifies() {
  setup_tracing();
  let mut h = Harness::new();
  h.gateway.add_balance_transactions(
    "po_1",
    vec![
      orderflow::domain::BalanceTransaction {
        id: "txn_1".to_string(),
        amount: 6000,
        fee: 150,
      },
      orderflow::domain::BalanceTransaction {
        id: "txn_2".to_string(),
        amount: 4250,
        fee: 100,
      },
    ],
  );
  let (body, header) = signed("payout.paid", json!({ "id": "po_1", "amount": 10000 }));

  let ack = h.dispatcher().handle(&body, Some(&header)).await.unwrap();
  assert_eq!(
    ack,
    Acknowledgement::PayoutBooked {
      payout_id: "po_1".to_string(),
      entries: 3
    }
  );
  assert_eq!(h.invoicing.ledger().len(), 3);
  let notifications = h.notifications();
  assert_eq!(notifications.len(), 1);
  assert_eq!(notifications[0].detail, "payout paid: po_1");
}

#[tokio::test]
#[serial]
async fn test_payout_failure_is_not_acked() {
  setup_tracing();
  let mut h = Harness::new();
  h.gateway.fail(GatewayOp::ListBalanceTransactions);
  let (body, header) = signed("payout.paid", json!({ "id": "po_2", "amount": 10000 }));

  let err = h.dispatcher().handle(&body, Some(&header)).await.unwrap_err();
  assert!(matches!(err, WebhookError::Payout(_)));
  assert!(h.invoicing.ledger().is_empty());
  assert_eq!(h.notifications().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_insecure_mode_skips_signature() {
  setup_tracing();
  let h = Harness::new();
  let body = envelope("foo.bar", json!({}));
  let ack = h
    .dispatcher_with(SignatureVerifier::insecure())
    .handle(&body, None)
    .await
    .unwrap();
  assert!(matches!(ack, Acknowledgement::Ignored { .. }));
}

#[tokio::test]
#[serial]
async fn test_concurrent_deliveries_run_one_step_each() {
  setup_tracing();
  let h = Harness::new();
  h.gateway.insert_order(sample_order(ORDER_ID, OrderType::Badass));
  h.workflow.create_customer(ORDER_ID).await.unwrap();
  let order = h.order(ORDER_ID);
  let (body, header) = signed("order.updated", order_json(&order));

  let dispatcher = std::sync::Arc::new(h.dispatcher());
  let handles: Vec<_> = (0..2)
    .map(|_| {
      let dispatcher = dispatcher.clone();
      let body = body.clone();
      let header = header.clone();
      tokio::spawn(async move { dispatcher.handle(&body, Some(&header)).await })
    })
    .collect();
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  // Serialized: one delivery drafts the invoice, the other books it.
  let invoices = h
    .invoicing
    .calls()
    .iter()
    .filter(|call| matches!(call, InvoicingCall::CreateInvoice(_)))
    .count();
  assert_eq!(invoices, 1);
  assert_eq!(h.order(ORDER_ID).flow_status(), Ok(Some(FlowStatus::InvoiceBooked)));
}
