// tests/payout_tests.rs
mod common;
use common::*;
use orderflow::domain::{BalanceTransaction, LedgerEntry};
use orderflow::memory::{InvoicingCall, InvoicingOp};
use orderflow::{format_amount, LedgerAccounts, Money, Payout, PayoutError, PayoutReconciler};
use serial_test::serial;

fn payout(id: &str, amount: i64) -> Payout {
  Payout {
    id: id.to_string(),
    amount,
    currency: Some("dkk".to_string()),
  }
}

fn fees(fees: &[i64]) -> Vec<BalanceTransaction> {
  fees
    .iter()
    .enumerate()
    .map(|(i, fee)| BalanceTransaction {
      id: format!("txn_{}", i),
      amount: 1000,
      fee: *fee,
    })
    .collect()
}

#[tokio::test]
#[serial]
async fn test_ledger_lines_net_to_zero() {
  setup_tracing();
  let h = Harness::new();
  h.gateway.add_balance_transactions("po_1", fees(&[100, 100, 50]));

  let entries = h.payouts.reconcile(&payout("po_1", 10000)).await.unwrap();

  let rendered: Vec<(u32, String)> = entries
    .iter()
    .map(|e| (e.account_number, format_amount(e.amount.minor())))
    .collect();
  assert_eq!(
    rendered,
    vec![
      (55000, "100.00".to_string()),
      (7220, "2.50".to_string()),
      (55010, "-102.50".to_string()),
    ]
  );
  let net: Money = entries.iter().map(|e| e.amount).sum();
  assert_eq!(net, Money(0));
  assert_eq!(entries[0].description, "Stripe payout udbetaling: po_1");
  assert_eq!(entries[1].description, "Stripe gebyr, payout: po_1");
  assert_eq!(h.invoicing.ledger(), entries);
}

#[tokio::test]
#[serial]
async fn test_payout_without_transactions_books_zero_fee() {
  setup_tracing();
  let h = Harness::new();
  let entries = h.payouts.reconcile(&payout("po_empty", 5000)).await.unwrap();
  assert_eq!(entries[1].amount, Money(0));
  assert_eq!(entries[2].amount, Money(-5000));
}

#[tokio::test]
#[serial]
async fn test_redelivery_posts_again() {
  setup_tracing();
  let h = Harness::new();
  h.gateway.add_balance_transactions("po_1", fees(&[250]));
  h.payouts.reconcile(&payout("po_1", 10000)).await.unwrap();
  h.payouts.reconcile(&payout("po_1", 10000)).await.unwrap();

  let posts = h
    .invoicing
    .calls()
    .into_iter()
    .filter(|call| matches!(call, InvoicingCall::PostLedgerEntries(_)))
    .count();
  assert_eq!(posts, 2);
  assert_eq!(h.invoicing.ledger().len(), 6);
}

#[tokio::test]
#[serial]
async fn test_posting_failure_names_payout() {
  setup_tracing();
  let h = Harness::new();
  h.invoicing.fail(InvoicingOp::PostLedgerEntries);
  match h.payouts.reconcile(&payout("po_9", 10000)).await {
    Err(err @ PayoutError::PostLedger { .. }) => assert_eq!(err.payout_id(), "po_9"),
    other => panic!("expected PostLedger failure, got {:?}", other),
  }
}

#[test]
fn test_custom_accounts() {
  let h = Harness::new();
  let accounts = LedgerAccounts {
    payout: 1,
    fees: 2,
    clearing: 3,
  };
  let reconciler = PayoutReconciler::new(h.gateway.clone(), h.invoicing.clone(), accounts);
  let entries: Vec<LedgerEntry> = reconciler.ledger_entries("po_x", Money(100), Money(1));
  let accounts: Vec<u32> = entries.iter().map(|e| e.account_number).collect();
  assert_eq!(accounts, vec![1, 2, 3]);
  assert_eq!(entries[2].amount, Money(-101));
}
