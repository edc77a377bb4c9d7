// orderflow/src/payout.rs

use crate::domain::{LedgerEntry, Money, Payout};
use crate::error::PayoutError;
use crate::ports::{InvoicingService, PaymentGateway};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Ledger accounts a payout is booked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerAccounts {
  /// Bank account receiving the payout.
  pub payout: u32,
  pub fees: u32,
  /// Clearing account customer payments were deposited to.
  pub clearing: u32,
}

impl Default for LedgerAccounts {
  fn default() -> Self {
    Self {
      payout: 55000,
      fees: 7220,
      clearing: 55010,
    }
  }
}

/// Books gateway payouts in the invoicing service's ledger.
pub struct PayoutReconciler {
  gateway: Arc<dyn PaymentGateway>,
  invoicing: Arc<dyn InvoicingService>,
  accounts: LedgerAccounts,
}

impl PayoutReconciler {
  pub fn new(gateway: Arc<dyn PaymentGateway>, invoicing: Arc<dyn InvoicingService>, accounts: LedgerAccounts) -> Self {
    Self {
      gateway,
      invoicing,
      accounts,
    }
  }

  /// Sums the fees of every balance transaction in the payout and posts the
  /// three offsetting lines. Not deduplicated: reconciling the same payout
  /// twice posts twice.
  #[instrument(name = "PayoutReconciler::reconcile", skip_all, fields(payout_id = %payout.id), err(Display))]
  pub async fn reconcile(&self, payout: &Payout) -> Result<Vec<LedgerEntry>, PayoutError> {
    let transactions = self
      .gateway
      .list_balance_transactions(&payout.id)
      .await
      .map_err(|source| PayoutError::ListTransactions {
        payout_id: payout.id.clone(),
        source,
      })?;
    let fee: Money = transactions.iter().map(|tx| Money(tx.fee)).sum();
    event!(Level::DEBUG, transactions = transactions.len(), fee = %fee, "Fees summed.");

    let entries = self.ledger_entries(&payout.id, Money(payout.amount), fee);
    self
      .invoicing
      .post_ledger_entries(&entries)
      .await
      .map_err(|source| PayoutError::PostLedger {
        payout_id: payout.id.clone(),
        source,
      })?;

    event!(Level::INFO, amount = %Money(payout.amount), fee = %fee, "Payout booked.");
    Ok(entries)
  }

  /// Payout credit, fee debit, and the clearing line that nets them to zero.
  pub fn ledger_entries(&self, payout_id: &str, amount: Money, fee: Money) -> Vec<LedgerEntry> {
    vec![
      LedgerEntry {
        account_number: self.accounts.payout,
        amount,
        description: format!("Stripe payout udbetaling: {}", payout_id),
      },
      LedgerEntry {
        account_number: self.accounts.fees,
        amount: fee,
        description: format!("Stripe gebyr, payout: {}", payout_id),
      },
      LedgerEntry {
        account_number: self.accounts.clearing,
        amount: -(amount + fee),
        description: format!("Stripe payout udbetaling: {}", payout_id),
      },
    ]
  }
}
