// orderflow/src/domain/payout.rs

use super::money::Money;
use serde::{Deserialize, Serialize};

/// A settlement from the gateway to the merchant's bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
  pub id: String,
  /// Net amount paid out, minor units.
  pub amount: i64,
  #[serde(default)]
  pub currency: Option<String>,
}

/// One gateway balance movement attached to a payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTransaction {
  pub id: String,
  pub amount: i64,
  /// Processing fee, minor units.
  #[serde(default)]
  pub fee: i64,
}

/// A bookkeeping line for the invoicing service's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
  pub account_number: u32,
  pub amount: Money,
  pub description: String,
}
