// orderflow/src/domain/money.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount in minor currency units (øre, cents).
///
/// Displays as a decimal with exactly two fraction digits, which is the form
/// customers see in rendered messages and the invoicing service books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
  pub fn minor(&self) -> i64 {
    self.0
  }

  /// Decimal value for JSON APIs that take amounts as numbers.
  pub fn to_decimal(&self) -> f64 {
    self.0 as f64 / 100.0
  }
}

impl From<i64> for Money {
  fn from(minor: i64) -> Self {
    Money(minor)
  }
}

impl std::ops::Add for Money {
  type Output = Money;

  fn add(self, rhs: Money) -> Money {
    Money(self.0 + rhs.0)
  }
}

impl std::ops::Neg for Money {
  type Output = Money;

  fn neg(self) -> Money {
    Money(-self.0)
  }
}

impl std::iter::Sum for Money {
  fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
    Money(iter.map(|m| m.0).sum())
  }
}

impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
  }
}

/// Shorthand for rendering minor units, `49900` -> `"499.00"`.
pub fn format_amount(minor: i64) -> String {
  Money(minor).to_string()
}
