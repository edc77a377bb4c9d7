// orderflow/src/domain/mod.rs

pub mod money;
pub mod order;
pub mod payout;

pub use money::{format_amount, Money};
pub use order::{
  meta, FlowStatus, LineItem, LineItemKind, NewOrder, Order, OrderPatch, OrderStatus, OrderType,
};
pub use payout::{BalanceTransaction, LedgerEntry, Payout};
