// src/lib.rs

//! Orderflow: webhook-driven order fulfillment.
//!
//! An order is charged at the payment gateway, then walked through a fixed
//! sequence of bookkeeping steps at the invoicing service:
//!  - create the customer,
//!  - create, book and pay the invoice,
//!  - email the invoice together with a product-specific delivery message,
//!  - mark the order fulfilled.
//!
//! The current step lives in the gateway order's `flowstatus` metadata. Each
//! inbound webhook re-reads the order and runs at most one step, so gateway
//! redelivery is the retry mechanism. Payout webhooks are booked as ledger
//! entries.

pub mod checkout;
pub mod domain;
pub mod error;
pub mod fulfillment;
pub mod memory;
pub mod notify;
pub mod payout;
pub mod ports;
pub mod webhook;
pub mod workflow;

// --- Re-exports for the Public API ---

pub use crate::domain::{
  format_amount, meta, BalanceTransaction, FlowStatus, LedgerEntry, LineItem, LineItemKind, Money, NewOrder, Order,
  OrderPatch, OrderStatus, OrderType, Payout,
};
pub use crate::error::{
  CheckoutError, FlowError, FlowResult, FulfillmentError, PayoutError, Service, SignatureError, Step, WebhookError,
};
pub use crate::ports::{CardError, InvoicingService, NotificationSink, PaymentGateway, ProductVariant};

pub use crate::checkout::{CheckoutRequest, CheckoutService};
pub use crate::fulfillment::{Fulfillment, FulfillmentMessage, FulfillmentRegistry, StoreSettings};
pub use crate::notify::{Color, Notification, NotificationQueue, Notifier};
pub use crate::payout::{LedgerAccounts, PayoutReconciler};
pub use crate::webhook::{Acknowledgement, SignatureVerifier, WebhookDispatcher, WebhookEvent};
pub use crate::workflow::{FlowOutcome, OrderLocks, Workflow};
