// orderflow/src/workflow/engine.rs

//! Contains `Workflow`, the order state machine.
//!
//! The state is the order's `flowstatus` metadata on the gateway. Each call
//! re-reads the live order, runs at most one transition, and persists the next
//! state with a single `update_order`. A failed call leaves the state as it
//! was, so redelivering the triggering event retries the same step.

use crate::domain::{format_amount, meta, FlowStatus, LineItemKind, Money, Order, OrderPatch, OrderStatus, OrderType};
use crate::error::{FlowError, FlowResult, Step};
use crate::fulfillment::{Fulfillment, FulfillmentRegistry};
use crate::notify::{Notification, Notifier};
use crate::ports::{InvoiceDraft, InvoiceLine, InvoicingService, NewCustomer, PaymentGateway};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Description the invoicing service shows for discount lines.
pub const DISCOUNT_LINE_DESCRIPTION: &str = "Rabat";

/// What a single workflow call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
  /// Order is canceled or returned; nothing was done.
  Halted { status: OrderStatus },
  /// No flowstatus yet; the order waits for its payment to succeed.
  Idle,
  /// Order was already past the requested entry point.
  Skipped { current: FlowStatus },
  Advanced { from: Option<FlowStatus>, to: FlowStatus },
  /// Invoice already delivered and the order marked fulfilled.
  AlreadyFulfilled,
  Celebrated,
}

pub struct Workflow {
  gateway: Arc<dyn PaymentGateway>,
  invoicing: Arc<dyn InvoicingService>,
  fulfillments: FulfillmentRegistry,
  notifier: Notifier,
}

impl Workflow {
  pub fn new(
    gateway: Arc<dyn PaymentGateway>,
    invoicing: Arc<dyn InvoicingService>,
    fulfillments: FulfillmentRegistry,
    notifier: Notifier,
  ) -> Self {
    Self {
      gateway,
      invoicing,
      fulfillments,
      notifier,
    }
  }

  pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
    &self.gateway
  }

  pub fn notifier(&self) -> &Notifier {
    &self.notifier
  }

  /// Runs the transition for the order's current flowstatus.
  ///
  /// The inbound event is not trusted for status: everything is decided on the
  /// order as the gateway returns it now.
  #[instrument(name = "Workflow::start_flow", skip(self), err(Display))]
  pub async fn start_flow(&self, order_id: &str) -> FlowResult<FlowOutcome> {
    let order = self.load(order_id).await?;
    if order.status.is_withdrawn() {
      event!(Level::INFO, status = %order.status, "Order withdrawn, workflow halted.");
      return Ok(FlowOutcome::Halted { status: order.status });
    }

    let current = self.current_flow_status(&order)?;
    event!(Level::DEBUG, flow_status = ?current, "Dispatching on flowstatus.");

    match current {
      None => Ok(FlowOutcome::Idle),
      Some(FlowStatus::UserCreated) => self.create_invoice(&order).await,
      Some(FlowStatus::InvoiceCreated) => self.book_invoice(&order).await,
      Some(FlowStatus::InvoiceBooked) => self.create_payment(&order).await,
      Some(FlowStatus::InvoicePaid) => self.send_invoice(&order).await,
      Some(FlowStatus::EmailSent) => {
        self.celebrate(&order);
        Ok(FlowOutcome::Celebrated)
      }
    }
  }

  /// Entry point once the order's payment went through: registers the buyer
  /// with the invoicing service and moves the order to `UserCreated`.
  ///
  /// Only runs for orders that have no flowstatus yet.
  #[instrument(name = "Workflow::create_customer", skip(self), err(Display))]
  pub async fn create_customer(&self, order_id: &str) -> FlowResult<FlowOutcome> {
    let order = self.load(order_id).await?;
    if order.status.is_withdrawn() {
      return Ok(FlowOutcome::Halted { status: order.status });
    }
    if let Some(current) = self.current_flow_status(&order)? {
      event!(Level::INFO, flow_status = %current, "Customer already created, skipping.");
      return Ok(FlowOutcome::Skipped { current });
    }

    let customer = NewCustomer {
      email: require(&order, Step::CreateCustomer, meta::EMAIL)?.to_string(),
      name: require(&order, Step::CreateCustomer, meta::NAME)?.to_string(),
      address: order.meta(meta::ADDRESS).unwrap_or_default().to_string(),
    };
    let customer_id = self
      .invoicing
      .create_customer(&customer)
      .await
      .map_err(|e| FlowError::invoicing(Step::CreateCustomer, &order.id, e))?;

    let patch = OrderPatch::advance(FlowStatus::UserCreated).with_meta(meta::CUSTOMER, customer_id);
    self.persist(&order, Step::CreateCustomer, &patch).await?;
    Ok(FlowOutcome::Advanced {
      from: None,
      to: FlowStatus::UserCreated,
    })
  }

  async fn create_invoice(&self, order: &Order) -> FlowResult<FlowOutcome> {
    let customer_id = require(order, Step::CreateInvoice, meta::CUSTOMER)?;
    let draft = InvoiceDraft {
      customer_id: customer_id.to_string(),
      lines: invoice_lines(order),
      template_id: self
        .strategy(order)
        .ok()
        .and_then(|strategy| strategy.invoice_template().map(str::to_string)),
    };

    let invoice = self
      .invoicing
      .create_invoice(&draft)
      .await
      .map_err(|e| FlowError::invoicing(Step::CreateInvoice, &order.id, e))?;
    event!(Level::INFO, invoice_id = %invoice.id, lines = draft.lines.len(), "Invoice drafted.");

    let patch = OrderPatch::advance(FlowStatus::InvoiceCreated)
      .with_meta(meta::INVOICE_ID, invoice.id)
      .with_meta(meta::INVOICE_TIMESTAMP, invoice.timestamp);
    self.persist(order, Step::CreateInvoice, &patch).await?;
    Ok(FlowOutcome::Advanced {
      from: Some(FlowStatus::UserCreated),
      to: FlowStatus::InvoiceCreated,
    })
  }

  async fn book_invoice(&self, order: &Order) -> FlowResult<FlowOutcome> {
    let invoice_id = require(order, Step::BookInvoice, meta::INVOICE_ID)?;
    let timestamp = require(order, Step::BookInvoice, meta::INVOICE_TIMESTAMP)?;

    let booked = self
      .invoicing
      .book_invoice(invoice_id, timestamp)
      .await
      .map_err(|e| FlowError::invoicing(Step::BookInvoice, &order.id, e))?;

    let mut patch = OrderPatch::advance(FlowStatus::InvoiceBooked).with_meta(meta::INVOICE_TIMESTAMP, booked.timestamp);
    if let Some(number) = booked.number {
      patch = patch.with_meta(meta::INVOICE_NUMBER, number.to_string());
    }
    self.persist(order, Step::BookInvoice, &patch).await?;
    Ok(FlowOutcome::Advanced {
      from: Some(FlowStatus::InvoiceCreated),
      to: FlowStatus::InvoiceBooked,
    })
  }

  async fn create_payment(&self, order: &Order) -> FlowResult<FlowOutcome> {
    let invoice_id = require(order, Step::CreatePayment, meta::INVOICE_ID)?;
    self
      .invoicing
      .create_payment(invoice_id, Money(order.amount))
      .await
      .map_err(|e| FlowError::invoicing(Step::CreatePayment, &order.id, e))?;

    self
      .persist(order, Step::CreatePayment, &OrderPatch::advance(FlowStatus::InvoicePaid))
      .await?;
    Ok(FlowOutcome::Advanced {
      from: Some(FlowStatus::InvoiceBooked),
      to: FlowStatus::InvoicePaid,
    })
  }

  async fn send_invoice(&self, order: &Order) -> FlowResult<FlowOutcome> {
    // `order` was read after taking the order lock, so this is the live status.
    if order.status == OrderStatus::Fulfilled {
      event!(Level::INFO, order_id = %order.id, "Order already fulfilled, not sending again.");
      return Ok(FlowOutcome::AlreadyFulfilled);
    }

    let invoice_id = require(order, Step::SendInvoice, meta::INVOICE_ID)?;
    let strategy = self.strategy(order)?;
    let message = strategy.fulfill(order).await.map_err(|source| FlowError::Fulfillment {
      order_id: order.id.clone(),
      source,
    })?;

    self
      .invoicing
      .send_invoice(invoice_id, &message.subject, &message.body)
      .await
      .map_err(|e| FlowError::invoicing(Step::SendInvoice, &order.id, e))?;

    let patch = OrderPatch::advance(FlowStatus::EmailSent).with_status(OrderStatus::Fulfilled);
    self.persist(order, Step::SendInvoice, &patch).await?;
    Ok(FlowOutcome::Advanced {
      from: Some(FlowStatus::InvoicePaid),
      to: FlowStatus::EmailSent,
    })
  }

  fn celebrate(&self, order: &Order) {
    let order_type = order.order_type_raw().unwrap_or("unknown");
    self.notifier.notify(Notification::success(
      format!("Order {} - type {}", order.id, order_type),
      format!(
        "Well done, you just earned: {} DKK and {} will be a badass",
        format_amount(order.amount),
        order.customer_name()
      ),
      "Completed",
    ));
  }

  fn strategy(&self, order: &Order) -> FlowResult<&Arc<dyn Fulfillment>> {
    let raw = order.order_type_raw().unwrap_or_default();
    raw
      .parse::<OrderType>()
      .ok()
      .and_then(|order_type| self.fulfillments.get(order_type))
      .ok_or_else(|| FlowError::UnknownOrderType {
        order_id: order.id.clone(),
        order_type: raw.to_string(),
      })
  }

  fn current_flow_status(&self, order: &Order) -> FlowResult<Option<FlowStatus>> {
    order.flow_status().map_err(|value| FlowError::UnknownFlowStatus {
      order_id: order.id.clone(),
      value,
    })
  }

  async fn load(&self, order_id: &str) -> FlowResult<Order> {
    self
      .gateway
      .get_order(order_id)
      .await
      .map_err(|e| FlowError::gateway(Step::LoadOrder, order_id, e))
  }

  async fn persist(&self, order: &Order, step: Step, patch: &OrderPatch) -> FlowResult<()> {
    self
      .gateway
      .update_order(&order.id, patch)
      .await
      .map_err(|e| FlowError::gateway(step, &order.id, e))?;
    event!(
      Level::INFO,
      order_id = %order.id,
      step = %step,
      flow_status = patch.flow_status().unwrap_or_default(),
      "Order advanced."
    );
    Ok(())
  }
}

fn require<'a>(order: &'a Order, step: Step, key: &'static str) -> FlowResult<&'a str> {
  order
    .meta(key)
    .filter(|value| !value.is_empty())
    .ok_or_else(|| FlowError::MissingMetadata {
      order_id: order.id.clone(),
      step,
      key,
    })
}

/// One invoice line per sku and discount item; tax and shipping lines are
/// left to the invoicing service.
pub fn invoice_lines(order: &Order) -> Vec<InvoiceLine> {
  order
    .items
    .iter()
    .filter_map(|item| match item.kind {
      LineItemKind::Sku => Some(InvoiceLine {
        description: item.description.clone(),
        amount: Money(item.amount),
      }),
      LineItemKind::Discount => Some(InvoiceLine {
        description: DISCOUNT_LINE_DESCRIPTION.to_string(),
        amount: Money(item.amount),
      }),
      _ => None,
    })
    .collect()
}
