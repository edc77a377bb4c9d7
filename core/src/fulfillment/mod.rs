// orderflow/src/fulfillment/mod.rs

//! Per-product delivery messages.
//!
//! Once an order's invoice is paid the workflow asks the strategy registered
//! for its [`OrderType`] for the subject and body of the invoice email. Each
//! strategy renders a Danish message with the customer's name, the order
//! total and whatever the product needs: download links, a bootcamp
//! schedule, a community link.

mod bootcamp;
mod bundle;
mod online_bootcamp;
mod program;
mod recipe_book;

pub use bootcamp::BootcampSeries;
pub use bundle::Bundle;
pub use online_bootcamp::OnlineBootcamp;
pub use program::SingleProgram;
pub use recipe_book::RecipeBook;

use crate::domain::{Money, Order, OrderType};
use crate::error::FulfillmentError;
use crate::ports::PaymentGateway;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Subject and body of the delivery email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentMessage {
  pub subject: String,
  pub body: String,
}

#[async_trait]
pub trait Fulfillment: Send + Sync {
  async fn fulfill(&self, order: &Order) -> Result<FulfillmentMessage, FulfillmentError>;

  /// Invoice layout for this product; `None` means the invoicing default.
  fn invoice_template(&self) -> Option<&str> {
    None
  }
}

/// Shop-wide constants the strategies and checkout share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
  /// Origin serving purchased files, without trailing slash.
  pub download_base_url: String,
  pub program_sku: String,
  pub recipe_book_sku: String,
  /// Applied when exactly two products are bought together.
  pub bundle_coupon: String,
  /// Invoice layout for the downloadable products.
  pub invoice_template_id: Option<String>,
  pub community_url: String,
  pub videos_url: String,
}

impl Default for StoreSettings {
  fn default() -> Self {
    Self {
      download_base_url: "https://app.camillabengtsson.dk".to_string(),
      program_sku: "sku_DJx1hCHoxDAAtE".to_string(),
      recipe_book_sku: "sku_DWJE6B88Ih3Wgg".to_string(),
      bundle_coupon: "3Y9rWEst".to_string(),
      invoice_template_id: None,
      community_url: "http://bit.ly/2Kb9B2g".to_string(),
      videos_url: "http://bit.ly/2Ol7yM4".to_string(),
    }
  }
}

impl StoreSettings {
  /// `{base}/downloads/{order}/{sku}`
  pub fn download_link(&self, order_id: &str, sku_id: &str) -> String {
    format!(
      "{}/downloads/{}/{}",
      self.download_base_url.trim_end_matches('/'),
      order_id,
      sku_id
    )
  }

  pub fn classify<S: AsRef<str>>(&self, skus: &[S]) -> OrderType {
    OrderType::for_basket(skus, &self.program_sku, &self.recipe_book_sku)
  }
}

/// Footer shared by every message: invoice amount and the PDF placeholder the
/// invoicing service substitutes.
pub(crate) fn invoice_footer(order: &Order) -> String {
  format!(
    "______\n\nPs. Fakturaen for dit køb på {} kr. inkl. moms er vedhæftet.\n\n[link-to-pdf]\n",
    Money(order.amount)
  )
}

/// Strategies keyed by order type, built once at startup.
#[derive(Clone, Default)]
pub struct FulfillmentRegistry {
  strategies: HashMap<OrderType, Arc<dyn Fulfillment>>,
}

impl FulfillmentRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// All five product strategies.
  pub fn standard(settings: Arc<StoreSettings>, gateway: Arc<dyn PaymentGateway>) -> Self {
    let mut registry = Self::new();
    registry.register(OrderType::Badass, Arc::new(SingleProgram::new(settings.clone())));
    registry.register(OrderType::Bundle, Arc::new(Bundle::new(settings.clone())));
    registry.register(OrderType::Foodie, Arc::new(RecipeBook::new(settings)));
    registry.register(OrderType::Bootcamp, Arc::new(BootcampSeries::new(gateway.clone())));
    registry.register(OrderType::OnlineBootcamp, Arc::new(OnlineBootcamp::new(gateway)));
    registry
  }

  pub fn register(&mut self, order_type: OrderType, strategy: Arc<dyn Fulfillment>) -> &mut Self {
    self.strategies.insert(order_type, strategy);
    self
  }

  pub fn get(&self, order_type: OrderType) -> Option<&Arc<dyn Fulfillment>> {
    self.strategies.get(&order_type)
  }

  pub fn len(&self) -> usize {
    self.strategies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.strategies.is_empty()
  }
}

impl std::fmt::Debug for FulfillmentRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FulfillmentRegistry")
      .field("order_types", &self.strategies.keys().collect::<Vec<_>>())
      .finish()
  }
}
