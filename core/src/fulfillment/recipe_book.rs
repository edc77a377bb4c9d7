// orderflow/src/fulfillment/recipe_book.rs

use super::{invoice_footer, Fulfillment, FulfillmentMessage, StoreSettings};
use crate::domain::Order;
use crate::error::FulfillmentError;
use async_trait::async_trait;
use std::sync::Arc;

/// The recipe e-book: one download link for its own SKU.
#[derive(Debug, Clone)]
pub struct RecipeBook {
  settings: Arc<StoreSettings>,
}

impl RecipeBook {
  pub fn new(settings: Arc<StoreSettings>) -> Self {
    Self { settings }
  }
}

#[async_trait]
impl Fulfillment for RecipeBook {
  async fn fulfill(&self, order: &Order) -> Result<FulfillmentMessage, FulfillmentError> {
    let link = self.settings.download_link(&order.id, &self.settings.recipe_book_sku);
    let body = format!(
      "Hej {name}\n\n\
       Så er der gang i køkkenet! Din e-bog med hurtige opskrifter ligger klar her: {link}\n\n\
       Linket er personligt, så del det ikke med andre.\n\n\
       Jeg håber opskrifterne viser dig at sund mad sagtens kan være både nem og lækker.\n\n\
       God fornøjelse med madlavningen!\n\n\
       Kærlig hilsen\nCamilla\n\n{footer}",
      name = order.customer_name(),
      link = link,
      footer = invoice_footer(order),
    );

    Ok(FulfillmentMessage {
      subject: "Her er dit program :-)".to_string(),
      body,
    })
  }

  fn invoice_template(&self) -> Option<&str> {
    self.settings.invoice_template_id.as_deref()
  }
}
