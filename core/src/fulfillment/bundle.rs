// orderflow/src/fulfillment/bundle.rs

use super::{invoice_footer, Fulfillment, FulfillmentMessage, StoreSettings};
use crate::domain::Order;
use crate::error::FulfillmentError;
use async_trait::async_trait;
use std::sync::Arc;

/// Program and e-book bought together: both download links in one message.
#[derive(Debug, Clone)]
pub struct Bundle {
  settings: Arc<StoreSettings>,
}

impl Bundle {
  pub fn new(settings: Arc<StoreSettings>) -> Self {
    Self { settings }
  }
}

#[async_trait]
impl Fulfillment for Bundle {
  async fn fulfill(&self, order: &Order) -> Result<FulfillmentMessage, FulfillmentError> {
    let program_link = self.settings.download_link(&order.id, &self.settings.program_sku);
    let book_link = self.settings.download_link(&order.id, &self.settings.recipe_book_sku);
    let body = format!(
      "Hej {name}\n\n\
       Tillykke! Nu bliver du stærk både i træningscentret og i køkkenet.\n\n\
       Træningsprogrammet: {program_link}\n\n\
       E-bogen med opskrifter: {book_link}\n\n\
       Begge links er personlige, så del dem ikke med andre.\n\n\
       Programmet giver dig også adgang til vores lukkede fællesskab: {community}\n\n\
       Alle øvelser er vist på video her: {videos}\n\n\
       God træning og god madlavning!\n\n\
       Kærlig hilsen\nCamilla\n\n{footer}",
      name = order.customer_name(),
      program_link = program_link,
      book_link = book_link,
      community = self.settings.community_url,
      videos = self.settings.videos_url,
      footer = invoice_footer(order),
    );

    Ok(FulfillmentMessage {
      subject: "Her er dine programmer :-)".to_string(),
      body,
    })
  }

  fn invoice_template(&self) -> Option<&str> {
    self.settings.invoice_template_id.as_deref()
  }
}
