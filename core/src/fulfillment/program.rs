// orderflow/src/fulfillment/program.rs

use super::{invoice_footer, Fulfillment, FulfillmentMessage, StoreSettings};
use crate::domain::Order;
use crate::error::FulfillmentError;
use async_trait::async_trait;
use std::sync::Arc;

/// The training program on its own: one download link.
#[derive(Debug, Clone)]
pub struct SingleProgram {
  settings: Arc<StoreSettings>,
}

impl SingleProgram {
  pub fn new(settings: Arc<StoreSettings>) -> Self {
    Self { settings }
  }
}

#[async_trait]
impl Fulfillment for SingleProgram {
  async fn fulfill(&self, order: &Order) -> Result<FulfillmentMessage, FulfillmentError> {
    let link = self.settings.download_link(&order.id, &self.settings.program_sku);
    let body = format!(
      "Hej {name}\n\n\
       Tillykke med dit nye træningsprogram! Du kan hente det her: {link}\n\n\
       Linket er personligt, så del det ikke med andre.\n\n\
       Programmet giver dig også adgang til vores lukkede fællesskab, hvor vi hjælper og hepper på hinanden: {community}\n\n\
       Alle øvelser er vist på video, så du altid kan se hvordan de udføres: {videos}\n\n\
       Skriv til os i gruppen hvis du har spørgsmål. God træning!\n\n\
       Kærlig hilsen\nCamilla\n\n{footer}",
      name = order.customer_name(),
      link = link,
      community = self.settings.community_url,
      videos = self.settings.videos_url,
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
