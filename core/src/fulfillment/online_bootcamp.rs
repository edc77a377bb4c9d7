// orderflow/src/fulfillment/online_bootcamp.rs

use super::{invoice_footer, Fulfillment, FulfillmentMessage};
use crate::domain::Order;
use crate::error::FulfillmentError;
use crate::ports::PaymentGateway;
use async_trait::async_trait;
use std::sync::Arc;

pub const ATTR_COMMUNITY_LINK: &str = "facebook";

/// Remote bootcamp: the purchased SKU carries the link to its community group.
pub struct OnlineBootcamp {
  gateway: Arc<dyn PaymentGateway>,
}

impl OnlineBootcamp {
  pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
    Self { gateway }
  }

  /// The first purchased SKU that carries a community link.
  async fn community_link(&self, order: &Order) -> Result<String, FulfillmentError> {
    let mut first_sku = None;
    for sku_id in order.sku_items().filter_map(|item| item.parent.as_deref()) {
      first_sku.get_or_insert(sku_id);
      let variant = self
        .gateway
        .get_product_variant(sku_id)
        .await
        .map_err(|source| FulfillmentError::Catalog {
          sku_id: sku_id.to_string(),
          source,
        })?;
      if let Some(link) = variant.attribute(ATTR_COMMUNITY_LINK) {
        return Ok(link.to_string());
      }
    }
    match first_sku {
      Some(sku_id) => Err(FulfillmentError::MissingAttribute {
        sku_id: sku_id.to_string(),
        attribute: ATTR_COMMUNITY_LINK,
      }),
      None => Err(FulfillmentError::NoItems),
    }
  }
}

#[async_trait]
impl Fulfillment for OnlineBootcamp {
  async fn fulfill(&self, order: &Order) -> Result<FulfillmentMessage, FulfillmentError> {
    let link = self.community_link(order).await?;
    let body = format!(
      "Hej {name}\n\n\
       Velkommen til online bootcamp! Vi glæder os til at komme i gang sammen med dig.\n\n\
       Alt foregår i vores gruppe, som du finder her: {link}\n\n\
       Kærlig hilsen\nRasmus & Camilla\n\n{footer}",
      name = order.customer_name(),
      link = link,
      footer = invoice_footer(order),
    );

    Ok(FulfillmentMessage {
      subject: "Her er dit program :-)".to_string(),
      body,
    })
  }
}
