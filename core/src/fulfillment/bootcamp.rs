// orderflow/src/fulfillment/bootcamp.rs

use super::{invoice_footer, Fulfillment, FulfillmentMessage};
use crate::domain::Order;
use crate::error::FulfillmentError;
use crate::ports::{PaymentGateway, ProductVariant};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{event, Level};

pub const ATTR_DATE: &str = "date";
pub const ATTR_STARTS_AT: &str = "StartsAt";
pub const ATTR_FOCUS: &str = "fokus";

/// One training session from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub date: String,
  pub starts_at: String,
  pub focus: String,
}

impl Session {
  fn from_variant(variant: &ProductVariant, sku_id: &str) -> Result<Self, FulfillmentError> {
    let attr = |attribute: &'static str| {
      variant
        .attribute(attribute)
        .map(str::to_string)
        .ok_or_else(|| FulfillmentError::MissingAttribute {
          sku_id: sku_id.to_string(),
          attribute,
        })
    };
    Ok(Self {
      date: attr(ATTR_DATE)?,
      starts_at: attr(ATTR_STARTS_AT)?,
      focus: attr(ATTR_FOCUS)?,
    })
  }
}

/// In-person training sessions. Every purchased SKU is one session; its date,
/// start time and focus come from the catalog and are listed as a schedule.
pub struct BootcampSeries {
  gateway: Arc<dyn PaymentGateway>,
}

impl BootcampSeries {
  pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
    Self { gateway }
  }

  async fn sessions(&self, order: &Order) -> Result<Vec<Session>, FulfillmentError> {
    let mut sessions = Vec::new();
    for sku_id in order.sku_items().filter_map(|item| item.parent.as_deref()) {
      let variant = self
        .gateway
        .get_product_variant(sku_id)
        .await
        .map_err(|source| FulfillmentError::Catalog {
          sku_id: sku_id.to_string(),
          source,
        })?;
      sessions.push(Session::from_variant(&variant, sku_id)?);
    }
    if sessions.is_empty() {
      return Err(FulfillmentError::NoItems);
    }
    Ok(sessions)
  }
}

pub(crate) fn render_schedule(sessions: &[Session]) -> String {
  let mut schedule = String::new();
  for session in sessions {
    // Writing to a String cannot fail.
    let _ = writeln!(schedule, "{} kl. {} - {}", session.date, session.starts_at, session.focus);
  }
  schedule
}

#[async_trait]
impl Fulfillment for BootcampSeries {
  async fn fulfill(&self, order: &Order) -> Result<FulfillmentMessage, FulfillmentError> {
    let sessions = self.sessions(order).await?;
    event!(Level::DEBUG, order_id = %order.id, sessions = sessions.len(), "Rendering bootcamp schedule.");

    let body = format!(
      "Hej {name}\n\n\
       Hvor er det fedt at du vil træne med os! Vi glæder os allerede.\n\n\
       Du er tilmeldt fællestræning på disse datoer:\n\n\
       {schedule}\n\
       Vi træner i Loaded Gym, Værkstedvej 71, 2500 Valby. Der er gratis parkering ved døren, \
       og S-tog til Ny Ellebjerg eller bus 8A til Grønttorvet holder tæt på.\n\n\
       Sig i receptionen at du skal træne med Rasmus og Camilla, og kom i god tid. Vi starter præcist.\n\n\
       Kærlig hilsen\nCamilla\n\n{footer}",
      name = order.customer_name(),
      schedule = render_schedule(&sessions),
      footer = invoice_footer(order),
    );

    Ok(FulfillmentMessage {
      subject: "Du er tilmeldt Badass bootcamp :-)".to_string(),
      body,
    })
  }
}
