// orderflow/src/checkout.rs

use crate::domain::{meta, NewOrder, Order, OrderStatus};
use crate::error::CheckoutError;
use crate::fulfillment::StoreSettings;
use crate::notify::{Notification, Notifier};
use crate::ports::{CardError, PaymentGateway};
use crate::workflow::OrderLocks;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Storefront purchase as posted by the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub address: String,
  #[serde(default)]
  pub tshirt: String,
  /// Card token from the browser; it cannot be submitted again later.
  pub stripe_token: String,
  #[serde(rename = "sku", default)]
  pub skus: Vec<String>,
  #[serde(default)]
  pub newsletter: bool,
}

/// Creates orders and charges them.
pub struct CheckoutService {
  gateway: Arc<dyn PaymentGateway>,
  settings: Arc<StoreSettings>,
  locks: OrderLocks,
  notifier: Notifier,
}

impl CheckoutService {
  pub fn new(
    gateway: Arc<dyn PaymentGateway>,
    settings: Arc<StoreSettings>,
    locks: OrderLocks,
    notifier: Notifier,
  ) -> Self {
    Self {
      gateway,
      settings,
      locks,
      notifier,
    }
  }

  /// Builds the gateway order for a request without sending it.
  pub fn new_order(&self, request: &CheckoutRequest) -> NewOrder {
    let order_type = self.settings.classify(&request.skus);
    let mut metadata = BTreeMap::new();
    metadata.insert(meta::NAME.to_string(), request.name.clone());
    metadata.insert(meta::EMAIL.to_string(), request.email.clone());
    metadata.insert(meta::ADDRESS.to_string(), request.address.clone());
    metadata.insert(meta::TOKEN.to_string(), request.stripe_token.clone());
    metadata.insert(meta::TSHIRT.to_string(), request.tshirt.clone());
    metadata.insert(meta::NEWSLETTER.to_string(), request.newsletter.to_string());
    metadata.insert(meta::ORDER_TYPE.to_string(), order_type.as_str().to_string());

    NewOrder {
      currency: "dkk".to_string(),
      email: request.email.clone(),
      skus: request.skus.clone(),
      coupon: (request.skus.len() == 2).then(|| self.settings.bundle_coupon.clone()),
      metadata,
    }
  }

  /// Creates the order and charges it immediately.
  ///
  /// The charge runs under the order's lock, which the `order.created`
  /// webhook also takes before deciding whether to charge.
  #[instrument(name = "CheckoutService::place_order", skip_all, fields(skus = request.skus.len()), err(Display))]
  pub async fn place_order(&self, request: &CheckoutRequest) -> Result<Order, CheckoutError> {
    if request.skus.is_empty() {
      return Err(CheckoutError::EmptyBasket);
    }

    let new_order = self.new_order(request);
    let order = match self.gateway.create_order(&new_order).await {
      Ok(order) => order,
      Err(source) => {
        self.notifier.notify(Notification::failure(
          "Could not create order",
          format!("{:#}", source),
          "Error creating order",
        ));
        return Err(CheckoutError::CreateOrder { source });
      }
    };
    event!(Level::INFO, order_id = %order.id, order_type = ?order.order_type_raw(), "Order created.");

    let _guard = self.locks.lock(&order.id).await;
    // The `order.created` webhook may have taken the lock first and charged.
    let charged = match self.gateway.get_order(&order.id).await {
      Ok(live) if live.status != OrderStatus::Created => {
        event!(Level::INFO, order_id = %live.id, status = %live.status, "Order already charged, not charging again.");
        return Ok(live);
      }
      Ok(_) => self.gateway.pay_order(&order.id, &request.stripe_token).await,
      Err(source) => Err(source),
    };
    match charged {
      Ok(paid) => {
        event!(Level::INFO, order_id = %paid.id, "Order paid at checkout.");
        Ok(paid)
      }
      Err(source) => {
        let error = match source.downcast_ref::<CardError>() {
          Some(card) => CheckoutError::CardRejected {
            order_id: order.id.clone(),
            code: card.code.clone(),
            message: card_message(card),
          },
          None => CheckoutError::Charge {
            order_id: order.id.clone(),
            source,
          },
        };
        self.notifier.notify(Notification::failure(
          "Could not capture payment",
          error.to_string(),
          "Error pay order",
        ));
        Err(error)
      }
    }
  }
}

/// Customer-facing Danish text for a card decline.
pub fn card_message(card: &CardError) -> String {
  match card.code.as_str() {
    "card_declined" => "Kortet blev afvist. Prøv igen, eventuelt med et andet kort.".to_string(),
    "expired_card" => "Kortet er udløbet. Prøv igen med et andet kort.".to_string(),
    "incorrect_cvc" | "invalid_cvc" => "CVC-koden er forkert. Prøv igen.".to_string(),
    "invalid_expiry_month" | "invalid_expiry_year" => "Udløbsmåned eller -år er forkert. Prøv igen.".to_string(),
    _ => card.message.clone(),
  }
}
