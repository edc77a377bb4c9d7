// orderflow-server/src/services/stripe.rs

use super::body_excerpt;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use orderflow::{BalanceTransaction, CardError, NewOrder, Order, OrderPatch, PaymentGateway, ProductVariant};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{event, instrument, Level};

pub const API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe orders API client. Requests are form encoded, responses JSON.
pub struct StripeClient {
  http: Client,
  secret_key: String,
  base_url: String,
}

#[derive(Deserialize)]
struct List<T> {
  data: Vec<T>,
  #[serde(default)]
  has_more: bool,
}

#[derive(Deserialize)]
struct Sku {
  id: String,
  #[serde(default)]
  attributes: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
  error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
  #[serde(rename = "type")]
  kind: String,
  code: Option<String>,
  decline_code: Option<String>,
  message: Option<String>,
}

impl StripeClient {
  pub fn new(http: Client, secret_key: impl Into<String>) -> Self {
    Self {
      http,
      secret_key: secret_key.into(),
      base_url: API_BASE.to_string(),
    }
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.base_url.trim_end_matches('/'), path)
  }

  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> anyhow::Result<T> {
    let response = request
      .bearer_auth(&self.secret_key)
      .send()
      .await
      .context("Stripe request failed")?;
    let status = response.status();
    if status.is_success() {
      return response.json::<T>().await.context("Decoding Stripe response failed");
    }
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body))
  }
}

/// Card errors become [`CardError`] so checkout can tell the customer why.
fn api_error(status: StatusCode, body: &str) -> anyhow::Error {
  match serde_json::from_str::<ErrorEnvelope>(body) {
    Ok(ErrorEnvelope { error }) if error.kind == "card_error" => CardError {
      code: error
        .code
        .or(error.decline_code)
        .unwrap_or_else(|| "card_declined".to_string()),
      message: error.message.unwrap_or_default(),
    }
    .into(),
    Ok(ErrorEnvelope { error }) => anyhow!(
      "Stripe API error {} ({}): {}",
      status,
      error.kind,
      error.message.unwrap_or_default()
    ),
    Err(_) => anyhow!("Stripe API error {}: {}", status, body_excerpt(body)),
  }
}

fn patch_form(patch: &OrderPatch) -> Vec<(String, String)> {
  let mut form: Vec<(String, String)> = patch
    .metadata
    .iter()
    .map(|(key, value)| (format!("metadata[{}]", key), value.clone()))
    .collect();
  if let Some(status) = patch.status {
    form.push(("status".to_string(), status.as_str().to_string()));
  }
  form
}

fn new_order_form(order: &NewOrder) -> Vec<(String, String)> {
  let mut form = vec![
    ("currency".to_string(), order.currency.clone()),
    ("email".to_string(), order.email.clone()),
  ];
  for (i, sku) in order.skus.iter().enumerate() {
    form.push((format!("items[{}][type]", i), "sku".to_string()));
    form.push((format!("items[{}][parent]", i), sku.clone()));
  }
  if let Some(coupon) = &order.coupon {
    form.push(("coupon".to_string(), coupon.clone()));
  }
  for (key, value) in &order.metadata {
    form.push((format!("metadata[{}]", key), value.clone()));
  }
  form
}

#[async_trait]
impl PaymentGateway for StripeClient {
  #[instrument(name = "StripeClient::get_order", skip(self), err(Display))]
  async fn get_order(&self, order_id: &str) -> anyhow::Result<Order> {
    self.send(self.http.get(self.url(&format!("orders/{}", order_id)))).await
  }

  #[instrument(name = "StripeClient::update_order", skip(self, patch), fields(flow_status = ?patch.flow_status()), err(Display))]
  async fn update_order(&self, order_id: &str, patch: &OrderPatch) -> anyhow::Result<Order> {
    let request = self
      .http
      .post(self.url(&format!("orders/{}", order_id)))
      .form(&patch_form(patch));
    self.send(request).await
  }

  #[instrument(name = "StripeClient::pay_order", skip(self, source_token), err(Display))]
  async fn pay_order(&self, order_id: &str, source_token: &str) -> anyhow::Result<Order> {
    let request = self
      .http
      .post(self.url(&format!("orders/{}/pay", order_id)))
      .form(&[("source", source_token)]);
    self.send(request).await
  }

  #[instrument(name = "StripeClient::create_order", skip_all, fields(skus = order.skus.len()), err(Display))]
  async fn create_order(&self, order: &NewOrder) -> anyhow::Result<Order> {
    let request = self.http.post(self.url("orders")).form(&new_order_form(order));
    self.send(request).await
  }

  #[instrument(name = "StripeClient::list_balance_transactions", skip(self), err(Display))]
  async fn list_balance_transactions(&self, payout_id: &str) -> anyhow::Result<Vec<BalanceTransaction>> {
    let mut transactions = Vec::new();
    let mut starting_after: Option<String> = None;
    loop {
      let mut query = vec![("payout", payout_id.to_string()), ("limit", "100".to_string())];
      if let Some(after) = &starting_after {
        query.push(("starting_after", after.clone()));
      }
      let page: List<BalanceTransaction> = self
        .send(self.http.get(self.url("balance_transactions")).query(&query))
        .await?;
      starting_after = page.data.last().map(|tx| tx.id.clone());
      transactions.extend(page.data);
      if !page.has_more || starting_after.is_none() {
        break;
      }
    }
    event!(Level::DEBUG, count = transactions.len(), "Balance transactions listed.");
    Ok(transactions)
  }

  #[instrument(name = "StripeClient::get_product_variant", skip(self), err(Display))]
  async fn get_product_variant(&self, sku_id: &str) -> anyhow::Result<ProductVariant> {
    let sku: Sku = self.send(self.http.get(self.url(&format!("skus/{}", sku_id)))).await?;
    Ok(ProductVariant {
      id: sku.id,
      attributes: sku.attributes,
    })
  }
}
