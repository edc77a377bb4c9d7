// orderflow-server/src/services/dinero.rs

//! Dinero accounting API client.
//!
//! Authenticates with the OAuth password grant (the API key doubles as user
//! and password) and caches the bearer token until shortly before it expires.

use super::body_excerpt;
use crate::config::DineroConfig;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::Local;
use orderflow::ports::{InvoiceDraft, InvoiceRef, NewCustomer};
use orderflow::{InvoicingService, LedgerAccounts, LedgerEntry, Money};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{event, instrument, Level};

pub const AUTH_URL: &str = "https://authz.dinero.dk/dineroapi/oauth/token";
pub const API_BASE: &str = "https://api.dinero.dk/v1";

/// Revenue account every invoice line is booked on.
const SALES_ACCOUNT: u32 = 1000;
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

struct AccessToken {
  value: String,
  expires_at: Instant,
}

pub struct DineroClient {
  http: Client,
  config: DineroConfig,
  accounts: LedgerAccounts,
  base_url: String,
  token: Mutex<Option<AccessToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
  access_token: String,
  expires_in: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ContactBody<'a> {
  name: &'a str,
  email: &'a str,
  street: &'a str,
  country_key: &'a str,
  is_person: bool,
  payment_condition_type: &'a str,
}

#[derive(Deserialize)]
struct ContactCreated {
  #[serde(rename = "ContactGuid")]
  id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ProductLine {
  base_amount_value: f64,
  quantity: u32,
  account_number: u32,
  description: String,
  line_type: &'static str,
  unit: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PaymentConditions {
  payment_condition_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InvoiceBody<'a> {
  #[serde(rename = "ContactGuid")]
  contact_id: &'a str,
  show_lines_incl_vat: bool,
  currency: &'static str,
  language: &'static str,
  date: String,
  product_lines: Vec<ProductLine>,
  payment_conditions: PaymentConditions,
  #[serde(skip_serializing_if = "Option::is_none")]
  invoice_template_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct Saved {
  #[serde(rename = "Guid")]
  id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Invoice {
  #[serde(rename = "Guid")]
  id: String,
  #[serde(default)]
  number: Option<i64>,
  #[serde(rename = "TimeStamp")]
  timestamp: String,
  #[serde(default)]
  status: String,
  #[serde(default)]
  payment_status: Option<String>,
}

impl Invoice {
  fn is_booked(&self) -> bool {
    self.status != "Draft" && !self.status.is_empty()
  }

  fn is_paid(&self) -> bool {
    matches!(self.payment_status.as_deref(), Some("Paid") | Some("OverPaid"))
  }

  fn into_ref(self) -> InvoiceRef {
    InvoiceRef {
      id: self.id,
      number: self.number,
      timestamp: self.timestamp,
    }
  }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct BookBody<'a> {
  timestamp: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PaymentBody<'a> {
  timestamp: &'a str,
  deposit_account_number: u32,
  amount: f64,
  description: &'static str,
  payment_date: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EmailBody<'a> {
  subject: &'a str,
  message: &'a str,
  add_voucher_as_attachment: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LedgerItem<'a> {
  account_number: u32,
  account_vat_code: &'static str,
  amount: f64,
  description: &'a str,
  voucher_number: u32,
  voucher_date: &'a str,
}

#[derive(Serialize, Deserialize)]
struct LedgerItemRef {
  #[serde(rename = "Id")]
  id: String,
  #[serde(rename = "Timestamp")]
  timestamp: String,
}

fn today() -> String {
  Local::now().format("%Y-%m-%d").to_string()
}

impl DineroClient {
  pub fn new(http: Client, config: DineroConfig, accounts: LedgerAccounts) -> Self {
    Self {
      http,
      config,
      accounts,
      base_url: API_BASE.to_string(),
      token: Mutex::new(None),
    }
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/{}/{}",
      self.base_url.trim_end_matches('/'),
      self.config.organization_id,
      path
    )
  }

  async fn access_token(&self) -> anyhow::Result<String> {
    let mut cached = self.token.lock().await;
    if let Some(token) = cached.as_ref() {
      if token.expires_at > Instant::now() + TOKEN_MARGIN {
        return Ok(token.value.clone());
      }
    }

    let request = self
      .http
      .post(AUTH_URL)
      .basic_auth(&self.config.client_key, Some(&self.config.client_secret))
      .form(&[
        ("grant_type", "password"),
        ("scope", "read write"),
        ("username", self.config.api_key.as_str()),
        ("password", self.config.api_key.as_str()),
      ]);
    let token: TokenResponse = decode(request).await.context("Dinero authentication failed")?;
    event!(Level::DEBUG, expires_in = token.expires_in, "Dinero access token refreshed.");

    let value = token.access_token.clone();
    *cached = Some(AccessToken {
      value: token.access_token,
      expires_at: Instant::now() + Duration::from_secs(token.expires_in),
    });
    Ok(value)
  }

  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> anyhow::Result<T> {
    let token = self.access_token().await?;
    decode(request.bearer_auth(token)).await
  }

  /// For endpoints that answer with an empty body.
  async fn execute(&self, request: RequestBuilder) -> anyhow::Result<()> {
    let token = self.access_token().await?;
    let response = request.bearer_auth(token).send().await.context("Dinero request failed")?;
    check(response).await.map(|_| ())
  }

  async fn get_invoice(&self, invoice_id: &str) -> anyhow::Result<Invoice> {
    self
      .send(self.http.get(self.url(&format!("invoices/{}", invoice_id))))
      .await
  }
}

async fn check(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(anyhow!("Dinero API error {}: {}", status, body_excerpt(&body)))
}

async fn decode<T: DeserializeOwned>(request: RequestBuilder) -> anyhow::Result<T> {
  let response = request.send().await.context("Dinero request failed")?;
  check(response)
    .await?
    .json::<T>()
    .await
    .context("Decoding Dinero response failed")
}

#[async_trait]
impl InvoicingService for DineroClient {
  #[instrument(name = "DineroClient::create_customer", skip_all, err(Display))]
  async fn create_customer(&self, customer: &NewCustomer) -> anyhow::Result<String> {
    let body = ContactBody {
      name: &customer.name,
      email: &customer.email,
      street: &customer.address,
      country_key: "DK",
      is_person: true,
      payment_condition_type: "NettoCash",
    };
    let created: ContactCreated = self.send(self.http.post(self.url("contacts")).json(&body)).await?;
    Ok(created.id)
  }

  #[instrument(name = "DineroClient::create_invoice", skip_all, fields(lines = draft.lines.len()), err(Display))]
  async fn create_invoice(&self, draft: &InvoiceDraft) -> anyhow::Result<InvoiceRef> {
    let body = InvoiceBody {
      contact_id: &draft.customer_id,
      show_lines_incl_vat: true,
      currency: "DKK",
      language: "da-DK",
      date: today(),
      product_lines: draft
        .lines
        .iter()
        .map(|line| ProductLine {
          base_amount_value: line.amount.to_decimal(),
          quantity: 1,
          account_number: SALES_ACCOUNT,
          description: line.description.clone(),
          line_type: "Product",
          unit: "parts",
        })
        .collect(),
      payment_conditions: PaymentConditions {
        payment_condition_type: "Paid",
      },
      invoice_template_id: draft.template_id.as_deref(),
    };
    let saved: Saved = self.send(self.http.post(self.url("invoices")).json(&body)).await?;
    Ok(self.get_invoice(&saved.id).await?.into_ref())
  }

  #[instrument(name = "DineroClient::book_invoice", skip(self, timestamp), err(Display))]
  async fn book_invoice(&self, invoice_id: &str, timestamp: &str) -> anyhow::Result<InvoiceRef> {
    let invoice = self.get_invoice(invoice_id).await?;
    if invoice.is_booked() {
      event!(Level::INFO, status = %invoice.status, "Invoice already booked.");
      return Ok(invoice.into_ref());
    }

    self
      .execute(
        self
          .http
          .post(self.url(&format!("invoices/{}/book", invoice_id)))
          .json(&BookBody { timestamp }),
      )
      .await?;
    Ok(self.get_invoice(invoice_id).await?.into_ref())
  }

  #[instrument(name = "DineroClient::create_payment", skip(self, amount), fields(amount = %amount), err(Display))]
  async fn create_payment(&self, invoice_id: &str, amount: Money) -> anyhow::Result<()> {
    let invoice = self.get_invoice(invoice_id).await?;
    if invoice.is_paid() {
      event!(Level::INFO, "Invoice already paid.");
      return Ok(());
    }

    let body = PaymentBody {
      timestamp: &invoice.timestamp,
      deposit_account_number: self.accounts.clearing,
      amount: amount.to_decimal(),
      description: "Paid with stripe",
      payment_date: today(),
    };
    self
      .execute(
        self
          .http
          .post(self.url(&format!("invoices/{}/payments", invoice_id)))
          .json(&body),
      )
      .await
  }

  #[instrument(name = "DineroClient::send_invoice", skip(self, body), err(Display))]
  async fn send_invoice(&self, invoice_id: &str, subject: &str, body: &str) -> anyhow::Result<()> {
    let email = EmailBody {
      subject,
      message: body,
      add_voucher_as_attachment: true,
    };
    self
      .execute(
        self
          .http
          .post(self.url(&format!("invoices/{}/email", invoice_id)))
          .json(&email),
      )
      .await
  }

  #[instrument(name = "DineroClient::post_ledger_entries", skip_all, fields(entries = entries.len()), err(Display))]
  async fn post_ledger_entries(&self, entries: &[LedgerEntry]) -> anyhow::Result<()> {
    let voucher_date = today();
    let items: Vec<LedgerItem<'_>> = entries
      .iter()
      .map(|entry| LedgerItem {
        account_number: entry.account_number,
        account_vat_code: "None",
        amount: entry.amount.to_decimal(),
        description: &entry.description,
        voucher_number: 1,
        voucher_date: &voucher_date,
      })
      .collect();

    let created: Vec<LedgerItemRef> = self.send(self.http.post(self.url("ledgeritems")).json(&items)).await?;
    self
      .execute(self.http.post(self.url("ledgeritems/book")).json(&created))
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn invoice(status: &str, payment_status: Option<&str>) -> Invoice {
    Invoice {
      id: "invoice-1".to_string(),
      number: None,
      timestamp: "0000000000000001".to_string(),
      status: status.to_string(),
      payment_status: payment_status.map(str::to_string),
    }
  }

  #[test]
  fn only_drafts_need_booking() {
    assert!(!invoice("Draft", None).is_booked());
    assert!(invoice("Booked", None).is_booked());
    assert!(invoice("Paid", Some("Paid")).is_booked());
  }

  #[test]
  fn paid_and_overpaid_skip_payment() {
    assert!(invoice("Booked", Some("Paid")).is_paid());
    assert!(invoice("Booked", Some("OverPaid")).is_paid());
    assert!(!invoice("Booked", Some("Unpaid")).is_paid());
    assert!(!invoice("Booked", None).is_paid());
  }

  #[test]
  fn invoice_payload_uses_dinero_field_names() {
    let body = InvoiceBody {
      contact_id: "contact-1",
      show_lines_incl_vat: true,
      currency: "DKK",
      language: "da-DK",
      date: "2024-01-02".to_string(),
      product_lines: vec![ProductLine {
        base_amount_value: Money(49950).to_decimal(),
        quantity: 1,
        account_number: SALES_ACCOUNT,
        description: "Program".to_string(),
        line_type: "Product",
        unit: "parts",
      }],
      payment_conditions: PaymentConditions {
        payment_condition_type: "Paid",
      },
      invoice_template_id: None,
    };
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["ContactGuid"], "contact-1");
    assert_eq!(json["ProductLines"][0]["BaseAmountValue"], 499.5);
    assert_eq!(json["PaymentConditions"]["PaymentConditionType"], "Paid");
    assert!(json.get("InvoiceTemplateId").is_none());
  }
}
