// orderflow/src/webhook/signature.rs

//! Gateway webhook signatures.
//!
//! The header looks like `t=1700000000,v1=<hex>,v1=<hex>`. Each `v1` is an
//! HMAC-SHA256 over `"{t}.{body}"` keyed with the endpoint secret; one match is
//! enough. Old timestamps are refused to limit replay.

use crate::error::SignatureError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{event, Level};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct SignatureVerifier {
  secret: String,
  tolerance_secs: i64,
  insecure: bool,
}

impl std::fmt::Debug for SignatureVerifier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SignatureVerifier")
      .field("tolerance_secs", &self.tolerance_secs)
      .field("insecure", &self.insecure)
      .finish_non_exhaustive()
  }
}

impl SignatureVerifier {
  pub fn new(secret: impl Into<String>) -> Self {
    Self {
      secret: secret.into(),
      tolerance_secs: DEFAULT_TOLERANCE_SECS,
      insecure: false,
    }
  }

  /// Accepts every payload unchecked. Local development only.
  pub fn insecure() -> Self {
    Self {
      secret: String::new(),
      tolerance_secs: DEFAULT_TOLERANCE_SECS,
      insecure: true,
    }
  }

  pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
    self.tolerance_secs = tolerance_secs;
    self
  }

  pub fn is_insecure(&self) -> bool {
    self.insecure
  }

  /// Verifies against the current wall clock.
  pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
    self.verify_at(payload, header, chrono::Utc::now().timestamp())
  }

  pub fn verify_at(&self, payload: &[u8], header: Option<&str>, now: i64) -> Result<(), SignatureError> {
    if self.insecure {
      event!(Level::WARN, "Webhook signature check disabled, accepting payload unverified.");
      return Ok(());
    }

    let header = header.ok_or(SignatureError::MissingHeader)?;
    let (timestamp, signatures) = parse_header(header)?;

    // `t` is attacker controlled; any i64 must compare without overflow.
    if now.abs_diff(timestamp) > self.tolerance_secs.unsigned_abs() {
      return Err(SignatureError::OutsideTolerance {
        age_secs: now.saturating_sub(timestamp),
        tolerance_secs: self.tolerance_secs,
      });
    }

    let mac = self.mac_for(payload, timestamp)?;
    let matched = signatures
      .iter()
      .any(|candidate| mac.clone().verify_slice(candidate).is_ok());
    if matched {
      Ok(())
    } else {
      Err(SignatureError::Mismatch)
    }
  }

  /// Produces a header value the way the gateway does.
  pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
    let digest = self.mac_for(payload, timestamp)?.finalize().into_bytes();
    Ok(format!("t={},v1={}", timestamp, hex::encode(digest)))
  }

  fn mac_for(&self, payload: &[u8], timestamp: i64) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
      .map_err(|e| SignatureError::MalformedHeader(format!("unusable secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
  }
}

/// Splits the header into its timestamp and decoded `v1` signatures. Other
/// schemes (`v0`, ...) are ignored.
fn parse_header(header: &str) -> Result<(i64, Vec<Vec<u8>>), SignatureError> {
  let mut timestamp = None;
  let mut signatures = Vec::new();

  for part in header.split(',') {
    let Some((key, value)) = part.trim().split_once('=') else {
      continue;
    };
    match key {
      "t" => {
        let parsed = value
          .parse::<i64>()
          .map_err(|_| SignatureError::MalformedHeader(format!("bad timestamp '{}'", value)))?;
        timestamp = Some(parsed);
      }
      "v1" => {
        if let Ok(bytes) = hex::decode(value) {
          signatures.push(bytes);
        }
      }
      _ => {}
    }
  }

  let timestamp = timestamp.ok_or_else(|| SignatureError::MalformedHeader("no timestamp".to_string()))?;
  if signatures.is_empty() {
    return Err(SignatureError::MalformedHeader("no v1 signature".to_string()));
  }
  Ok((timestamp, signatures))
}
