// orderflow-server/src/services/slack.rs

use super::body_excerpt;
use crate::config::SlackConfig;
use anyhow::{bail, Context};
use async_trait::async_trait;
use orderflow::{Notification, NotificationSink};
use reqwest::Client;
use serde::Serialize;
use tracing::instrument;

const USERNAME: &str = "robot";
const ICON: &str = ":gopher_dance:";

#[derive(Serialize)]
struct Attachment<'a> {
  title: &'a str,
  text: String,
  color: &'static str,
}

#[derive(Serialize)]
struct Payload<'a> {
  username: &'static str,
  icon_emoji: &'static str,
  channel: &'a str,
  attachments: Vec<Attachment<'a>>,
}

/// Posts notifications to a Slack incoming webhook.
pub struct SlackSink {
  http: Client,
  config: SlackConfig,
}

impl SlackSink {
  pub fn new(http: Client, config: SlackConfig) -> Self {
    Self { http, config }
  }

  fn payload<'a>(&'a self, notification: &'a Notification) -> Payload<'a> {
    Payload {
      username: USERNAME,
      icon_emoji: ICON,
      channel: &self.config.channel,
      attachments: vec![Attachment {
        title: &notification.detail,
        text: format!("{} - {}", notification.title, notification.status),
        color: notification.color.hex(),
      }],
    }
  }
}

#[async_trait]
impl NotificationSink for SlackSink {
  #[instrument(name = "SlackSink::deliver", skip_all, fields(title = %notification.title), err(Display))]
  async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
    let response = self
      .http
      .post(&self.config.url)
      .json(&self.payload(notification))
      .send()
      .await
      .context("Slack request failed")?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      bail!("Slack rejected notification with {}: {}", status, body_excerpt(&body));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detail_is_the_headline() {
    let sink = SlackSink::new(
      Client::new(),
      SlackConfig {
        url: "https://hooks.slack.invalid/x".to_string(),
        channel: "#orders".to_string(),
      },
    );
    let notification = Notification::failure("Order or_1 - step send_invoice", "invoice service down", "Error");
    let json = serde_json::to_value(sink.payload(&notification)).unwrap();

    assert_eq!(json["username"], "robot");
    assert_eq!(json["icon_emoji"], ":gopher_dance:");
    assert_eq!(json["attachments"][0]["title"], "invoice service down");
    assert_eq!(json["attachments"][0]["text"], "Order or_1 - step send_invoice - Error");
    assert_eq!(json["attachments"][0]["color"], "#CF0003");
  }
}
