// orderflow-server/src/services/mod.rs

//! HTTP clients implementing the workflow's collaborator capabilities.

pub mod dinero;
pub mod slack;
pub mod stripe;

pub use dinero::DineroClient;
pub use slack::SlackSink;
pub use stripe::StripeClient;

/// First part of an error body, for error messages.
pub(crate) fn body_excerpt(body: &str) -> &str {
  let mut end = body.len().min(512);
  while !body.is_char_boundary(end) {
    end -= 1;
  }
  &body[..end]
}
