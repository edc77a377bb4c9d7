// orderflow/src/webhook/mod.rs

pub mod dispatcher;
pub mod event;
pub mod signature;

pub use dispatcher::{Acknowledgement, WebhookDispatcher};
pub use event::{Charge, Envelope, EventKind, WebhookEvent};
pub use signature::{SignatureVerifier, DEFAULT_TOLERANCE_SECS};
