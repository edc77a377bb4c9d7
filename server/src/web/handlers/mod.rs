// orderflow-server/src/web/handlers/mod.rs

pub mod checkout_handlers;
pub mod webhook_handlers;
