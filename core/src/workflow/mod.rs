// orderflow/src/workflow/mod.rs

pub mod engine;
pub mod locks;

pub use engine::{invoice_lines, FlowOutcome, Workflow};
pub use locks::{OrderGuard, OrderLocks};
