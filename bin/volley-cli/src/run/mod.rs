//! Run module executing a deployment plan.
//!
//! A plan is a JSON list of steps (`deploy`, `call`, `describe`) executed in one broadcast
//! scope on an in-memory chain.

mod cmd;
mod plan;

pub use cmd::*;
pub use plan::*;
