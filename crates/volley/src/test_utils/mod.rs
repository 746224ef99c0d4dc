//! Test utilities for deployment scripts.

mod counter;
mod fixtures;

pub use counter::*;
pub use fixtures::*;
