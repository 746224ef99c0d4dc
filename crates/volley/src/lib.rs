//! Deterministic multi-sender transaction orchestration.
//!
//! A deployment script submits transactions through named senders (private keys, hardware
//! wallets, Safe multisigs, Governor proposals). Every transaction is simulated immediately
//! against a [`Vm`] and queued on one global queue. When the outermost broadcast scope of
//! the [`Coordinator`] ends, the queue is replayed in submission order, each entry handled by
//! its sender's backend. Contracts are deployed through the CreateX factory with addresses
//! that are predicted, checked and reused when already occupied.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod config;
pub use config::*;

mod coordinator;
pub use coordinator::*;

mod deployer;
pub use deployer::*;

mod error;
pub use error::*;

mod event;
pub use event::*;

mod harness;
pub use harness::*;

mod registry;
pub use registry::*;

pub mod salt;

pub mod sender;
pub use sender::{Sender, SenderInitConfig, SenderKind, SenderType};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod types;
pub use types::*;

pub mod vm;
pub use vm::{CallFailure, MemoryVm, Vm};
