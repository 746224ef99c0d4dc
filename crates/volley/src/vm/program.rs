//! Native programs giving behaviour to contracts of the in-memory backend.

use core::fmt::Debug;
use std::sync::Arc;

use alloy_primitives::{keccak256, map::HashMap, Bytes, B256};
use auto_impl::auto_impl;

use super::{CallContext, CallFailure};

/// Behaviour of a contract deployed on the in-memory backend.
///
/// A program is bound to the creation bytecode of an artifact. When that bytecode is deployed,
/// [`Program::construct`] runs with the trailing constructor arguments and the deployed account
/// keeps the creation bytecode as its code. Every later call dispatches to [`Program::call`].
#[auto_impl(&, Box, Arc)]
pub trait Program: Debug + Send + Sync {
    /// Runs the constructor. `args` are the bytes following the creation bytecode.
    fn construct(&self, ctx: &mut CallContext<'_>, args: &[u8]) -> Result<(), CallFailure> {
        let _ = (ctx, args);
        Ok(())
    }

    /// Handles a call with the given calldata.
    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, CallFailure>;
}

/// Programs indexed by the hash of their creation bytecode.
#[derive(Debug, Clone, Default)]
pub struct ProgramRegistry {
    /// Program by creation code hash.
    programs: HashMap<B256, Arc<dyn Program>>,
    /// Registered creation bytecodes, longest first, for init code prefix matching.
    bytecodes: Vec<Bytes>,
}

impl ProgramRegistry {
    /// Binds `program` to `bytecode`. A later registration of the same bytecode replaces the
    /// earlier one.
    pub fn register(&mut self, bytecode: Bytes, program: Arc<dyn Program>) {
        let code_hash = keccak256(&bytecode);
        if self.programs.insert(code_hash, program).is_none() {
            self.bytecodes.push(bytecode);
            self.bytecodes.sort_by(|a, b| b.len().cmp(&a.len()));
        }
    }

    /// Returns the program bound to deployed `code`.
    pub fn get(&self, code: &[u8]) -> Option<Arc<dyn Program>> {
        self.programs.get(&keccak256(code)).cloned()
    }

    /// Splits `init_code` into a registered creation bytecode and the constructor arguments
    /// that follow it. Returns `None` when no registered bytecode prefixes `init_code`.
    pub fn resolve<'a>(&self, init_code: &'a [u8]) -> Option<(Bytes, &'a [u8])> {
        self.bytecodes
            .iter()
            .find(|bytecode| init_code.starts_with(bytecode))
            .map(|bytecode| (bytecode.clone(), &init_code[bytecode.len()..]))
    }
}
