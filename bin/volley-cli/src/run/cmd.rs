use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::info;
use volley::{vm::BroadcastRecord, BroadcastOutcome, Event, SimulatedTransaction, Vm};

use super::Plan;
use crate::common::{AddressBook, CliError, LogArgs, Result, SendersArgs};

/// Execute a deployment plan and broadcast it
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Plan file
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,

    /// Only simulate, skip the broadcast
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Address book to resolve call targets from and record deployments in
    #[arg(long = "address-book", value_name = "FILE")]
    pub address_book: Option<PathBuf>,

    /// Sender configuration
    #[command(flatten)]
    pub senders: SendersArgs,

    /// Logging configuration
    #[command(flatten)]
    pub log: LogArgs,
}

/// Everything a run produced.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunOutput {
    events: Vec<Event>,
    queue: Vec<SimulatedTransaction>,
    broadcasts: Vec<BroadcastRecord>,
    outcome: Option<BroadcastOutcome>,
}

impl Cmd {
    /// Execute the run command
    pub fn run(&self) -> Result<()> {
        self.log.init().map_err(CliError::Logging)?;

        let plan = Plan::load(&self.plan)?;
        let mut book = match &self.address_book {
            Some(path) => AddressBook::load(path)?,
            None => AddressBook::default(),
        };

        let mut coordinator = self.senders.coordinator(self.dry_run)?;
        let state = coordinator.broadcast_scope(|coordinator| plan.execute(coordinator, &book))?;
        info!(deployed = state.deployed.len(), "Plan executed");

        let events = coordinator.take_events();
        if let Some(path) = &self.address_book {
            let chain_id = coordinator.vm().chain_id();
            let recorded =
                book.record_events(chain_id, coordinator.namespace(), &events, &state.short_ids);
            book.save(path)?;
            info!(recorded, path = %path.display(), "Updated address book");
        }

        let output = RunOutput {
            events,
            queue: coordinator.queue().to_vec(),
            broadcasts: coordinator.vm().broadcasts().to_vec(),
            outcome: coordinator.last_broadcast().cloned(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
