mod address_book;
mod error;
mod logging;
mod senders;

pub use address_book::*;
pub use error::*;
pub use logging::*;
pub use senders::*;
