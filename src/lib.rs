pub mod ci;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod forge;
pub mod guard;
pub mod manifest;
pub mod process;
pub mod publish;
pub mod remote;
pub mod repo;

pub use cli::Args;
pub use command::release::{self, ReleaseOutcome};
pub use error::{ReleaseError, Result};

#[cfg(test)]
pub mod test_helpers;
