//! A chat assistant for a gym-equipment retailer.
//!
//! The assistant answers from a read-only product catalog through three
//! tools, and is served over HTTP as a stream of server-sent events or used
//! from the terminal through the bundled CLI.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod assistant;
pub mod catalog;
pub mod config;
mod error;
#[cfg(feature = "server")]
pub mod server;
pub mod tools;

pub use assistant::{AssistantBuilder, SYSTEM_PROMPT, build_from_config};
pub use error::Error;

/// Re-exports of [`gym_agent_core`] crate.
pub mod core {
    pub use gym_agent_core::*;
}
