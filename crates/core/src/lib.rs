//! Core logic of the chat agent: conversation state, tool dispatch, the
//! reason/act control loop, checkpoints and the streaming relay.
//!
//! The crate knows nothing about the catalog or the HTTP surface. Tools and
//! model providers are plugged in through [`AgentBuilder`].

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod checkpoint;
pub mod conversation;
mod model_client;
pub mod relay;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, BuildError, DEFAULT_MAX_TOOL_ROUNDS, Error, ErrorKind,
    Route, route,
};
pub use tool::Tool;
