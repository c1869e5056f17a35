//! An abstraction layer for different chat models.
//!
//! This crate establishes an unified protocol for the agent to talk to the
//! supported chat models, so that the control loop can switch between them
//! without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod provider;
mod request;
mod response;

pub use provider::*;
pub use request::*;
pub use response::*;
