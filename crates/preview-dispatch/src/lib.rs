//! Context-elevating REST dispatch.
//!
//! This crate provides:
//! - `RestServer` - The host REST dispatch boundary
//! - `ElevatingDispatcher` - Upgrades preview reads to `edit` context
//! - `MemoryRestServer` - Fixture-backed server for tests and the CLI

mod dispatcher;
mod error;
mod memory;
mod server;

pub use dispatcher::*;
pub use error::*;
pub use memory::*;
pub use server::*;
