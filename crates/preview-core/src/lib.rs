//! Core abstractions for bound configuration previews.
//!
//! This crate provides the fundamental types shared by every component:
//! - `DispatchContext` - The `read` / `edit` REST permission scope
//! - `RestRequest` / `RestResponse` - Host dispatch value types
//! - `FieldId` - Parsed configuration field identifiers
//! - `EventBus` - Typed preview events with a defined firing order

mod config;
mod context;
mod events;
mod field;

pub use config::*;
pub use context::*;
pub use events::*;
pub use field::*;
