//! Resource binding registry.
//!
//! This crate provides:
//! - `BindingRegistry` - Field-to-route bindings with dirty value tracking
//! - `BindingKind` - Closed set of binding kinds resolved at registration
//! - `ControlLayout` - Generated controls for REST resource bindings

mod binding;
mod error;
mod layout;
mod registry;

pub use binding::*;
pub use error::*;
pub use layout::*;
pub use registry::*;
