//! Live preview synchronization.
//!
//! Edits to bound fields are coalesced per route over a debounce window and
//! the affected resources are re-requested through a [`ResourceFetcher`].
//! Results are published on the event bus.

mod error;
mod fetcher;
mod state;
mod synchronizer;

pub use error::*;
pub use fetcher::*;
pub use state::*;
pub use synchronizer::*;
