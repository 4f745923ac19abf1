//! Preview sessions.
//!
//! A preview session ties a nonce to the previewed theme and expires after a
//! fixed duration. The bootstrap blobs handed to the client process are built
//! from a live session.

mod bootstrap;
mod error;
mod nonce;
mod session;

pub use bootstrap::*;
pub use error::*;
pub use nonce::*;
pub use session::*;
