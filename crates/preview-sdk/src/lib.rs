//! Public SDK for REST resource live preview.
//!
//! This crate re-exports all preview functionality:
//!
//! ```ignore
//! use preview_sdk::prelude::*;
//!
//! let server = Arc::new(MemoryRestServer::from_fixtures(fixtures));
//! let session = SessionHandle::new(PreviewSession::start("twentytwenty"));
//! let fetcher = DispatchFetcher::new(ElevatingDispatcher::new(server), session.clone());
//!
//! let sync = LiveSynchronizer::spawn(registry, Arc::new(fetcher), session, EventBus::new(), SyncConfig::default());
//! sync.edit(&FieldId::parse("rest_resource[pages][4][title]")?, json!("New Title")).await?;
//! sync.wait_until_settled().await?;
//! ```

pub use preview_core;
pub use preview_dispatch;
pub use preview_observability;
pub use preview_registry;
pub use preview_session;
pub use preview_sync;

/// Prelude for convenient imports.
pub mod prelude {
    pub use preview_core::*;
    pub use preview_dispatch::*;
    pub use preview_observability::*;
    pub use preview_registry::*;
    pub use preview_session::*;
    pub use preview_sync::*;
}
