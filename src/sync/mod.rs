//! Cross-device snapshot sync
//!
//! This module provides:
//! - A compact wire encoding of the whole card set ([`SnapshotDoc`])
//! - The remote snapshot store trait and its HTTP implementation
//! - The last-write-wins reconciler with conflict and rate-limit guards

pub mod models;
pub mod reconciler;
pub mod remote;

pub use models::*;
pub use reconciler::SyncReconciler;
pub use remote::{HttpRemoteStore, RemoteError, RemoteStore};
