//! Google Drive連携モジュール

pub mod auth;
pub mod client;
pub mod sync;

pub use auth::Authenticator;
pub use client::DriveClient;
pub use sync::{RemoteStore, SyncStats, sync_directory};
